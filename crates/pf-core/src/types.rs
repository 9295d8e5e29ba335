//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FleetError;

/// Label shown by a relay when the operator did not provide one
pub const DEFAULT_LABEL: &str = "@RustyManager";

/// Separator used by the registry and TLS status records
pub const RECORD_SEPARATOR: char = '|';

/// A validated TCP port in `1..=65535`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Create a port from a raw number, rejecting 0 and values above 65535
    pub fn new(raw: u32) -> Result<Self, FleetError> {
        match u16::try_from(raw) {
            Ok(0) | Err(_) => Err(FleetError::InvalidPort(raw.to_string())),
            Ok(port) => Ok(Self(port)),
        }
    }

    /// Parse operator input such as `" 8080 "`
    pub fn parse(raw: &str) -> Result<Self, FleetError> {
        let trimmed = raw.trim();
        let value: u32 = trimmed
            .parse()
            .map_err(|_| FleetError::InvalidPort(trimmed.to_string()))?;
        Self::new(value)
    }

    /// Get the raw port number
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Port {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<u32> for Port {
    type Error = FleetError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Replace a blank label with `default` and flatten line breaks
///
/// Labels end up on a single registry line and in a unit's `ExecStart=`, so
/// they must never span lines.
pub fn normalize_label(label: &str, default: &str) -> String {
    let flat: String = label
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let flat = flat.trim();
    if flat.is_empty() {
        default.to_string()
    } else {
        flat.to_string()
    }
}

/// Trim and check a TLS connect host
///
/// The host is written into a `listen|host|connect` record and a line of the
/// engine config, so it must be one token without the record separator.
pub fn validate_host(host: &str) -> Result<&str, FleetError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(FleetError::EmptyHost);
    }
    if host
        .chars()
        .any(|c| c == RECORD_SEPARATOR || c.is_whitespace() || c.is_control())
    {
        return Err(FleetError::InvalidHost(host.to_string()));
    }
    Ok(host)
}

/// One desired relay instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub port: Port,
    pub label: String,
}

impl RegistryEntry {
    /// Create an entry, falling back to [`DEFAULT_LABEL`] for a blank label
    pub fn new(port: Port, label: &str) -> Self {
        Self {
            port,
            label: normalize_label(label, DEFAULT_LABEL),
        }
    }

    /// Render as a `port|label` registry line
    pub fn to_record(&self) -> String {
        format!("{}{}{}", self.port, RECORD_SEPARATOR, self.label)
    }

    /// Parse a registry line
    ///
    /// A line holding only a port yields an entry with the default label.
    /// Returns `None` for malformed lines.
    pub fn from_record(line: &str) -> Option<Self> {
        let (port, label) = match line.split_once(RECORD_SEPARATOR) {
            Some((port, label)) => (port, label),
            None => (line, ""),
        };
        let port = Port::parse(port).ok()?;
        Some(Self::new(port, label))
    }
}

/// Singleton TLS overlay parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsOverlayConfig {
    pub listen_port: Port,
    pub connect_host: String,
    pub connect_port: Port,
}

impl TlsOverlayConfig {
    /// Address the TLS engine forwards decrypted traffic to
    pub fn connect_address(&self) -> String {
        if self.connect_host.contains(':') && !self.connect_host.starts_with('[') {
            format!("[{}]:{}", self.connect_host, self.connect_port)
        } else {
            format!("{}:{}", self.connect_host, self.connect_port)
        }
    }

    /// Render as a `listen|host|connect` status line
    pub fn to_record(&self) -> String {
        format!(
            "{listen}{sep}{host}{sep}{connect}",
            listen = self.listen_port,
            host = self.connect_host,
            connect = self.connect_port,
            sep = RECORD_SEPARATOR
        )
    }

    /// Parse a status line; `None` if malformed
    pub fn from_record(line: &str) -> Option<Self> {
        let mut fields = line.trim().split(RECORD_SEPARATOR);
        let listen_port = Port::parse(fields.next()?).ok()?;
        let connect_host = fields.next()?.trim().to_string();
        let connect_port = Port::parse(fields.next()?).ok()?;
        if connect_host.is_empty() || fields.next().is_some() {
            return None;
        }
        Some(Self {
            listen_port,
            connect_host,
            connect_port,
        })
    }
}

impl fmt::Display for TlsOverlayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.listen_port, self.connect_address())
    }
}

/// Observed state of the TLS overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayStatus {
    /// Overlay process is not running
    Absent,
    /// Overlay process is running with a known configuration
    Active(TlsOverlayConfig),
    /// Overlay process is running but its status record is missing
    ActiveUnknown,
}

impl OverlayStatus {
    /// Whether the overlay process is running
    pub fn is_active(&self) -> bool {
        !matches!(self, OverlayStatus::Absent)
    }

    /// Known configuration of a running overlay
    pub fn config(&self) -> Option<&TlsOverlayConfig> {
        match self {
            OverlayStatus::Active(config) => Some(config),
            _ => None,
        }
    }
}

impl fmt::Display for OverlayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayStatus::Absent => write!(f, "inactive"),
            OverlayStatus::Active(config) => write!(f, "active ({})", config),
            OverlayStatus::ActiveUnknown => write!(f, "active (configuration unknown)"),
        }
    }
}

/// Supervisor view of a single unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnitState {
    pub active: bool,
    pub enabled: bool,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.active, self.enabled) {
            (true, _) => write!(f, "active"),
            (false, true) => write!(f, "failed"),
            (false, false) => write!(f, "inactive"),
        }
    }
}

/// One item that failed inside a batch operation
#[derive(Debug)]
pub struct BatchFailure {
    /// What the item was, e.g. `port 8080 (@label)`
    pub target: String,
    pub error: FleetError,
}

/// Outcome of a batch operation that isolates per-item failures
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&mut self, target: impl Into<String>) {
        self.succeeded.push(target.into());
    }

    pub fn failure(&mut self, target: impl Into<String>, error: FleetError) {
        self.failed.push(BatchFailure {
            target: target.into(),
            error,
        });
    }

    /// True when no item failed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
