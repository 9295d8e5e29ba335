//! Core error types for proxyfleet

use std::path::PathBuf;
use thiserror::Error;

use crate::types::Port;

/// Result alias used across the proxyfleet crates
pub type Result<T, E = FleetError> = std::result::Result<T, E>;

/// Closed set of failures an operation can surface to the operator
#[derive(Error, Debug)]
pub enum FleetError {
    /// Port outside 1..=65535 or not a number
    #[error("Invalid port: {0:?} (expected a number between 1 and 65535)")]
    InvalidPort(String),

    /// Empty connect host for the TLS overlay
    #[error("Connect host must not be empty")]
    EmptyHost,

    /// Connect host that would not survive the status record or engine config
    #[error("Invalid connect host: {0:?} (whitespace, control characters and '|' are not allowed)")]
    InvalidHost(String),

    /// Port already present in the registry
    #[error("Port {0} is already registered")]
    DuplicateEntry(Port),

    /// Registry add rejected because an unrelated listener holds the port
    #[error("Port {0} is unavailable: another process is listening on it")]
    PortUnavailable(Port),

    /// Activation rejected because the port is bound
    #[error("Port {0} is already in use")]
    PortInUse(Port),

    /// Port not present in the registry
    #[error("Port {0} is not registered")]
    NotFound(Port),

    /// Port registered but nothing listens on it
    #[error("No relay is listening on port {0}")]
    NotActive(Port),

    /// No TLS overlay configuration has been recorded
    #[error("TLS overlay is not configured")]
    NotConfigured,

    /// Unit started but the supervisor does not report it active
    #[error("Unit {unit} did not become active")]
    ConfirmationFailed {
        unit: String,
        /// Tail of the unit's log output
        diagnostics: String,
    },

    /// Supervisor command failed
    #[error("Supervisor failed to {action} {unit}: {message}")]
    Supervisor {
        action: &'static str,
        unit: String,
        message: String,
    },

    /// External tool (package manager, TLS engine) failed
    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    /// Certificate generation or persistence failed
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Durable store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Another proxyfleet process holds the state lock
    #[error("Another proxyfleet process (PID {0}) is running")]
    Busy(u32),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FleetError {
    /// Process exit code reported to the operator for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FleetError::InvalidPort(_) | FleetError::EmptyHost | FleetError::InvalidHost(_) => 2,
            FleetError::DuplicateEntry(_) => 3,
            FleetError::PortUnavailable(_) | FleetError::PortInUse(_) => 4,
            FleetError::NotFound(_) | FleetError::NotActive(_) | FleetError::NotConfigured => 5,
            FleetError::ConfirmationFailed { .. } => 6,
            FleetError::Busy(_) => 7,
            _ => 1,
        }
    }

    /// Underlying diagnostic output, when the failure carries any
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            FleetError::ConfirmationFailed { diagnostics, .. } if !diagnostics.trim().is_empty() => {
                Some(diagnostics)
            }
            _ => None,
        }
    }
}

/// Durable store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// A record could not be parsed
    #[error("{path}:{line}: malformed record {record:?}")]
    Malformed {
        path: PathBuf,
        line: usize,
        record: String,
    },

    /// Reading or writing the backing file failed
    #[error("Failed to access {path:?}: {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
