//! Top-level fleet configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{RelayConfig, TlsConfig};
use crate::error::ConfigError;

/// Configuration for the whole fleet, as stored in `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub paths: PathsConfig,
    pub supervisor: SupervisorConfig,
    pub relay: RelayConfig,
    pub tls: TlsConfig,
}

impl FleetConfig {
    /// Reject values that would produce broken unit names or paths
    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = &self.relay.unit_prefix;
        if prefix.is_empty() || !prefix.chars().all(is_unit_name_char) {
            return Err(ConfigError::Invalid(format!(
                "relay.unit_prefix {:?} is not a valid unit name prefix",
                prefix
            )));
        }
        if self.tls.unit_name.is_empty() || !self.tls.unit_name.chars().all(is_unit_name_char) {
            return Err(ConfigError::Invalid(format!(
                "tls.unit_name {:?} is not a valid unit name",
                self.tls.unit_name
            )));
        }
        if self.tls.validity_days == 0 {
            return Err(ConfigError::Invalid("tls.validity_days must be positive".into()));
        }
        if self.paths.state_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("paths.state_dir must be set".into()));
        }
        Ok(())
    }

    /// Registry file (`port|label` per line)
    pub fn registry_path(&self) -> PathBuf {
        self.paths.state_dir.join("ports")
    }

    /// TLS overlay status record
    pub fn tls_status_path(&self) -> PathBuf {
        self.paths.state_dir.join("tls").join("status")
    }

    /// Directory holding the TLS key and certificate
    pub fn cert_dir(&self) -> PathBuf {
        self.paths.state_dir.join("tls").join("certs")
    }

    /// Rendered TLS engine configuration
    pub fn tls_engine_config_path(&self) -> PathBuf {
        self.paths.state_dir.join("tls").join("overlay.conf")
    }

    /// Cross-process lock file
    pub fn lock_path(&self) -> PathBuf {
        self.paths.state_dir.join("proxyfleet.lock")
    }
}

fn is_unit_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@')
}

/// Filesystem locations for persistent state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Registry, TLS status record, certificates, and lock file live here
    pub state_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("/opt/proxyfleet"),
        }
    }
}

/// Host supervisor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Directory unit files are written to
    pub unit_dir: PathBuf,

    /// `systemctl` executable
    pub systemctl: PathBuf,

    /// `journalctl` executable, used for diagnostics
    pub journalctl: PathBuf,

    /// Number of log lines attached to a failed activation
    pub log_lines: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            unit_dir: PathBuf::from("/etc/systemd/system"),
            systemctl: PathBuf::from("systemctl"),
            journalctl: PathBuf::from("journalctl"),
            log_lines: 20,
        }
    }
}
