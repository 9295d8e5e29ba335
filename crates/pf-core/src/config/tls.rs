//! TLS overlay configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// TLS engine and certificate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// OS package providing the TLS engine
    pub package: String,

    /// TLS engine executable
    pub binary: PathBuf,

    /// Supervisor unit name (without `.service`)
    pub unit_name: String,

    /// Certificate subject common name
    pub common_name: String,

    /// Certificate validity in days
    pub validity_days: u32,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            package: "stunnel4".to_string(),
            binary: PathBuf::from("stunnel"),
            unit_name: "proxyfleet-tls".to_string(),
            common_name: "proxyfleet".to_string(),
            validity_days: 3650,
        }
    }
}
