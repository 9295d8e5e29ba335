//! Relay unit configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::types::DEFAULT_LABEL;

/// How relay units are generated
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay executable, invoked as `<binary> --port P --status S`
    pub binary: PathBuf,

    /// Units are named `<unit_prefix>-<port>.service`
    pub unit_prefix: String,

    /// Label used when the operator leaves it blank
    pub default_label: String,

    /// Supervisor restart policy
    pub restart_policy: RestartPolicy,

    /// Seconds between automatic restarts
    pub restart_sec: u32,

    /// Open file descriptor limit for each relay
    pub limit_nofile: Option<u64>,

    /// Extra arguments appended after `--status`
    pub extra_args: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("/opt/proxyfleet/bin/relay"),
            unit_prefix: "proxy".to_string(),
            default_label: DEFAULT_LABEL.to_string(),
            restart_policy: RestartPolicy::Always,
            restart_sec: 3,
            limit_nofile: Some(65536),
            extra_args: Vec::new(),
        }
    }
}

/// systemd `Restart=` values used by generated units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    Always,
    OnFailure,
    No,
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartPolicy::Always => write!(f, "always"),
            RestartPolicy::OnFailure => write!(f, "on-failure"),
            RestartPolicy::No => write!(f, "no"),
        }
    }
}
