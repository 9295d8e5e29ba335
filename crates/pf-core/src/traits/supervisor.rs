//! Process supervisor trait

use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::RestartPolicy;
use crate::error::Result;

/// Everything the supervisor needs to run one long-lived process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDefinition {
    /// Unit name without the `.service` suffix
    pub name: String,
    pub description: String,
    /// Program followed by its arguments
    pub exec: Vec<String>,
    pub restart: RestartPolicy,
    pub restart_sec: u32,
    pub limit_nofile: Option<u64>,
}

impl UnitDefinition {
    /// Name as the supervisor knows it, e.g. `proxy-8080.service`
    pub fn unit_name(&self) -> String {
        service_name(&self.name)
    }
}

/// Append `.service` unless already present
pub fn service_name(name: &str) -> String {
    if name.ends_with(".service") {
        name.to_string()
    } else {
        format!("{}.service", name)
    }
}

/// Host service manager
///
/// All calls complete before returning; nothing here imposes a timeout.
/// Units are addressed by their full name (`*.service`).
#[async_trait]
pub trait Supervisor: Send + Sync {
    /// Install or overwrite a unit definition, returning where it lives
    async fn define(&self, unit: &UnitDefinition) -> Result<PathBuf>;

    /// Delete a unit definition; returns `false` if there was none
    async fn undefine(&self, unit: &str) -> Result<bool>;

    /// Whether a definition exists for `unit`
    async fn is_defined(&self, unit: &str) -> Result<bool>;

    /// Names of all defined units starting with `prefix`
    async fn defined_units(&self, prefix: &str) -> Result<Vec<String>>;

    /// Re-read unit definitions
    async fn reload(&self) -> Result<()>;

    async fn enable(&self, unit: &str) -> Result<()>;

    async fn disable(&self, unit: &str) -> Result<()>;

    async fn start(&self, unit: &str) -> Result<()>;

    async fn stop(&self, unit: &str) -> Result<()>;

    /// Restart the unit, starting it if it was stopped
    async fn restart(&self, unit: &str) -> Result<()>;

    async fn is_active(&self, unit: &str) -> Result<bool>;

    async fn is_enabled(&self, unit: &str) -> Result<bool>;

    /// Last `lines` lines of the unit's log output
    async fn logs(&self, unit: &str, lines: usize) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_suffix() {
        assert_eq!(service_name("proxy-80"), "proxy-80.service");
        assert_eq!(service_name("proxy-80.service"), "proxy-80.service");
    }
}
