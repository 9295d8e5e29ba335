//! Configuration management for proxyfleet

mod fleet;
mod relay;
mod tls;

pub use fleet::{FleetConfig, PathsConfig, SupervisorConfig};
pub use relay::{RelayConfig, RestartPolicy};
pub use tls::TlsConfig;

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configuration file location
pub const CONFIG_ENV: &str = "PROXYFLEET_CONFIG";

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    PathBuf::from("/etc/proxyfleet")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load the fleet configuration, falling back to defaults when the file is absent
pub fn load_or_default(path: &Path) -> Result<FleetConfig, ConfigError> {
    match load_config::<FleetConfig>(path) {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(ConfigError::NotFound(_)) => {
            tracing::debug!("No config at {:?}, using defaults", path);
            Ok(FleetConfig::default())
        }
        Err(e) => Err(e),
    }
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}
