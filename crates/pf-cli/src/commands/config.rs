//! Config command implementations

use std::path::Path;

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success, print_warning};
use pf_core::config::{self, FleetConfig};

/// Show the effective configuration
pub fn config_show(path: &Path) -> Result<()> {
    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}, showing defaults", path));
    }
    let config = config::load_or_default(path)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub fn config_path(path: &Path) -> Result<()> {
    println!("{}", path.display());
    Ok(())
}

/// Write a default configuration file
pub fn config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {:?}", dir))?;
            print_success(&format!("Created config directory: {:?}", dir));
        }
    }

    std::fs::write(path, default_config_content()?)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    print_success(&format!("Created configuration file: {:?}", path));
    Ok(())
}

/// Default configuration as written by `config init`
pub fn default_config_content() -> Result<String> {
    let body = toml::to_string_pretty(&FleetConfig::default())?;
    Ok(format!(
        "# proxyfleet configuration\n# Every key is optional; missing keys use the values below.\n\n{}",
        body
    ))
}
