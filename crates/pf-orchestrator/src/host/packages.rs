//! apt-based package installer

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use pf_core::error::{FleetError, Result};
use pf_core::traits::PackageInstaller;

/// Installs missing tools with `apt-get`
#[derive(Debug, Clone)]
pub struct AptInstaller {
    apt_get: PathBuf,
}

impl AptInstaller {
    pub fn new() -> Self {
        Self {
            apt_get: PathBuf::from("apt-get"),
        }
    }
}

impl Default for AptInstaller {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PackageInstaller for AptInstaller {
    async fn ensure_installed(&self, package: &str, binary: &str) -> Result<()> {
        if let Some(path) = find_binary(binary, std::env::var_os("PATH")) {
            tracing::debug!("{} already present at {:?}", binary, path);
            return Ok(());
        }

        tracing::info!("Installing package {}", package);
        let output = Command::new(&self.apt_get)
            .args(["install", "-y", package])
            .env("DEBIAN_FRONTEND", "noninteractive")
            .output()
            .await
            .map_err(|e| FleetError::ExternalTool {
                tool: self.apt_get.display().to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(FleetError::ExternalTool {
                tool: format!("apt-get install {}", package),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Resolve `binary` the way a shell would: as-is when it contains a slash,
/// otherwise against each `PATH` entry
pub fn find_binary(binary: &str, path_var: Option<OsString>) -> Option<PathBuf> {
    if binary.contains('/') {
        let path = Path::new(binary);
        return path.is_file().then(|| path.to_path_buf());
    }
    let path_var = path_var?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}
