//! Package installation trait

use async_trait::async_trait;

use crate::error::Result;

/// Makes sure an external tool is present on the host
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Install `package` unless `binary` can already be found
    async fn ensure_installed(&self, package: &str, binary: &str) -> Result<()>;
}
