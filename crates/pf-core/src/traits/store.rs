//! Durable store traits

use crate::error::Result;
use crate::types::{Port, RegistryEntry, TlsOverlayConfig};

/// Ordered, durable list of registry entries
///
/// A store that was never written behaves as an empty registry.
pub trait RegistryStore: Send + Sync {
    /// Load all entries in insertion order
    fn load(&self) -> Result<Vec<RegistryEntry>>;

    /// Replace the whole contents
    fn save(&self, entries: &[RegistryEntry]) -> Result<()>;

    /// Append one entry at the end
    fn append(&self, entry: &RegistryEntry) -> Result<()> {
        let mut entries = self.load()?;
        entries.push(entry.clone());
        self.save(&entries)
    }

    /// Remove every entry for `port`, returning whether anything was removed
    fn remove_matching(&self, port: Port) -> Result<bool> {
        let mut entries = self.load()?;
        let before = entries.len();
        entries.retain(|e| e.port != port);
        if entries.len() == before {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }

    /// Delete the backing storage entirely; missing storage is not an error
    fn purge(&self) -> Result<()>;
}

/// Single-record store for the TLS overlay parameters
pub trait StatusStore: Send + Sync {
    fn load(&self) -> Result<Option<TlsOverlayConfig>>;

    fn save(&self, config: &TlsOverlayConfig) -> Result<()>;

    /// Delete the record; a missing record is not an error
    fn clear(&self) -> Result<()>;
}
