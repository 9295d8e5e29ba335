//! In-memory stores for tests and dry runs

use std::sync::Mutex;

use pf_core::error::Result;
use pf_core::traits::{RegistryStore, StatusStore};
use pf_core::{RegistryEntry, TlsOverlayConfig};

#[derive(Debug, Default)]
pub struct MemoryRegistryStore {
    entries: Mutex<Vec<RegistryEntry>>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<RegistryEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl RegistryStore for MemoryRegistryStore {
    fn load(&self) -> Result<Vec<RegistryEntry>> {
        Ok(self.entries.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    fn save(&self, entries: &[RegistryEntry]) -> Result<()> {
        *self.entries.lock().unwrap_or_else(|p| p.into_inner()) = entries.to_vec();
        Ok(())
    }

    fn purge(&self) -> Result<()> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).clear();
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    record: Mutex<Option<TlsOverlayConfig>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusStore for MemoryStatusStore {
    fn load(&self) -> Result<Option<TlsOverlayConfig>> {
        Ok(self.record.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    fn save(&self, config: &TlsOverlayConfig) -> Result<()> {
        *self.record.lock().unwrap_or_else(|p| p.into_inner()) = Some(config.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.record.lock().unwrap_or_else(|p| p.into_inner()) = None;
        Ok(())
    }
}
