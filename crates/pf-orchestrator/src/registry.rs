//! Port registry: the durable desired state of the relay fleet
//!
//! The registry never caches; every call goes to the backing store so the
//! answer always reflects what is on disk right now.

use std::sync::Arc;

use pf_core::error::{FleetError, Result};
use pf_core::traits::{PortProbe, RegistryStore};
use pf_core::{Port, RegistryEntry};

pub struct PortRegistry {
    store: Arc<dyn RegistryStore>,
    probe: Arc<dyn PortProbe>,
}

impl PortRegistry {
    pub fn new(store: Arc<dyn RegistryStore>, probe: Arc<dyn PortProbe>) -> Self {
        Self { store, probe }
    }

    /// Load the registry at process start; a missing store is an empty registry
    pub fn restore(&self) -> Result<Vec<RegistryEntry>> {
        let entries = self.store.load()?;
        tracing::debug!("Restored {} registry entries", entries.len());
        Ok(entries)
    }

    /// All entries in insertion order
    pub fn list(&self) -> Result<Vec<RegistryEntry>> {
        self.store.load()
    }

    pub fn get(&self, port: Port) -> Result<Option<RegistryEntry>> {
        Ok(self.store.load()?.into_iter().find(|e| e.port == port))
    }

    pub fn contains(&self, port: Port) -> Result<bool> {
        Ok(self.get(port)?.is_some())
    }

    /// Register a port that nothing else is listening on
    pub fn add(&self, port: Port, label: &str) -> Result<RegistryEntry> {
        if self.contains(port)? {
            return Err(FleetError::DuplicateEntry(port));
        }
        if self.probe.is_listening(port)? {
            return Err(FleetError::PortUnavailable(port));
        }
        let entry = RegistryEntry::new(port, label);
        self.store.append(&entry)?;
        tracing::info!("Registered port {} ({})", entry.port, entry.label);
        Ok(entry)
    }

    /// Append an entry whose relay is already confirmed running
    ///
    /// Skips the listener check because the relay itself holds the port.
    pub fn record(&self, entry: RegistryEntry) -> Result<RegistryEntry> {
        if self.contains(entry.port)? {
            return Err(FleetError::DuplicateEntry(entry.port));
        }
        self.store.append(&entry)?;
        tracing::info!("Registered port {} ({})", entry.port, entry.label);
        Ok(entry)
    }

    pub fn remove(&self, port: Port) -> Result<RegistryEntry> {
        let entry = self.get(port)?.ok_or(FleetError::NotFound(port))?;
        self.store.remove_matching(port)?;
        tracing::info!("Unregistered port {}", port);
        Ok(entry)
    }

    /// Replace the label in place, keeping the entry's position
    pub fn update(&self, port: Port, label: &str) -> Result<RegistryEntry> {
        let mut entries = self.store.load()?;
        let entry = entries
            .iter_mut()
            .find(|e| e.port == port)
            .ok_or(FleetError::NotFound(port))?;
        *entry = RegistryEntry::new(port, label);
        let updated = entry.clone();
        self.store.save(&entries)?;
        tracing::info!("Updated label of port {} to {}", port, updated.label);
        Ok(updated)
    }

    /// Drop every entry
    pub fn clear(&self) -> Result<()> {
        self.store.purge()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRegistryStore;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StaticProbe(Mutex<HashSet<u16>>);

    impl PortProbe for StaticProbe {
        fn is_listening(&self, port: Port) -> Result<bool> {
            Ok(self.0.lock().unwrap().contains(&port.get()))
        }
    }

    fn port(n: u32) -> Port {
        Port::new(n).unwrap()
    }

    fn registry() -> (PortRegistry, Arc<StaticProbe>) {
        let probe = Arc::new(StaticProbe::default());
        let registry = PortRegistry::new(Arc::new(MemoryRegistryStore::new()), probe.clone());
        (registry, probe)
    }

    #[test]
    fn test_add_defaults_blank_label() {
        let (registry, _) = registry();
        let entry = registry.add(port(8080), "").unwrap();
        assert_eq!(entry.label, pf_core::types::DEFAULT_LABEL);
        assert_eq!(registry.list().unwrap(), vec![entry]);
    }

    #[test]
    fn test_add_rejects_duplicate() {
        let (registry, _) = registry();
        registry.add(port(8080), "A").unwrap();
        let err = registry.add(port(8080), "B").unwrap_err();
        assert!(matches!(err, FleetError::DuplicateEntry(p) if p.get() == 8080));
        assert_eq!(registry.list().unwrap().len(), 1);
    }

    #[test]
    fn test_add_rejects_foreign_listener() {
        let (registry, probe) = registry();
        probe.0.lock().unwrap().insert(3128);
        let err = registry.add(port(3128), "").unwrap_err();
        assert!(matches!(err, FleetError::PortUnavailable(_)));
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn test_record_skips_probe() {
        let (registry, probe) = registry();
        probe.0.lock().unwrap().insert(80);
        registry.record(RegistryEntry::new(port(80), "x")).unwrap();
        assert!(registry.contains(port(80)).unwrap());
    }

    #[test]
    fn test_update_preserves_position() {
        let (registry, _) = registry();
        registry.add(port(80), "a").unwrap();
        registry.add(port(81), "b").unwrap();
        registry.add(port(82), "c").unwrap();

        registry.update(port(81), "B").unwrap();
        let labels: Vec<String> = registry.list().unwrap().into_iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["a", "B", "c"]);
    }

    #[test]
    fn test_missing_entries_are_not_found() {
        let (registry, _) = registry();
        assert!(matches!(registry.remove(port(1)), Err(FleetError::NotFound(_))));
        assert!(matches!(registry.update(port(1), "x"), Err(FleetError::NotFound(_))));
    }

    #[test]
    fn test_restore_empty_store() {
        let (registry, _) = registry();
        assert!(registry.restore().unwrap().is_empty());
    }
}
