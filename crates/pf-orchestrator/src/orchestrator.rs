//! Operator-facing command surface
//!
//! Validates raw operator input and delegates to the relay and TLS managers.
//! Nothing in here touches the filesystem or the supervisor directly.

use std::sync::Arc;

use pf_core::config::FleetConfig;
use pf_core::error::Result;
use pf_core::traits::{ListenerTerminator, PackageInstaller, PortProbe, RegistryStore, StatusStore, Supervisor};
use pf_core::{BatchReport, OverlayStatus, Port, RegistryEntry, TlsOverlayConfig, UnitState};
use pf_core::types::validate_host;
use tracing::{info, warn};

use crate::host::{AptInstaller, ProcessTerminator, SystemPortProbe, SystemdSupervisor};
use crate::registry::PortRegistry;
use crate::relay::RelayUnitManager;
use crate::store::{FileRegistryStore, FileStatusStore, MemoryRegistryStore, MemoryStatusStore};
use crate::tls::{OverlayPaths, TlsOverlayManager};

/// Host collaborators the orchestrator acts through
#[derive(Clone)]
pub struct Host {
    pub supervisor: Arc<dyn Supervisor>,
    pub probe: Arc<dyn PortProbe>,
    pub terminator: Arc<dyn ListenerTerminator>,
    pub installer: Arc<dyn PackageInstaller>,
}

impl Host {
    /// systemd, `/proc` probing, signals, and apt
    pub fn system(config: &FleetConfig) -> Self {
        Self {
            supervisor: Arc::new(SystemdSupervisor::new(&config.supervisor)),
            probe: Arc::new(SystemPortProbe::new()),
            terminator: Arc::new(ProcessTerminator::default()),
            installer: Arc::new(AptInstaller::new()),
        }
    }
}

/// Durable state the orchestrator reads and writes
#[derive(Clone)]
pub struct Stores {
    pub registry: Arc<dyn RegistryStore>,
    pub status: Arc<dyn StatusStore>,
}

impl Stores {
    /// Files under the configured state directory
    pub fn files(config: &FleetConfig) -> Self {
        Self {
            registry: Arc::new(FileRegistryStore::new(config.registry_path())),
            status: Arc::new(FileStatusStore::new(config.tls_status_path())),
        }
    }

    pub fn memory() -> Self {
        Self {
            registry: Arc::new(MemoryRegistryStore::new()),
            status: Arc::new(MemoryStatusStore::new()),
        }
    }
}

pub struct Orchestrator {
    relays: RelayUnitManager,
    tls: TlsOverlayManager,
}

impl Orchestrator {
    pub fn new(config: &FleetConfig, host: Host, stores: Stores) -> Self {
        let registry = PortRegistry::new(stores.registry, Arc::clone(&host.probe));
        let relays = RelayUnitManager::new(
            config.relay.clone(),
            config.supervisor.log_lines,
            registry,
            Arc::clone(&host.supervisor),
            Arc::clone(&host.probe),
            Arc::clone(&host.terminator),
        );
        let tls = TlsOverlayManager::new(
            config.tls.clone(),
            config.supervisor.log_lines,
            OverlayPaths {
                engine_config: config.tls_engine_config_path(),
                cert_dir: config.cert_dir(),
            },
            stores.status,
            host.supervisor,
            host.probe,
            host.installer,
        );
        Self { relays, tls }
    }

    /// Orchestrator acting on the real host with file-backed state
    pub fn from_config(config: &FleetConfig) -> Self {
        Self::new(config, Host::system(config), Stores::files(config))
    }

    pub fn relays(&self) -> &RelayUnitManager {
        &self.relays
    }

    pub fn tls(&self) -> &TlsOverlayManager {
        &self.tls
    }

    /// Reload durable registry state
    pub fn restore(&self) -> Result<Vec<RegistryEntry>> {
        self.relays.registry().restore()
    }

    pub async fn add_port(&self, raw_port: &str, label: &str) -> Result<RegistryEntry> {
        let port = Port::parse(raw_port)?;
        self.relays.activate(port, label).await
    }

    /// Tear down a relay; `Ok(None)` when the port was not registered
    pub async fn remove_port(&self, raw_port: &str) -> Result<Option<RegistryEntry>> {
        let port = Port::parse(raw_port)?;
        self.relays.deactivate(port).await
    }

    pub async fn update_label(&self, raw_port: &str, label: &str) -> Result<RegistryEntry> {
        let port = Port::parse(raw_port)?;
        self.relays.update_label(port, label).await
    }

    pub async fn restart_all(&self) -> Result<BatchReport> {
        self.relays.restart_all().await
    }

    pub fn list_ports(&self) -> Result<Vec<RegistryEntry>> {
        self.relays.registry().list()
    }

    /// Registry entries together with their supervisor state
    pub async fn port_states(&self) -> Result<Vec<(RegistryEntry, UnitState)>> {
        let mut states = Vec::new();
        for entry in self.list_ports()? {
            let state = self.relays.unit_state(entry.port).await?;
            states.push((entry, state));
        }
        Ok(states)
    }

    pub async fn tls_activate(
        &self,
        raw_listen_port: &str,
        connect_host: &str,
        raw_connect_port: &str,
    ) -> Result<TlsOverlayConfig> {
        let listen_port = Port::parse(raw_listen_port)?;
        let connect_port = Port::parse(raw_connect_port)?;
        let connect_host = validate_host(connect_host)?;
        self.tls.activate(listen_port, connect_host, connect_port).await
    }

    pub async fn tls_deactivate(&self) -> Result<()> {
        self.tls.deactivate().await
    }

    pub async fn tls_status(&self) -> Result<OverlayStatus> {
        self.tls.status().await
    }

    pub async fn tls_restart(&self) -> Result<TlsOverlayConfig> {
        self.tls.restart().await
    }

    pub fn tls_fingerprint(&self) -> Result<Option<String>> {
        self.tls.certificate_fingerprint()
    }

    /// Remove every relay, the TLS overlay, and all generated artifacts
    ///
    /// Individual failures are collected in the report rather than aborting,
    /// so a partially uninstalled host can simply be uninstalled again.
    pub async fn uninstall(&self) -> Result<BatchReport> {
        let mut report = BatchReport::new();

        let mut ports: Vec<Port> = match self.list_ports() {
            Ok(entries) => entries.into_iter().map(|e| e.port).collect(),
            Err(e) => {
                report.failure("registry", e);
                Vec::new()
            }
        };
        match self.relays.orphaned_ports().await {
            Ok(orphans) => ports.extend(orphans),
            Err(e) => warn!("Could not scan for orphaned relay units: {}", e),
        }

        for port in ports {
            let target = format!("port {}", port);
            match self.relays.deactivate(port).await {
                Ok(_) => report.success(target),
                Err(e) => report.failure(target, e),
            }
        }

        match self.tls.deactivate().await {
            Ok(()) => report.success("tls overlay"),
            Err(e) => report.failure("tls overlay", e),
        }
        if let Err(e) = self.tls.purge().await {
            report.failure("tls artifacts", e);
        }
        if let Err(e) = self.relays.registry().clear() {
            report.failure("registry", e);
        }

        info!(
            "Uninstall finished: {} removed, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        Ok(report)
    }
}
