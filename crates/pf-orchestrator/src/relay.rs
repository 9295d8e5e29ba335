//! Relay unit manager
//!
//! Turns registry entries into supervised relay units and keeps the two in
//! step: an entry is recorded only after its unit is confirmed active, and a
//! unit that fails confirmation is removed again before the call returns.

use std::sync::Arc;

use pf_core::config::RelayConfig;
use pf_core::error::{FleetError, Result};
use pf_core::traits::{service_name, ListenerTerminator, PortProbe, Supervisor, UnitDefinition};
use pf_core::types::normalize_label;
use pf_core::{BatchReport, Port, RegistryEntry, UnitState};
use tracing::{info, warn};

use crate::registry::PortRegistry;

pub struct RelayUnitManager {
    config: RelayConfig,
    log_lines: usize,
    registry: PortRegistry,
    supervisor: Arc<dyn Supervisor>,
    probe: Arc<dyn PortProbe>,
    terminator: Arc<dyn ListenerTerminator>,
}

impl RelayUnitManager {
    pub fn new(
        config: RelayConfig,
        log_lines: usize,
        registry: PortRegistry,
        supervisor: Arc<dyn Supervisor>,
        probe: Arc<dyn PortProbe>,
        terminator: Arc<dyn ListenerTerminator>,
    ) -> Self {
        Self {
            config,
            log_lines,
            registry,
            supervisor,
            probe,
            terminator,
        }
    }

    pub fn registry(&self) -> &PortRegistry {
        &self.registry
    }

    /// Supervisor unit name for a port, e.g. `proxy-8080.service`
    pub fn unit_name(&self, port: Port) -> String {
        service_name(&format!("{}-{}", self.config.unit_prefix, port))
    }

    /// Unit definition derived from a registry entry
    pub fn definition(&self, entry: &RegistryEntry) -> UnitDefinition {
        let mut exec = vec![
            self.config.binary.display().to_string(),
            "--port".to_string(),
            entry.port.to_string(),
            "--status".to_string(),
            entry.label.clone(),
        ];
        exec.extend(self.config.extra_args.iter().cloned());

        UnitDefinition {
            name: format!("{}-{}", self.config.unit_prefix, entry.port),
            description: format!("proxyfleet relay on port {}", entry.port),
            exec,
            restart: self.config.restart_policy,
            restart_sec: self.config.restart_sec,
            limit_nofile: self.config.limit_nofile,
        }
    }

    /// Start a relay on a free port and register it once it is confirmed running
    pub async fn activate(&self, port: Port, label: &str) -> Result<RegistryEntry> {
        if self.registry.contains(port)? {
            return Err(FleetError::DuplicateEntry(port));
        }
        if self.probe.is_listening(port)? {
            return Err(FleetError::PortInUse(port));
        }

        let entry = RegistryEntry::new(port, &normalize_label(label, &self.config.default_label));
        self.start_unit(&entry).await?;

        match self.registry.record(entry) {
            Ok(entry) => {
                info!("Relay on port {} is active", port);
                Ok(entry)
            }
            Err(e) => {
                warn!("Failed to record port {}, tearing its unit down: {}", port, e);
                self.stop_unit(port, true).await?;
                Err(e)
            }
        }
    }

    /// Tear down the relay on `port`
    ///
    /// Safe to repeat: an absent unit, stopped process, or missing registry
    /// entry is not an error. Returns the entry that was removed, if any.
    /// Listeners on a port with neither an entry nor a unit are left alone.
    pub async fn deactivate(&self, port: Port) -> Result<Option<RegistryEntry>> {
        let registered = self.registry.contains(port)?;
        self.stop_unit(port, registered).await?;
        match self.registry.remove(port) {
            Ok(entry) => Ok(Some(entry)),
            Err(FleetError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Change the label shown by a running relay
    pub async fn update_label(&self, port: Port, label: &str) -> Result<RegistryEntry> {
        let current = self.registry.get(port)?.ok_or(FleetError::NotFound(port))?;
        if !self.probe.is_listening(port)? {
            return Err(FleetError::NotActive(port));
        }

        let updated = RegistryEntry::new(port, &normalize_label(label, &self.config.default_label));
        let unit = self.unit_name(port);

        let result = async {
            self.supervisor.undefine(&unit).await?;
            self.supervisor.define(&self.definition(&updated)).await?;
            self.supervisor.reload().await?;
            self.restart_confirmed(&unit).await
        }
        .await;

        if let Err(e) = result {
            warn!("Relabelling relay on port {} failed, restoring previous unit: {}", port, e);
            self.restore_definition(&current).await;
            return Err(e);
        }

        let entry = self.registry.update(port, &updated.label)?;
        info!("Relay on port {} now shows {:?}", port, entry.label);
        Ok(entry)
    }

    /// Restart every registered relay in registry order
    ///
    /// Each port is handled on its own: its stop phase finishes before its
    /// start phase begins, and a failure is reported without stopping the loop.
    /// A relay that cannot be brought back is dropped from the registry.
    pub async fn restart_all(&self) -> Result<BatchReport> {
        let mut report = BatchReport::new();

        for entry in self.registry.list()? {
            let target = format!("port {} ({})", entry.port, entry.label);

            if let Err(e) = self.stop_unit(entry.port, true).await {
                report.failure(target, e);
                continue;
            }

            let started = match self.probe.is_listening(entry.port) {
                Ok(true) => Err(FleetError::PortInUse(entry.port)),
                Ok(false) => self.start_unit(&entry).await,
                Err(e) => Err(e),
            };

            match started {
                Ok(()) => {
                    info!("Restarted relay on port {}", entry.port);
                    report.success(target);
                }
                Err(e) => {
                    warn!("Relay on port {} did not come back: {}", entry.port, e);
                    if let Err(remove_err) = self.registry.remove(entry.port) {
                        warn!("Failed to unregister port {}: {}", entry.port, remove_err);
                    }
                    report.failure(target, e);
                }
            }
        }

        Ok(report)
    }

    /// Supervisor view of the relay unit for `port`
    pub async fn unit_state(&self, port: Port) -> Result<UnitState> {
        let unit = self.unit_name(port);
        Ok(UnitState {
            active: self.supervisor.is_active(&unit).await?,
            enabled: self.supervisor.is_enabled(&unit).await?,
        })
    }

    /// Ports that have a relay unit defined but no registry entry
    pub async fn orphaned_ports(&self) -> Result<Vec<Port>> {
        let prefix = format!("{}-", self.config.unit_prefix);
        let registered: Vec<Port> = self.registry.list()?.into_iter().map(|e| e.port).collect();

        let orphans = self
            .supervisor
            .defined_units(&prefix)
            .await?
            .iter()
            .filter_map(|unit| {
                let port = unit.strip_prefix(&prefix)?.strip_suffix(".service")?;
                Port::parse(port).ok()
            })
            .filter(|port| !registered.contains(port))
            .collect();
        Ok(orphans)
    }

    /// Define, enable, and start the unit for `entry`, then confirm it once
    ///
    /// Any failure removes everything this call created.
    async fn start_unit(&self, entry: &RegistryEntry) -> Result<()> {
        let unit = self.unit_name(entry.port);
        self.supervisor.define(&self.definition(entry)).await?;

        let result = async {
            self.supervisor.reload().await?;
            self.supervisor.enable(&unit).await?;
            self.supervisor.start(&unit).await?;
            self.confirm(&unit).await
        }
        .await;

        if let Err(e) = result {
            warn!("Rolling back {}: {}", unit, e);
            self.rollback(&unit).await;
            return Err(e);
        }
        Ok(())
    }

    /// Disable, stop, undefine, and kill whatever still listens on `port`
    ///
    /// Listeners are only killed when the port is `registered` or had a unit
    /// definition. Only a definition that cannot be deleted is reported;
    /// everything else is best effort because the unit may already be partly
    /// gone.
    async fn stop_unit(&self, port: Port, registered: bool) -> Result<()> {
        let unit = self.unit_name(port);

        if let Err(e) = self.supervisor.disable(&unit).await {
            tracing::debug!("Ignoring disable failure for {}: {}", unit, e);
        }
        if let Err(e) = self.supervisor.stop(&unit).await {
            tracing::debug!("Ignoring stop failure for {}: {}", unit, e);
        }
        let undefined = self.supervisor.undefine(&unit).await;

        if registered || matches!(undefined, Ok(true)) {
            match self.terminator.terminate_listeners(port) {
                Ok(0) => {}
                Ok(n) => warn!("Killed {} lingering listener(s) on port {}", n, port),
                Err(e) => warn!("Could not check for lingering listeners on port {}: {}", port, e),
            }
        }
        if let Err(e) = self.supervisor.reload().await {
            warn!("Supervisor reload after stopping {} failed: {}", unit, e);
        }

        undefined.map(|_| ())
    }

    async fn confirm(&self, unit: &str) -> Result<()> {
        if self.supervisor.is_active(unit).await? {
            return Ok(());
        }
        let diagnostics = self
            .supervisor
            .logs(unit, self.log_lines)
            .await
            .unwrap_or_else(|e| format!("(logs unavailable: {})", e));
        Err(FleetError::ConfirmationFailed {
            unit: unit.to_string(),
            diagnostics,
        })
    }

    async fn restart_confirmed(&self, unit: &str) -> Result<()> {
        self.supervisor.restart(unit).await?;
        self.confirm(unit).await
    }

    async fn rollback(&self, unit: &str) {
        if let Err(e) = self.supervisor.disable(unit).await {
            tracing::debug!("Rollback: disable {} failed: {}", unit, e);
        }
        if let Err(e) = self.supervisor.stop(unit).await {
            tracing::debug!("Rollback: stop {} failed: {}", unit, e);
        }
        if let Err(e) = self.supervisor.undefine(unit).await {
            warn!("Rollback: could not delete {}: {}", unit, e);
        }
        if let Err(e) = self.supervisor.reload().await {
            warn!("Rollback: supervisor reload failed: {}", e);
        }
    }

    async fn restore_definition(&self, entry: &RegistryEntry) {
        let unit = self.unit_name(entry.port);
        let restored = async {
            self.supervisor.define(&self.definition(entry)).await?;
            self.supervisor.reload().await?;
            self.supervisor.restart(&unit).await
        }
        .await;
        if let Err(e) = restored {
            warn!("Could not restore {}: {}", unit, e);
        }
    }
}
