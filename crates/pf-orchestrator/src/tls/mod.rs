//! TLS overlay manager
//!
//! Manages the single TLS-terminating tunnel in front of one backend endpoint:
//! certificate material, the rendered engine configuration, one supervised
//! process, and the status record describing what it was configured with.

mod cert;
mod render;

pub use cert::CertificateMaterial;
pub use render::render_engine_config;

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use pf_core::config::{RestartPolicy, TlsConfig};
use pf_core::error::{FleetError, Result};
use pf_core::traits::{service_name, PackageInstaller, PortProbe, StatusStore, Supervisor, UnitDefinition};
use pf_core::types::validate_host;
use pf_core::{OverlayStatus, Port, TlsOverlayConfig};
use tracing::{info, warn};

use crate::host::find_binary;

/// Lifecycle of the overlay as seen by this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Absent,
    Configuring,
    Active,
    Reconfiguring,
}

impl fmt::Display for OverlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayState::Absent => write!(f, "absent"),
            OverlayState::Configuring => write!(f, "configuring"),
            OverlayState::Active => write!(f, "active"),
            OverlayState::Reconfiguring => write!(f, "reconfiguring"),
        }
    }
}

/// Filesystem locations owned by the overlay
#[derive(Debug, Clone)]
pub struct OverlayPaths {
    /// Rendered engine configuration
    pub engine_config: PathBuf,
    /// Directory holding the key and certificate
    pub cert_dir: PathBuf,
}

pub struct TlsOverlayManager {
    config: TlsConfig,
    log_lines: usize,
    engine_config: PathBuf,
    certs: CertificateMaterial,
    status: Arc<dyn StatusStore>,
    supervisor: Arc<dyn Supervisor>,
    probe: Arc<dyn PortProbe>,
    installer: Arc<dyn PackageInstaller>,
    state: Mutex<OverlayState>,
}

impl TlsOverlayManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: TlsConfig,
        log_lines: usize,
        paths: OverlayPaths,
        status: Arc<dyn StatusStore>,
        supervisor: Arc<dyn Supervisor>,
        probe: Arc<dyn PortProbe>,
        installer: Arc<dyn PackageInstaller>,
    ) -> Self {
        Self {
            config,
            log_lines,
            engine_config: paths.engine_config,
            certs: CertificateMaterial::new(paths.cert_dir),
            status,
            supervisor,
            probe,
            installer,
            state: Mutex::new(OverlayState::Absent),
        }
    }

    pub fn unit_name(&self) -> String {
        service_name(&self.config.unit_name)
    }

    pub fn certificates(&self) -> &CertificateMaterial {
        &self.certs
    }

    /// State reached by the last operation in this process
    pub fn state(&self) -> OverlayState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn transition(&self, next: OverlayState) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if *state != next {
            tracing::debug!("TLS overlay {} -> {}", *state, next);
            *state = next;
        }
    }

    /// Bring the overlay up as `listen_port -> connect_host:connect_port`
    ///
    /// Replaces any previous configuration. When the overlay already listens
    /// on `listen_port` it is reconfigured in place instead of rejected. A
    /// failed reconfiguration puts the previous overlay back.
    pub async fn activate(
        &self,
        listen_port: Port,
        connect_host: &str,
        connect_port: Port,
    ) -> Result<TlsOverlayConfig> {
        let connect_host = validate_host(connect_host)?;
        let overlay = TlsOverlayConfig {
            listen_port,
            connect_host: connect_host.to_string(),
            connect_port,
        };

        let binary = self.config.binary.display().to_string();
        self.installer
            .ensure_installed(&self.config.package, &binary)
            .await?;
        self.certs
            .ensure(&self.config.common_name, self.config.validity_days)?;

        let unit = self.unit_name();
        let running = self.supervisor.is_active(&unit).await?;
        if self.probe.is_listening(listen_port)? {
            let recorded = self.status.load()?;
            let ours = running && recorded.map(|r| r.listen_port) == Some(listen_port);
            if !ours {
                return Err(FleetError::PortInUse(listen_port));
            }
            info!("TLS overlay already listens on {}, reconfiguring in place", listen_port);
        }

        let previous = if running { self.snapshot()? } else { None };
        self.transition(if running {
            OverlayState::Reconfiguring
        } else {
            OverlayState::Configuring
        });

        match self.apply(&overlay).await {
            Ok(()) => {
                self.transition(OverlayState::Active);
                info!("TLS overlay active: {}", overlay);
                Ok(overlay)
            }
            Err(e) => {
                match previous {
                    Some(previous) => {
                        warn!("TLS overlay reconfiguration failed, restoring {}: {}", previous.overlay, e);
                        self.restore(previous).await;
                    }
                    None => {
                        warn!("TLS overlay activation failed, rolling back: {}", e);
                        self.rollback().await;
                        self.transition(OverlayState::Absent);
                    }
                }
                Err(e)
            }
        }
    }

    /// Stop the overlay and forget its configuration; certificates are kept
    pub async fn deactivate(&self) -> Result<()> {
        let unit = self.unit_name();
        if self.supervisor.is_active(&unit).await? {
            self.supervisor.stop(&unit).await?;
            info!("Stopped {}", unit);
        }
        if let Err(e) = self.supervisor.disable(&unit).await {
            tracing::debug!("Ignoring disable failure for {}: {}", unit, e);
        }
        self.status.clear()?;
        self.transition(OverlayState::Absent);
        Ok(())
    }

    pub async fn status(&self) -> Result<OverlayStatus> {
        if !self.supervisor.is_active(&self.unit_name()).await? {
            return Ok(OverlayStatus::Absent);
        }
        Ok(match self.status.load()? {
            Some(config) => OverlayStatus::Active(config),
            None => OverlayStatus::ActiveUnknown,
        })
    }

    /// Configuration recorded by the last successful activation
    pub fn recorded(&self) -> Result<Option<TlsOverlayConfig>> {
        self.status.load()
    }

    /// Deactivate and activate again with the recorded parameters
    pub async fn restart(&self) -> Result<TlsOverlayConfig> {
        let recorded = self.status.load()?.ok_or(FleetError::NotConfigured)?;
        self.deactivate().await?;
        self.activate(recorded.listen_port, &recorded.connect_host, recorded.connect_port)
            .await
    }

    pub fn certificate_fingerprint(&self) -> Result<Option<String>> {
        self.certs.fingerprint()
    }

    /// Remove every overlay artifact: unit, engine config, certificates, record
    ///
    /// Expects the overlay to be deactivated already; safe to repeat.
    pub async fn purge(&self) -> Result<()> {
        let unit = self.unit_name();
        if self.supervisor.undefine(&unit).await? {
            if let Err(e) = self.supervisor.reload().await {
                warn!("Supervisor reload after removing {} failed: {}", unit, e);
            }
        }
        remove_file_if_present(&self.engine_config)?;
        self.certs.remove()?;
        self.status.clear()?;
        self.transition(OverlayState::Absent);
        Ok(())
    }

    async fn apply(&self, overlay: &TlsOverlayConfig) -> Result<()> {
        let rendered =
            render_engine_config(overlay, &self.certs.cert_path(), &self.certs.key_path());
        if let Some(parent) = self.engine_config.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.engine_config, rendered)?;

        let unit = self.unit_name();
        self.supervisor.define(&self.definition()).await?;
        self.supervisor.reload().await?;
        self.supervisor.enable(&unit).await?;
        // restart also starts a stopped unit, and picks up the new config otherwise
        self.supervisor.restart(&unit).await?;

        if !self.supervisor.is_active(&unit).await? {
            let diagnostics = self
                .supervisor
                .logs(&unit, self.log_lines)
                .await
                .unwrap_or_else(|e| format!("(logs unavailable: {})", e));
            return Err(FleetError::ConfirmationFailed { unit, diagnostics });
        }

        self.status.save(overlay)
    }

    fn definition(&self) -> UnitDefinition {
        let configured = self.config.binary.display().to_string();
        let binary = find_binary(&configured, std::env::var_os("PATH"))
            .map(|p| p.display().to_string())
            .unwrap_or(configured);

        UnitDefinition {
            name: self.config.unit_name.clone(),
            description: "proxyfleet TLS overlay".to_string(),
            exec: vec![binary, self.engine_config.display().to_string()],
            restart: RestartPolicy::OnFailure,
            restart_sec: 3,
            limit_nofile: None,
        }
    }

    /// Engine config and status record of the running overlay, if both exist
    fn snapshot(&self) -> Result<Option<Snapshot>> {
        let Some(overlay) = self.status.load()? else {
            return Ok(None);
        };
        match std::fs::read_to_string(&self.engine_config) {
            Ok(engine_config) => Ok(Some(Snapshot {
                overlay,
                engine_config,
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Put a snapshot back in place and restart the overlay from it
    async fn restore(&self, previous: Snapshot) {
        let unit = self.unit_name();
        let restored: Result<bool> = async {
            std::fs::write(&self.engine_config, &previous.engine_config)?;
            self.status.save(&previous.overlay)?;
            self.supervisor.define(&self.definition()).await?;
            self.supervisor.reload().await?;
            self.supervisor.enable(&unit).await?;
            self.supervisor.restart(&unit).await?;
            self.supervisor.is_active(&unit).await
        }
        .await;

        match restored {
            Ok(true) => {
                info!("TLS overlay restored: {}", previous.overlay);
                self.transition(OverlayState::Active);
            }
            Ok(false) => {
                warn!("Restored TLS overlay {} is not running", previous.overlay);
                self.transition(OverlayState::Absent);
            }
            Err(e) => {
                warn!("Could not restore TLS overlay {}: {}", previous.overlay, e);
                self.transition(OverlayState::Absent);
            }
        }
    }

    async fn rollback(&self) {
        let unit = self.unit_name();
        if let Err(e) = self.supervisor.stop(&unit).await {
            tracing::debug!("Rollback: stop {} failed: {}", unit, e);
        }
        if let Err(e) = self.supervisor.disable(&unit).await {
            tracing::debug!("Rollback: disable {} failed: {}", unit, e);
        }
        if let Err(e) = self.supervisor.undefine(&unit).await {
            warn!("Rollback: could not delete {}: {}", unit, e);
        }
        if let Err(e) = self.supervisor.reload().await {
            warn!("Rollback: supervisor reload failed: {}", e);
        }
        if let Err(e) = remove_file_if_present(&self.engine_config) {
            warn!("Rollback: could not delete {:?}: {}", self.engine_config, e);
        }
        if let Err(e) = self.status.clear() {
            warn!("Rollback: could not clear TLS status record: {}", e);
        }
    }
}

/// Running overlay captured before a reconfiguration
struct Snapshot {
    overlay: TlsOverlayConfig,
    engine_config: String,
}

fn remove_file_if_present(path: &std::path::Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
