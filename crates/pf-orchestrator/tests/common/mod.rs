//! In-memory host used by the orchestrator integration tests
//!
//! Models just enough of systemd and the network stack: active relay units
//! hold the port named by `--port`, the TLS unit holds the `accept` port of
//! the engine config it was started with.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use pf_core::config::FleetConfig;
use pf_core::error::{FleetError, Result};
use pf_core::traits::{ListenerTerminator, PackageInstaller, PortProbe, Supervisor, UnitDefinition};
use pf_core::Port;
use pf_orchestrator::{Host, Orchestrator, Stores};

#[derive(Default)]
struct FakeState {
    units: HashMap<String, UnitDefinition>,
    enabled: HashSet<String>,
    /// Active units and the port each one holds
    active: HashMap<String, Option<u16>>,
    broken: HashSet<String>,
    /// Units whose next `define` call fails
    failing_define: HashSet<String>,
    foreign: HashSet<u16>,
    installed: Vec<String>,
    reloads: usize,
}

impl FakeState {
    fn listening(&self) -> BTreeSet<u16> {
        self.active
            .values()
            .flatten()
            .chain(self.foreign.iter())
            .copied()
            .collect()
    }

    fn require_defined(&self, action: &'static str, unit: &str) -> Result<()> {
        if self.units.contains_key(unit) {
            return Ok(());
        }
        Err(FleetError::Supervisor {
            action,
            unit: unit.to_string(),
            message: format!("Unit {} not found.", unit),
        })
    }

    /// Launch the unit's process; a broken unit or a bound port leaves it inactive
    fn launch(&mut self, unit: &str) {
        if self.broken.contains(unit) {
            return;
        }
        let port = self.units.get(unit).and_then(bound_port);
        if let Some(port) = port {
            if self.listening().contains(&port) {
                return;
            }
        }
        self.active.insert(unit.to_string(), port);
    }
}

/// Port a unit binds, read from its command line or engine config
fn bound_port(unit: &UnitDefinition) -> Option<u16> {
    if let Some(index) = unit.exec.iter().position(|arg| arg == "--port") {
        return unit.exec.get(index + 1)?.parse().ok();
    }
    let config = std::fs::read_to_string(unit.exec.get(1)?).ok()?;
    config.lines().find_map(|line| {
        let value = line.trim().strip_prefix("accept")?.trim_start().strip_prefix('=')?;
        value.trim().parse().ok()
    })
}

#[derive(Clone, Default)]
pub struct FakeHost {
    state: Arc<Mutex<FakeState>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(&self) -> Host {
        Host {
            supervisor: Arc::new(self.clone()),
            probe: Arc::new(self.clone()),
            terminator: Arc::new(self.clone()),
            installer: Arc::new(self.clone()),
        }
    }

    /// Simulate an unrelated process listening on `port`
    pub fn occupy(&self, port: u16) {
        self.state.lock().unwrap().foreign.insert(port);
    }

    /// Make `unit` exit immediately whenever it is started
    pub fn break_unit(&self, unit: &str) {
        self.state.lock().unwrap().broken.insert(unit.to_string());
    }

    /// Make the next `define` of `unit` fail without touching its unit file
    pub fn fail_next_define(&self, unit: &str) {
        self.state.lock().unwrap().failing_define.insert(unit.to_string());
    }

    pub fn repair_unit(&self, unit: &str) {
        self.state.lock().unwrap().broken.remove(unit);
    }

    /// Kill a running unit behind the supervisor's back
    pub fn crash(&self, unit: &str) {
        self.state.lock().unwrap().active.remove(unit);
    }

    pub fn defined(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut units: Vec<String> = state.units.keys().cloned().collect();
        units.sort();
        units
    }

    pub fn enabled(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut units: Vec<String> = state.enabled.iter().cloned().collect();
        units.sort();
        units
    }

    pub fn active(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut units: Vec<String> = state.active.keys().cloned().collect();
        units.sort();
        units
    }

    pub fn listening(&self) -> Vec<u16> {
        self.state.lock().unwrap().listening().into_iter().collect()
    }

    pub fn exec(&self, unit: &str) -> Option<Vec<String>> {
        self.state.lock().unwrap().units.get(unit).map(|u| u.exec.clone())
    }

    pub fn installed(&self) -> Vec<String> {
        self.state.lock().unwrap().installed.clone()
    }

    pub fn reloads(&self) -> usize {
        self.state.lock().unwrap().reloads
    }
}

#[async_trait]
impl Supervisor for FakeHost {
    async fn define(&self, unit: &UnitDefinition) -> Result<PathBuf> {
        let name = unit.unit_name();
        let mut state = self.state.lock().unwrap();
        if state.failing_define.remove(&name) {
            return Err(FleetError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("cannot write {}", name),
            )));
        }
        state.units.insert(name.clone(), unit.clone());
        Ok(PathBuf::from("/etc/systemd/system").join(name))
    }

    async fn undefine(&self, unit: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().units.remove(unit).is_some())
    }

    async fn is_defined(&self, unit: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().units.contains_key(unit))
    }

    async fn defined_units(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .defined()
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect())
    }

    async fn reload(&self) -> Result<()> {
        self.state.lock().unwrap().reloads += 1;
        Ok(())
    }

    async fn enable(&self, unit: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.require_defined("enable", unit)?;
        state.enabled.insert(unit.to_string());
        Ok(())
    }

    async fn disable(&self, unit: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let was_enabled = state.enabled.remove(unit);
        if was_enabled {
            return Ok(());
        }
        state.require_defined("disable", unit)
    }

    async fn start(&self, unit: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.require_defined("start", unit)?;
        if !state.active.contains_key(unit) {
            state.launch(unit);
        }
        Ok(())
    }

    async fn stop(&self, unit: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.active.remove(unit).is_some() {
            return Ok(());
        }
        state.require_defined("stop", unit)
    }

    async fn restart(&self, unit: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.require_defined("restart", unit)?;
        state.active.remove(unit);
        state.launch(unit);
        Ok(())
    }

    async fn is_active(&self, unit: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().active.contains_key(unit))
    }

    async fn is_enabled(&self, unit: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().enabled.contains(unit))
    }

    async fn logs(&self, unit: &str, lines: usize) -> Result<String> {
        Ok(format!("{}: exited with status 1 (last {} lines)\n", unit, lines))
    }
}

impl PortProbe for FakeHost {
    fn is_listening(&self, port: Port) -> Result<bool> {
        Ok(self.state.lock().unwrap().listening().contains(&port.get()))
    }
}

impl ListenerTerminator for FakeHost {
    fn terminate_listeners(&self, port: Port) -> Result<usize> {
        let removed = self.state.lock().unwrap().foreign.remove(&port.get());
        Ok(usize::from(removed))
    }
}

#[async_trait]
impl PackageInstaller for FakeHost {
    async fn ensure_installed(&self, package: &str, _binary: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.installed.iter().any(|p| p == package) {
            state.installed.push(package.to_string());
        }
        Ok(())
    }
}

/// Orchestrator on a fake host with file-backed state in a temp directory
pub struct TestFleet {
    pub dir: TempDir,
    pub config: FleetConfig,
    pub host: FakeHost,
    pub orchestrator: Orchestrator,
}

impl TestFleet {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = FleetConfig::default();
        config.paths.state_dir = dir.path().to_path_buf();
        let host = FakeHost::new();
        let orchestrator = Orchestrator::new(&config, host.host(), Stores::files(&config));
        Self {
            dir,
            config,
            host,
            orchestrator,
        }
    }

    /// A second orchestrator over the same state, as a later CLI invocation would see it
    pub fn reopen(&self) -> Orchestrator {
        Orchestrator::new(&self.config, self.host.host(), Stores::files(&self.config))
    }

    pub fn registry_contents(&self) -> Option<String> {
        std::fs::read_to_string(self.config.registry_path()).ok()
    }
}

pub fn port(n: u32) -> Port {
    Port::new(n).unwrap()
}
