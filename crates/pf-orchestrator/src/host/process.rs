//! Forced termination of lingering listeners

use std::thread::sleep;
use std::time::Duration;

use pf_core::error::Result;
use pf_core::traits::ListenerTerminator;
use pf_core::Port;
use tracing::{debug, warn};

/// Terminates processes holding a listening socket, SIGTERM first then SIGKILL
#[derive(Debug, Clone)]
pub struct ProcessTerminator {
    grace: Duration,
}

impl ProcessTerminator {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }
}

impl Default for ProcessTerminator {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500))
    }
}

impl ListenerTerminator for ProcessTerminator {
    #[cfg(target_os = "linux")]
    fn terminate_listeners(&self, port: Port) -> Result<usize> {
        let inodes = super::probe::listening_socket_inodes(port)?;
        if inodes.is_empty() {
            return Ok(0);
        }

        let own_pid = std::process::id();
        let pids: Vec<u32> = pids_owning_sockets(&inodes)
            .into_iter()
            .filter(|pid| *pid != own_pid)
            .collect();

        for pid in &pids {
            warn!("Terminating PID {} still listening on port {}", pid, port);
            terminate_process(*pid, self.grace);
        }
        Ok(pids.len())
    }

    #[cfg(not(target_os = "linux"))]
    fn terminate_listeners(&self, port: Port) -> Result<usize> {
        debug!("Listener termination is not supported on this platform (port {})", port);
        Ok(0)
    }
}

/// Walk `/proc/<pid>/fd` looking for `socket:[inode]` links
#[cfg(target_os = "linux")]
fn pids_owning_sockets(inodes: &[u64]) -> Vec<u32> {
    let targets: Vec<String> = inodes.iter().map(|i| format!("socket:[{}]", i)).collect();
    let mut pids = Vec::new();

    let Ok(proc_entries) = std::fs::read_dir("/proc") else {
        return pids;
    };
    for entry in proc_entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        // Processes we may not inspect, or that exited meanwhile, are skipped
        let Ok(fds) = std::fs::read_dir(entry.path().join("fd")) else {
            continue;
        };
        let owns = fds.flatten().any(|fd| {
            std::fs::read_link(fd.path())
                .map(|link| targets.iter().any(|t| link.as_os_str() == t.as_str()))
                .unwrap_or(false)
        });
        if owns {
            pids.push(pid);
        }
    }
    pids
}

#[cfg(unix)]
fn is_alive(pid: u32) -> bool {
    pf_core::lock::is_process_alive(pid)
}

/// Send SIGTERM, wait up to `grace`, then SIGKILL
#[cfg(unix)]
fn terminate_process(pid: u32, grace: Duration) {
    let raw = pid as libc::pid_t;

    debug!("Sending SIGTERM to process {}", pid);
    if unsafe { libc::kill(raw, libc::SIGTERM) } != 0 {
        // ESRCH: already gone
        return;
    }

    let interval = Duration::from_millis(100);
    let iterations = (grace.as_millis() / interval.as_millis()).max(1);
    for _ in 0..iterations {
        sleep(interval);
        if !is_alive(pid) {
            debug!("Process {} exited after SIGTERM", pid);
            return;
        }
    }

    debug!("Process {} still running, sending SIGKILL", pid);
    unsafe {
        libc::kill(raw, libc::SIGKILL);
    }
    sleep(interval);
}

#[cfg(not(unix))]
fn terminate_process(pid: u32, _grace: Duration) {
    debug!("Cannot terminate process {} on this platform", pid);
}
