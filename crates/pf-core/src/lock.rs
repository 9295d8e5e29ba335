//! State lock for single-writer access
//!
//! Every mutating command holds this lock while it touches the registry, the
//! TLS status record, or supervisor definitions. The lock file stores the
//! owner's PID so a lock left behind by a crashed process can be reclaimed.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::FleetError;

/// Read the PID recorded in a lock file
///
/// Returns `Ok(None)` if the file doesn't exist.
pub fn read_lock_owner(path: &Path) -> io::Result<Option<u32>> {
    match fs::File::open(path) {
        Ok(mut file) => {
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            let pid = contents
                .trim()
                .parse::<u32>()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            Ok(Some(pid))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if a process with the given PID is still alive
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    // kill(pid, 0) succeeds for live processes; EPERM also means it exists
    unsafe {
        let result = libc::kill(pid as libc::pid_t, 0);
        if result == 0 {
            return true;
        }
        let err = std::io::Error::last_os_error();
        err.raw_os_error() == Some(libc::EPERM)
    }
}

#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    true
}

/// Guard that owns the state lock and removes it when dropped
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    /// Take the lock at `path` for process `pid`
    ///
    /// Fails with [`FleetError::Busy`] when another live process holds it.
    pub fn acquire(path: impl Into<PathBuf>, pid: u32) -> Result<Self, FleetError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    writeln!(file, "{}", pid)?;
                    tracing::debug!("Acquired state lock {:?}", path);
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    match read_lock_owner(&path) {
                        Ok(Some(owner)) if owner != pid && is_process_alive(owner) => {
                            return Err(FleetError::Busy(owner));
                        }
                        Ok(owner) => {
                            tracing::warn!("Reclaiming stale lock {:?} (owner {:?})", path, owner);
                        }
                        Err(e) => {
                            tracing::warn!("Reclaiming unreadable lock {:?}: {}", path, e);
                        }
                    }
                    match fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove lock file {:?}: {}", self.path, e),
        }
    }
}
