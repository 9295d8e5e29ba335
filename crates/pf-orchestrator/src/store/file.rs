//! Line-oriented file stores
//!
//! The registry is one `port|label` record per line; the TLS status record is
//! a single `listen|host|connect` line. Writes go to a sibling temp file and
//! are renamed into place so a crash never leaves a half-written registry.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use pf_core::error::{Result, StoreError};
use pf_core::traits::{RegistryStore, StatusStore};
use pf_core::{RegistryEntry, TlsOverlayConfig};

/// Registry backed by a plain text file
#[derive(Debug, Clone)]
pub struct FileRegistryStore {
    path: PathBuf,
}

impl FileRegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RegistryStore for FileRegistryStore {
    fn load(&self) -> Result<Vec<RegistryEntry>> {
        let Some(content) = read_optional(&self.path)? else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<RegistryEntry> = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry = RegistryEntry::from_record(line).ok_or_else(|| StoreError::Malformed {
                path: self.path.clone(),
                line: index + 1,
                record: line.to_string(),
            })?;
            if entries.iter().any(|e| e.port == entry.port) {
                tracing::warn!(
                    "Ignoring duplicate registry record for port {} at {:?}:{}",
                    entry.port,
                    self.path,
                    index + 1
                );
                continue;
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    fn save(&self, entries: &[RegistryEntry]) -> Result<()> {
        let mut content = String::new();
        for entry in entries {
            content.push_str(&entry.to_record());
            content.push('\n');
        }
        write_atomic(&self.path, &content)
    }

    fn append(&self, entry: &RegistryEntry) -> Result<()> {
        let result = (|| -> io::Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            writeln!(file, "{}", entry.to_record())?;
            file.sync_all()
        })();
        result.map_err(|source| access(&self.path, source))
    }

    fn purge(&self) -> Result<()> {
        remove_optional(&self.path)
    }
}

/// TLS status record backed by a single-line file
#[derive(Debug, Clone)]
pub struct FileStatusStore {
    path: PathBuf,
}

impl FileStatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusStore for FileStatusStore {
    fn load(&self) -> Result<Option<TlsOverlayConfig>> {
        let Some(content) = read_optional(&self.path)? else {
            return Ok(None);
        };
        let line = content.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        if line.is_empty() {
            return Ok(None);
        }
        let config = TlsOverlayConfig::from_record(line).ok_or_else(|| StoreError::Malformed {
            path: self.path.clone(),
            line: 1,
            record: line.to_string(),
        })?;
        Ok(Some(config))
    }

    fn save(&self, config: &TlsOverlayConfig) -> Result<()> {
        write_atomic(&self.path, &format!("{}\n", config.to_record()))
    }

    fn clear(&self) -> Result<()> {
        remove_optional(&self.path)
    }
}

fn access(path: &Path, source: io::Error) -> pf_core::FleetError {
    StoreError::Access {
        path: path.to_path_buf(),
        source,
    }
    .into()
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(access(path, e)),
    }
}

fn remove_optional(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(access(path, e)),
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let result = (|| -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    result.map_err(|source| access(path, source))
}
