//! systemd implementation of the process supervisor

use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

use pf_core::config::SupervisorConfig;
use pf_core::error::{FleetError, Result};
use pf_core::traits::{Supervisor, UnitDefinition};

/// Supervisor backed by `systemctl` and unit files in `unit_dir`
#[derive(Debug, Clone)]
pub struct SystemdSupervisor {
    unit_dir: PathBuf,
    systemctl: PathBuf,
    journalctl: PathBuf,
}

impl SystemdSupervisor {
    pub fn new(config: &SupervisorConfig) -> Self {
        Self {
            unit_dir: config.unit_dir.clone(),
            systemctl: config.systemctl.clone(),
            journalctl: config.journalctl.clone(),
        }
    }

    fn unit_path(&self, unit: &str) -> PathBuf {
        self.unit_dir.join(unit)
    }

    async fn systemctl(&self, action: &'static str, unit: Option<&str>) -> Result<Output> {
        let mut cmd = Command::new(&self.systemctl);
        cmd.arg(action);
        if let Some(unit) = unit {
            cmd.arg(unit);
        }
        tracing::debug!("Running {:?} {} {}", self.systemctl, action, unit.unwrap_or(""));
        cmd.output().await.map_err(|e| FleetError::Supervisor {
            action,
            unit: unit.unwrap_or("daemon").to_string(),
            message: format!("failed to execute {:?}: {}", self.systemctl, e),
        })
    }

    /// Run a state-changing command and fail on a non-zero exit
    async fn checked(&self, action: &'static str, unit: Option<&str>) -> Result<()> {
        let output = self.systemctl(action, unit).await?;
        if output.status.success() {
            return Ok(());
        }
        Err(FleetError::Supervisor {
            action,
            unit: unit.unwrap_or("daemon").to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Run a query command whose exit status is the answer
    async fn query(&self, action: &'static str, unit: &str) -> Result<bool> {
        let output = self.systemctl(action, Some(unit)).await?;
        Ok(output.status.success())
    }
}

#[async_trait]
impl Supervisor for SystemdSupervisor {
    async fn define(&self, unit: &UnitDefinition) -> Result<PathBuf> {
        let path = self.unit_path(&unit.unit_name());
        let content = render_unit(unit);
        let write = |path: &Path| -> io::Result<()> {
            fs::create_dir_all(&self.unit_dir)?;
            fs::write(path, content)
        };
        write(&path).map_err(|e| FleetError::Supervisor {
            action: "define",
            unit: unit.unit_name(),
            message: format!("failed to write {:?}: {}", path, e),
        })?;
        tracing::info!("Wrote unit file {:?}", path);
        Ok(path)
    }

    async fn undefine(&self, unit: &str) -> Result<bool> {
        let path = self.unit_path(unit);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Removed unit file {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FleetError::Supervisor {
                action: "undefine",
                unit: unit.to_string(),
                message: format!("failed to remove {:?}: {}", path, e),
            }),
        }
    }

    async fn is_defined(&self, unit: &str) -> Result<bool> {
        Ok(self.unit_path(unit).exists())
    }

    async fn defined_units(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.unit_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut units: Vec<String> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(prefix) && name.ends_with(".service"))
            .collect();
        units.sort();
        Ok(units)
    }

    async fn reload(&self) -> Result<()> {
        self.checked("daemon-reload", None).await
    }

    async fn enable(&self, unit: &str) -> Result<()> {
        self.checked("enable", Some(unit)).await
    }

    async fn disable(&self, unit: &str) -> Result<()> {
        self.checked("disable", Some(unit)).await
    }

    async fn start(&self, unit: &str) -> Result<()> {
        self.checked("start", Some(unit)).await
    }

    async fn stop(&self, unit: &str) -> Result<()> {
        self.checked("stop", Some(unit)).await
    }

    async fn restart(&self, unit: &str) -> Result<()> {
        self.checked("restart", Some(unit)).await
    }

    async fn is_active(&self, unit: &str) -> Result<bool> {
        self.query("is-active", unit).await
    }

    async fn is_enabled(&self, unit: &str) -> Result<bool> {
        self.query("is-enabled", unit).await
    }

    async fn logs(&self, unit: &str, lines: usize) -> Result<String> {
        let output = Command::new(&self.journalctl)
            .arg("-u")
            .arg(unit)
            .arg("-n")
            .arg(lines.to_string())
            .arg("--no-pager")
            .output()
            .await
            .map_err(|e| FleetError::ExternalTool {
                tool: self.journalctl.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Render a unit definition as a systemd `.service` file
pub fn render_unit(unit: &UnitDefinition) -> String {
    let exec = unit
        .exec
        .iter()
        .map(|arg| quote_exec_arg(arg))
        .collect::<Vec<_>>()
        .join(" ");

    let mut content = format!(
        r#"[Unit]
Description={description}
After=network.target

[Service]
Type=simple
ExecStart={exec}
Restart={restart}
RestartSec={restart_sec}s
"#,
        description = unit.description,
        exec = exec,
        restart = unit.restart,
        restart_sec = unit.restart_sec,
    );

    if let Some(limit) = unit.limit_nofile {
        content.push_str(&format!("LimitNOFILE={}\n", limit));
    }

    content.push_str(
        r#"
[Install]
WantedBy=multi-user.target
"#,
    );
    content
}

/// Quote one `ExecStart=` word
///
/// `%` and `$` are always doubled so systemd never expands them. Words with
/// whitespace, quotes, or backslashes are wrapped in double quotes.
pub fn quote_exec_arg(arg: &str) -> String {
    let escaped = arg.replace('%', "%%").replace('$', "$$");
    let needs_quotes = escaped.is_empty()
        || escaped
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\'' || c == '\\' || c == ';');
    if !needs_quotes {
        return escaped;
    }
    let mut quoted = String::with_capacity(escaped.len() + 2);
    quoted.push('"');
    for c in escaped.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
