//! Output formatting utilities for the CLI
//!
//! Tables for the relay fleet and batch reports, plus colored status messages.

use serde::Serialize;
use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use pf_core::{BatchReport, Port, RegistryEntry, UnitState};

/// One relay as shown by `list --long`
#[derive(Debug, Clone, Serialize)]
pub struct PortStatus {
    pub port: Port,
    pub label: String,
    pub unit: String,
    #[serde(flatten)]
    pub state: UnitState,
}

/// Format registry entries as an ASCII table
///
/// Returns "No relays registered" for an empty registry.
pub fn format_ports(entries: &[RegistryEntry]) -> String {
    if entries.is_empty() {
        return "No relays registered".to_string();
    }

    #[derive(Tabled)]
    struct PortRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "PORT")]
        port: u16,
        #[tabled(rename = "LABEL")]
        label: String,
    }

    let rows: Vec<PortRow> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| PortRow {
            index: i + 1,
            port: e.port.get(),
            label: truncate(&e.label, 48),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format relays with their supervisor state
pub fn format_port_states(states: &[PortStatus]) -> String {
    if states.is_empty() {
        return "No relays registered".to_string();
    }

    #[derive(Tabled)]
    struct PortStateRow {
        #[tabled(rename = "PORT")]
        port: u16,
        #[tabled(rename = "LABEL")]
        label: String,
        #[tabled(rename = "UNIT")]
        unit: String,
        #[tabled(rename = "STATUS")]
        status: String,
        #[tabled(rename = "ENABLED")]
        enabled: String,
    }

    let rows: Vec<PortStateRow> = states
        .iter()
        .map(|s| PortStateRow {
            port: s.port.get(),
            label: s.label.clone(),
            unit: s.unit.clone(),
            status: s.state.to_string(),
            enabled: if s.state.enabled { "yes" } else { "no" }.to_string(),
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(100))
        .to_string()
}

/// Format the per-item outcome of a batch operation
pub fn format_report(report: &BatchReport) -> String {
    #[derive(Tabled)]
    struct ReportRow {
        #[tabled(rename = "TARGET")]
        target: String,
        #[tabled(rename = "RESULT")]
        result: String,
    }

    let rows: Vec<ReportRow> = report
        .succeeded
        .iter()
        .map(|target| ReportRow {
            target: target.clone(),
            result: "ok".to_string(),
        })
        .chain(report.failed.iter().map(|f| ReportRow {
            target: f.target.clone(),
            result: f.error.to_string(),
        }))
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(100))
        .to_string()
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix to stderr
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print supervisor log output under an error, indented
pub fn print_diagnostics(diagnostics: &str) {
    for line in diagnostics.lines() {
        eprintln!("    {}", line);
    }
}
