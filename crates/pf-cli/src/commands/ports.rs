//! Relay commands: add, remove, update, restart

use anyhow::Result;

use pf_orchestrator::Orchestrator;

use crate::output::{format_report, print_diagnostics, print_info, print_success, print_warning};

/// Start a relay on `port` and register it
pub async fn add_command(orchestrator: &Orchestrator, port: &str, label: Option<&str>) -> Result<()> {
    let entry = orchestrator.add_port(port, label.unwrap_or("")).await?;
    print_success(&format!(
        "Relay on port {} is running with label {:?}",
        entry.port, entry.label
    ));
    Ok(())
}

/// Tear down the relays on `ports`, in the order given
pub async fn remove_command(orchestrator: &Orchestrator, ports: &[String]) -> Result<()> {
    for raw in ports {
        match orchestrator.remove_port(raw).await? {
            Some(entry) => print_success(&format!(
                "Removed relay on port {} ({})",
                entry.port, entry.label
            )),
            None => print_warning(&format!(
                "Port {} was not registered; removed any leftover unit",
                raw.trim()
            )),
        }
    }
    Ok(())
}

pub async fn update_command(orchestrator: &Orchestrator, port: &str, label: &str) -> Result<()> {
    let entry = orchestrator.update_label(port, label).await?;
    print_success(&format!(
        "Relay on port {} now shows {:?}",
        entry.port, entry.label
    ));
    Ok(())
}

/// Restart every registered relay and report each outcome
pub async fn restart_command(orchestrator: &Orchestrator) -> Result<()> {
    let report = orchestrator.restart_all().await?;
    if report.succeeded.is_empty() && report.failed.is_empty() {
        print_info("No relays registered");
        return Ok(());
    }

    println!("{}", format_report(&report));
    for failure in &report.failed {
        if let Some(diagnostics) = failure.error.diagnostics() {
            print_warning(&format!("Log output for {}:", failure.target));
            print_diagnostics(diagnostics);
        }
    }

    if !report.is_clean() {
        anyhow::bail!(restart_failure_message(report.failed.len()));
    }
    print_success(&format!("Restarted {} relay(s)", report.succeeded.len()));
    Ok(())
}

/// Summary for a restart with failures
///
/// A relay whose stop phase failed keeps its entry while one that did not
/// come back is unregistered, so the registry is the place to look.
fn restart_failure_message(failed: usize) -> String {
    format!(
        "{} relay(s) failed to restart; run `proxyfleet list` to see which are still registered",
        failed
    )
}
