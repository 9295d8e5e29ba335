//! Uninstall command implementation

use anyhow::Result;

use pf_orchestrator::Orchestrator;

use crate::output::{format_report, print_info, print_success, print_warning};

/// Remove every relay, the TLS overlay, and all generated state
pub async fn uninstall_command(orchestrator: &Orchestrator, confirmed: bool) -> Result<()> {
    if !confirmed {
        print_warning("This stops and removes every relay and the TLS overlay, including certificates");
        print_info("Re-run with --yes to proceed");
        anyhow::bail!("Uninstall not confirmed");
    }

    let report = orchestrator.uninstall().await?;
    println!("{}", format_report(&report));

    if !report.is_clean() {
        anyhow::bail!(
            "{} item(s) could not be removed; run uninstall again after fixing them",
            report.failed.len()
        );
    }
    print_success("proxyfleet state removed");
    Ok(())
}
