//! TLS overlay commands

use anyhow::Result;
use serde_json::json;

use pf_core::OverlayStatus;
use pf_orchestrator::Orchestrator;

use crate::output::{print_info, print_success, print_warning};

pub async fn tls_start(
    orchestrator: &Orchestrator,
    listen_port: &str,
    connect_host: &str,
    connect_port: &str,
) -> Result<()> {
    let overlay = orchestrator
        .tls_activate(listen_port, connect_host, connect_port)
        .await?;
    print_success(&format!("TLS overlay active: {}", overlay));
    if let Some(fingerprint) = orchestrator.tls_fingerprint()? {
        print_info(&format!("Certificate SHA-256: {}", fingerprint));
    }
    Ok(())
}

pub async fn tls_stop(orchestrator: &Orchestrator) -> Result<()> {
    orchestrator.tls_deactivate().await?;
    print_success("TLS overlay stopped");
    Ok(())
}

pub async fn tls_restart(orchestrator: &Orchestrator) -> Result<()> {
    let overlay = orchestrator.tls_restart().await?;
    print_success(&format!("TLS overlay restarted: {}", overlay));
    Ok(())
}

/// Show whether the overlay runs and what it forwards
pub async fn tls_status(orchestrator: &Orchestrator, json: bool) -> Result<()> {
    let status = orchestrator.tls_status().await?;
    let fingerprint = orchestrator.tls_fingerprint()?;

    if json {
        let config = status.config();
        let value = json!({
            "active": status.is_active(),
            "listen_port": config.map(|c| c.listen_port),
            "connect_host": config.map(|c| c.connect_host.as_str()),
            "connect_port": config.map(|c| c.connect_port),
            "fingerprint": fingerprint,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match &status {
        OverlayStatus::Absent => print_info("TLS overlay is not running"),
        OverlayStatus::Active(config) => print_success(&format!("TLS overlay active: {}", config)),
        OverlayStatus::ActiveUnknown => {
            print_warning("TLS overlay is running but its configuration record is missing");
            print_info("Run 'proxyfleet tls start' again to record it");
        }
    }
    if let Some(fingerprint) = fingerprint {
        println!("Certificate SHA-256: {}", fingerprint);
    }
    Ok(())
}
