//! List command implementation

use anyhow::Result;

use pf_orchestrator::Orchestrator;

use crate::output::{format_port_states, format_ports, PortStatus};

/// Execute the list command
///
/// The short form only reads the registry; `--long` also asks the supervisor
/// about every unit.
pub async fn list_command(orchestrator: &Orchestrator, long: bool, json: bool) -> Result<()> {
    if !long {
        let entries = orchestrator.list_ports()?;
        if json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else {
            println!("{}", format_ports(&entries));
        }
        return Ok(());
    }

    let states: Vec<PortStatus> = orchestrator
        .port_states()
        .await?
        .into_iter()
        .map(|(entry, state)| PortStatus {
            unit: orchestrator.relays().unit_name(entry.port),
            port: entry.port,
            label: entry.label,
            state,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&states)?);
    } else {
        println!("{}", format_port_states(&states));
    }
    Ok(())
}
