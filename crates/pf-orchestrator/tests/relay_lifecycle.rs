//! Relay lifecycle integration tests
//!
//! Drives the orchestrator against an in-memory host with file-backed state.

mod common;

use common::{port, TestFleet};
use pf_core::types::DEFAULT_LABEL;
use pf_core::FleetError;

#[tokio::test]
async fn test_add_port_starts_enables_and_registers() {
    let fleet = TestFleet::new();

    let entry = fleet.orchestrator.add_port("8080", "").await.unwrap();
    assert_eq!(entry.port, port(8080));
    assert_eq!(entry.label, DEFAULT_LABEL);

    assert_eq!(fleet.host.active(), vec!["proxy-8080.service"]);
    assert_eq!(fleet.host.enabled(), vec!["proxy-8080.service"]);
    assert_eq!(fleet.host.listening(), vec![8080]);
    let exec = fleet.host.exec("proxy-8080.service").unwrap();
    assert!(exec.windows(2).any(|w| w == ["--status", DEFAULT_LABEL]));

    assert_eq!(
        fleet.registry_contents().as_deref(),
        Some("8080|@RustyManager\n")
    );
    assert_eq!(fleet.orchestrator.list_ports().unwrap(), vec![entry]);
}

#[tokio::test]
async fn test_list_preserves_insertion_order_across_invocations() {
    let fleet = TestFleet::new();
    for (p, label) in [("9000", "c"), ("80", "a"), ("3128", "b")] {
        fleet.orchestrator.add_port(p, label).await.unwrap();
    }

    let later = fleet.reopen();
    let restored = later.restore().unwrap();
    let ports: Vec<u16> = restored.iter().map(|e| e.port.get()).collect();
    assert_eq!(ports, vec![9000, 80, 3128]);
}

#[tokio::test]
async fn test_invalid_port_is_rejected_before_side_effects() {
    let fleet = TestFleet::new();

    for raw in ["0", "65536", "http", ""] {
        let err = fleet.orchestrator.add_port(raw, "x").await.unwrap_err();
        assert!(matches!(err, FleetError::InvalidPort(_)), "{raw:?}: {err}");
        assert_eq!(err.exit_code(), 2);
    }
    assert!(fleet.host.defined().is_empty());
    assert!(fleet.registry_contents().is_none());
}

#[tokio::test]
async fn test_duplicate_add_leaves_registry_unchanged() {
    let fleet = TestFleet::new();
    fleet.orchestrator.add_port("8080", "first").await.unwrap();
    let reloads = fleet.host.reloads();

    let err = fleet.orchestrator.add_port("8080", "second").await.unwrap_err();
    assert!(matches!(err, FleetError::DuplicateEntry(p) if p == port(8080)));
    assert_eq!(err.exit_code(), 3);

    let entries = fleet.orchestrator.list_ports().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].label, "first");
    assert_eq!(fleet.host.reloads(), reloads);
}

#[tokio::test]
async fn test_port_in_use_creates_nothing() {
    let fleet = TestFleet::new();
    fleet.host.occupy(3128);

    let err = fleet.orchestrator.add_port("3128", "squid").await.unwrap_err();
    assert!(matches!(err, FleetError::PortInUse(_)));
    assert_eq!(err.exit_code(), 4);
    assert!(fleet.host.defined().is_empty());
    assert!(fleet.orchestrator.list_ports().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_confirmation_rolls_back_every_artifact() {
    let fleet = TestFleet::new();
    fleet.host.break_unit("proxy-8080.service");

    let err = fleet.orchestrator.add_port("8080", "x").await.unwrap_err();
    match &err {
        FleetError::ConfirmationFailed { unit, diagnostics } => {
            assert_eq!(unit, "proxy-8080.service");
            assert!(diagnostics.contains("exited with status 1"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), 6);
    assert!(err.diagnostics().is_some());

    assert!(fleet.host.defined().is_empty());
    assert!(fleet.host.enabled().is_empty());
    assert!(fleet.host.active().is_empty());
    assert!(fleet.orchestrator.list_ports().unwrap().is_empty());

    // nothing left behind, so a retry after the fault is fixed succeeds
    fleet.host.repair_unit("proxy-8080.service");
    fleet.orchestrator.add_port("8080", "x").await.unwrap();
}

#[tokio::test]
async fn test_remove_port_is_idempotent() {
    let fleet = TestFleet::new();
    fleet.orchestrator.add_port("8080", "x").await.unwrap();

    let removed = fleet.orchestrator.remove_port("8080").await.unwrap();
    assert_eq!(removed.map(|e| e.label), Some("x".to_string()));
    assert!(fleet.host.defined().is_empty());
    assert!(fleet.host.listening().is_empty());
    assert_eq!(fleet.registry_contents().as_deref(), Some(""));

    assert!(fleet.orchestrator.remove_port("8080").await.unwrap().is_none());
    assert!(fleet.orchestrator.remove_port("8080").await.unwrap().is_none());
}

#[tokio::test]
async fn test_remove_port_kills_lingering_listener() {
    let fleet = TestFleet::new();
    fleet.orchestrator.add_port("8080", "x").await.unwrap();
    fleet.host.crash("proxy-8080.service");
    fleet.host.occupy(8080);

    fleet.orchestrator.remove_port("8080").await.unwrap();
    assert!(fleet.host.listening().is_empty());
}

#[tokio::test]
async fn test_remove_unregistered_port_spares_foreign_listener() {
    let fleet = TestFleet::new();
    fleet.host.occupy(22);

    assert!(fleet.orchestrator.remove_port("22").await.unwrap().is_none());
    assert_eq!(fleet.host.listening(), vec![22]);
}

#[tokio::test]
async fn test_update_label_redefines_and_keeps_position() {
    let fleet = TestFleet::new();
    fleet.orchestrator.add_port("80", "a").await.unwrap();
    fleet.orchestrator.add_port("81", "b").await.unwrap();
    fleet.orchestrator.add_port("82", "c").await.unwrap();

    let entry = fleet.orchestrator.update_label("81", "New Label").await.unwrap();
    assert_eq!(entry.label, "New Label");

    let exec = fleet.host.exec("proxy-81.service").unwrap();
    assert!(exec.windows(2).any(|w| w == ["--status", "New Label"]));
    assert!(fleet.host.active().contains(&"proxy-81.service".to_string()));

    let labels: Vec<String> = fleet
        .orchestrator
        .list_ports()
        .unwrap()
        .into_iter()
        .map(|e| e.label)
        .collect();
    assert_eq!(labels, vec!["a", "New Label", "c"]);
}

#[tokio::test]
async fn test_update_label_requires_registered_running_relay() {
    let fleet = TestFleet::new();

    let err = fleet.orchestrator.update_label("8080", "x").await.unwrap_err();
    assert!(matches!(err, FleetError::NotFound(_)));

    fleet.orchestrator.add_port("8080", "old").await.unwrap();
    fleet.host.crash("proxy-8080.service");

    let err = fleet.orchestrator.update_label("8080", "new").await.unwrap_err();
    assert!(matches!(err, FleetError::NotActive(_)));
    assert_eq!(err.exit_code(), 5);
    assert_eq!(fleet.orchestrator.list_ports().unwrap()[0].label, "old");
}

#[tokio::test]
async fn test_update_label_failure_restores_previous_unit() {
    let fleet = TestFleet::new();
    fleet.orchestrator.add_port("8080", "old").await.unwrap();
    fleet.host.break_unit("proxy-8080.service");

    let err = fleet.orchestrator.update_label("8080", "new").await.unwrap_err();
    assert!(matches!(err, FleetError::ConfirmationFailed { .. }));

    let exec = fleet.host.exec("proxy-8080.service").unwrap();
    assert!(exec.windows(2).any(|w| w == ["--status", "old"]));
    assert_eq!(fleet.orchestrator.list_ports().unwrap()[0].label, "old");
}

#[tokio::test]
async fn test_update_label_define_failure_restores_previous_unit() {
    let fleet = TestFleet::new();
    fleet.orchestrator.add_port("8080", "old").await.unwrap();
    fleet.host.fail_next_define("proxy-8080.service");

    let err = fleet.orchestrator.update_label("8080", "new").await.unwrap_err();
    assert!(matches!(err, FleetError::Io(_)), "{err}");

    assert_eq!(fleet.host.defined(), vec!["proxy-8080.service"]);
    let exec = fleet.host.exec("proxy-8080.service").unwrap();
    assert!(exec.windows(2).any(|w| w == ["--status", "old"]));
    assert_eq!(fleet.host.active(), vec!["proxy-8080.service"]);
    assert_eq!(fleet.host.listening(), vec![8080]);
    assert_eq!(fleet.orchestrator.list_ports().unwrap()[0].label, "old");
}

#[tokio::test]
async fn test_restart_all_isolates_failures() {
    let fleet = TestFleet::new();
    for p in ["8080", "8081", "8082"] {
        fleet.orchestrator.add_port(p, p).await.unwrap();
    }
    fleet.host.break_unit("proxy-8081.service");

    let report = fleet.orchestrator.restart_all().await.unwrap();
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].target.contains("8081"));
    assert!(!report.is_clean());

    assert_eq!(
        fleet.host.active(),
        vec!["proxy-8080.service", "proxy-8082.service"]
    );
    let ports: Vec<u16> = fleet
        .orchestrator
        .list_ports()
        .unwrap()
        .iter()
        .map(|e| e.port.get())
        .collect();
    assert_eq!(ports, vec![8080, 8082]);
    assert!(fleet.host.exec("proxy-8081.service").is_none());
}

#[tokio::test]
async fn test_restart_all_recovers_crashed_relay() {
    let fleet = TestFleet::new();
    fleet.orchestrator.add_port("8080", "x").await.unwrap();
    fleet.host.crash("proxy-8080.service");

    let report = fleet.orchestrator.restart_all().await.unwrap();
    assert!(report.is_clean());
    assert_eq!(fleet.host.active(), vec!["proxy-8080.service"]);
}

#[tokio::test]
async fn test_port_states_reflect_supervisor() {
    let fleet = TestFleet::new();
    fleet.orchestrator.add_port("8080", "a").await.unwrap();
    fleet.orchestrator.add_port("8081", "b").await.unwrap();
    fleet.host.crash("proxy-8081.service");

    let states = fleet.orchestrator.port_states().await.unwrap();
    assert!(states[0].1.active);
    assert!(!states[1].1.active);
    assert!(states[1].1.enabled);
    assert_eq!(states[1].1.to_string(), "failed");
}

#[tokio::test]
async fn test_uninstall_twice_removes_everything() {
    let fleet = TestFleet::new();
    fleet.orchestrator.add_port("8080", "a").await.unwrap();
    fleet.orchestrator.add_port("8081", "b").await.unwrap();
    fleet
        .orchestrator
        .tls_activate("443", "127.0.0.1", "8080")
        .await
        .unwrap();

    let report = fleet.orchestrator.uninstall().await.unwrap();
    assert!(report.is_clean(), "{:?}", report.failed);
    assert!(fleet.host.defined().is_empty());
    assert!(fleet.host.active().is_empty());
    assert!(fleet.host.listening().is_empty());
    assert!(fleet.registry_contents().is_none());
    assert!(!fleet.config.cert_dir().exists());
    assert!(!fleet.config.tls_engine_config_path().exists());
    assert!(!fleet.config.tls_status_path().exists());

    let again = fleet.orchestrator.uninstall().await.unwrap();
    assert!(again.is_clean(), "{:?}", again.failed);
}

#[tokio::test]
async fn test_uninstall_removes_orphaned_relay_units() {
    let fleet = TestFleet::new();
    fleet.orchestrator.add_port("8080", "a").await.unwrap();
    // registry lost, unit still defined
    std::fs::remove_file(fleet.config.registry_path()).unwrap();

    assert_eq!(
        fleet.orchestrator.relays().orphaned_ports().await.unwrap(),
        vec![port(8080)]
    );
    let report = fleet.orchestrator.uninstall().await.unwrap();
    assert!(report.succeeded.iter().any(|t| t == "port 8080"));
    assert!(fleet.host.defined().is_empty());
}

#[tokio::test]
async fn test_memory_stores_leave_no_files() {
    let fleet = TestFleet::new();
    let orchestrator = pf_orchestrator::Orchestrator::new(
        &fleet.config,
        fleet.host.host(),
        pf_orchestrator::Stores::memory(),
    );

    orchestrator.add_port("8080", "x").await.unwrap();
    assert_eq!(orchestrator.list_ports().unwrap().len(), 1);
    assert!(fleet.registry_contents().is_none());

    orchestrator.remove_port("8080").await.unwrap();
    assert!(orchestrator.list_ports().unwrap().is_empty());
}
