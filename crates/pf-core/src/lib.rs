//! pf-core: Core abstractions and configuration for proxyfleet
//!
//! This crate provides the shared types, host-collaborator traits, and
//! configuration structures used by the orchestrator and the CLI.

pub mod config;
pub mod error;
pub mod lock;
pub mod traits;
pub mod types;

pub use error::{FleetError, Result};
pub use types::{BatchReport, OverlayStatus, Port, RegistryEntry, TlsOverlayConfig, UnitState};
