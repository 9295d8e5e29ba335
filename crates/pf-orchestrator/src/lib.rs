//! pf-orchestrator: port registry and service lifecycle orchestration
//!
//! Keeps the durable list of relay ports in step with the host supervisor
//! and manages the singleton TLS overlay on top of one relay.

pub mod host;
pub mod orchestrator;
pub mod registry;
pub mod relay;
pub mod store;
pub mod tls;

pub use orchestrator::{Host, Orchestrator, Stores};
pub use registry::PortRegistry;
pub use relay::RelayUnitManager;
pub use tls::{OverlayState, TlsOverlayManager};
