//! Host collaborator traits
//!
//! The orchestrator only talks to the host through these seams, so tests can
//! substitute in-memory implementations.

mod packages;
mod probe;
mod store;
mod supervisor;

pub use packages::PackageInstaller;
pub use probe::{ListenerTerminator, PortProbe};
pub use store::{RegistryStore, StatusStore};
pub use supervisor::{service_name, Supervisor, UnitDefinition};
