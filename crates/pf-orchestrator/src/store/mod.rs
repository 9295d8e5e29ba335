//! Registry and TLS status stores

mod file;
mod memory;

pub use file::{FileRegistryStore, FileStatusStore};
pub use memory::{MemoryRegistryStore, MemoryStatusStore};
