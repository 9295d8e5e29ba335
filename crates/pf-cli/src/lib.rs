//! proxyfleet CLI
//!
//! Provides the `proxyfleet` binary for managing relay units and the TLS
//! overlay on a single host.

pub mod commands;
pub mod output;
