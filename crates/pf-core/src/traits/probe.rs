//! Port probing traits

use crate::error::Result;
use crate::types::Port;

/// Reports whether any process is listening on a TCP port
pub trait PortProbe: Send + Sync {
    fn is_listening(&self, port: Port) -> Result<bool>;
}

/// Last-resort termination of whatever still listens on a port
pub trait ListenerTerminator: Send + Sync {
    /// Terminate every process listening on `port`, returning how many were signalled
    fn terminate_listeners(&self, port: Port) -> Result<usize>;
}
