//! Host collaborators: systemd, port probing, process termination, packages

mod packages;
mod probe;
mod process;
mod systemd;

pub use packages::{find_binary, AptInstaller};
pub use probe::SystemPortProbe;
pub use process::ProcessTerminator;
pub use systemd::{quote_exec_arg, render_unit, SystemdSupervisor};
