//! CLI command implementations

mod config;
mod list;
mod ports;
mod tls;
mod uninstall;

pub use config::{config_init, config_path, config_show, default_config_content};
pub use list::list_command;
pub use ports::{add_command, remove_command, restart_command, update_command};
pub use tls::{tls_restart, tls_start, tls_status, tls_stop};
pub use uninstall::uninstall_command;
