//! proxyfleet CLI
//!
//! Single binary for managing the relay fleet on this host:
//! - Relay units (add, remove, relabel, restart, list)
//! - The TLS overlay in front of one relay
//! - Uninstall and configuration management

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pf_core::config::{self, CONFIG_ENV};
use pf_core::lock::StateLock;
use pf_core::FleetError;
use pf_orchestrator::Orchestrator;
use proxyfleet::commands;
use proxyfleet::output::{print_diagnostics, print_error};

#[derive(Parser)]
#[command(name = "proxyfleet")]
#[command(author, version, about = "Relay fleet and TLS overlay manager")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a relay on a port and register it
    Add {
        /// Port for the relay to listen on
        port: String,
        /// Status label shown to connecting clients
        label: Option<String>,
    },

    /// Stop relays and remove them from the registry
    /// Alias: rm
    #[command(alias = "rm")]
    Remove {
        /// Port(s) to remove
        #[arg(required = true)]
        ports: Vec<String>,
    },

    /// Change the status label of a running relay
    Update {
        /// Port of the relay
        port: String,
        /// New status label
        label: String,
    },

    /// Restart every registered relay
    Restart,

    /// List registered relays
    /// Alias: ls
    #[command(alias = "ls")]
    List {
        /// Include supervisor state for every relay
        #[arg(short, long)]
        long: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Manage the TLS overlay
    Tls {
        #[command(subcommand)]
        action: TlsAction,
    },

    /// Remove every relay, the TLS overlay, and all generated files
    Uninstall {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum TlsAction {
    /// Terminate TLS on a port and forward to an endpoint
    Start {
        /// Port to accept TLS connections on
        listen_port: String,
        /// Host to forward plaintext traffic to
        connect_host: String,
        /// Port to forward plaintext traffic to
        connect_port: String,
    },
    /// Stop the overlay (certificates are kept)
    Stop,
    /// Show overlay state and certificate fingerprint
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Restart the overlay with its recorded configuration
    Restart,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Show the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl Commands {
    /// Whether the command changes host or registry state
    fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Commands::List { .. }
                | Commands::Config { .. }
                | Commands::Tls {
                    action: TlsAction::Status { .. }
                }
        )
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(e) = run(cli).await {
        let code = match e.downcast_ref::<FleetError>() {
            Some(fleet) => {
                print_error(&fleet.to_string());
                if let Some(diagnostics) = fleet.diagnostics() {
                    print_diagnostics(diagnostics);
                }
                fleet.exit_code()
            }
            None => {
                print_error(&format!("{:#}", e));
                1
            }
        };
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(config::default_config_path);

    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Show => commands::config_show(&config_path),
            ConfigAction::Path => commands::config_path(&config_path),
            ConfigAction::Init { force } => commands::config_init(&config_path, *force),
        };
    }

    let fleet = config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load configuration from {:?}", config_path))?;

    let _lock = if cli.command.is_mutating() {
        Some(StateLock::acquire(fleet.lock_path(), std::process::id())?)
    } else {
        None
    };

    let orchestrator = Orchestrator::from_config(&fleet);
    orchestrator.restore()?;

    match cli.command {
        Commands::Add { port, label } => {
            commands::add_command(&orchestrator, &port, label.as_deref()).await
        }
        Commands::Remove { ports } => commands::remove_command(&orchestrator, &ports).await,
        Commands::Update { port, label } => {
            commands::update_command(&orchestrator, &port, &label).await
        }
        Commands::Restart => commands::restart_command(&orchestrator).await,
        Commands::List { long, json } => commands::list_command(&orchestrator, long, json).await,
        Commands::Tls { action } => match action {
            TlsAction::Start {
                listen_port,
                connect_host,
                connect_port,
            } => commands::tls_start(&orchestrator, &listen_port, &connect_host, &connect_port).await,
            TlsAction::Stop => commands::tls_stop(&orchestrator).await,
            TlsAction::Status { json } => commands::tls_status(&orchestrator, json).await,
            TlsAction::Restart => commands::tls_restart(&orchestrator).await,
        },
        Commands::Uninstall { yes } => commands::uninstall_command(&orchestrator, yes).await,
        Commands::Config { .. } => Ok(()),
    }
}
