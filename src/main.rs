//! # DHCP Sync Entry Point
//!
//! Parses the command line, initializes tracing and either runs the sync loop
//! or compares two include files.
//!
//! ## Example Usage
//!
//! ```bash
//! # Poll forever using dhcp_sync.json5 in the working directory
//! dhcp_sync
//!
//! # Use another configuration file and stop after one cycle
//! dhcp_sync run --config /etc/dhcp_sync.json5 --once
//!
//! # Compare two include files
//! dhcp_sync compare /etc/dhcp/dhcpd.hosts.conf /tmp/dhcpd.hosts.conf
//! ```
//!
//! Log levels can be controlled through the `RUST_LOG` environment variable.

use clap::{Parser, Subcommand};
use dhcp_sync::compare;
use dhcp_sync::config::{Config, CONFIG_FILE};
use dhcp_sync::error::SyncError;
use dhcp_sync::sync::{CycleOutcome, SyncStatus, Syncer};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Sync DHCP host reservations from an IPAM inventory")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll the inventory and keep the include file up to date (default)
    Run {
        /// JSON5 configuration file; `DHCP_SYNC_*` variables override it
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Compare the reservations in two include files
    Compare {
        first: PathBuf,
        second: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), SyncError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run {
        config: None,
        once: false,
    }) {
        Commands::Run { config, once } => run(config, once).await,
        Commands::Compare { first, second } => {
            let comparison = compare::compare_files(&first, &second)?;
            print!(
                "{}",
                comparison.render(&first.display().to_string(), &second.display().to_string())
            );
            Ok(())
        }
    }
}

async fn run(config_path: Option<PathBuf>, once: bool) -> Result<(), SyncError> {
    // fall back to the default file only when it exists, so env-only setups work
    let config_path = config_path.or_else(|| {
        let default = Path::new(CONFIG_FILE);
        default.exists().then(|| default.to_path_buf())
    });

    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return Err(e);
        }
    };
    let syncer = Syncer::from_config(&config)?;

    if once {
        let (_, outcome) = syncer.run_cycle(SyncStatus::default()).await;
        return match outcome {
            CycleOutcome::Unchanged | CycleOutcome::Updated { .. } => Ok(()),
            other => Err(SyncError::Generic(format!("Sync cycle did not complete: {other:?}"))),
        };
    }

    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel_token.clone()));

    syncer.run(cancel_token).await;
    Ok(())
}

/// Cancel `token` on Ctrl-C or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    token.cancel();
}
