//! # DHCP Sync Library
//!
//! Keeps a DHCP server's static host reservations in line with an
//! IP-address-management inventory. The inventory renders the reservations
//! itself (one `host` statement per line); this crate polls that export,
//! compares it with the include file on disk, replaces the file atomically when
//! it differs and asks the service manager to reload the daemon.
//!
//! ## Getting Started
//!
//! ```no_run
//! use dhcp_sync::{config::Config, sync::Syncer};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), dhcp_sync::error::SyncError> {
//!     let config = Config::load(Some(Path::new("dhcp_sync.json5")))?;
//!     let syncer = Syncer::from_config(&config)?;
//!     syncer.run(CancellationToken::new()).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Failure handling
//!
//! - A failed or empty fetch leaves the file alone; the next poll tries again.
//! - A failed write leaves the previous file in place and skips the reload.
//! - A failed reload leaves the new file in place; it is not reverted.
//! - Missing configuration is fatal at startup.

/// Error types shared by every module
pub mod error;

/// Startup configuration loaded from a JSON5 file and `DHCP_SYNC_*` variables
pub mod config;

/// HTTP access to the inventory export
pub mod inventory;

/// Recognition of `host` reservation lines
pub mod reservations;

/// Atomic replacement of the generated include file
pub mod store;

/// Service manager hook that reloads the DHCP daemon
pub mod reload;

/// The poll, compare, replace and reload loop
pub mod sync;

/// Reservation-level comparison of two include files
pub mod compare;
