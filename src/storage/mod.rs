//! Persistence layer: the bucketed database and metadata-versioned
//! settings files.

pub mod db;
pub mod settings;

pub use db::{DbTx, WalletDb};
pub use settings::{load_json, save_json, save_json_sync, Metadata};
pub use settings::{DB_METADATA, SEED_METADATA, SETTINGS_METADATA};

/// File names inside the wallet's persist directory.
pub const SETTINGS_FILE: &str = "wallet.json";
pub const DB_FILE: &str = "wallet.db";
pub const LOG_FILE: &str = "wallet.log";

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use crate::errors::{WalletError, WalletResult};

/// Install a process-global tracing subscriber that appends plain-text
/// lines to `wallet.log` inside `persist_dir`. Intended for standalone
/// deployments; an embedding node that already installs its own subscriber
/// should skip this and route the wallet's spans itself.
pub fn init_wallet_log(persist_dir: &Path) -> WalletResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(persist_dir.join(LOG_FILE))?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|_| WalletError::Unsupported("a global tracing subscriber is already installed"))
}
