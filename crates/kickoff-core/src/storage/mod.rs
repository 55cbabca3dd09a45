mod config;
pub mod database;
pub mod memory;

pub use config::{Config, ControlConfig, GitHubConfig, TimerConfig, WatcherConfig};
pub use database::SqliteStore;
pub use memory::MemoryStore;

use std::path::PathBuf;

use tokio::sync::broadcast;

use crate::error::{ConfigError, StorageError};

/// Capacity of the change channel each store publishes on. Slow observers that
/// fall further behind than this see `Lagged` and should re-read the store.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// A write observed on a [`KvStore`]. `value` is `None` for removals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
    pub value: Option<String>,
}

/// Process-wide key-value storage with change notification.
///
/// Every successful write is published to subscribers, so a second engine
/// sharing the store (another "tab") can recompute its derived state.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;

    /// Publish writes made by other processes since the last call. Stores
    /// that cannot be shared across processes have nothing to report.
    fn poll_external_changes(&self) -> Result<Vec<StoreChange>, StorageError> {
        Ok(Vec::new())
    }
}

/// Returns `~/.config/kickoff[-dev]/` based on KICKOFF_ENV.
///
/// Set KICKOFF_ENV=dev to use the development data directory, or
/// KICKOFF_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("KICKOFF_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("KICKOFF_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("kickoff-dev")
            } else {
                base_dir.join("kickoff")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
