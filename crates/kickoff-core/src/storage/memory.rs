//! In-process key-value store.
//!
//! Used in tests and as the shared channel between engines living in the same
//! process. Nothing survives a restart.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use super::{KvStore, StoreChange, CHANGE_CHANNEL_CAPACITY};
use crate::error::StorageError;

#[derive(Debug)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: Mutex::new(HashMap::new()),
            changes,
        }
    }

    fn publish(&self, key: &str, value: Option<&str>) {
        // No subscribers is fine.
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
            value: value.map(str::to_string),
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().map_err(|_| StorageError::Locked)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        {
            let mut values = self.values.lock().map_err(|_| StorageError::Locked)?;
            values.insert(key.to_string(), value.to_string());
        }
        self.publish(key, Some(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let removed = {
            let mut values = self.values.lock().map_err(|_| StorageError::Locked)?;
            values.remove(key).is_some()
        };
        if removed {
            self.publish(key, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
