//! SQLite-backed key-value store.
//!
//! Persists the countdown keys in a single `kv` table at
//! `~/.config/kickoff/kickoff.db`. Several processes may open the same file;
//! [`SqliteStore::poll_external_changes`] turns their commits into
//! [`StoreChange`] notifications using `PRAGMA data_version`, which only moves
//! when *another* connection commits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection};
use tokio::sync::broadcast;
use tracing::debug;

use super::{data_dir, KvStore, StoreChange, CHANGE_CHANNEL_CAPACITY};
use crate::error::StorageError;

const DB_FILE: &str = "kickoff.db";

/// What this connection last saw, for diffing against external commits.
#[derive(Debug, Default)]
struct Observed {
    data_version: i64,
    snapshot: HashMap<String, String>,
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
    changes: broadcast::Sender<StoreChange>,
    observed: Mutex<Observed>,
}

impl SqliteStore {
    /// Open the store at `~/.config/kickoff/kickoff.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self, StorageError> {
        let dir = data_dir().map_err(|e| StorageError::Unavailable {
            path: PathBuf::from(DB_FILE),
            message: e.to_string(),
        })?;
        Self::open_at(dir.join(DB_FILE))
    }

    /// Open (or create) the store at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|e| StorageError::Unavailable {
            path: path.clone(),
            message: e.to_string(),
        })?;
        conn.busy_timeout(Duration::from_secs(2))?;
        Self::from_connection(conn, path)
    }

    /// Open an in-memory database (for tests and degraded sessions).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, path: PathBuf) -> Result<Self, StorageError> {
        migrate(&conn)?;
        let observed = Observed {
            data_version: data_version(&conn)?,
            snapshot: read_all(&conn)?,
        };
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            changes,
            observed: Mutex::new(observed),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a value from the kv table.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv table.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        self.observed()?
            .snapshot
            .insert(key.to_string(), value.to_string());
        self.publish(StoreChange {
            key: key.to_string(),
            value: Some(value.to_string()),
        });
        Ok(())
    }

    /// Delete a key from the kv table.
    pub fn kv_delete(&self, key: &str) -> Result<(), StorageError> {
        let affected = self
            .conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        self.observed()?.snapshot.remove(key);
        if affected > 0 {
            self.publish(StoreChange {
                key: key.to_string(),
                value: None,
            });
        }
        Ok(())
    }

    /// Detect writes committed by other connections since the last call and
    /// publish them to subscribers. Returns the changes, sorted by key.
    pub fn poll_external_changes(&self) -> Result<Vec<StoreChange>, StorageError> {
        let conn = self.conn()?;
        let version = data_version(&conn)?;
        let mut observed = self.observed()?;
        if version == observed.data_version {
            return Ok(Vec::new());
        }
        let current = read_all(&conn)?;
        drop(conn);

        let mut changes: Vec<StoreChange> = current
            .iter()
            .filter(|(key, value)| observed.snapshot.get(*key) != Some(*value))
            .map(|(key, value)| StoreChange {
                key: key.clone(),
                value: Some(value.clone()),
            })
            .chain(
                observed
                    .snapshot
                    .keys()
                    .filter(|key| !current.contains_key(*key))
                    .map(|key| StoreChange {
                        key: key.clone(),
                        value: None,
                    }),
            )
            .collect();
        changes.sort_by(|a, b| a.key.cmp(&b.key));

        observed.data_version = version;
        observed.snapshot = current;
        drop(observed);

        if !changes.is_empty() {
            debug!(count = changes.len(), path = %self.path.display(), "external store changes");
        }
        for change in &changes {
            self.publish(change.clone());
        }
        Ok(changes)
    }

    fn publish(&self, change: StoreChange) {
        let _ = self.changes.send(change);
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Locked)
    }

    fn observed(&self) -> Result<MutexGuard<'_, Observed>, StorageError> {
        self.observed.lock().map_err(|_| StorageError::Locked)
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.kv_get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.kv_set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.kv_delete(key)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn poll_external_changes(&self) -> Result<Vec<StoreChange>, StorageError> {
        SqliteStore::poll_external_changes(self)
    }
}

fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
}

fn data_version(conn: &Connection) -> Result<i64, rusqlite::Error> {
    conn.query_row("PRAGMA data_version", [], |row| row.get(0))
}

fn read_all(conn: &Connection) -> Result<HashMap<String, String>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM kv")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    let values = rows.collect::<Result<HashMap<_, _>, _>>()?;
    Ok(values)
}
