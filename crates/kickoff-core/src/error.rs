//! Core error types for kickoff-core.
//!
//! Nothing in this crate is fatal to the process: storage failures degrade the
//! timer to in-memory operation, fetch failures skip one resource for one poll
//! cycle, and validation failures are reported back to the command console.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for kickoff-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistence-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed user input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Commit-info fetch errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Control server errors
    #[error("Control server error: {0}")]
    Control(#[from] ControlError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key-value store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backing store could not be opened or reached.
    #[error("Storage unavailable at {path}: {message}")]
    Unavailable { path: PathBuf, message: String },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked, or an in-process lock was poisoned
    #[error("Storage is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// The data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors raised for command-console input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An argument was missing, non-numeric, negative or out of range.
    #[error("Invalid argument '{field}': {message}")]
    InvalidArgument { field: String, message: String },

    /// The console does not know this command.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Transient failure fetching commit info for one resource.
///
/// The watcher logs these and retries on the next poll cycle.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Network-level failure (connect, timeout, body read)
    #[error("Request for '{resource}' failed: {source}")]
    Http {
        resource: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response
    #[error("Request for '{resource}' returned HTTP {status}")]
    Status { resource: String, status: u16 },

    /// Body did not have the expected shape
    #[error("Malformed response for '{resource}': {message}")]
    Malformed { resource: String, message: String },
}

impl FetchError {
    /// The resource whose fetch failed.
    pub fn resource(&self) -> &str {
        match self {
            FetchError::Http { resource, .. }
            | FetchError::Status { resource, .. }
            | FetchError::Malformed { resource, .. } => resource,
        }
    }
}

/// Errors talking to the optional control server.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Connection refused, DNS failure or timeout
    #[error("control server not reachable at {url}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response
    #[error("control server returned HTTP {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    /// Body did not have the expected shape
    #[error("malformed response from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => {
                if code.code == rusqlite::ErrorCode::DatabaseLocked
                    || code.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
