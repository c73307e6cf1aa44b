use std::path::PathBuf;

use crate::value::ValueKind;

/// Errors from key-value store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key cannot be used as a store key (and therefore as a file name).
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The key collides with the store's own index file.
    #[error("key {0:?} is reserved for the store index")]
    ReservedKey(String),

    /// The value cannot be persisted (non-finite number, null object).
    #[error("invalid value for {key:?}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// No entry exists for the key.
    #[error("key not found: {0}")]
    NotFound(String),

    /// The key holds a value of a different kind than requested.
    #[error("type mismatch for {key:?}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The index file exists but could not be decoded.
    #[error("corrupt index {path:?}: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },

    /// The configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error from the underlying file system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
