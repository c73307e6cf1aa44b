//! Typed key-value persistence over per-key JSON files.
//!
//! A store holds three scalar buckets (numbers, text, booleans) and a
//! catalog of object keys. Scalars and the catalog are persisted together in
//! an index file (`GlobalStorage.json`); every object value lives in its own
//! `<key>.json` file next to it.
//!
//! # Values
//!
//! Callers pick the variant explicitly through [`StoredValue`]:
//!
//! - [`StoredValue::Number`] -- any numeric value, stored as `f64`
//! - [`StoredValue::Text`] -- strings and characters
//! - [`StoredValue::Bool`]
//! - [`StoredValue::Object`] -- any `serde`-serializable value
//!
//! # Storage Backends
//!
//! All backends implement the [`KeyValueStore`] trait:
//!
//! - [`FileStore`] -- the on-disk store
//! - [`InMemoryStore`] -- no I/O, for tests and embedding
//!
//! # Design Rules
//!
//! 1. A key holds at most one value; saving replaces whatever was there.
//! 2. Keys are validated before any I/O and are always safe file names.
//! 3. Write-then-commit: the index is written before the in-memory state
//!    changes, so a failed write never leaves memory ahead of disk.
//! 4. A miss is `StoreError::NotFound`, never a silent default.
//! 5. All I/O errors are propagated to the caller.

pub mod config;
pub mod error;
pub mod file;
pub mod key;
pub mod memory;
pub mod state;
pub mod traits;
pub mod value;

// Re-export primary types at crate root for ergonomic imports.
pub use config::{ReconcileMode, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use file::{FileStore, ReconcileReport};
pub use key::{validate_key, INDEX_KEY};
pub use memory::InMemoryStore;
pub use state::{ObjectRecord, ScalarEntry, StoreState};
pub use traits::KeyValueStore;
pub use value::{StoredValue, ValueKind};
