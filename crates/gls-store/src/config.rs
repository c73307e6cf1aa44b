use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Environment variable that overrides the default data directory.
pub const DATA_DIR_ENV: &str = "GLS_DATA_DIR";

/// How [`FileStore::open`](crate::FileStore::open) treats `*.json` files in
/// the data directory that the index does not know about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Leave untracked files alone.
    Off,
    /// Register untracked files as objects without reading them.
    #[default]
    Register,
    /// Register untracked files and cache their parsed contents. Files
    /// that do not parse are skipped.
    Preload,
}

/// Configuration for a [`FileStore`](crate::FileStore).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Persistent-data directory holding the index and all object files.
    /// Must stay writable for the lifetime of the store.
    pub data_dir: PathBuf,
    /// Startup handling of untracked object files.
    pub reconcile: ReconcileMode,
    /// `fsync` each file before it replaces the previous version.
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("gls-data"),
            reconcile: ReconcileMode::default(),
            sync_writes: true,
        }
    }
}

impl StoreConfig {
    /// Default configuration rooted at `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: dir.into(),
            ..Default::default()
        }
    }

    /// Default configuration, with the data directory taken from
    /// `GLS_DATA_DIR` when set.
    pub fn from_env() -> Self {
        match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::in_dir(dir),
            _ => Self::default(),
        }
    }

    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read and parse a TOML configuration file.
    pub fn from_toml_file(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Set the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the reconciliation mode.
    pub fn with_reconcile(mut self, mode: ReconcileMode) -> Self {
        self.reconcile = mode;
        self
    }
}
