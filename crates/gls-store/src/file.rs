//! On-disk store: an index file plus one JSON file per object key.
//!
//! Layout of the data directory:
//!
//! ```text
//! <data_dir>/
//!   GlobalStorage.json   scalar buckets + object catalog (StoreState)
//!   <key>.json           one pretty-printed document per object key
//! ```
//!
//! Every write goes through a temp file in the same directory that is
//! renamed over the target, so readers only ever see complete documents.
//! The in-memory state is replaced only after the index write succeeded.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::{ReconcileMode, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::key::{self, validate_key, INDEX_KEY};
use crate::state::{ObjectRecord, StoreState};
use crate::traits::KeyValueStore;
use crate::value::{StoredValue, ValueKind};

/// Outcome of scanning the data directory for untracked object files.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Keys newly registered as objects.
    pub registered: Vec<String>,
    /// Files that looked like object files but were not registered.
    pub skipped: Vec<PathBuf>,
}

/// File-backed key-value store.
pub struct FileStore {
    config: StoreConfig,
    state: StoreState,
    /// Parsed object payloads, keyed by object key.
    cache: HashMap<String, serde_json::Value>,
}

impl FileStore {
    /// Open the store rooted at `config.data_dir`.
    ///
    /// Creates the directory if needed, loads the index (an absent index is
    /// an empty store) and reconciles untracked object files.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let mut store = Self {
            config,
            state: StoreState::new(),
            cache: HashMap::new(),
        };
        let report = store.reload()?;

        info!(
            dir = %store.config.data_dir.display(),
            keys = store.state.len(),
            registered = report.registered.len(),
            "store opened"
        );
        Ok(store)
    }

    /// Re-read the index from disk and reconcile again, discarding the
    /// in-memory state.
    pub fn reload(&mut self) -> StoreResult<ReconcileReport> {
        let mut state = self.read_index()?;
        let mut cache = HashMap::new();
        let report = self.reconcile(&mut state, &mut cache)?;

        if !report.registered.is_empty() {
            self.write_index(&state)?;
        }

        self.state = state;
        self.cache = cache;
        Ok(report)
    }

    /// Write the index one final time and release the store.
    pub fn close(self) -> StoreResult<()> {
        self.write_index(&self.state)?;
        info!(
            dir = %self.config.data_dir.display(),
            keys = self.state.len(),
            "store closed"
        );
        Ok(())
    }

    /// The persistent-data directory.
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Path of the index file.
    pub fn index_path(&self) -> PathBuf {
        self.config.data_dir.join(key::file_name(INDEX_KEY))
    }

    /// Path of the file that holds (or would hold) the object `key`.
    pub fn object_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.config.data_dir.join(key::file_name(key)))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The scalar buckets and object catalog as last written to disk.
    pub fn state(&self) -> &StoreState {
        &self.state
    }

    // ---------------------------------------------------------------
    // Index I/O
    // ---------------------------------------------------------------

    fn read_index(&self) -> StoreResult<StoreState> {
        let path = self.index_path();
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no index file, starting empty");
                return Ok(StoreState::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut state = StoreState::from_json(&data).map_err(|e| StoreError::CorruptIndex {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        for (key, kind) in state.normalize() {
            warn!(%key, %kind, "dropping duplicate index entry");
        }

        // Records must point at `<key>.json` for a valid key; anything else
        // could reach outside the data directory.
        state.objects.retain(|record| {
            let ok = validate_key(&record.key).is_ok() && record.file == key::file_name(&record.key);
            if !ok {
                warn!(key = %record.key, file = %record.file, "dropping invalid object record");
            }
            ok
        });

        Ok(state)
    }

    fn write_index(&self, state: &StoreState) -> StoreResult<()> {
        let data = state.to_json_pretty()?;
        self.write_atomic(&self.index_path(), &data)?;
        debug!(keys = state.len(), "index flushed");
        Ok(())
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> StoreResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.config.data_dir)?;
        tmp.write_all(data)?;
        if self.config.sync_writes {
            tmp.as_file().sync_all()?;
        }
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn remove_object_file(&self, record: &ObjectRecord) {
        let path = self.config.data_dir.join(&record.file);
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "object file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove object file"),
        }
    }

    // ---------------------------------------------------------------
    // Reconciliation
    // ---------------------------------------------------------------

    fn reconcile(
        &self,
        state: &mut StoreState,
        cache: &mut HashMap<String, serde_json::Value>,
    ) -> StoreResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        if self.config.reconcile == ReconcileMode::Off {
            return Ok(report);
        }

        for entry in fs::read_dir(&self.config.data_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let name = entry.file_name();
            let Some(key) = name.to_str().and_then(key::key_from_file_name) else {
                continue;
            };

            if key.eq_ignore_ascii_case(INDEX_KEY) || state.object(key).is_some() {
                continue;
            }
            if let Err(e) = validate_key(key) {
                warn!(path = %path.display(), error = %e, "skipping untracked file");
                report.skipped.push(path);
                continue;
            }
            if let Some(kind) = state.kind_of(key) {
                warn!(%key, %kind, "skipping untracked file shadowed by a scalar");
                report.skipped.push(path);
                continue;
            }

            if self.config.reconcile == ReconcileMode::Preload {
                let parsed = fs::read(&path)
                    .map_err(StoreError::from)
                    .and_then(|data| Ok(serde_json::from_slice(&data)?));
                match parsed {
                    Ok(payload) => {
                        cache.insert(key.to_string(), payload);
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable object file");
                        report.skipped.push(path);
                        continue;
                    }
                }
            }

            debug!(%key, "registering untracked object file");
            state.objects.insert(ObjectRecord::for_key(key));
            report.registered.push(key.to_string());
        }

        report.registered.sort();
        report.skipped.sort();
        Ok(report)
    }
}

impl KeyValueStore for FileStore {
    fn save(&mut self, key: &str, value: StoredValue) -> StoreResult<()> {
        validate_key(key)?;
        value.validate(key)?;

        let mut next = self.state.clone();
        let removed = next.put(key, &value);

        match value {
            StoredValue::Object(payload) => {
                let path = self.config.data_dir.join(key::file_name(key));
                let data = serde_json::to_vec_pretty(&payload)?;
                self.write_atomic(&path, &data)?;

                // Overwriting an existing object leaves the index untouched.
                if next != self.state {
                    if let Err(e) = self.write_index(&next) {
                        if removed.object.is_none() {
                            let _ = fs::remove_file(&path);
                        }
                        return Err(e);
                    }
                }

                debug!(%key, path = %path.display(), "object saved");
                self.state = next;
                self.cache.insert(key.to_string(), payload);
            }
            scalar => {
                self.write_index(&next)?;
                debug!(%key, kind = %scalar.kind(), "scalar saved");
                self.state = next;

                if let Some(record) = removed.object {
                    self.cache.remove(key);
                    self.remove_object_file(&record);
                }
            }
        }
        Ok(())
    }

    fn load(&self, key: &str) -> StoreResult<StoredValue> {
        validate_key(key)?;

        if let Some(value) = self.state.scalar(key) {
            debug!(%key, kind = %value.kind(), "scalar loaded");
            return Ok(value);
        }

        let record = self
            .state
            .object(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if let Some(payload) = self.cache.get(key) {
            return Ok(StoredValue::Object(payload.clone()));
        }

        let path = self.config.data_dir.join(&record.file);
        match fs::read(&path) {
            Ok(data) => {
                debug!(%key, path = %path.display(), "object loaded");
                Ok(StoredValue::Object(serde_json::from_slice(&data)?))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(%key, path = %path.display(), "object file missing");
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&mut self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;

        let mut next = self.state.clone();
        let removed = next.remove(key);
        if removed.is_empty() {
            return Ok(false);
        }

        self.write_index(&next)?;
        self.state = next;

        if let Some(record) = removed.object {
            self.cache.remove(key);
            self.remove_object_file(&record);
        }
        debug!(%key, "deleted");
        Ok(true)
    }

    fn kind_of(&self, key: &str) -> Option<ValueKind> {
        self.state.kind_of(key)
    }

    fn keys(&self) -> Vec<(String, ValueKind)> {
        self.state.keys()
    }

    fn len(&self) -> usize {
        self.state.len()
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("data_dir", &self.config.data_dir)
            .field("key_count", &self.state.len())
            .field("cached_objects", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Player {
        name: String,
        hp: u32,
        position: (f32, f32),
    }

    fn player() -> Player {
        Player {
            name: "ada".into(),
            hp: 90,
            position: (1.5, -2.0),
        }
    }

    fn temp_store() -> (TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(StoreConfig::in_dir(dir.path())).unwrap();
        (dir, store)
    }

    fn reopen(dir: &TempDir) -> FileStore {
        FileStore::open(StoreConfig::in_dir(dir.path())).unwrap()
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    // -----------------------------------------------------------------------
    // Round-trips
    // -----------------------------------------------------------------------

    #[test]
    fn scalar_roundtrip() {
        let (_dir, mut store) = temp_store();
        store.save("score", 1250.into()).unwrap();
        store.save("name", "ada".into()).unwrap();
        store.save("muted", false.into()).unwrap();

        assert_eq!(store.load_number("score").unwrap(), 1250.0);
        assert_eq!(store.load_string("name").unwrap(), "ada");
        assert!(!store.load_bool("muted").unwrap());
    }

    #[test]
    fn object_roundtrip_writes_own_file() {
        let (dir, mut store) = temp_store();
        store.save_object("player", &player()).unwrap();

        let path = dir.path().join("player.json");
        assert!(path.exists());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains('\n'), "object file should be pretty-printed");

        assert_eq!(store.load_object::<Player>("player").unwrap(), player());
    }

    #[test]
    fn object_load_reads_file_when_not_cached() {
        let (dir, mut store) = temp_store();
        store.save_object("player", &player()).unwrap();
        store.close().unwrap();

        let store = FileStore::open(
            StoreConfig::in_dir(dir.path()).with_reconcile(ReconcileMode::Off),
        )
        .unwrap();
        assert!(store.cache.is_empty());
        assert_eq!(store.load_object::<Player>("player").unwrap(), player());
    }

    // -----------------------------------------------------------------------
    // Overwrite
    // -----------------------------------------------------------------------

    #[test]
    fn overwrite_same_kind() {
        let (_dir, mut store) = temp_store();
        store.save("k", 1.into()).unwrap();
        store.save("k", 2.into()).unwrap();
        assert_eq!(store.load_number("k").unwrap(), 2.0);
        assert_eq!(store.state().numbers.len(), 1);
    }

    #[test]
    fn scalar_over_object_removes_file() {
        let (dir, mut store) = temp_store();
        store.save_object("k", &player()).unwrap();
        store.save("k", "text now".into()).unwrap();

        assert!(!dir.path().join("k.json").exists());
        assert_eq!(store.kind_of("k"), Some(ValueKind::Text));
        assert!(store.state().objects.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn object_over_scalar_clears_bucket() {
        let (_dir, mut store) = temp_store();
        store.save("k", true.into()).unwrap();
        store.save_object("k", &vec!["a", "b"]).unwrap();

        assert!(store.state().booleans.is_empty());
        assert_eq!(store.load_object::<Vec<String>>("k").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn object_overwrite_replaces_content() {
        let (dir, mut store) = temp_store();
        store.save_object("p", &player()).unwrap();
        let mut updated = player();
        updated.hp = 10;
        store.save_object("p", &updated).unwrap();

        assert_eq!(store.load_object::<Player>("p").unwrap(), updated);
        assert_eq!(reopen(&dir).load_object::<Player>("p").unwrap(), updated);
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    #[test]
    fn delete_absent_touches_nothing() {
        let (dir, mut store) = temp_store();
        store.save("present", 1.into()).unwrap();
        let before = listing(dir.path());
        let index_before = fs::read(store.index_path()).unwrap();

        assert!(!store.delete("absent").unwrap());
        assert_eq!(listing(dir.path()), before);
        assert_eq!(fs::read(store.index_path()).unwrap(), index_before);
    }

    #[test]
    fn delete_scalar() {
        let (dir, mut store) = temp_store();
        store.save("k", 3.into()).unwrap();
        assert!(store.delete("k").unwrap());
        assert!(matches!(store.load("k"), Err(StoreError::NotFound(_))));
        assert!(matches!(reopen(&dir).load("k"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_object_removes_file() {
        let (dir, mut store) = temp_store();
        store.save_object("p", &player()).unwrap();
        assert!(store.delete("p").unwrap());
        assert!(!dir.path().join("p.json").exists());
        assert!(!store.contains("p"));
    }

    #[test]
    fn delete_object_with_file_already_gone() {
        let (dir, mut store) = temp_store();
        store.save_object("p", &player()).unwrap();
        fs::remove_file(dir.path().join("p.json")).unwrap();
        assert!(store.delete("p").unwrap());
        assert!(!store.contains("p"));
    }

    // -----------------------------------------------------------------------
    // Keys
    // -----------------------------------------------------------------------

    #[test]
    fn empty_key_never_touches_disk() {
        let (dir, mut store) = temp_store();
        assert!(store.save("", 1.into()).is_err());
        assert!(store.load("").is_err());
        assert!(store.delete("").is_err());
        assert!(listing(dir.path()).is_empty());
    }

    #[test]
    fn traversal_key_creates_nothing_outside() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("data");
        let mut store = FileStore::open(StoreConfig::in_dir(&data)).unwrap();

        let err = store.save_object("../escape", &player()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));
        assert!(!root.path().join("escape.json").exists());
        assert_eq!(listing(root.path()), vec!["data".to_string()]);
    }

    #[test]
    fn reserved_key_rejected() {
        let (_dir, mut store) = temp_store();
        let err = store.save("GlobalStorage", 1.into()).unwrap_err();
        assert!(matches!(err, StoreError::ReservedKey(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn object_path_validates_key() {
        let (dir, store) = temp_store();
        assert_eq!(store.object_path("p").unwrap(), dir.path().join("p.json"));
        assert!(store.object_path("a/b").is_err());
    }

    #[test]
    fn isolation_between_keys() {
        let (_dir, mut store) = temp_store();
        store.save("a", 1.into()).unwrap();
        store.save("b", 2.into()).unwrap();
        store.save("b", "two".into()).unwrap();
        store.delete("b").unwrap();
        assert_eq!(store.load_number("a").unwrap(), 1.0);
    }

    // -----------------------------------------------------------------------
    // Persistence and reconciliation
    // -----------------------------------------------------------------------

    #[test]
    fn persists_across_restart() {
        let (dir, mut store) = temp_store();
        store.save("score", 7.5.into()).unwrap();
        store.save("name", "bo".into()).unwrap();
        store.save("on", true.into()).unwrap();
        store.save_object("player", &player()).unwrap();
        store.close().unwrap();

        let store = reopen(&dir);
        assert_eq!(store.load_number("score").unwrap(), 7.5);
        assert_eq!(store.load_string("name").unwrap(), "bo");
        assert!(store.load_bool("on").unwrap());
        assert_eq!(store.load_object::<Player>("player").unwrap(), player());
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn index_is_pretty_json_at_reserved_path() {
        let (dir, mut store) = temp_store();
        store.save("score", 1.into()).unwrap();
        let path = dir.path().join("GlobalStorage.json");
        assert_eq!(store.index_path(), path);

        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains('\n'));
        let state = StoreState::from_json(text.as_bytes()).unwrap();
        assert_eq!(state.scalar("score"), Some(StoredValue::Number(1.0)));
    }

    #[test]
    fn orphan_files_are_registered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("orphan.json"), r#"{"x": 1}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = reopen(&dir);
        assert_eq!(store.kind_of("orphan"), Some(ValueKind::Object));
        assert_eq!(
            store.load("orphan").unwrap(),
            StoredValue::Object(serde_json::json!({"x": 1}))
        );
        assert_eq!(store.len(), 1);

        // Registration is flushed to the index.
        let state = StoreState::from_json(&fs::read(store.index_path()).unwrap()).unwrap();
        assert!(state.object("orphan").is_some());
    }

    #[test]
    fn reconcile_off_ignores_orphans() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("orphan.json"), "{}").unwrap();
        let store = FileStore::open(
            StoreConfig::in_dir(dir.path()).with_reconcile(ReconcileMode::Off),
        )
        .unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn preload_caches_and_skips_unparsable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.json"), "[1, 2]").unwrap();
        fs::write(dir.path().join("bad.json"), "{ not json").unwrap();

        let mut store = FileStore::open(
            StoreConfig::in_dir(dir.path()).with_reconcile(ReconcileMode::Preload),
        )
        .unwrap();
        assert!(store.cache.contains_key("good"));
        assert!(!store.contains("bad"));

        let report = store.reload().unwrap();
        assert!(report.registered.is_empty());
        assert_eq!(report.skipped, vec![dir.path().join("bad.json")]);
    }

    #[test]
    fn orphan_shadowed_by_scalar_is_skipped() {
        let (dir, mut store) = temp_store();
        store.save("k", 1.into()).unwrap();
        fs::write(dir.path().join("k.json"), "{}").unwrap();

        let report = store.reload().unwrap();
        assert_eq!(report.skipped, vec![dir.path().join("k.json")]);
        assert_eq!(store.kind_of("k"), Some(ValueKind::Number));
    }

    #[test]
    fn invalid_orphan_name_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("trailing .json"), "{}").unwrap();
        let mut store = reopen(&dir);
        assert!(store.is_empty());
        let report = store.reload().unwrap();
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn duplicate_index_entries_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("GlobalStorage.json"),
            r#"{
                "numbers": [{"key": "dup", "value": 1.0}],
                "strings": [{"key": "dup", "value": "shadowed"}]
            }"#,
        )
        .unwrap();

        let store = reopen(&dir);
        assert_eq!(store.load("dup").unwrap(), StoredValue::Number(1.0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn tampered_object_record_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("GlobalStorage.json"),
            r#"{"objects": [{"key": "p", "file": "../outside.json"}]}"#,
        )
        .unwrap();

        let store = FileStore::open(
            StoreConfig::in_dir(dir.path()).with_reconcile(ReconcileMode::Off),
        )
        .unwrap();
        assert!(!store.contains("p"));
    }

    #[test]
    fn corrupt_index_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("GlobalStorage.json"), "not json").unwrap();
        let err = FileStore::open(StoreConfig::in_dir(dir.path())).unwrap_err();
        assert!(matches!(err, StoreError::CorruptIndex { .. }));
    }

    #[test]
    fn missing_object_file_is_not_found() {
        let (dir, mut store) = temp_store();
        store.save_object("p", &player()).unwrap();
        store.close().unwrap();
        fs::remove_file(dir.path().join("p.json")).unwrap();

        let store = FileStore::open(
            StoreConfig::in_dir(dir.path()).with_reconcile(ReconcileMode::Off),
        )
        .unwrap();
        assert!(matches!(store.load("p"), Err(StoreError::NotFound(_))));
    }

    // -----------------------------------------------------------------------
    // Failed flushes
    // -----------------------------------------------------------------------

    /// Make every further index write fail by putting a directory where the
    /// index file goes.
    fn block_index(store: &FileStore) {
        let path = store.index_path();
        let _ = fs::remove_file(&path);
        fs::create_dir(&path).unwrap();
    }

    #[test]
    fn failed_scalar_flush_keeps_previous_state() {
        let (_dir, mut store) = temp_store();
        store.save("a", 1.into()).unwrap();
        block_index(&store);

        assert!(store.save("b", 2.into()).is_err());
        assert!(!store.contains("b"));
        assert!(store.delete("a").is_err());
        assert_eq!(store.load_number("a").unwrap(), 1.0);
    }

    #[test]
    fn failed_object_flush_removes_new_file() {
        let (dir, mut store) = temp_store();
        block_index(&store);

        assert!(store.save_object("p", &player()).is_err());
        assert!(!store.contains("p"));
        assert!(!dir.path().join("p.json").exists());
    }

    #[test]
    fn debug_format() {
        let (_dir, store) = temp_store();
        let debug = format!("{store:?}");
        assert!(debug.contains("FileStore"));
        assert!(debug.contains("key_count"));
    }
}
