use std::collections::HashMap;

use crate::error::{StoreError, StoreResult};
use crate::key::validate_key;
use crate::state::StoreState;
use crate::traits::KeyValueStore;
use crate::value::{StoredValue, ValueKind};

/// In-memory key-value store.
///
/// Intended for tests and embedding. Same validation and overwrite rules as
/// [`FileStore`](crate::FileStore), without touching the file system.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: StoreState,
    objects: HashMap<String, serde_json::Value>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing state. Object records in `state` have no
    /// payload and load as `NotFound` until saved again.
    pub fn from_state(state: StoreState) -> Self {
        Self {
            state,
            objects: HashMap::new(),
        }
    }

    /// The current scalar buckets and object catalog.
    pub fn state(&self) -> &StoreState {
        &self.state
    }

    /// Remove every key.
    pub fn clear(&mut self) {
        self.state = StoreState::new();
        self.objects.clear();
    }
}

impl KeyValueStore for InMemoryStore {
    fn save(&mut self, key: &str, value: StoredValue) -> StoreResult<()> {
        validate_key(key)?;
        value.validate(key)?;

        let removed = self.state.put(key, &value);
        if removed.object.is_some() {
            self.objects.remove(key);
        }
        if let StoredValue::Object(payload) = value {
            self.objects.insert(key.to_string(), payload);
        }
        Ok(())
    }

    fn load(&self, key: &str) -> StoreResult<StoredValue> {
        validate_key(key)?;

        if let Some(value) = self.state.scalar(key) {
            return Ok(value);
        }
        self.state
            .object(key)
            .and_then(|_| self.objects.get(key))
            .map(|payload| StoredValue::Object(payload.clone()))
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn delete(&mut self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;

        let removed = self.state.remove(key);
        if removed.object.is_some() {
            self.objects.remove(key);
        }
        Ok(!removed.is_empty())
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

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("key_count", &self.state.len())
            .finish()
    }
}
