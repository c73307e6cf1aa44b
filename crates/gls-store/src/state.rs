use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::key;
use crate::value::{StoredValue, ValueKind};

/// A single `(key, value)` pair in one of the scalar buckets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalarEntry<T> {
    pub key: String,
    pub value: T,
}

impl<T> ScalarEntry<T> {
    pub fn new(key: impl Into<String>, value: T) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Catalog entry: `key` has its own JSON document at `file`, relative to the
/// data directory.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub key: String,
    pub file: String,
}

impl ObjectRecord {
    /// Record for `key` under the standard `<key>.json` file name.
    pub fn for_key(key: &str) -> Self {
        Self {
            key: key.to_string(),
            file: key::file_name(key),
        }
    }
}

/// What a removal took out of the state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Removed {
    /// Number of scalar entries dropped across all buckets.
    pub scalars: usize,
    /// The catalog record dropped, if the key was an object.
    pub object: Option<ObjectRecord>,
}

impl Removed {
    pub fn is_empty(&self) -> bool {
        self.scalars == 0 && self.object.is_none()
    }
}

/// The persisted state of a store: three scalar buckets and the object
/// catalog.
///
/// This is exactly what the index file contains. It holds no object
/// payloads, only the records pointing at their files.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub numbers: Vec<ScalarEntry<f64>>,
    #[serde(default)]
    pub strings: Vec<ScalarEntry<String>>,
    #[serde(default)]
    pub booleans: Vec<ScalarEntry<bool>>,
    #[serde(default)]
    pub objects: BTreeSet<ObjectRecord>,
}

impl StoreState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an index document.
    pub fn from_json(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }

    /// Encode as a pretty-printed index document.
    pub fn to_json_pretty(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Total number of keys held.
    pub fn len(&self) -> usize {
        self.numbers.len() + self.strings.len() + self.booleans.len() + self.objects.len()
    }

    /// Returns `true` if no key is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a scalar value. Objects are not resolved here; see
    /// [`StoreState::object`].
    pub fn scalar(&self, key: &str) -> Option<StoredValue> {
        if let Some(e) = self.numbers.iter().find(|e| e.key == key) {
            return Some(StoredValue::Number(e.value));
        }
        if let Some(e) = self.strings.iter().find(|e| e.key == key) {
            return Some(StoredValue::Text(e.value.clone()));
        }
        self.booleans
            .iter()
            .find(|e| e.key == key)
            .map(|e| StoredValue::Bool(e.value))
    }

    /// Look up the catalog record for an object key.
    pub fn object(&self, key: &str) -> Option<&ObjectRecord> {
        self.objects.iter().find(|r| r.key == key)
    }

    /// Which kind of value `key` currently holds.
    pub fn kind_of(&self, key: &str) -> Option<ValueKind> {
        if self.numbers.iter().any(|e| e.key == key) {
            Some(ValueKind::Number)
        } else if self.strings.iter().any(|e| e.key == key) {
            Some(ValueKind::Text)
        } else if self.booleans.iter().any(|e| e.key == key) {
            Some(ValueKind::Bool)
        } else if self.object(key).is_some() {
            Some(ValueKind::Object)
        } else {
            None
        }
    }

    /// Remove every entry for `key` from all buckets and the catalog.
    pub fn remove(&mut self, key: &str) -> Removed {
        let before = self.numbers.len() + self.strings.len() + self.booleans.len();
        self.numbers.retain(|e| e.key != key);
        self.strings.retain(|e| e.key != key);
        self.booleans.retain(|e| e.key != key);
        let after = self.numbers.len() + self.strings.len() + self.booleans.len();

        let object = self.object(key).cloned();
        if let Some(record) = &object {
            self.objects.remove(record);
        }

        Removed {
            scalars: before - after,
            object,
        }
    }

    /// Replace whatever `key` holds with `value`.
    ///
    /// Scalars go into their bucket; objects only get a catalog record, the
    /// payload itself belongs to the caller.
    pub fn put(&mut self, key: &str, value: &StoredValue) -> Removed {
        let removed = self.remove(key);
        match value {
            StoredValue::Number(n) => self.numbers.push(ScalarEntry::new(key, *n)),
            StoredValue::Text(s) => self.strings.push(ScalarEntry::new(key, s.clone())),
            StoredValue::Bool(b) => self.booleans.push(ScalarEntry::new(key, *b)),
            StoredValue::Object(_) => {
                self.objects.insert(ObjectRecord::for_key(key));
            }
        }
        removed
    }

    /// All keys with their kinds, ordered by key.
    pub fn keys(&self) -> Vec<(String, ValueKind)> {
        let mut keys: Vec<(String, ValueKind)> = self
            .numbers
            .iter()
            .map(|e| (e.key.clone(), ValueKind::Number))
            .chain(self.strings.iter().map(|e| (e.key.clone(), ValueKind::Text)))
            .chain(self.booleans.iter().map(|e| (e.key.clone(), ValueKind::Bool)))
            .chain(self.objects.iter().map(|r| (r.key.clone(), ValueKind::Object)))
            .collect();
        keys.sort();
        keys
    }

    /// Drop duplicate keys so each key is held at most once.
    ///
    /// The first occurrence wins, scanning numbers, strings, booleans and
    /// then objects. Returns the entries that were dropped.
    pub fn normalize(&mut self) -> Vec<(String, ValueKind)> {
        let mut seen = HashSet::new();
        let mut dropped = Vec::new();

        let mut keep = |key: &str, kind: ValueKind| {
            if seen.insert(key.to_string()) {
                true
            } else {
                dropped.push((key.to_string(), kind));
                false
            }
        };

        self.numbers.retain(|e| keep(&e.key, ValueKind::Number));
        self.strings.retain(|e| keep(&e.key, ValueKind::Text));
        self.booleans.retain(|e| keep(&e.key, ValueKind::Bool));
        self.objects.retain(|r| keep(&r.key, ValueKind::Object));

        dropped
    }
}
