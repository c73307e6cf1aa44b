use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreResult;
use crate::value::{StoredValue, ValueKind};

/// Typed key-value store.
///
/// All implementations must satisfy these invariants:
/// - Keys are validated before anything else happens; an invalid key never
///   touches the backing storage.
/// - A key holds at most one value. `save` fully replaces any previous
///   value, whatever its kind.
/// - A miss is reported as `StoreError::NotFound`, never as a default value.
/// - A failed write leaves the store exactly as it was before the call.
pub trait KeyValueStore {
    /// Save `value` under `key`, replacing any previous value.
    fn save(&mut self, key: &str, value: StoredValue) -> StoreResult<()>;

    /// Load the value stored under `key`.
    fn load(&self, key: &str) -> StoreResult<StoredValue>;

    /// Delete `key`. Returns `true` if something was removed.
    ///
    /// Deleting an absent key is a no-op that returns `Ok(false)`.
    fn delete(&mut self, key: &str) -> StoreResult<bool>;

    /// Which kind of value `key` holds, if any.
    fn kind_of(&self, key: &str) -> Option<ValueKind>;

    /// All keys with their kinds, ordered by key.
    fn keys(&self) -> Vec<(String, ValueKind)>;

    /// Check whether `key` holds a value.
    fn contains(&self, key: &str) -> bool {
        self.kind_of(key).is_some()
    }

    /// Number of keys held.
    fn len(&self) -> usize {
        self.keys().len()
    }

    /// Returns `true` if the store holds no keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load_number(&self, key: &str) -> StoreResult<f64> {
        self.load(key)?.into_number(key)
    }

    fn load_string(&self, key: &str) -> StoreResult<String> {
        self.load(key)?.into_text(key)
    }

    fn load_bool(&self, key: &str) -> StoreResult<bool> {
        self.load(key)?.into_bool(key)
    }

    /// Serialize `value` and save it as an object.
    fn save_object<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> StoreResult<()>
    where
        Self: Sized,
    {
        self.save(key, StoredValue::object(value)?)
    }

    /// Load an object and deserialize it into `T`.
    fn load_object<T: DeserializeOwned>(&self, key: &str) -> StoreResult<T>
    where
        Self: Sized,
    {
        self.load(key)?.into_object(key)
    }
}
