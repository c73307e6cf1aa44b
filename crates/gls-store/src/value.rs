use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// The kind of value held under a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueKind {
    /// Any numeric value, stored as `f64`.
    Number,
    /// Text, including single characters.
    Text,
    /// `true` / `false`.
    Bool,
    /// Structured value persisted in its own JSON file.
    Object,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number => write!(f, "number"),
            Self::Text => write!(f, "text"),
            Self::Bool => write!(f, "bool"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// A value that can be saved in the store.
///
/// Scalars live in the index file; `Object` values are written to a
/// standalone `<key>.json` file.
#[derive(Clone, Debug, PartialEq)]
pub enum StoredValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Object(serde_json::Value),
}

impl StoredValue {
    /// Encode any serializable value as an `Object`.
    pub fn object<T: Serialize + ?Sized>(value: &T) -> StoreResult<Self> {
        Ok(Self::Object(serde_json::to_value(value)?))
    }

    /// The kind tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Number(_) => ValueKind::Number,
            Self::Text(_) => ValueKind::Text,
            Self::Bool(_) => ValueKind::Bool,
            Self::Object(_) => ValueKind::Object,
        }
    }

    /// Check that the value can be persisted under `key`.
    ///
    /// JSON has no representation for NaN or infinities, and a `null`
    /// object carries nothing to load back.
    pub fn validate(&self, key: &str) -> StoreResult<()> {
        let reason = match self {
            Self::Number(n) if !n.is_finite() => format!("number {n} is not finite"),
            Self::Object(serde_json::Value::Null) => "object is null".to_string(),
            _ => return Ok(()),
        };
        Err(StoreError::InvalidValue {
            key: key.to_string(),
            reason,
        })
    }

    /// Unwrap a `Number`, or report which kind `key` actually holds.
    pub fn into_number(self, key: &str) -> StoreResult<f64> {
        match self {
            Self::Number(n) => Ok(n),
            other => Err(mismatch(key, ValueKind::Number, &other)),
        }
    }

    /// Unwrap a `Text`, or report which kind `key` actually holds.
    pub fn into_text(self, key: &str) -> StoreResult<String> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(mismatch(key, ValueKind::Text, &other)),
        }
    }

    /// Unwrap a `Bool`, or report which kind `key` actually holds.
    pub fn into_bool(self, key: &str) -> StoreResult<bool> {
        match self {
            Self::Bool(b) => Ok(b),
            other => Err(mismatch(key, ValueKind::Bool, &other)),
        }
    }

    /// Decode an `Object` into `T`.
    pub fn into_object<T: DeserializeOwned>(self, key: &str) -> StoreResult<T> {
        match self {
            Self::Object(v) => Ok(serde_json::from_value(v)?),
            other => Err(mismatch(key, ValueKind::Object, &other)),
        }
    }

    /// Render the value as a JSON value, regardless of kind.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Number(n) => serde_json::json!(n),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Object(v) => v.clone(),
        }
    }
}

fn mismatch(key: &str, expected: ValueKind, found: &StoredValue) -> StoreError {
    StoreError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

impl std::fmt::Display for StoredValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Object(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for StoredValue {
                fn from(n: $t) -> Self {
                    Self::Number(n as f64)
                }
            }
        )*
    };
}

number_from!(f64, f32, i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl From<&str> for StoredValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for StoredValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<char> for StoredValue {
    fn from(c: char) -> Self {
        Self::Text(c.to_string())
    }
}

impl From<bool> for StoredValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
