//! Key validation.
//!
//! Every key doubles as a file name (`<key>.json`) inside a single flat data
//! directory, so a valid key:
//! - Must be non-empty and at most [`MAX_KEY_LEN`] bytes
//! - Must not contain path separators, control characters, or any of
//!   `: * ? " < > |`
//! - Must not be `.` or `..`, or start with `.`
//! - Must not end with a space or `.`
//! - Must not equal the reserved index key, compared case-insensitively

use crate::error::{StoreError, StoreResult};

/// Key under which the store persists its own index (`GlobalStorage.json`).
pub const INDEX_KEY: &str = "GlobalStorage";

/// Extension appended to every key to form its file name.
pub const FILE_EXTENSION: &str = "json";

/// Longest key that still leaves room for the `.json` suffix in a
/// 255-byte file name.
pub const MAX_KEY_LEN: usize = 255 - 1 - FILE_EXTENSION.len();

/// Characters that are forbidden anywhere in a key.
const FORBIDDEN_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Validate a store key, returning `Ok(())` if it can be used.
///
/// # Examples
///
/// ```
/// use gls_store::key::validate_key;
///
/// assert!(validate_key("high-score").is_ok());
/// assert!(validate_key("").is_err());
/// assert!(validate_key("../escape").is_err());
/// assert!(validate_key("GlobalStorage").is_err());
/// ```
pub fn validate_key(key: &str) -> StoreResult<()> {
    let invalid = |reason: String| StoreError::InvalidKey {
        key: key.to_string(),
        reason,
    };

    if key.is_empty() {
        return Err(invalid("key must not be empty".into()));
    }

    if key.len() > MAX_KEY_LEN {
        return Err(invalid(format!(
            "key is {} bytes, limit is {MAX_KEY_LEN}",
            key.len()
        )));
    }

    if let Some(ch) = key.chars().find(|c| c.is_control()) {
        return Err(invalid(format!("contains control character: {ch:?}")));
    }

    for ch in FORBIDDEN_CHARS {
        if key.contains(*ch) {
            return Err(invalid(format!("contains forbidden character: {ch:?}")));
        }
    }

    // Covers `.`, `..`, and hidden/temporary files alike.
    if key.starts_with('.') {
        return Err(invalid("must not start with '.'".into()));
    }

    if key.ends_with('.') || key.ends_with(' ') {
        return Err(invalid("must not end with '.' or a space".into()));
    }

    if key.eq_ignore_ascii_case(INDEX_KEY) {
        return Err(StoreError::ReservedKey(key.to_string()));
    }

    Ok(())
}

/// File name that holds the data for `key`.
pub fn file_name(key: &str) -> String {
    format!("{key}.{FILE_EXTENSION}")
}

/// Inverse of [`file_name`]: the key a data-directory entry belongs to, if
/// the name carries the store's extension.
pub fn key_from_file_name(name: &str) -> Option<&str> {
    name.strip_suffix(FILE_EXTENSION)?.strip_suffix('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_keys() {
        for key in ["a", "score", "player_1", "level-3.checkpoint", "ünïcode", "with space"] {
            assert!(validate_key(key).is_ok(), "{key} should be valid");
        }
    }

    #[test]
    fn empty_key_rejected() {
        let err = validate_key("").unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));
    }

    #[test]
    fn path_separators_rejected() {
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("a\\b").is_err());
        assert!(validate_key("/etc/passwd").is_err());
    }

    #[test]
    fn traversal_rejected() {
        assert!(validate_key(".").is_err());
        assert!(validate_key("..").is_err());
        assert!(validate_key("../up").is_err());
        assert!(validate_key(".hidden").is_err());
    }

    #[test]
    fn forbidden_and_control_chars_rejected() {
        for key in ["a:b", "a*", "what?", "\"q\"", "<x>", "a|b", "nul\0", "tab\there"] {
            assert!(validate_key(key).is_err(), "{key:?} should be rejected");
        }
    }

    #[test]
    fn trailing_dot_or_space_rejected() {
        assert!(validate_key("name.").is_err());
        assert!(validate_key("name ").is_err());
    }

    #[test]
    fn length_limit() {
        let max = "k".repeat(MAX_KEY_LEN);
        assert!(validate_key(&max).is_ok());
        assert_eq!(file_name(&max).len(), 255);

        let over = "k".repeat(MAX_KEY_LEN + 1);
        assert!(validate_key(&over).is_err());
    }

    #[test]
    fn index_key_is_reserved_case_insensitively() {
        for key in ["GlobalStorage", "globalstorage", "GLOBALSTORAGE"] {
            let err = validate_key(key).unwrap_err();
            assert!(matches!(err, StoreError::ReservedKey(_)));
        }
        assert!(validate_key("GlobalStorage2").is_ok());
    }

    #[test]
    fn file_name_mapping() {
        assert_eq!(file_name("player"), "player.json");
        assert_eq!(key_from_file_name("player.json"), Some("player"));
        assert_eq!(key_from_file_name("a.b.json"), Some("a.b"));
        assert_eq!(key_from_file_name("player.txt"), None);
        assert_eq!(key_from_file_name("json"), None);
    }
}
