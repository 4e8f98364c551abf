//! Irreversible anonymizers
//!
//! None of these can be undone, even with the key: deanonymizing a field
//! they govern fails with [`ObscuraError::IrreversibleField`].

use super::{EmptyValuePolicy, FieldAnonymizer};
use crate::domain::{ObscuraError, Record, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Minimum number of hex characters kept from the digest
const MIN_HASH_LEN: usize = 8;

/// Renders scalars as text, rejecting arrays and objects
fn scalar_text(value: &Value, anonymizer: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(ObscuraError::invalid_value(
            anonymizer,
            "arrays and objects cannot be anonymized",
        )),
    }
}

/// Keyed SHA-256 digest truncated to the original length
#[derive(Debug, Clone, Default)]
pub struct HashFieldAnonymizer {
    empty: EmptyValuePolicy,
}

impl HashFieldAnonymizer {
    /// Creates a hashing anonymizer
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the empty-value policy
    pub fn with_empty_values(mut self, empty: EmptyValuePolicy) -> Self {
        self.empty = empty;
        self
    }
}

impl FieldAnonymizer for HashFieldAnonymizer {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn empty_values(&self) -> &EmptyValuePolicy {
        &self.empty
    }

    fn is_reversible(&self, _record: &Record) -> bool {
        false
    }

    fn encrypt(&self, value: &Value, key: &str) -> Result<Value> {
        let text = scalar_text(value, self.name())?;
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update(text.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        let len = text.chars().count().clamp(MIN_HASH_LEN, digest.len());
        Ok(Value::String(digest[..len].to_string()))
    }
}

/// Masks all but a prefix and suffix of the value
#[derive(Debug, Clone)]
pub struct MaskFieldAnonymizer {
    empty: EmptyValuePolicy,
    keep_prefix: usize,
    keep_suffix: usize,
    mask_char: char,
}

impl Default for MaskFieldAnonymizer {
    fn default() -> Self {
        Self {
            empty: EmptyValuePolicy::default(),
            keep_prefix: 0,
            keep_suffix: 0,
            mask_char: '*',
        }
    }
}

impl MaskFieldAnonymizer {
    /// Creates an anonymizer masking every character with `*`
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the first `count` characters
    pub fn keep_prefix(mut self, count: usize) -> Self {
        self.keep_prefix = count;
        self
    }

    /// Keeps the last `count` characters
    pub fn keep_suffix(mut self, count: usize) -> Self {
        self.keep_suffix = count;
        self
    }

    /// Sets the mask character
    pub fn mask_char(mut self, mask: char) -> Self {
        self.mask_char = mask;
        self
    }

    /// Overrides the empty-value policy
    pub fn with_empty_values(mut self, empty: EmptyValuePolicy) -> Self {
        self.empty = empty;
        self
    }
}

impl FieldAnonymizer for MaskFieldAnonymizer {
    fn name(&self) -> &'static str {
        "mask"
    }

    fn empty_values(&self) -> &EmptyValuePolicy {
        &self.empty
    }

    fn is_reversible(&self, _record: &Record) -> bool {
        false
    }

    fn encrypt(&self, value: &Value, _key: &str) -> Result<Value> {
        let text = scalar_text(value, self.name())?;
        let len = text.chars().count();
        let masked = text
            .chars()
            .enumerate()
            .map(|(i, c)| {
                if i < self.keep_prefix || i + self.keep_suffix >= len {
                    c
                } else {
                    self.mask_char
                }
            })
            .collect();
        Ok(Value::String(masked))
    }
}

/// Random alphanumeric text of the same length
#[derive(Debug, Clone, Default)]
pub struct RandomTextFieldAnonymizer {
    empty: EmptyValuePolicy,
}

impl RandomTextFieldAnonymizer {
    /// Creates a random-text anonymizer
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the empty-value policy
    pub fn with_empty_values(mut self, empty: EmptyValuePolicy) -> Self {
        self.empty = empty;
        self
    }
}

impl FieldAnonymizer for RandomTextFieldAnonymizer {
    fn name(&self) -> &'static str {
        "random_text"
    }

    fn empty_values(&self) -> &EmptyValuePolicy {
        &self.empty
    }

    fn is_reversible(&self, _record: &Record) -> bool {
        false
    }

    fn encrypt(&self, value: &Value, _key: &str) -> Result<Value> {
        let len = scalar_text(value, self.name())?.chars().count();
        let random: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        Ok(Value::String(random))
    }
}

/// Replaces the value with a fixed one
///
/// Covers placeholders such as a replacement file path or a redacted marker.
#[derive(Debug, Clone)]
pub struct StaticValueFieldAnonymizer {
    empty: EmptyValuePolicy,
    replacement: Value,
}

impl StaticValueFieldAnonymizer {
    /// Creates an anonymizer replacing every non-empty value with `replacement`
    pub fn new(replacement: impl Into<Value>) -> Self {
        Self {
            empty: EmptyValuePolicy::default(),
            replacement: replacement.into(),
        }
    }

    /// Overrides the empty-value policy
    pub fn with_empty_values(mut self, empty: EmptyValuePolicy) -> Self {
        self.empty = empty;
        self
    }
}

impl FieldAnonymizer for StaticValueFieldAnonymizer {
    fn name(&self) -> &'static str {
        "static_value"
    }

    fn empty_values(&self) -> &EmptyValuePolicy {
        &self.empty
    }

    fn is_reversible(&self, _record: &Record) -> bool {
        false
    }

    fn encrypt(&self, _value: &Value, _key: &str) -> Result<Value> {
        Ok(self.replacement.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_truncates_to_length() {
        let anonymizer = HashFieldAnonymizer::new();
        let hashed = anonymizer.encrypt(&json!("Jonathan Smith"), "k").unwrap();
        assert_eq!(hashed.as_str().unwrap().len(), 14);

        let short = anonymizer.encrypt(&json!("Al"), "k").unwrap();
        assert_eq!(short.as_str().unwrap().len(), MIN_HASH_LEN);
    }

    #[test]
    fn test_hash_depends_on_key() {
        let anonymizer = HashFieldAnonymizer::new();
        assert_ne!(
            anonymizer.encrypt(&json!("Ada"), "k1").unwrap(),
            anonymizer.encrypt(&json!("Ada"), "k2").unwrap()
        );
    }

    #[test]
    fn test_hash_not_reversible() {
        let anonymizer = HashFieldAnonymizer::new();
        assert!(matches!(
            anonymizer.decrypt(&json!("abcdef12"), "k"),
            Err(ObscuraError::IrreversibleField(_))
        ));
    }

    #[test]
    fn test_mask() {
        let anonymizer = MaskFieldAnonymizer::new().keep_prefix(2).keep_suffix(2);
        assert_eq!(
            anonymizer.encrypt(&json!("CZ6508000000192000145399"), "k").unwrap(),
            json!("CZ********************99")
        );
        assert_eq!(anonymizer.encrypt(&json!("abc"), "k").unwrap(), json!("abc"));
    }

    #[test]
    fn test_mask_char() {
        let anonymizer = MaskFieldAnonymizer::new().mask_char('#');
        assert_eq!(anonymizer.encrypt(&json!(1234), "k").unwrap(), json!("####"));
    }

    #[test]
    fn test_random_text_same_length() {
        let anonymizer = RandomTextFieldAnonymizer::new();
        let value = anonymizer.encrypt(&json!("secret-value"), "k").unwrap();
        assert_eq!(value.as_str().unwrap().len(), 12);
        assert_ne!(value, json!("secret-value"));
    }

    #[test]
    fn test_static_value() {
        let anonymizer = StaticValueFieldAnonymizer::new("avatars/anonymous.png");
        assert_eq!(
            anonymizer.encrypt(&json!("avatars/jane.png"), "k").unwrap(),
            json!("avatars/anonymous.png")
        );
    }
}
