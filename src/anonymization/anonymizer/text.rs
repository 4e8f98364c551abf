//! Free-text anonymizer

use super::{expect_str, EmptyValuePolicy, FieldAnonymizer};
use crate::anonymization::crypto::{decrypt_text, encrypt_text};
use crate::domain::Result;
use serde_json::Value;

/// Reversible keyed substitution of letters and digits
///
/// Whitespace, punctuation and non-ASCII characters are kept, so names and
/// street addresses keep their shape.
#[derive(Debug, Clone, Default)]
pub struct TextFieldAnonymizer {
    empty: EmptyValuePolicy,
}

impl TextFieldAnonymizer {
    /// Creates a text anonymizer with the default empty-value policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the empty-value policy
    pub fn with_empty_values(mut self, empty: EmptyValuePolicy) -> Self {
        self.empty = empty;
        self
    }
}

impl FieldAnonymizer for TextFieldAnonymizer {
    fn name(&self) -> &'static str {
        "text"
    }

    fn empty_values(&self) -> &EmptyValuePolicy {
        &self.empty
    }

    fn encrypt(&self, value: &Value, key: &str) -> Result<Value> {
        let text = expect_str(value, self.name())?;
        Ok(Value::String(encrypt_text(key, text)))
    }

    fn decrypt(&self, value: &Value, key: &str) -> Result<Value> {
        let text = expect_str(value, self.name())?;
        Ok(Value::String(decrypt_text(key, text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::address::en::StreetName;
    use fake::faker::name::en::Name;
    use fake::Fake;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("John Smith" ; "name")]
    #[test_case("Na Příkopě 12" ; "street with diacritics")]
    #[test_case("" ; "empty string")]
    #[test_case("42" ; "digits only")]
    fn test_roundtrip(original: &str) {
        let anonymizer = TextFieldAnonymizer::new();
        let encrypted = anonymizer.encrypt(&json!(original), "field-key").unwrap();
        let decrypted = anonymizer.decrypt(&encrypted, "field-key").unwrap();
        assert_eq!(decrypted, json!(original));
    }

    #[test]
    fn test_roundtrip_fake_values() {
        let anonymizer = TextFieldAnonymizer::new();
        for _ in 0..20 {
            let name: String = Name().fake();
            let street: String = StreetName().fake();
            for original in [name, street] {
                let encrypted = anonymizer.encrypt(&json!(original), "k").unwrap();
                assert_eq!(anonymizer.decrypt(&encrypted, "k").unwrap(), json!(original));
            }
        }
    }

    #[test]
    fn test_changes_value() {
        let anonymizer = TextFieldAnonymizer::new();
        let encrypted = anonymizer.encrypt(&json!("Ada Lovelace"), "k").unwrap();
        assert_ne!(encrypted, json!("Ada Lovelace"));
    }

    #[test]
    fn test_rejects_non_string() {
        let anonymizer = TextFieldAnonymizer::new();
        assert!(anonymizer.encrypt(&json!(12), "k").is_err());
    }
}
