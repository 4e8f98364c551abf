//! E-mail address and phone number anonymizers

use super::{expect_str, EmptyValuePolicy, FieldAnonymizer};
use crate::anonymization::crypto::cipher::{transform, Charset, Direction};
use crate::domain::{ObscuraError, Result};
use serde_json::Value;

/// Reversible e-mail anonymizer
///
/// Encrypts the local part and every domain label except the top-level one,
/// so `jane.doe@example.com` stays a syntactically valid `.com` address.
#[derive(Debug, Clone, Default)]
pub struct EmailFieldAnonymizer {
    empty: EmptyValuePolicy,
}

impl EmailFieldAnonymizer {
    /// Creates an e-mail anonymizer
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the empty-value policy
    pub fn with_empty_values(mut self, empty: EmptyValuePolicy) -> Self {
        self.empty = empty;
        self
    }

    fn apply(&self, value: &Value, key: &str, direction: Direction) -> Result<Value> {
        let address = expect_str(value, self.name())?;
        let (local, domain) = address.rsplit_once('@').ok_or_else(|| {
            ObscuraError::invalid_value(self.name(), "value is not an e-mail address")
        })?;

        let local = transform(&format!("{key}::local"), local, Charset::Alphanumeric, direction);

        let labels: Vec<&str> = domain.split('.').collect();
        let last = labels.len().saturating_sub(1);
        let domain = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                if i == last && last > 0 {
                    (*label).to_string()
                } else {
                    transform(
                        &format!("{key}::domain::{i}"),
                        label,
                        Charset::Alphanumeric,
                        direction,
                    )
                }
            })
            .collect::<Vec<_>>()
            .join(".");

        Ok(Value::String(format!("{local}@{domain}")))
    }
}

impl FieldAnonymizer for EmailFieldAnonymizer {
    fn name(&self) -> &'static str {
        "email"
    }

    fn empty_values(&self) -> &EmptyValuePolicy {
        &self.empty
    }

    fn encrypt(&self, value: &Value, key: &str) -> Result<Value> {
        self.apply(value, key, Direction::Encrypt)
    }

    fn decrypt(&self, value: &Value, key: &str) -> Result<Value> {
        self.apply(value, key, Direction::Decrypt)
    }
}

/// Reversible phone number anonymizer
///
/// Only digits are encrypted; a leading `+`, spaces and separators stay.
#[derive(Debug, Clone, Default)]
pub struct PhoneNumberFieldAnonymizer {
    empty: EmptyValuePolicy,
    keep_prefix_digits: usize,
}

impl PhoneNumberFieldAnonymizer {
    /// Creates a phone number anonymizer
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the first `count` digits (country/area code) in clear
    pub fn keep_prefix_digits(mut self, count: usize) -> Self {
        self.keep_prefix_digits = count;
        self
    }

    /// Overrides the empty-value policy
    pub fn with_empty_values(mut self, empty: EmptyValuePolicy) -> Self {
        self.empty = empty;
        self
    }

    fn apply(&self, value: &Value, key: &str, direction: Direction) -> Result<Value> {
        let number = expect_str(value, self.name())?;
        if !number.chars().any(|c| c.is_ascii_digit()) {
            return Err(ObscuraError::invalid_value(
                self.name(),
                "value contains no digits",
            ));
        }

        let mut seen = 0;
        let split = number
            .char_indices()
            .find(|(_, c)| {
                if c.is_ascii_digit() {
                    seen += 1;
                }
                seen > self.keep_prefix_digits
            })
            .map(|(i, _)| i)
            .unwrap_or(number.len());
        let (prefix, rest) = number.split_at(split);

        Ok(Value::String(format!(
            "{prefix}{}",
            transform(key, rest, Charset::Digits, direction)
        )))
    }
}

impl FieldAnonymizer for PhoneNumberFieldAnonymizer {
    fn name(&self) -> &'static str {
        "phone_number"
    }

    fn empty_values(&self) -> &EmptyValuePolicy {
        &self.empty
    }

    fn encrypt(&self, value: &Value, key: &str) -> Result<Value> {
        self.apply(value, key, Direction::Encrypt)
    }

    fn decrypt(&self, value: &Value, key: &str) -> Result<Value> {
        self.apply(value, key, Direction::Decrypt)
    }
}
