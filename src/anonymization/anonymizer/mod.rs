//! Field anonymizers
//!
//! A field anonymizer transforms one field value forward (anonymize) and, if
//! it is reversible, backward (deanonymize) given the per-field key derived
//! by the model anonymizer. Transforms are pure: no persistence, no access to
//! other fields.
//!
//! Reversible: [`TextFieldAnonymizer`], [`EmailFieldAnonymizer`],
//! [`PhoneNumberFieldAnonymizer`], [`NumericFieldAnonymizer`],
//! [`DecimalFieldAnonymizer`], [`DateFieldAnonymizer`],
//! [`IpAddressFieldAnonymizer`], [`NoOpFieldAnonymizer`].
//!
//! Irreversible: [`HashFieldAnonymizer`], [`MaskFieldAnonymizer`],
//! [`RandomTextFieldAnonymizer`], [`StaticValueFieldAnonymizer`].

pub mod contact;
pub mod date;
pub mod irreversible;
pub mod network;
pub mod numeric;
pub mod text;

pub use contact::{EmailFieldAnonymizer, PhoneNumberFieldAnonymizer};
pub use date::DateFieldAnonymizer;
pub use irreversible::{
    HashFieldAnonymizer, MaskFieldAnonymizer, RandomTextFieldAnonymizer,
    StaticValueFieldAnonymizer,
};
pub use network::IpAddressFieldAnonymizer;
pub use numeric::{DecimalFieldAnonymizer, NumericFieldAnonymizer};
pub use text::TextFieldAnonymizer;

use crate::domain::{FieldChange, HistoryEntry, ObscuraError, Record, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Which values count as empty and whether empty values are left alone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmptyValuePolicy {
    /// Leave empty values untouched in both directions
    #[serde(default = "default_ignore_empty_values")]
    pub ignore_empty_values: bool,

    /// Values considered empty
    #[serde(default = "default_empty_values")]
    pub empty_values: Vec<Value>,
}

fn default_ignore_empty_values() -> bool {
    true
}

fn default_empty_values() -> Vec<Value> {
    vec![Value::Null]
}

impl Default for EmptyValuePolicy {
    fn default() -> Self {
        Self {
            ignore_empty_values: default_ignore_empty_values(),
            empty_values: default_empty_values(),
        }
    }
}

impl EmptyValuePolicy {
    /// Whether `value` passes through untouched
    pub fn skips(&self, value: &Value) -> bool {
        self.ignore_empty_values && self.empty_values.contains(value)
    }
}

/// Transform of a single field value
pub trait FieldAnonymizer: Send + Sync + fmt::Debug {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Empty-value handling
    fn empty_values(&self) -> &EmptyValuePolicy;

    /// Whether the transform can be reversed for this record
    fn is_reversible(&self, _record: &Record) -> bool {
        true
    }

    /// Forward transform of a non-empty value
    fn encrypt(&self, value: &Value, key: &str) -> Result<Value>;

    /// Backward transform of a non-empty value
    fn decrypt(&self, _value: &Value, _key: &str) -> Result<Value> {
        Err(ObscuraError::IrreversibleField(self.name().to_string()))
    }

    /// Anonymizes a value, honouring the empty-value policy
    fn anonymize_value(&self, value: &Value, key: &str) -> Result<Value> {
        if self.empty_values().skips(value) {
            return Ok(value.clone());
        }
        self.encrypt(value, key)
    }

    /// Deanonymizes a value, honouring reversibility and the empty-value policy
    fn deanonymize_value(&self, record: &Record, value: &Value, key: &str) -> Result<Value> {
        if !self.is_reversible(record) {
            return Err(ObscuraError::IrreversibleField(self.name().to_string()));
        }
        if self.empty_values().skips(value) {
            return Ok(value.clone());
        }
        self.decrypt(value, key)
    }

    /// New value of a field of the live record
    fn get_value_from_obj(
        &self,
        record: &Record,
        field: &str,
        key: &str,
        anonymize: bool,
    ) -> Result<Value> {
        let value = record.value(field);
        let result = if anonymize {
            self.anonymize_value(value, key)
        } else {
            self.deanonymize_value(record, value, key)
        };
        result.map_err(|e| e.for_field(field))
    }

    /// New old/new pair of a field inside a history entry
    ///
    /// `None` when the entry did not change the field.
    fn get_value_from_entry(
        &self,
        record: &Record,
        entry: &HistoryEntry,
        field: &str,
        key: &str,
        anonymize: bool,
    ) -> Result<Option<FieldChange>> {
        let Some(change) = entry.changes.get(field) else {
            return Ok(None);
        };
        let transform = |value: &Value| {
            let result = if anonymize {
                self.anonymize_value(value, key)
            } else {
                self.deanonymize_value(record, value, key)
            };
            result.map_err(|e| e.for_field(field))
        };
        Ok(Some(FieldChange::new(
            transform(&change.old)?,
            transform(&change.new)?,
        )))
    }
}

/// Pass-through anonymizer
///
/// Declares a field as anonymizable (markers are written) without changing
/// its value.
#[derive(Debug, Clone, Default)]
pub struct NoOpFieldAnonymizer {
    empty: EmptyValuePolicy,
}

impl NoOpFieldAnonymizer {
    /// Creates a pass-through anonymizer
    pub fn new() -> Self {
        Self::default()
    }
}

impl FieldAnonymizer for NoOpFieldAnonymizer {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn empty_values(&self) -> &EmptyValuePolicy {
        &self.empty
    }

    fn encrypt(&self, value: &Value, _key: &str) -> Result<Value> {
        Ok(value.clone())
    }

    fn decrypt(&self, value: &Value, _key: &str) -> Result<Value> {
        Ok(value.clone())
    }
}

/// Extracts a string value or reports the type that was found instead
pub(crate) fn expect_str<'a>(value: &'a Value, anonymizer: &str) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        ObscuraError::invalid_value(
            anonymizer,
            format!("expected a string, found {}", type_name(value)),
        )
    })
}

/// JSON type name of a value
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
