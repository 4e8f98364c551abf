//! Domain error types
//!
//! This module defines the error hierarchy for Obscura.
//! Errors raised by collaborator backends are wrapped in [`StoreError`] so
//! that no backend-specific types leak into the anonymization core.

use crate::domain::ids::{EntityType, ObjectId};
use thiserror::Error;

/// Main Obscura error type
///
/// Fatal variants abort the current `update` call before any write for the
/// object being processed. [`ObscuraError::UnreachableProperty`] is the one
/// non-fatal kind: the engine logs it and skips the offending branch.
#[derive(Debug, Error)]
pub enum ObscuraError {
    /// No usable encryption key, or otherwise invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Deanonymization requested on a type marked non-reversible
    #[error("Anonymizer for {entity_type} object {object_id} is not reversible")]
    IrreversibleAnonymizer {
        entity_type: EntityType,
        object_id: ObjectId,
    },

    /// Decryption requested from a field anonymizer that cannot reverse
    #[error("Field anonymizer '{0}' is not reversible")]
    IrreversibleField(String),

    /// A requested field or relation maps to no anonymizer or descriptor
    #[error("Unknown field '{field}' on {entity_type}: {reason}")]
    UnknownField {
        entity_type: EntityType,
        field: String,
        reason: String,
    },

    /// A related attribute is neither a single record, a collection, nor empty
    #[error("Unreachable property '{field}' on {entity_type} object {object_id}: {observed}")]
    UnreachableProperty {
        entity_type: EntityType,
        object_id: ObjectId,
        field: String,
        observed: String,
    },

    /// Two anonymizers registered for one entity type
    #[error("Anonymizer already registered for {0}")]
    DuplicateRegistration(EntityType),

    /// Registration attempted after the global registry was installed
    #[error("Anonymizer registry is frozen: {0}")]
    RegistryFrozen(String),

    /// A value the field anonymizer cannot transform
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Collaborator backend errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl ObscuraError {
    /// Whether the error aborts the whole call (everything except unreachable properties)
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ObscuraError::UnreachableProperty { .. })
    }

    /// Shorthand for an [`ObscuraError::UnknownField`]
    pub fn unknown_field(
        entity_type: &EntityType,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ObscuraError::UnknownField {
            entity_type: entity_type.clone(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`ObscuraError::InvalidValue`]
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ObscuraError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Attach the record field name to an [`ObscuraError::InvalidValue`]
    pub fn for_field(self, name: &str) -> Self {
        match self {
            ObscuraError::InvalidValue { reason, .. } => ObscuraError::InvalidValue {
                field: name.to_string(),
                reason,
            },
            other => other,
        }
    }
}

/// Store-specific errors
///
/// Errors raised by record stores, schema reflection, marker and history
/// backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record not found
    #[error("Record not found: {entity_type} {object_id}")]
    NotFound {
        entity_type: EntityType,
        object_id: ObjectId,
    },

    /// Conflicting write (e.g. a second active marker)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Entity type not known to the backend
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(EntityType),

    /// Backend failure
    #[error("Backend failure: {0}")]
    Backend(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for ObscuraError {
    fn from(err: std::io::Error) -> Self {
        ObscuraError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for ObscuraError {
    fn from(err: serde_json::Error) -> Self {
        ObscuraError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for ObscuraError {
    fn from(err: toml::de::Error) -> Self {
        ObscuraError::Configuration(format!("TOML parse error: {err}"))
    }
}
