//! Records and the bookkeeping types that surround them
//!
//! A [`Record`] is any row of the underlying store. The core only knows its
//! entity type, primary key and a JSON object of field values.

use crate::domain::ids::{EntityType, LegalReasonRef, ObjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A record of the underlying store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Entity type of the record
    pub entity_type: EntityType,

    /// Primary key
    pub pk: ObjectId,

    /// Field values
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates an empty record
    pub fn new(entity_type: EntityType, pk: impl Into<ObjectId>) -> Self {
        Self {
            entity_type,
            pk: pk.into(),
            fields: Map::new(),
        }
    }

    /// Sets a field value (builder style)
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns a field value, `None` if the record has no such field
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns a field value, treating a missing field as `null`
    pub fn value(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&Value::Null)
    }

    /// Returns a text field value
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Sets a field value
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Whether the record carries the given field
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Identity key of this record
    pub fn key(&self) -> (EntityType, ObjectId) {
        (self.entity_type.clone(), self.pk.clone())
    }
}

/// Old and new value of one field inside a history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Value before the recorded write
    pub old: Value,
    /// Value after the recorded write
    pub new: Value,
}

impl FieldChange {
    /// Creates a new field change
    pub fn new(old: Value, new: Value) -> Self {
        Self { old, new }
    }
}

/// A change-history entry for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Entry identity, preserved across rewrites
    pub id: Uuid,

    /// Entity type of the changed record
    pub entity_type: EntityType,

    /// Primary key of the changed record
    pub object_id: ObjectId,

    /// When the change was recorded
    pub recorded_at: DateTime<Utc>,

    /// Changed fields
    pub changes: BTreeMap<String, FieldChange>,
}

impl HistoryEntry {
    /// Creates a new entry for the given record
    pub fn new(entity_type: EntityType, object_id: ObjectId) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_type,
            object_id,
            recorded_at: Utc::now(),
            changes: BTreeMap::new(),
        }
    }

    /// Adds a field change (builder style)
    pub fn with_change(mut self, field: impl Into<String>, old: Value, new: Value) -> Self {
        self.changes.insert(field.into(), FieldChange::new(old, new));
        self
    }
}

/// Marker stating that a field of a record has been anonymized
///
/// At most one active marker exists per (entity type, object id, field).
/// Deanonymization deletes the active marker instead of deactivating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizedData {
    /// Marker id
    pub id: Uuid,

    /// Entity type of the anonymized record
    pub entity_type: EntityType,

    /// Primary key of the anonymized record
    pub object_id: ObjectId,

    /// Anonymized field
    pub field: String,

    /// Whether the marker is active
    pub is_active: bool,

    /// Legal reason whose expiry triggered the anonymization
    pub expired_reason: Option<LegalReasonRef>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl AnonymizedData {
    /// Creates an active marker
    pub fn active(
        entity_type: EntityType,
        object_id: ObjectId,
        field: impl Into<String>,
        expired_reason: Option<LegalReasonRef>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_type,
            object_id,
            field: field.into(),
            is_active: true,
            expired_reason,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn customer() -> EntityType {
        EntityType::new("shop.customer").unwrap()
    }

    #[test]
    fn test_record_builder() {
        let record = Record::new(customer(), 1)
            .with("first_name", "Ada")
            .with("age", 36);

        assert_eq!(record.get_str("first_name"), Some("Ada"));
        assert_eq!(record.value("age"), &json!(36));
        assert_eq!(record.value("missing"), &Value::Null);
        assert!(!record.has_field("missing"));
    }

    #[test]
    fn test_record_serde() {
        let record: Record = serde_json::from_value(json!({
            "entity_type": "shop.customer",
            "pk": 5,
            "fields": {"first_name": "Grace"}
        }))
        .unwrap();

        assert_eq!(record.pk, ObjectId::Int(5));
        assert_eq!(record.get_str("first_name"), Some("Grace"));
    }

    #[test]
    fn test_history_entry_builder() {
        let entry = HistoryEntry::new(customer(), ObjectId::Int(1)).with_change(
            "first_name",
            json!("Ada"),
            json!("Grace"),
        );

        assert_eq!(entry.changes["first_name"].old, json!("Ada"));
        assert_eq!(entry.changes["first_name"].new, json!("Grace"));
    }

    #[test]
    fn test_anonymized_data_active() {
        let reason = LegalReasonRef::generate();
        let marker = AnonymizedData::active(customer(), ObjectId::Int(1), "email", Some(reason));
        assert!(marker.is_active);
        assert_eq!(marker.expired_reason, Some(reason));
    }
}
