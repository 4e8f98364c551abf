//! Collaborator traits
//!
//! The anonymization core talks to the outside world only through these
//! narrow interfaces: the record store, schema reflection, the
//! anonymized-data marker store and the change-history log. Backends
//! implement them; [`Backend`] bundles one of each for the engine.

use super::query::RecordQuery;
use crate::domain::{
    AnonymizedData, EntityType, HistoryEntry, ObjectId, Record, StoreResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cardinality of a schema relation, seen from the owning entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// Reverse foreign key: many children point at this record
    OneToMany,
    /// Many-to-many link
    ManyToMany,
    /// Forward foreign key
    ManyToOne,
    /// Forward or reverse one-to-one link
    OneToOne,
}

impl Cardinality {
    /// Whether the relation yields a collection of records
    pub fn is_collection(self) -> bool {
        matches!(self, Cardinality::OneToMany | Cardinality::ManyToMany)
    }
}

/// How a relation is joined in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Join {
    /// The owning record holds the related pk in `column`
    Forward { column: String },
    /// Related records hold the owning pk in `column`
    Reverse { column: String },
    /// The owning record holds an array of related pks in `column`
    ThroughList { column: String },
}

/// What happens to related records when the owner is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    /// Delete related records too
    #[default]
    Cascade,
    /// Null out the join column of related records
    SetNull,
    /// Leave related records untouched
    DoNothing,
}

/// Schema descriptor of a relation field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    /// Relation name on the owning entity
    pub name: String,

    /// Cardinality
    pub cardinality: Cardinality,

    /// Entity type on the other side
    pub related_type: EntityType,

    /// Join strategy
    pub join: Join,

    /// Delete behaviour (only meaningful for reverse joins)
    #[serde(default)]
    pub on_delete: OnDelete,
}

/// Schema descriptor of a computed property returning related records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Property name on the owning entity
    pub name: String,

    /// Entity type of the returned records
    pub target_type: EntityType,
}

/// What a plain attribute or property evaluated to
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// The type has no such attribute at all
    Absent,
    /// The attribute exists but holds nothing
    Empty,
    /// A single related record
    Single(Record),
    /// A collection of related records
    Many(Vec<Record>),
    /// Something that is neither a record nor a collection of records
    Opaque(String),
}

/// Whether a save is recorded in the change history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    /// Record the write in the change history
    Record,
    /// Do not record this write
    Suppress,
}

/// Record store
///
/// Each `save` is atomic for the one record written; no multi-record
/// transaction is implied.
pub trait RecordStore: Send + Sync {
    /// Fetch one record
    fn get(&self, entity_type: &EntityType, pk: &ObjectId) -> StoreResult<Option<Record>>;

    /// Run a query
    fn query(&self, query: &RecordQuery) -> StoreResult<Vec<Record>>;

    /// Whether the query matches anything
    fn exists(&self, query: &RecordQuery) -> StoreResult<bool> {
        Ok(!self.query(&query.clone().limit(1))?.is_empty())
    }

    /// Number of matching records
    fn count(&self, query: &RecordQuery) -> StoreResult<usize> {
        Ok(self.query(query)?.len())
    }

    /// Persist one record
    fn save(&self, record: &Record, history: HistoryMode) -> StoreResult<()>;

    /// Delete one record and its cascade; returns the number of records removed
    fn delete(&self, entity_type: &EntityType, pk: &ObjectId) -> StoreResult<usize>;

    /// Delete every record matching the query (with cascades)
    fn delete_matching(&self, query: &RecordQuery) -> StoreResult<usize>;

    /// Records reachable through a schema relation
    fn related(&self, record: &Record, relation: &RelationDescriptor) -> StoreResult<Vec<Record>>;

    /// Evaluate a plain attribute or computed property
    fn property(&self, record: &Record, name: &str) -> StoreResult<PropertyValue>;
}

/// Schema reflection
pub trait SchemaReflection: Send + Sync {
    /// Relation descriptor for a field, if the field is a schema relation
    fn relation(&self, entity_type: &EntityType, name: &str) -> Option<RelationDescriptor>;

    /// Property descriptor, if the type declares such a computed property
    fn property(&self, entity_type: &EntityType, name: &str) -> Option<PropertyDescriptor>;
}

/// Anonymized-data marker store
pub trait AnonymizedDataStore: Send + Sync {
    /// Whether an active marker exists for the field
    fn is_anonymized(
        &self,
        entity_type: &EntityType,
        object_id: &ObjectId,
        field: &str,
    ) -> StoreResult<bool>;

    /// Insert a marker; fails with a conflict if an active one already exists
    fn create(&self, marker: AnonymizedData) -> StoreResult<()>;

    /// Delete the active marker of a field; returns the number removed
    fn delete_active(
        &self,
        entity_type: &EntityType,
        object_id: &ObjectId,
        field: &str,
    ) -> StoreResult<usize>;

    /// All markers of one record
    fn markers_for(
        &self,
        entity_type: &EntityType,
        object_id: &ObjectId,
    ) -> StoreResult<Vec<AnonymizedData>>;
}

/// Change-history log
pub trait HistoryLog: Send + Sync {
    /// Entries of one record, oldest first
    fn entries_for(
        &self,
        entity_type: &EntityType,
        object_id: &ObjectId,
    ) -> StoreResult<Vec<HistoryEntry>>;

    /// Overwrite an existing entry (matched by id)
    fn save_entry(&self, entry: &HistoryEntry) -> StoreResult<()>;

    /// Delete every entry of one record; returns the number removed
    fn delete_entries_for(
        &self,
        entity_type: &EntityType,
        object_id: &ObjectId,
    ) -> StoreResult<usize>;
}

/// One implementation of each collaborator trait
#[derive(Clone)]
pub struct Backend {
    /// Record store
    pub store: Arc<dyn RecordStore>,
    /// Schema reflection
    pub schema: Arc<dyn SchemaReflection>,
    /// Anonymized-data markers
    pub markers: Arc<dyn AnonymizedDataStore>,
    /// Change history
    pub history: Arc<dyn HistoryLog>,
}

impl Backend {
    /// Bundle a single backend object that implements every trait
    pub fn from_shared<B>(backend: Arc<B>) -> Self
    where
        B: RecordStore + SchemaReflection + AnonymizedDataStore + HistoryLog + 'static,
    {
        Self {
            store: backend.clone(),
            schema: backend.clone(),
            markers: backend.clone(),
            history: backend,
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}
