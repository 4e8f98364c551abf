//! Collaborator abstraction layer
//!
//! Trait-based interfaces for the systems the anonymization core depends on
//! but does not own: the record store, schema reflection, anonymized-data
//! markers and the change history. See [`traits`] for the contracts and
//! [`query`] for the small query model they share.

pub mod query;
pub mod traits;

pub use query::{Condition, RecordQuery, SortOrder};
pub use traits::{
    AnonymizedDataStore, Backend, Cardinality, HistoryLog, HistoryMode, Join, OnDelete,
    PropertyDescriptor, PropertyValue, RecordStore, RelationDescriptor, SchemaReflection,
};
