//! Anonymization module for Obscura
//!
//! Field-level and relation-level anonymization of records, driven by
//! per-type model anonymizers registered up front.
//!
//! # Architecture
//!
//! - **Field anonymizers** ([`anonymizer`]): pure keyed value transforms
//! - **Keys** ([`crypto`]): per-field key derivation and the keyed cipher
//! - **Model anonymizers** ([`model`], [`relation`]): which fields and relations of a type are anonymizable
//! - **Registry** ([`registry`], [`definition`]): entity type to anonymizer lookup, frozen after start-up
//! - **Field sets** ([`fields`]): the nested field matrix parsed against the registry and schema
//! - **Traversal** ([`engine`], [`delete`]): the update engine walking the record graph
//! - **Audit** ([`audit`], [`report`]): per-call reports and the operation journal
//!
//! # Usage
//!
//! ```rust,ignore
//! use obscura::anonymization::{AnonymizationEngine, FieldMatrix, UpdateRequest};
//!
//! let engine = AnonymizationEngine::new(registry, backend, global_secret)?;
//! let report = engine.update(
//!     &customer,
//!     UpdateRequest::anonymize()
//!         .fields(FieldMatrix::names(["first_name"]).related("emails", "__ALL__"))
//!         .base_key("per-job-key"),
//! )?;
//! ```

pub mod anonymizer;
pub mod audit;
pub mod config;
pub mod crypto;
pub mod definition;
pub mod delete;
pub mod engine;
pub mod fields;
pub mod model;
pub mod registry;
pub mod relation;
pub mod report;

// Re-export main types
pub use audit::AuditLogger;
pub use config::{AnonymizationConfig, AuditConfig};
pub use definition::{
    build_registry, AnonymizerDefinition, FieldAnonymizerKind, FieldDefinition,
    GenericRelationDefinition, GenericRelationKind,
};
pub use engine::{AnonymizationEngine, FieldSelection, UpdateMode, UpdateRequest};
pub use fields::{FieldEntry, FieldMatrix, Fields, FieldsParser, RelatedFields, ALL_FIELDS, DELETE_TOKEN};
pub use model::{
    AnonymizerKind, AnonymizerOptions, KeySource, ModelAnonymizer, ModelAnonymizerBuilder,
    RelatedAnonymizer, DEFAULT_CHUNK_SIZE,
};
pub use registry::{global, install_global, AnonymizerRegistry, RegistryBuilder};
pub use relation::{RelatedObjects, RelationAnonymizer};
pub use report::{DeletedObjects, ObjectUpdate, UpdateReport};
