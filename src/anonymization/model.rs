//! Model anonymizers
//!
//! A [`ModelAnonymizer`] governs one entity type: it owns the field
//! anonymizers of the type's local fields, the declared relations used to
//! reach related records, and the options that shape the update algorithm
//! (reversibility, history handling, per-model key override). Anonymizers
//! are assembled once with [`ModelAnonymizerBuilder`] and never mutated.

use super::anonymizer::FieldAnonymizer;
use super::relation::RelationAnonymizer;
use crate::domain::{EntityType, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Default number of records per bulk batch
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// What anonymizing a record means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnonymizerKind {
    /// Transform the requested fields
    #[default]
    Fields,
    /// Delete the record when `__SELF__` is requested, transform fields otherwise
    Delete,
}

/// Options of a model anonymizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymizerOptions {
    /// Whether deanonymization is allowed
    pub reversible: bool,

    /// Rewrite change-history values of anonymized fields
    pub anonymize_history: bool,

    /// Delete the change history of anonymized records
    pub delete_history: bool,

    /// Abstract anonymizers are templates; registration skips them
    pub is_abstract: bool,

    /// Records per bulk batch
    pub chunk_size: usize,
}

impl Default for AnonymizerOptions {
    fn default() -> Self {
        Self {
            reversible: true,
            anonymize_history: false,
            delete_history: false,
            is_abstract: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Per-model source of the base encryption key
#[derive(Clone)]
pub enum KeySource {
    /// Join the trimmed values of these record fields with `::`
    Fields(Vec<String>),
    /// Compute the key from the record
    Custom(Arc<dyn Fn(&Record) -> Option<String> + Send + Sync>),
}

impl KeySource {
    /// Base key for a record, `None` if the source yields nothing
    pub fn resolve(&self, record: &Record) -> Option<String> {
        match self {
            KeySource::Fields(names) => Some(
                names
                    .iter()
                    .map(|name| match record.value(name) {
                        Value::Null => String::new(),
                        Value::String(s) => s.trim().to_string(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("::"),
            ),
            KeySource::Custom(compute) => compute(record),
        }
    }
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Fields(names) => f.debug_tuple("Fields").field(names).finish(),
            KeySource::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How a declared related field finds its anonymizer
#[derive(Debug, Clone)]
pub enum RelatedAnonymizer {
    /// The anonymizer registered for this entity type
    Registered(EntityType),
    /// An inline anonymizer used instead of the registered one
    Nested(Arc<ModelAnonymizer>),
    /// A non-schema relation with its own resolver
    Relation(RelationAnonymizer),
}

/// Anonymizer of one entity type
#[derive(Clone)]
pub struct ModelAnonymizer {
    entity_type: EntityType,
    kind: AnonymizerKind,
    fields: BTreeMap<String, Arc<dyn FieldAnonymizer>>,
    relations: BTreeMap<String, RelatedAnonymizer>,
    options: AnonymizerOptions,
    key_source: Option<KeySource>,
}

impl ModelAnonymizer {
    /// Starts building an anonymizer for `entity_type`
    pub fn builder(entity_type: EntityType) -> ModelAnonymizerBuilder {
        ModelAnonymizerBuilder::new(entity_type)
    }

    /// Governed entity type
    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// Anonymizer kind
    pub fn kind(&self) -> AnonymizerKind {
        self.kind
    }

    /// Whether this is a delete anonymizer
    pub fn is_delete(&self) -> bool {
        self.kind == AnonymizerKind::Delete
    }

    /// Options
    pub fn options(&self) -> &AnonymizerOptions {
        &self.options
    }

    /// Whether registration should skip this anonymizer
    pub fn is_abstract(&self) -> bool {
        self.options.is_abstract
    }

    /// Whether deanonymization is allowed for this record
    pub fn is_reversible(&self, _record: &Record) -> bool {
        self.options.reversible
    }

    /// Field anonymizer of a local field
    pub fn field(&self, name: &str) -> Option<&Arc<dyn FieldAnonymizer>> {
        self.fields.get(name)
    }

    /// Whether `name` is a declared local field
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Names of every declared local field
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Declared relation
    pub fn relation(&self, name: &str) -> Option<&RelatedAnonymizer> {
        self.relations.get(name)
    }

    /// Every declared relation
    pub fn relations(&self) -> impl Iterator<Item = (&str, &RelatedAnonymizer)> {
        self.relations.iter().map(|(name, related)| (name.as_str(), related))
    }

    /// Per-model base key for a record
    pub fn key_override(&self, record: &Record) -> Option<String> {
        self.key_source.as_ref().and_then(|source| source.resolve(record))
    }

    /// Whether a per-model key source is declared
    pub fn has_key_source(&self) -> bool {
        self.key_source.is_some()
    }

    /// Records per bulk batch
    pub fn chunk_size(&self) -> usize {
        self.options.chunk_size
    }
}

impl fmt::Debug for ModelAnonymizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelAnonymizer")
            .field("entity_type", &self.entity_type)
            .field("kind", &self.kind)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .field("key_source", &self.key_source)
            .finish()
    }
}

/// Builder for [`ModelAnonymizer`]
///
/// A field and a relation cannot share a name; the later declaration wins.
///
/// # Examples
///
/// ```
/// use obscura::anonymization::anonymizer::{EmailFieldAnonymizer, TextFieldAnonymizer};
/// use obscura::anonymization::ModelAnonymizer;
/// use obscura::domain::EntityType;
///
/// let customer = ModelAnonymizer::builder(EntityType::new("shop.customer").unwrap())
///     .field("first_name", TextFieldAnonymizer::new())
///     .field("primary_email_address", EmailFieldAnonymizer::new())
///     .related("emails", EntityType::new("shop.email").unwrap())
///     .key_fields(["first_name", "primary_email_address"])
///     .build();
///
/// assert!(customer.has_field("first_name"));
/// ```
#[derive(Debug, Clone)]
pub struct ModelAnonymizerBuilder {
    inner: ModelAnonymizer,
}

impl ModelAnonymizerBuilder {
    fn new(entity_type: EntityType) -> Self {
        Self {
            inner: ModelAnonymizer {
                entity_type,
                kind: AnonymizerKind::Fields,
                fields: BTreeMap::new(),
                relations: BTreeMap::new(),
                options: AnonymizerOptions::default(),
                key_source: None,
            },
        }
    }

    /// Inherits fields, relations, key source and options from `parent`
    ///
    /// Declarations made on this builder afterwards override inherited ones.
    /// The abstract flag is not inherited.
    pub fn extends(mut self, parent: &ModelAnonymizer) -> Self {
        for (name, field) in &parent.fields {
            self.inner.relations.remove(name);
            self.inner.fields.insert(name.clone(), field.clone());
        }
        for (name, related) in &parent.relations {
            self.inner.fields.remove(name);
            self.inner.relations.insert(name.clone(), related.clone());
        }
        self.inner.kind = parent.kind;
        self.inner.key_source = parent.key_source.clone();
        self.inner.options = AnonymizerOptions {
            is_abstract: false,
            ..parent.options.clone()
        };
        self
    }

    /// Declares a local field
    pub fn field(self, name: impl Into<String>, anonymizer: impl FieldAnonymizer + 'static) -> Self {
        self.field_arc(name, Arc::new(anonymizer))
    }

    /// Declares a local field with a shared field anonymizer
    pub fn field_arc(mut self, name: impl Into<String>, anonymizer: Arc<dyn FieldAnonymizer>) -> Self {
        let name = name.into();
        self.inner.relations.remove(&name);
        self.inner.fields.insert(name, anonymizer);
        self
    }

    fn declare(mut self, name: String, related: RelatedAnonymizer) -> Self {
        self.inner.fields.remove(&name);
        self.inner.relations.insert(name, related);
        self
    }

    /// Declares a relation handled by the anonymizer registered for `entity_type`
    pub fn related(self, name: impl Into<String>, entity_type: EntityType) -> Self {
        self.declare(name.into(), RelatedAnonymizer::Registered(entity_type))
    }

    /// Declares a relation handled by an inline anonymizer
    pub fn nested(self, name: impl Into<String>, anonymizer: ModelAnonymizer) -> Self {
        self.declare(name.into(), RelatedAnonymizer::Nested(Arc::new(anonymizer)))
    }

    /// Declares a non-schema relation
    pub fn relation(self, name: impl Into<String>, relation: RelationAnonymizer) -> Self {
        self.declare(name.into(), RelatedAnonymizer::Relation(relation))
    }

    /// Sets the kind
    pub fn kind(mut self, kind: AnonymizerKind) -> Self {
        self.inner.kind = kind;
        self
    }

    /// Makes this a delete anonymizer
    pub fn delete_kind(self) -> Self {
        self.kind(AnonymizerKind::Delete)
    }

    /// Allows or forbids deanonymization
    pub fn reversible(mut self, reversible: bool) -> Self {
        self.inner.options.reversible = reversible;
        self
    }

    /// Rewrites change-history values of anonymized fields
    pub fn anonymize_history(mut self, enabled: bool) -> Self {
        self.inner.options.anonymize_history = enabled;
        self
    }

    /// Deletes the change history of anonymized records
    pub fn delete_history(mut self, enabled: bool) -> Self {
        self.inner.options.delete_history = enabled;
        self
    }

    /// Marks the anonymizer abstract
    pub fn abstract_anonymizer(mut self) -> Self {
        self.inner.options.is_abstract = true;
        self
    }

    /// Sets the bulk batch size
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.inner.options.chunk_size = chunk_size.max(1);
        self
    }

    /// Derives the base key from record fields
    pub fn key_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.key_source = Some(KeySource::Fields(names.into_iter().map(Into::into).collect()));
        self
    }

    /// Derives the base key with a function of the record
    pub fn key_with<F>(mut self, compute: F) -> Self
    where
        F: Fn(&Record) -> Option<String> + Send + Sync + 'static,
    {
        self.inner.key_source = Some(KeySource::Custom(Arc::new(compute)));
        self
    }

    /// Finishes the anonymizer
    pub fn build(self) -> ModelAnonymizer {
        self.inner
    }
}
