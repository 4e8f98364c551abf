//! Relation anonymizers
//!
//! Relations that the schema cannot express as a foreign key (generic
//! relations, query-derived sets) are declared with a [`RelationAnonymizer`]:
//! the related entity type, an optional anonymizer overriding the registered
//! one, and a resolver returning the related records of a given record.

use super::model::ModelAnonymizer;
use crate::adapters::database::{RecordQuery, RecordStore};
use crate::domain::{EntityType, ObjectId, Record, Result};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Resolver of related records
pub trait RelatedObjects: Send + Sync {
    /// Records related to `record`
    fn related_objects(&self, record: &Record, store: &dyn RecordStore) -> Result<Vec<Record>>;
}

impl<F> RelatedObjects for F
where
    F: Fn(&Record, &dyn RecordStore) -> Result<Vec<Record>> + Send + Sync,
{
    fn related_objects(&self, record: &Record, store: &dyn RecordStore) -> Result<Vec<Record>> {
        self(record, store)
    }
}

/// Records whose columns point back at the owner by entity type and pk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseGenericRelation {
    /// Related entity type
    pub related_type: EntityType,
    /// Column holding the owner's entity type
    pub content_type_column: String,
    /// Column holding the owner's pk
    pub object_id_column: String,
}

impl RelatedObjects for ReverseGenericRelation {
    fn related_objects(&self, record: &Record, store: &dyn RecordStore) -> Result<Vec<Record>> {
        let query = RecordQuery::all(self.related_type.clone())
            .filter_eq(self.content_type_column.clone(), record.entity_type.as_str())
            .filter_eq(self.object_id_column.clone(), Value::from(&record.pk));
        Ok(store.query(&query)?)
    }
}

/// The single record a generic foreign key on the owner points at
///
/// Yields nothing when the owner points at another entity type or at a
/// record that no longer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericForeignKey {
    /// Entity type the relation is declared for
    pub related_type: EntityType,
    /// Column of the owner holding the target entity type
    pub content_type_column: String,
    /// Column of the owner holding the target pk
    pub object_id_column: String,
}

impl RelatedObjects for GenericForeignKey {
    fn related_objects(&self, record: &Record, store: &dyn RecordStore) -> Result<Vec<Record>> {
        let points_here = record
            .get_str(&self.content_type_column)
            .and_then(|ty| EntityType::new(ty).ok())
            .is_some_and(|ty| ty == self.related_type);
        if !points_here {
            return Ok(Vec::new());
        }
        let Ok(pk) = ObjectId::try_from(record.value(&self.object_id_column)) else {
            return Ok(Vec::new());
        };
        Ok(store.get(&self.related_type, &pk)?.into_iter().collect())
    }
}

/// Records of another type whose `match_column` equals the owner's `source_column`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRelation {
    /// Related entity type
    pub related_type: EntityType,
    /// Column of the owner providing the match value
    pub source_column: String,
    /// Column of the related records compared against it
    pub match_column: String,
}

impl RelatedObjects for QueryRelation {
    fn related_objects(&self, record: &Record, store: &dyn RecordStore) -> Result<Vec<Record>> {
        let value = record.value(&self.source_column);
        if value.is_null() {
            return Ok(Vec::new());
        }
        let query = RecordQuery::all(self.related_type.clone())
            .filter_eq(self.match_column.clone(), value.clone());
        Ok(store.query(&query)?)
    }
}

/// A non-schema relation and how to anonymize its records
#[derive(Clone)]
pub struct RelationAnonymizer {
    related_type: EntityType,
    anonymizer: Option<Arc<ModelAnonymizer>>,
    resolver: Arc<dyn RelatedObjects>,
}

impl RelationAnonymizer {
    /// Relation resolved by an arbitrary resolver
    pub fn new(related_type: EntityType, resolver: impl RelatedObjects + 'static) -> Self {
        Self {
            related_type,
            anonymizer: None,
            resolver: Arc::new(resolver),
        }
    }

    /// Reverse generic relation (`content_type`/`object_id` columns on the related type)
    pub fn reverse_generic(
        related_type: EntityType,
        content_type_column: impl Into<String>,
        object_id_column: impl Into<String>,
    ) -> Self {
        Self::new(
            related_type.clone(),
            ReverseGenericRelation {
                related_type,
                content_type_column: content_type_column.into(),
                object_id_column: object_id_column.into(),
            },
        )
    }

    /// Generic foreign key held by the owner
    pub fn generic_foreign_key(
        related_type: EntityType,
        content_type_column: impl Into<String>,
        object_id_column: impl Into<String>,
    ) -> Self {
        Self::new(
            related_type.clone(),
            GenericForeignKey {
                related_type,
                content_type_column: content_type_column.into(),
                object_id_column: object_id_column.into(),
            },
        )
    }

    /// Query-derived relation
    pub fn query(
        related_type: EntityType,
        source_column: impl Into<String>,
        match_column: impl Into<String>,
    ) -> Self {
        Self::new(
            related_type.clone(),
            QueryRelation {
                related_type,
                source_column: source_column.into(),
                match_column: match_column.into(),
            },
        )
    }

    /// Uses `anonymizer` instead of the one registered for the related type
    pub fn with_anonymizer(mut self, anonymizer: ModelAnonymizer) -> Self {
        self.anonymizer = Some(Arc::new(anonymizer));
        self
    }

    /// Related entity type
    pub fn related_type(&self) -> &EntityType {
        &self.related_type
    }

    /// Explicit anonymizer, if declared
    pub fn anonymizer(&self) -> Option<&Arc<ModelAnonymizer>> {
        self.anonymizer.as_ref()
    }

    /// Records related to `record`
    pub fn related_objects(&self, record: &Record, store: &dyn RecordStore) -> Result<Vec<Record>> {
        self.resolver.related_objects(record, store)
    }
}

impl fmt::Debug for RelationAnonymizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationAnonymizer")
            .field("related_type", &self.related_type)
            .field(
                "anonymizer",
                &self.anonymizer.as_ref().map(|a| a.entity_type().clone()),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryBackend;

    fn ty(name: &str) -> EntityType {
        EntityType::new(name).unwrap()
    }

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend
            .insert(
                Record::new(ty("shop.note"), 1)
                    .with("content_type", "shop.customer")
                    .with("object_id", 7)
                    .with("text", "call back"),
            )
            .unwrap();
        backend
            .insert(
                Record::new(ty("shop.note"), 2)
                    .with("content_type", "shop.account")
                    .with("object_id", 7)
                    .with("text", "overdue"),
            )
            .unwrap();
        backend
            .insert(Record::new(ty("shop.customer"), 7).with("email", "ada@example.com"))
            .unwrap();
        backend
            .insert(Record::new(ty("shop.registration"), 1).with("email", "ada@example.com"))
            .unwrap();
        backend
    }

    #[test]
    fn test_reverse_generic_relation() {
        let backend = backend();
        let relation = RelationAnonymizer::reverse_generic(ty("shop.note"), "content_type", "object_id");
        let customer = Record::new(ty("shop.customer"), 7);

        let notes = relation.related_objects(&customer, &backend).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pk, ObjectId::Int(1));
    }

    #[test]
    fn test_generic_foreign_key() {
        let backend = backend();
        let relation =
            RelationAnonymizer::generic_foreign_key(ty("shop.customer"), "content_type", "object_id");

        let note = backend.get(&ty("shop.note"), &ObjectId::Int(1)).unwrap().unwrap();
        assert_eq!(relation.related_objects(&note, &backend).unwrap().len(), 1);

        let other = backend.get(&ty("shop.note"), &ObjectId::Int(2)).unwrap().unwrap();
        assert!(relation.related_objects(&other, &backend).unwrap().is_empty());
    }

    #[test]
    fn test_query_relation() {
        let backend = backend();
        let relation = RelationAnonymizer::query(ty("shop.registration"), "email", "email");
        let customer = backend.get(&ty("shop.customer"), &ObjectId::Int(7)).unwrap().unwrap();

        assert_eq!(relation.related_objects(&customer, &backend).unwrap().len(), 1);
        assert!(relation
            .related_objects(&Record::new(ty("shop.customer"), 8), &backend)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_closure_resolver() {
        let backend = backend();
        let relation = RelationAnonymizer::new(
            ty("shop.note"),
            |_: &Record, store: &dyn RecordStore| -> Result<Vec<Record>> {
                Ok(store.query(&RecordQuery::all(EntityType::new("shop.note").unwrap()))?)
            },
        );

        let customer = Record::new(ty("shop.customer"), 7);
        assert_eq!(relation.related_objects(&customer, &backend).unwrap().len(), 2);
        assert!(relation.anonymizer().is_none());
    }
}
