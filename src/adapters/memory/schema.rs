//! Schema definitions for the in-memory backend
//!
//! Entity schemas are plain data so they can be declared in configuration
//! (`[[entities]]`) as well as in code.

use crate::adapters::database::{
    PropertyDescriptor, PropertyValue, RecordQuery, RelationDescriptor, SortOrder,
};
use crate::domain::{EntityType, Record};
use serde::{Deserialize, Serialize};

/// Which records of a property query are returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyPick {
    /// Every match, as a collection
    #[default]
    All,
    /// The first match, as a single record
    First,
    /// The last match, as a single record
    Last,
    /// Every match after the first `count`, as a collection
    Skip { count: usize },
}

/// A computed property resolved by querying another entity type
///
/// Selects `target_type` records whose `match_column` equals this record's
/// `source_column`, ordered by pk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// Property name
    pub name: String,

    /// Entity type of the returned records
    pub target_type: EntityType,

    /// Column of the owning record providing the match value
    pub source_column: String,

    /// Column of the target records compared against the match value
    pub match_column: String,

    /// Ordering of matches
    #[serde(default)]
    pub order: SortOrder,

    /// Selection applied to the ordered matches
    #[serde(default)]
    pub pick: PropertyPick,
}

impl PropertyDefinition {
    /// Descriptor exposed through schema reflection
    pub fn descriptor(&self) -> PropertyDescriptor {
        PropertyDescriptor {
            name: self.name.clone(),
            target_type: self.target_type.clone(),
        }
    }

    /// Query selecting the candidate records for `record`
    pub fn query_for(&self, record: &Record) -> RecordQuery {
        RecordQuery::all(self.target_type.clone())
            .filter_eq(self.match_column.clone(), record.value(&self.source_column).clone())
            .order_by(self.order)
    }

    /// Reduce ordered candidates to the property value
    pub fn pick(&self, mut candidates: Vec<Record>) -> PropertyValue {
        match self.pick {
            PropertyPick::All => PropertyValue::Many(candidates),
            PropertyPick::Skip { count } => {
                PropertyValue::Many(candidates.into_iter().skip(count).collect())
            }
            PropertyPick::First => {
                if candidates.is_empty() {
                    PropertyValue::Empty
                } else {
                    PropertyValue::Single(candidates.swap_remove(0))
                }
            }
            PropertyPick::Last => match candidates.pop() {
                Some(record) => PropertyValue::Single(record),
                None => PropertyValue::Empty,
            },
        }
    }
}

/// Schema of one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Entity type described
    pub entity_type: EntityType,

    /// Relation fields
    #[serde(default)]
    pub relations: Vec<RelationDescriptor>,

    /// Computed properties
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
}

impl EntitySchema {
    /// Creates an empty schema
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            relations: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Adds a relation (builder style)
    pub fn relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    /// Adds a computed property (builder style)
    pub fn property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }

    /// Finds a relation by name
    pub fn find_relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Finds a property by name
    pub fn find_property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Validates names are unique across relations and properties
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        let names = self
            .relations
            .iter()
            .map(|r| r.name.as_str())
            .chain(self.properties.iter().map(|p| p.name.as_str()));
        for name in names {
            if !seen.insert(name) {
                return Err(format!(
                    "Duplicate relation/property '{}' on {}",
                    name, self.entity_type
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> EntityType {
        EntityType::new("shop.registration").unwrap()
    }

    fn definition(pick: PropertyPick) -> PropertyDefinition {
        PropertyDefinition {
            name: "registrations".to_string(),
            target_type: registration(),
            source_column: "email".to_string(),
            match_column: "email".to_string(),
            order: SortOrder::PkAsc,
            pick,
        }
    }

    fn candidates() -> Vec<Record> {
        (1..=3).map(|i| Record::new(registration(), i)).collect()
    }

    #[test]
    fn test_pick_last() {
        match definition(PropertyPick::Last).pick(candidates()) {
            PropertyValue::Single(record) => assert_eq!(record.pk.as_int(), Some(3)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_pick_first_empty() {
        assert_eq!(
            definition(PropertyPick::First).pick(Vec::new()),
            PropertyValue::Empty
        );
    }

    #[test]
    fn test_pick_skip() {
        match definition(PropertyPick::Skip { count: 1 }).pick(candidates()) {
            PropertyValue::Many(records) => assert_eq!(records.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let schema = EntitySchema::new(EntityType::new("shop.customer").unwrap())
            .property(definition(PropertyPick::All))
            .property(definition(PropertyPick::First));
        assert!(schema.validate().is_err());
    }
}
