//! Record queries
//!
//! A small query model: equality filters, pk range/set filters,
//! pk ordering, offset and limit. It is enough for relation resolvers,
//! computed properties and resumable pk-ordered batching.

use crate::domain::{EntityType, ObjectId, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordering by primary key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Ascending primary key
    #[default]
    PkAsc,
    /// Descending primary key
    PkDesc,
}

/// A single filter condition
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals value
    FieldEquals { column: String, value: Value },
    /// Primary key strictly greater than
    PkGreaterThan(ObjectId),
    /// Primary key in set
    PkIn(Vec<ObjectId>),
}

impl Condition {
    /// Evaluate the condition against a record
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Condition::FieldEquals { column, value } => record.value(column) == value,
            Condition::PkGreaterThan(pk) => &record.pk > pk,
            Condition::PkIn(pks) => pks.contains(&record.pk),
        }
    }
}

/// Query over the records of one entity type
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    /// Entity type queried
    pub entity_type: EntityType,
    /// Conditions, all of which must hold
    pub conditions: Vec<Condition>,
    /// Result ordering
    pub order: SortOrder,
    /// Number of leading matches to skip
    pub offset: usize,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl RecordQuery {
    /// All records of a type, ordered by ascending pk
    pub fn all(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            conditions: Vec::new(),
            order: SortOrder::PkAsc,
            offset: 0,
            limit: None,
        }
    }

    /// Add an equality filter
    pub fn filter_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::FieldEquals {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Restrict to pks strictly after `pk`
    pub fn after(mut self, pk: ObjectId) -> Self {
        self.conditions.push(Condition::PkGreaterThan(pk));
        self
    }

    /// Restrict to a set of pks
    pub fn pk_in(mut self, pks: Vec<ObjectId>) -> Self {
        self.conditions.push(Condition::PkIn(pks));
        self
    }

    /// Set the ordering
    pub fn order_by(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Skip leading matches
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Cap the number of results
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a record satisfies every condition
    pub fn matches(&self, record: &Record) -> bool {
        record.entity_type == self.entity_type && self.conditions.iter().all(|c| c.matches(record))
    }

    /// Apply filtering, ordering, offset and limit to an iterator of records
    ///
    /// Backends without native query support can use this directly.
    pub fn apply<'a, I>(&self, records: I) -> Vec<Record>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut matched: Vec<Record> = records
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();

        matched.sort_by(|a, b| a.pk.cmp(&b.pk));
        if self.order == SortOrder::PkDesc {
            matched.reverse();
        }

        let iter = matched.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> EntityType {
        EntityType::new("shop.registration").unwrap()
    }

    fn records() -> Vec<Record> {
        (1..=5)
            .map(|i| {
                Record::new(registration(), i).with(
                    "email",
                    if i % 2 == 0 { "a@example.com" } else { "b@example.com" },
                )
            })
            .collect()
    }

    #[test]
    fn test_filter_and_order() {
        let query = RecordQuery::all(registration())
            .filter_eq("email", "b@example.com")
            .order_by(SortOrder::PkDesc);

        let pks: Vec<ObjectId> = query.apply(&records()).into_iter().map(|r| r.pk).collect();
        assert_eq!(pks, vec![ObjectId::Int(5), ObjectId::Int(3), ObjectId::Int(1)]);
    }

    #[test]
    fn test_after_and_limit() {
        let query = RecordQuery::all(registration())
            .after(ObjectId::Int(2))
            .limit(2);

        let pks: Vec<ObjectId> = query.apply(&records()).into_iter().map(|r| r.pk).collect();
        assert_eq!(pks, vec![ObjectId::Int(3), ObjectId::Int(4)]);
    }

    #[test]
    fn test_offset() {
        let query = RecordQuery::all(registration()).offset(4);
        assert_eq!(query.apply(&records()).len(), 1);
    }

    #[test]
    fn test_pk_in() {
        let query = RecordQuery::all(registration()).pk_in(vec![ObjectId::Int(2), ObjectId::Int(9)]);
        assert_eq!(query.apply(&records()).len(), 1);
    }
}
