//! In-memory backend
//!
//! Implements every collaborator trait over `RwLock`-guarded maps. Records
//! are kept per entity type in pk order; tracked saves append a history entry
//! holding the diff of changed fields; deletes follow `on_delete` of reverse
//! relations.

use super::schema::EntitySchema;
use super::snapshot::Snapshot;
use crate::adapters::database::{
    AnonymizedDataStore, HistoryLog, HistoryMode, Join, OnDelete, PropertyDescriptor,
    PropertyValue, RecordQuery, RecordStore, RelationDescriptor, SchemaReflection,
};
use crate::domain::{
    AnonymizedData, EntityType, HistoryEntry, ObjectId, Record, StoreError, StoreResult,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<EntityType, BTreeMap<ObjectId, Record>>,
    markers: Vec<AnonymizedData>,
    history: Vec<HistoryEntry>,
}

/// In-memory implementation of all collaborator traits
#[derive(Debug, Default)]
pub struct MemoryBackend {
    schemas: BTreeMap<EntityType, EntitySchema>,
    state: RwLock<State>,
}

impl MemoryBackend {
    /// Create an empty backend without schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend with the given entity schemas
    pub fn with_schemas(schemas: impl IntoIterator<Item = EntitySchema>) -> Self {
        let mut backend = Self::new();
        for schema in schemas {
            backend.define(schema);
        }
        backend
    }

    /// Declare (or replace) the schema of an entity type
    pub fn define(&mut self, schema: EntitySchema) {
        self.schemas.insert(schema.entity_type.clone(), schema);
    }

    /// Schemas known to the backend
    pub fn schemas(&self) -> impl Iterator<Item = &EntitySchema> {
        self.schemas.values()
    }

    /// Insert a record without recording history (seeding)
    pub fn insert(&self, record: Record) -> StoreResult<()> {
        let mut state = self.write()?;
        state
            .records
            .entry(record.entity_type.clone())
            .or_default()
            .insert(record.pk.clone(), record);
        Ok(())
    }

    /// Append a history entry directly (seeding)
    pub fn push_history(&self, entry: HistoryEntry) -> StoreResult<()> {
        self.write()?.history.push(entry);
        Ok(())
    }

    /// All records of one type in pk order
    pub fn records_of(&self, entity_type: &EntityType) -> StoreResult<Vec<Record>> {
        Ok(self
            .read()?
            .records
            .get(entity_type)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    /// Total number of records
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.records.values().map(BTreeMap::len).sum())
    }

    /// Whether the backend holds no records
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Capture the current contents
    pub fn snapshot(&self) -> StoreResult<Snapshot> {
        let state = self.read()?;
        Ok(Snapshot {
            records: state
                .records
                .values()
                .flat_map(|records| records.values().cloned())
                .collect(),
            markers: state.markers.clone(),
            history: state.history.clone(),
        })
    }

    /// Replace the current contents with a snapshot
    pub fn restore(&self, snapshot: Snapshot) -> StoreResult<()> {
        let mut state = self.write()?;
        *state = State::default();
        for record in snapshot.records {
            state
                .records
                .entry(record.entity_type.clone())
                .or_default()
                .insert(record.pk.clone(), record);
        }
        state.markers = snapshot.markers;
        state.history = snapshot.history;
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("memory backend lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("memory backend lock poisoned".to_string()))
    }

    fn delete_locked(
        &self,
        state: &mut State,
        entity_type: &EntityType,
        pk: &ObjectId,
        visited: &mut HashSet<(EntityType, ObjectId)>,
    ) -> usize {
        if !visited.insert((entity_type.clone(), pk.clone())) {
            return 0;
        }
        let removed = state
            .records
            .get_mut(entity_type)
            .and_then(|records| records.remove(pk));
        if removed.is_none() {
            return 0;
        }

        let mut count = 1;
        let reverse_relations: Vec<RelationDescriptor> = self
            .schemas
            .get(entity_type)
            .map(|schema| {
                schema
                    .relations
                    .iter()
                    .filter(|r| matches!(r.join, Join::Reverse { .. }))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let pk_value = Value::from(pk);
        for relation in reverse_relations {
            let Join::Reverse { column } = &relation.join else {
                continue;
            };
            let children: Vec<ObjectId> = state
                .records
                .get(&relation.related_type)
                .map(|records| {
                    records
                        .values()
                        .filter(|r| r.value(column) == &pk_value)
                        .map(|r| r.pk.clone())
                        .collect()
                })
                .unwrap_or_default();

            match relation.on_delete {
                OnDelete::Cascade => {
                    for child in children {
                        count += self.delete_locked(state, &relation.related_type, &child, visited);
                    }
                }
                OnDelete::SetNull => {
                    if let Some(records) = state.records.get_mut(&relation.related_type) {
                        for child in children {
                            if let Some(record) = records.get_mut(&child) {
                                record.set(column.clone(), Value::Null);
                            }
                        }
                    }
                }
                OnDelete::DoNothing => {}
            }
        }
        count
    }
}

impl RecordStore for MemoryBackend {
    fn get(&self, entity_type: &EntityType, pk: &ObjectId) -> StoreResult<Option<Record>> {
        Ok(self
            .read()?
            .records
            .get(entity_type)
            .and_then(|records| records.get(pk))
            .cloned())
    }

    fn query(&self, query: &RecordQuery) -> StoreResult<Vec<Record>> {
        let state = self.read()?;
        Ok(match state.records.get(&query.entity_type) {
            Some(records) => query.apply(records.values()),
            None => Vec::new(),
        })
    }

    fn save(&self, record: &Record, history: HistoryMode) -> StoreResult<()> {
        let mut state = self.write()?;
        let previous = state
            .records
            .get(&record.entity_type)
            .and_then(|records| records.get(&record.pk))
            .cloned();

        if history == HistoryMode::Record {
            let mut entry = HistoryEntry::new(record.entity_type.clone(), record.pk.clone());
            for (name, new) in &record.fields {
                let old = previous
                    .as_ref()
                    .map(|p| p.value(name).clone())
                    .unwrap_or(Value::Null);
                if &old != new {
                    entry = entry.with_change(name.clone(), old, new.clone());
                }
            }
            if !entry.changes.is_empty() {
                state.history.push(entry);
            }
        }

        state
            .records
            .entry(record.entity_type.clone())
            .or_default()
            .insert(record.pk.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, entity_type: &EntityType, pk: &ObjectId) -> StoreResult<usize> {
        let mut state = self.write()?;
        let mut visited = HashSet::new();
        Ok(self.delete_locked(&mut state, entity_type, pk, &mut visited))
    }

    fn delete_matching(&self, query: &RecordQuery) -> StoreResult<usize> {
        let mut state = self.write()?;
        let targets: Vec<ObjectId> = match state.records.get(&query.entity_type) {
            Some(records) => query.apply(records.values()).into_iter().map(|r| r.pk).collect(),
            None => return Ok(0),
        };

        let mut visited = HashSet::new();
        let mut count = 0;
        for pk in targets {
            count += self.delete_locked(&mut state, &query.entity_type, &pk, &mut visited);
        }
        Ok(count)
    }

    fn related(&self, record: &Record, relation: &RelationDescriptor) -> StoreResult<Vec<Record>> {
        let state = self.read()?;
        let Some(targets) = state.records.get(&relation.related_type) else {
            return Ok(Vec::new());
        };

        let related = match &relation.join {
            Join::Forward { column } => match record.value(column) {
                Value::Null => Vec::new(),
                value => {
                    let pk = ObjectId::try_from(value).map_err(StoreError::Backend)?;
                    targets.get(&pk).cloned().into_iter().collect()
                }
            },
            Join::Reverse { column } => {
                let pk_value = Value::from(&record.pk);
                targets
                    .values()
                    .filter(|r| r.value(column) == &pk_value)
                    .cloned()
                    .collect()
            }
            Join::ThroughList { column } => match record.value(column) {
                Value::Null => Vec::new(),
                Value::Array(items) => {
                    let mut related = Vec::with_capacity(items.len());
                    for item in items {
                        let pk = ObjectId::try_from(item).map_err(StoreError::Backend)?;
                        if let Some(target) = targets.get(&pk) {
                            related.push(target.clone());
                        }
                    }
                    related
                }
                other => {
                    return Err(StoreError::Backend(format!(
                        "Column '{column}' of {} {} must hold an array of keys, found {other}",
                        record.entity_type, record.pk
                    )))
                }
            },
        };
        Ok(related)
    }

    fn property(&self, record: &Record, name: &str) -> StoreResult<PropertyValue> {
        if let Some(definition) = self
            .schemas
            .get(&record.entity_type)
            .and_then(|schema| schema.find_property(name))
        {
            let candidates = self.query(&definition.query_for(record))?;
            return Ok(definition.pick(candidates));
        }

        Ok(match record.get(name) {
            None => PropertyValue::Absent,
            Some(Value::Null) => PropertyValue::Empty,
            Some(Value::Array(items)) if items.is_empty() => PropertyValue::Many(Vec::new()),
            Some(other) => PropertyValue::Opaque(describe(other).to_string()),
        })
    }
}

impl SchemaReflection for MemoryBackend {
    fn relation(&self, entity_type: &EntityType, name: &str) -> Option<RelationDescriptor> {
        self.schemas
            .get(entity_type)
            .and_then(|schema| schema.find_relation(name))
            .cloned()
    }

    fn property(&self, entity_type: &EntityType, name: &str) -> Option<PropertyDescriptor> {
        self.schemas
            .get(entity_type)
            .and_then(|schema| schema.find_property(name))
            .map(|p| p.descriptor())
    }
}

impl AnonymizedDataStore for MemoryBackend {
    fn is_anonymized(
        &self,
        entity_type: &EntityType,
        object_id: &ObjectId,
        field: &str,
    ) -> StoreResult<bool> {
        Ok(self
            .read()?
            .markers
            .iter()
            .any(|m| {
                m.is_active
                    && &m.entity_type == entity_type
                    && &m.object_id == object_id
                    && m.field == field
            }))
    }

    fn create(&self, marker: AnonymizedData) -> StoreResult<()> {
        let mut state = self.write()?;
        let duplicate = marker.is_active
            && state.markers.iter().any(|m| {
                m.is_active
                    && m.entity_type == marker.entity_type
                    && m.object_id == marker.object_id
                    && m.field == marker.field
            });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "Active marker already exists for {} {} field '{}'",
                marker.entity_type, marker.object_id, marker.field
            )));
        }
        state.markers.push(marker);
        Ok(())
    }

    fn delete_active(
        &self,
        entity_type: &EntityType,
        object_id: &ObjectId,
        field: &str,
    ) -> StoreResult<usize> {
        let mut state = self.write()?;
        let before = state.markers.len();
        state.markers.retain(|m| {
            !(m.is_active
                && &m.entity_type == entity_type
                && &m.object_id == object_id
                && m.field == field)
        });
        Ok(before - state.markers.len())
    }

    fn markers_for(
        &self,
        entity_type: &EntityType,
        object_id: &ObjectId,
    ) -> StoreResult<Vec<AnonymizedData>> {
        Ok(self
            .read()?
            .markers
            .iter()
            .filter(|m| &m.entity_type == entity_type && &m.object_id == object_id)
            .cloned()
            .collect())
    }
}

impl HistoryLog for MemoryBackend {
    fn entries_for(
        &self,
        entity_type: &EntityType,
        object_id: &ObjectId,
    ) -> StoreResult<Vec<HistoryEntry>> {
        Ok(self
            .read()?
            .history
            .iter()
            .filter(|e| &e.entity_type == entity_type && &e.object_id == object_id)
            .cloned()
            .collect())
    }

    fn save_entry(&self, entry: &HistoryEntry) -> StoreResult<()> {
        let mut state = self.write()?;
        match state.history.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => {
                *existing = entry.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity_type: entry.entity_type.clone(),
                object_id: entry.object_id.clone(),
            }),
        }
    }

    fn delete_entries_for(
        &self,
        entity_type: &EntityType,
        object_id: &ObjectId,
    ) -> StoreResult<usize> {
        let mut state = self.write()?;
        let before = state.history.len();
        state
            .history
            .retain(|e| !(&e.entity_type == entity_type && &e.object_id == object_id));
        Ok(before - state.history.len())
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array of values",
        Value::Object(_) => "object",
    }
}
