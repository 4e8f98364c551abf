//! Main anonymization engine
//!
//! This module provides the [`AnonymizationEngine`] that walks a record graph
//! and anonymizes or deanonymizes the requested fields.
//!
//! # Architecture
//!
//! One root call runs these steps for every object it reaches:
//! - **Guard**: deanonymizing a non-reversible type fails before any write
//! - **Select**: fields not yet anonymized (or, backwards, anonymized and reversible)
//! - **Transform**: per-field keys are derived and every new value computed
//! - **History**: change history is deleted or rewritten as configured
//! - **Persist**: one history-suppressed save, then the anonymization markers
//! - **Recurse**: related objects, depth first in declaration order
//!
//! An object reached along several paths gets the fields requested on each
//! path; markers keep repeated fields from being transformed twice. A set
//! of (entity type, pk, selection) pairs skips a selection already applied
//! to an object, which bounds each root call on cyclic schemas.
//!
//! # Examples
//!
//! ```
//! use obscura::adapters::database::Backend;
//! use obscura::adapters::memory::MemoryBackend;
//! use obscura::anonymization::anonymizer::TextFieldAnonymizer;
//! use obscura::anonymization::{AnonymizationEngine, ModelAnonymizer, RegistryBuilder, UpdateRequest};
//! use obscura::config::secret_string;
//! use obscura::domain::{EntityType, Record};
//! use std::sync::Arc;
//!
//! # fn example() -> obscura::domain::Result<()> {
//! let customer = EntityType::new("shop.customer").unwrap();
//! let registry = RegistryBuilder::new()
//!     .with(
//!         ModelAnonymizer::builder(customer.clone())
//!             .field("first_name", TextFieldAnonymizer::new())
//!             .build(),
//!     )?
//!     .build();
//!
//! let backend = Arc::new(MemoryBackend::new());
//! backend.insert(Record::new(customer.clone(), 1).with("first_name", "Ada"))?;
//!
//! let engine = AnonymizationEngine::new(
//!     Arc::new(registry),
//!     Backend::from_shared(backend.clone()),
//!     secret_string("a-long-global-secret".to_string()),
//! )?;
//!
//! let record = backend.records_of(&customer)?.remove(0);
//! let report = engine.update(&record, UpdateRequest::anonymize().base_key("per-job-key"))?;
//! assert_eq!(report.fields_changed(), 1);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use super::anonymizer::FieldAnonymizer;
use super::audit::AuditLogger;
use super::crypto::{derive_key, random_secret};
use super::fields::{FieldMatrix, Fields, FieldsParser, DELETE_TOKEN};
use super::model::{ModelAnonymizer, RelatedAnonymizer};
use super::registry::{self, AnonymizerRegistry};
use super::report::UpdateReport;
use crate::adapters::database::{Backend, HistoryMode, PropertyValue, RecordQuery};
use crate::config::{secret_string, SecretString};
use crate::domain::{
    AnonymizedData, EntityType, HistoryEntry, LegalReasonRef, ObjectId, ObscuraError, PurposeRef,
    Record, Result, StoreError,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Direction of an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Forward transform
    Anonymize,
    /// Backward transform
    Deanonymize,
}

impl UpdateMode {
    /// Whether this is the forward direction
    pub fn is_anonymize(self) -> bool {
        self == UpdateMode::Anonymize
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateMode::Anonymize => f.write_str("anonymize"),
            UpdateMode::Deanonymize => f.write_str("deanonymize"),
        }
    }
}

/// Fields requested by an update
#[derive(Debug, Clone)]
pub enum FieldSelection {
    /// Parsed against the root's anonymizer at the start of the call
    Matrix(FieldMatrix),
    /// Already parsed
    Parsed(Fields),
}

impl Default for FieldSelection {
    fn default() -> Self {
        FieldSelection::Matrix(FieldMatrix::all())
    }
}

/// One root update call
///
/// # Examples
///
/// ```
/// use obscura::anonymization::{FieldMatrix, UpdateRequest};
/// use obscura::domain::LegalReasonRef;
///
/// let request = UpdateRequest::anonymize()
///     .fields(FieldMatrix::names(["first_name"]).related("emails", "__ALL__"))
///     .legal_reason(LegalReasonRef::generate())
///     .base_key("customer-key");
/// ```
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Direction
    pub mode: UpdateMode,
    /// Requested fields
    pub fields: FieldSelection,
    /// Legal reason attached to created markers
    pub legal_reason: Option<LegalReasonRef>,
    /// Processing purpose, passed through unchanged
    pub purpose: Option<PurposeRef>,
    /// Base key for reversible types, falls back to the engine's
    pub base_key: Option<SecretString>,
}

impl UpdateRequest {
    fn new(mode: UpdateMode) -> Self {
        Self {
            mode,
            fields: FieldSelection::default(),
            legal_reason: None,
            purpose: None,
            base_key: None,
        }
    }

    /// Anonymize every declared field
    pub fn anonymize() -> Self {
        Self::new(UpdateMode::Anonymize)
    }

    /// Deanonymize every declared field
    pub fn deanonymize() -> Self {
        Self::new(UpdateMode::Deanonymize)
    }

    /// Requested fields
    pub fn fields(mut self, matrix: impl Into<FieldMatrix>) -> Self {
        self.fields = FieldSelection::Matrix(matrix.into());
        self
    }

    /// Already parsed fields
    pub fn parsed_fields(mut self, fields: Fields) -> Self {
        self.fields = FieldSelection::Parsed(fields);
        self
    }

    /// Legal reason
    pub fn legal_reason(mut self, reason: LegalReasonRef) -> Self {
        self.legal_reason = Some(reason);
        self
    }

    /// Purpose
    pub fn purpose(mut self, purpose: PurposeRef) -> Self {
        self.purpose = Some(purpose);
        self
    }

    /// Base key
    pub fn base_key(mut self, key: impl Into<String>) -> Self {
        self.base_key = Some(secret_string(key.into()));
        self
    }
}

/// Anonymization engine
///
/// Holds the frozen registry, the collaborator backend and the global
/// secret. The engine is `Send + Sync` and can be shared behind an `Arc`;
/// each root call runs to completion on the calling thread.
pub struct AnonymizationEngine {
    registry: Arc<AnonymizerRegistry>,
    backend: Backend,
    global_secret: SecretString,
    base_key: Option<SecretString>,
    journal: Option<AuditLogger>,
}

impl AnonymizationEngine {
    /// Create a new engine
    ///
    /// # Errors
    ///
    /// Returns [`ObscuraError::Configuration`] if the global secret is empty.
    pub fn new(
        registry: Arc<AnonymizerRegistry>,
        backend: Backend,
        global_secret: SecretString,
    ) -> Result<Self> {
        if global_secret.expose_secret().is_empty() {
            return Err(ObscuraError::Configuration(
                "Global secret cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            registry,
            backend,
            global_secret,
            base_key: None,
            journal: None,
        })
    }

    /// Create an engine over the installed global registry
    pub fn from_global(backend: Backend, global_secret: SecretString) -> Result<Self> {
        let registry = registry::global().ok_or_else(|| {
            ObscuraError::Configuration("No global anonymizer registry installed".to_string())
        })?;
        Self::new(registry, backend, global_secret)
    }

    /// Appends one journal line per root call
    pub fn with_journal(mut self, journal: AuditLogger) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Base key used when a request supplies none
    pub fn with_base_key(mut self, key: SecretString) -> Self {
        self.base_key = Some(key);
        self
    }

    /// Registry
    pub fn registry(&self) -> &AnonymizerRegistry {
        &self.registry
    }

    /// Collaborator backend
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Anonymizer governing `entity_type`
    pub fn anonymizer_for(&self, entity_type: &EntityType) -> Result<Arc<ModelAnonymizer>> {
        self.registry.get(entity_type).cloned().ok_or_else(|| {
            ObscuraError::Configuration(format!("No anonymizer registered for {entity_type}"))
        })
    }

    /// Parse a field matrix for `entity_type`
    pub fn parse_fields(&self, entity_type: &EntityType, matrix: &FieldMatrix) -> Result<Fields> {
        let anonymizer = self.anonymizer_for(entity_type)?;
        FieldsParser::new(&self.registry, self.backend.schema.as_ref()).parse(&anonymizer, matrix)
    }

    /// Whether a field of a record carries an active marker
    pub fn is_field_anonymized(&self, record: &Record, field: &str) -> Result<bool> {
        Ok(self
            .backend
            .markers
            .is_anonymized(&record.entity_type, &record.pk, field)?)
    }

    /// Anonymize the requested fields of a record and its relations
    pub fn anonymize(&self, record: &Record, fields: impl Into<FieldMatrix>) -> Result<UpdateReport> {
        self.update(record, UpdateRequest::anonymize().fields(fields))
    }

    /// Deanonymize the requested fields of a record and its relations
    pub fn deanonymize(&self, record: &Record, fields: impl Into<FieldMatrix>) -> Result<UpdateReport> {
        self.update(record, UpdateRequest::deanonymize().fields(fields))
    }

    /// Fetch a record and update it
    pub fn update_by_id(
        &self,
        entity_type: &EntityType,
        pk: &ObjectId,
        request: UpdateRequest,
    ) -> Result<UpdateReport> {
        let record = self
            .backend
            .store
            .get(entity_type, pk)?
            .ok_or_else(|| StoreError::NotFound {
                entity_type: entity_type.clone(),
                object_id: pk.clone(),
            })?;
        self.update(&record, request)
    }

    /// Run one root update call
    ///
    /// # Errors
    ///
    /// - [`ObscuraError::IrreversibleAnonymizer`] when deanonymizing a non-reversible type
    /// - [`ObscuraError::UnknownField`] when the field matrix does not resolve
    /// - [`ObscuraError::Configuration`] when a reversible type has no base key
    /// - [`ObscuraError::Store`] on collaborator failures
    ///
    /// Objects completed before a failure stay written.
    pub fn update(&self, record: &Record, request: UpdateRequest) -> Result<UpdateReport> {
        let start = Instant::now();
        let mode = request.mode;
        crate::log_update_start!(&record.entity_type, &record.pk, mode);

        let result = self.run_update(record, request);
        match result {
            Ok(mut report) => {
                report.duration_ms = start.elapsed().as_millis() as u64;
                crate::log_update_complete!(
                    report.objects_visited,
                    report.fields_changed(),
                    start.elapsed()
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    entity_type = %record.entity_type,
                    object_id = %record.pk,
                    mode = %mode,
                    "Update failed"
                );
                Err(e)
            }
        }
    }

    fn run_update(&self, record: &Record, request: UpdateRequest) -> Result<UpdateReport> {
        let anonymizer = self.anonymizer_for(&record.entity_type)?;
        let mode = request.mode;

        if !mode.is_anonymize() && !anonymizer.is_reversible(record) {
            return Err(ObscuraError::IrreversibleAnonymizer {
                entity_type: record.entity_type.clone(),
                object_id: record.pk.clone(),
            });
        }

        let fields = match request.fields {
            FieldSelection::Matrix(matrix) => {
                FieldsParser::new(&self.registry, self.backend.schema.as_ref())
                    .parse(&anonymizer, &matrix)?
            }
            FieldSelection::Parsed(fields) => fields,
        };
        if fields.entity_type != record.entity_type {
            return Err(ObscuraError::Validation(format!(
                "Fields parsed for {} cannot update a {} record",
                fields.entity_type, record.entity_type
            )));
        }

        let base_key = request
            .base_key
            .as_ref()
            .or(self.base_key.as_ref())
            .map(|key| key.expose_secret().as_ref().to_string());

        let mut traversal = Traversal::new(
            self,
            mode,
            request.legal_reason,
            request.purpose,
            UpdateReport::new(mode, record.entity_type.clone(), Some(record.pk.clone())),
        );
        traversal.visit(&anonymizer, record, &fields, base_key.as_deref())?;
        let report = traversal.finish();

        if let Some(journal) = &self.journal {
            journal.log_update(&report, &fields.flatten())?;
        }

        Ok(report)
    }

    /// Delete every record of a delete-kind type matching `query`
    ///
    /// Bypasses per-object traversal; only for collections being wholly
    /// discarded.
    pub fn anonymize_collection(
        &self,
        entity_type: &EntityType,
        query: &RecordQuery,
    ) -> Result<UpdateReport> {
        let start = Instant::now();
        let anonymizer = self.anonymizer_for(entity_type)?;
        let mut report = super::delete::anonymize_collection(self, &anonymizer, query)?;
        report.duration_ms = start.elapsed().as_millis() as u64;

        if let Some(journal) = &self.journal {
            journal.log_update(&report, &[DELETE_TOKEN.to_string()])?;
        }
        Ok(report)
    }

    fn global_secret(&self) -> &str {
        self.global_secret.expose_secret().as_ref()
    }
}

impl fmt::Debug for AnonymizationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnonymizationEngine")
            .field("anonymizers", &self.registry.len())
            .field("journal", &self.journal.is_some())
            .finish_non_exhaustive()
    }
}

/// Key material of one visited object
///
/// The base secret is resolved on first use, so objects with nothing to
/// transform never need one.
pub(crate) struct ObjectKeys<'a> {
    anonymizer: &'a ModelAnonymizer,
    record: &'a Record,
    supplied: Option<&'a str>,
    global: &'a str,
    base: Option<String>,
}

impl<'a> ObjectKeys<'a> {
    pub(crate) fn new(
        anonymizer: &'a ModelAnonymizer,
        record: &'a Record,
        supplied: Option<&'a str>,
        global: &'a str,
    ) -> Self {
        Self {
            anonymizer,
            record,
            supplied,
            global,
            base: None,
        }
    }

    fn base_secret(&mut self) -> Result<&str> {
        if self.base.is_none() {
            let base = if !self.anonymizer.is_reversible(self.record) {
                random_secret()
            } else if let Some(key) = self.anonymizer.key_override(self.record) {
                key
            } else if let Some(key) = self.supplied {
                key.to_string()
            } else {
                return Err(ObscuraError::Configuration(format!(
                    "No encryption key available for {} object {}: supply a base key or declare key fields",
                    self.record.entity_type, self.record.pk
                )));
            };
            self.base = Some(base);
        }
        Ok(self.base.as_deref().unwrap_or_default())
    }

    /// Derived key of one field (or relation) of the object
    pub(crate) fn field_key(&mut self, field: &str) -> Result<String> {
        let global = self.global;
        let record = self.record;
        let base = self.base_secret()?;
        Ok(derive_key(&record.pk, base, global, field))
    }
}

/// State of one root call
pub(crate) struct Traversal<'e> {
    pub(crate) engine: &'e AnonymizationEngine,
    pub(crate) mode: UpdateMode,
    legal_reason: Option<LegalReasonRef>,
    purpose: Option<PurposeRef>,
    visited: HashSet<(EntityType, ObjectId)>,
    applied: HashSet<(EntityType, ObjectId, String)>,
    pub(crate) report: UpdateReport,
}

impl<'e> Traversal<'e> {
    pub(crate) fn new(
        engine: &'e AnonymizationEngine,
        mode: UpdateMode,
        legal_reason: Option<LegalReasonRef>,
        purpose: Option<PurposeRef>,
        report: UpdateReport,
    ) -> Self {
        Self {
            engine,
            mode,
            legal_reason,
            purpose,
            visited: HashSet::new(),
            applied: HashSet::new(),
            report,
        }
    }

    pub(crate) fn finish(self) -> UpdateReport {
        self.report
    }

    /// Processes one object and everything reachable from it
    pub(crate) fn visit(
        &mut self,
        anonymizer: &ModelAnonymizer,
        record: &Record,
        fields: &Fields,
        base_key: Option<&str>,
    ) -> Result<()> {
        let (entity_type, pk) = record.key();
        let mut selection = fields.flatten();
        selection.sort();
        if !self
            .applied
            .insert((entity_type.clone(), pk.clone(), selection.join(",")))
        {
            tracing::debug!(
                entity_type = %record.entity_type,
                object_id = %record.pk,
                "Selection already applied to object"
            );
            return Ok(());
        }
        if self.visited.insert((entity_type, pk)) {
            self.report.objects_visited += 1;
        } else {
            tracing::debug!(
                entity_type = %record.entity_type,
                object_id = %record.pk,
                "Object reached again, applying this path's fields"
            );
        }

        if !self.mode.is_anonymize() && !anonymizer.is_reversible(record) {
            return Err(ObscuraError::IrreversibleAnonymizer {
                entity_type: record.entity_type.clone(),
                object_id: record.pk.clone(),
            });
        }

        tracing::debug!(
            entity_type = %record.entity_type,
            object_id = %record.pk,
            mode = %self.mode,
            purpose = self.purpose.as_ref().map(PurposeRef::as_str),
            "Visiting object"
        );

        let engine = self.engine;
        let mut keys = ObjectKeys::new(anonymizer, record, base_key, engine.global_secret());

        if anonymizer.is_delete() {
            return self.visit_delete(anonymizer, record, fields, &mut keys);
        }
        self.visit_fields(anonymizer, record, fields, &mut keys)
    }

    /// Local fields then relations
    pub(crate) fn visit_fields(
        &mut self,
        anonymizer: &ModelAnonymizer,
        record: &Record,
        fields: &Fields,
        keys: &mut ObjectKeys<'_>,
    ) -> Result<()> {
        self.update_local(anonymizer, record, fields, keys)?;
        self.visit_related(anonymizer, record, fields, keys)
    }

    fn select_local<'a>(
        &self,
        anonymizer: &'a ModelAnonymizer,
        record: &Record,
        fields: &Fields,
    ) -> Result<Vec<(String, &'a Arc<dyn FieldAnonymizer>)>> {
        let markers = &self.engine.backend.markers;
        let mut selected = Vec::new();

        for name in &fields.local_fields {
            if name == DELETE_TOKEN {
                continue;
            }
            let field = anonymizer.field(name).ok_or_else(|| {
                ObscuraError::unknown_field(
                    anonymizer.entity_type(),
                    name.clone(),
                    "no field anonymizer declared",
                )
            })?;

            let marked = markers.is_anonymized(&record.entity_type, &record.pk, name)?;
            let wanted = if self.mode.is_anonymize() {
                !marked
            } else {
                marked && field.is_reversible(record)
            };
            if wanted {
                selected.push((name.clone(), field));
            }
        }

        Ok(selected)
    }

    fn update_local(
        &mut self,
        anonymizer: &ModelAnonymizer,
        record: &Record,
        fields: &Fields,
        keys: &mut ObjectKeys<'_>,
    ) -> Result<()> {
        let targets = self.select_local(anonymizer, record, fields)?;
        if targets.is_empty() {
            return Ok(());
        }
        let anonymize = self.mode.is_anonymize();
        let backend = &self.engine.backend;

        let mut updated = record.clone();
        let mut field_keys = Vec::with_capacity(targets.len());
        for (name, field) in &targets {
            let key = keys.field_key(name)?;
            let value = field.get_value_from_obj(record, name, &key, anonymize)?;
            updated.set(name.clone(), value);
            field_keys.push(key);
        }

        let options = anonymizer.options();
        let mut rewritten: Vec<HistoryEntry> = Vec::new();
        if !options.delete_history && options.anonymize_history {
            for mut entry in backend.history.entries_for(&record.entity_type, &record.pk)? {
                let mut changed = false;
                for ((name, field), key) in targets.iter().zip(&field_keys) {
                    if let Some(change) =
                        field.get_value_from_entry(record, &entry, name, key, anonymize)?
                    {
                        entry.changes.insert(name.clone(), change);
                        changed = true;
                    }
                }
                if changed {
                    rewritten.push(entry);
                }
            }
        }

        if options.delete_history {
            if anonymize {
                self.report.history_deleted += backend
                    .history
                    .delete_entries_for(&record.entity_type, &record.pk)?;
            }
        } else {
            for entry in &rewritten {
                backend.history.save_entry(entry)?;
            }
            self.report.history_rewritten += rewritten.len();
        }

        backend.store.save(&updated, HistoryMode::Suppress)?;

        for (name, _) in &targets {
            if anonymize {
                backend.markers.create(AnonymizedData::active(
                    record.entity_type.clone(),
                    record.pk.clone(),
                    name.clone(),
                    self.legal_reason,
                ))?;
            } else {
                backend
                    .markers
                    .delete_active(&record.entity_type, &record.pk, name)?;
            }
        }

        let names: Vec<String> = targets.into_iter().map(|(name, _)| name).collect();
        tracing::debug!(
            entity_type = %record.entity_type,
            object_id = %record.pk,
            fields = ?names,
            "Fields updated"
        );
        self.report.add_update(&record.entity_type, &record.pk, names);
        Ok(())
    }

    /// Recurses into every requested relation, depth first
    pub(crate) fn visit_related(
        &mut self,
        anonymizer: &ModelAnonymizer,
        record: &Record,
        fields: &Fields,
        keys: &mut ObjectKeys<'_>,
    ) -> Result<()> {
        for related in &fields.related_fields {
            let Some(objects) = self.related_objects(anonymizer, record, &related.name)? else {
                continue;
            };
            if objects.is_empty() {
                continue;
            }

            tracing::debug!(
                entity_type = %record.entity_type,
                object_id = %record.pk,
                relation = %related.name,
                count = objects.len(),
                "Following relation"
            );

            let key = keys.field_key(&related.name)?;
            for object in &objects {
                // a sibling branch may have deleted it through a cascade
                let Some(current) = self.engine.backend.store.get(&object.entity_type, &object.pk)?
                else {
                    continue;
                };
                self.visit(&related.anonymizer, &current, &related.fields, Some(&key))?;
            }
        }
        Ok(())
    }

    /// Records reached through `name`, `None` for an unreachable property
    fn related_objects(
        &mut self,
        anonymizer: &ModelAnonymizer,
        record: &Record,
        name: &str,
    ) -> Result<Option<Vec<Record>>> {
        let backend = &self.engine.backend;

        if let Some(RelatedAnonymizer::Relation(relation)) = anonymizer.relation(name) {
            return relation
                .related_objects(record, backend.store.as_ref())
                .map(Some);
        }

        if let Some(descriptor) = backend.schema.relation(&record.entity_type, name) {
            let mut objects = backend.store.related(record, &descriptor)?;
            if !descriptor.cardinality.is_collection() {
                objects.truncate(1);
            }
            return Ok(Some(objects));
        }

        match backend.store.property(record, name)? {
            PropertyValue::Absent => Err(ObscuraError::unknown_field(
                &record.entity_type,
                name,
                "no relation, property or attribute of that name",
            )),
            PropertyValue::Empty => Ok(Some(Vec::new())),
            PropertyValue::Single(object) => Ok(Some(vec![object])),
            PropertyValue::Many(objects) => Ok(Some(objects)),
            PropertyValue::Opaque(observed) => {
                let warning = ObscuraError::UnreachableProperty {
                    entity_type: record.entity_type.clone(),
                    object_id: record.pk.clone(),
                    field: name.to_string(),
                    observed,
                };
                tracing::warn!(error = %warning, "Skipping unreachable property");
                self.report.add_warning(warning.to_string());
                Ok(None)
            }
        }
    }
}
