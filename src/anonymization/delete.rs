//! Delete anonymizers
//!
//! For delete-kind anonymizers the `__SELF__` token means "remove the whole
//! record": requested relations are processed first, then the record is
//! deleted with the store's cascades. Deletion cannot be undone, so under
//! deanonymization the token is inert and only the other fields are handled.

use super::engine::{AnonymizationEngine, ObjectKeys, Traversal, UpdateMode};
use super::fields::{Fields, DELETE_TOKEN};
use super::model::ModelAnonymizer;
use super::report::UpdateReport;
use crate::adapters::database::RecordQuery;
use crate::domain::{ObscuraError, Record, Result};

impl Traversal<'_> {
    pub(crate) fn visit_delete(
        &mut self,
        anonymizer: &ModelAnonymizer,
        record: &Record,
        fields: &Fields,
        keys: &mut ObjectKeys<'_>,
    ) -> Result<()> {
        if !fields.has_delete_token() {
            return self.visit_fields(anonymizer, record, fields, keys);
        }

        if !self.mode.is_anonymize() {
            let fields = fields.without_local(DELETE_TOKEN);
            return self.visit_fields(anonymizer, record, &fields, keys);
        }

        self.visit_related(anonymizer, record, fields, keys)?;

        let backend = self.engine.backend();
        let removed = backend.store.delete(&record.entity_type, &record.pk)?;
        self.report
            .add_delete(&record.entity_type, Some(&record.pk), removed);

        if anonymizer.options().delete_history {
            self.report.history_deleted += backend
                .history
                .delete_entries_for(&record.entity_type, &record.pk)?;
        }

        tracing::debug!(
            entity_type = %record.entity_type,
            object_id = %record.pk,
            records_removed = removed,
            "Record deleted"
        );
        Ok(())
    }
}

/// Bulk delete of the records matching `query`
pub(crate) fn anonymize_collection(
    engine: &AnonymizationEngine,
    anonymizer: &ModelAnonymizer,
    query: &RecordQuery,
) -> Result<UpdateReport> {
    let entity_type = anonymizer.entity_type();
    if !anonymizer.is_delete() {
        return Err(ObscuraError::Validation(format!(
            "Anonymizer for {entity_type} cannot anonymize whole collections"
        )));
    }
    if &query.entity_type != entity_type {
        return Err(ObscuraError::Validation(format!(
            "Query over {} passed to the anonymizer for {}",
            query.entity_type, entity_type
        )));
    }

    let removed = engine.backend().store.delete_matching(query)?;
    let mut report = UpdateReport::new(UpdateMode::Anonymize, entity_type.clone(), None);
    report.add_delete(entity_type, None, removed);

    tracing::info!(
        entity_type = %entity_type,
        records_removed = removed,
        "Collection deleted"
    );
    Ok(report)
}
