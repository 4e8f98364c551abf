//! Bulk anonymization jobs
//!
//! Runs the registered anonymizers over every stored record of their type,
//! batch by batch. Field anonymizers process each object through the
//! engine; delete anonymizers remove whole batches at once.

use super::cursor::{BulkCheckpoint, BulkStatus, PkCursor};
use crate::adapters::database::RecordQuery;
use crate::anonymization::engine::{AnonymizationEngine, UpdateRequest};
use crate::anonymization::model::ModelAnonymizer;
use crate::domain::{EntityType, ObjectId, ObscuraError, Result, StoreError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Options of one bulk run
#[derive(Debug, Clone, Default)]
pub struct BulkOptions {
    /// Checkpoint of an earlier run to continue from
    pub resume_from: Option<BulkCheckpoint>,

    /// Shutdown signal, checked between batches
    pub shutdown: Option<watch::Receiver<bool>>,
}

impl BulkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resume_from(mut self, checkpoint: BulkCheckpoint) -> Self {
        self.resume_from = Some(checkpoint);
        self
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

/// An object the job could not process
#[derive(Debug, Clone)]
pub struct BulkError {
    /// Object that failed
    pub object_id: ObjectId,

    /// Error message
    pub message: String,
}

/// Result of running one anonymizer
#[derive(Debug, Clone)]
pub struct BulkRun {
    /// Where the run stopped
    pub checkpoint: BulkCheckpoint,

    /// Batches completed
    pub batches: usize,

    /// Objects with at least one field changed
    pub objects_updated: usize,

    /// Fields changed across every visited object
    pub fields_changed: usize,

    /// Records removed, cascades included
    pub records_removed: usize,

    /// Objects gone before their turn (removed by an earlier cascade)
    pub skipped: usize,

    /// Objects that failed
    pub errors: Vec<BulkError>,

    /// Duration of the run
    pub duration: Duration,
}

impl BulkRun {
    fn new(checkpoint: BulkCheckpoint) -> Self {
        Self {
            checkpoint,
            batches: 0,
            objects_updated: 0,
            fields_changed: 0,
            records_removed: 0,
            skipped: 0,
            errors: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.checkpoint.entity_type
    }

    pub fn is_interrupted(&self) -> bool {
        self.checkpoint.status == BulkStatus::Interrupted
    }
}

/// Result of [`BulkAnonymizer::run_all`]
#[derive(Debug, Clone, Default)]
pub struct BulkSummary {
    /// One entry per anonymizer run, in registration order
    pub runs: Vec<BulkRun>,

    /// Whether a shutdown request stopped the job
    pub interrupted: bool,

    /// Total duration
    pub duration: Duration,
}

impl BulkSummary {
    pub fn total_processed(&self) -> u64 {
        self.runs.iter().map(|r| r.checkpoint.processed).sum()
    }

    pub fn total_fields_changed(&self) -> usize {
        self.runs.iter().map(|r| r.fields_changed).sum()
    }

    pub fn total_records_removed(&self) -> usize {
        self.runs.iter().map(|r| r.records_removed).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.runs.iter().map(|r| r.errors.len()).sum()
    }

    /// Completed without interruption or failed objects
    pub fn is_successful(&self) -> bool {
        !self.interrupted && self.total_errors() == 0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            anonymizers = self.runs.len(),
            processed = self.total_processed(),
            fields_changed = self.total_fields_changed(),
            records_removed = self.total_records_removed(),
            interrupted = self.interrupted,
            duration_secs = self.duration.as_secs(),
            "Bulk anonymization completed"
        );

        if self.total_errors() > 0 {
            tracing::warn!(
                error_count = self.total_errors(),
                "Bulk anonymization completed with errors"
            );
            for run in &self.runs {
                for error in &run.errors {
                    tracing::warn!(
                        entity_type = %run.entity_type(),
                        object_id = %error.object_id,
                        message = %error.message,
                        "Bulk anonymization error"
                    );
                }
            }
        }
    }
}

/// Runs registered anonymizers over whole entity types
#[derive(Debug, Clone)]
pub struct BulkAnonymizer {
    engine: Arc<AnonymizationEngine>,
}

impl BulkAnonymizer {
    pub fn new(engine: Arc<AnonymizationEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &AnonymizationEngine {
        &self.engine
    }

    /// Anonymize every record of `entity_type`
    ///
    /// # Errors
    ///
    /// Fails on an unregistered type, a checkpoint of another type,
    /// configuration errors and store failures. Other per-object failures are
    /// collected in [`BulkRun::errors`] and the run continues.
    pub fn run(&self, entity_type: &EntityType, options: &BulkOptions) -> Result<BulkRun> {
        let start = Instant::now();
        let anonymizer = self.engine.anonymizer_for(entity_type)?;

        let checkpoint = match &options.resume_from {
            Some(checkpoint) if &checkpoint.entity_type != entity_type => {
                return Err(ObscuraError::Validation(format!(
                    "Checkpoint for {} cannot resume a run over {}",
                    checkpoint.entity_type, entity_type
                )));
            }
            Some(checkpoint) => checkpoint.clone(),
            None => BulkCheckpoint::new(entity_type.clone()),
        };

        let mut run = BulkRun::new(checkpoint);
        if run.checkpoint.is_completed() {
            tracing::info!(entity_type = %entity_type, "Checkpoint already completed, nothing to do");
            return Ok(run);
        }

        tracing::info!(
            entity_type = %entity_type,
            kind = ?anonymizer.kind(),
            chunk_size = anonymizer.chunk_size(),
            resume_after = ?run.checkpoint.last_pk,
            "Starting bulk anonymization"
        );

        if anonymizer.is_delete() {
            self.run_delete(&anonymizer, options, &mut run)?;
        } else {
            self.run_fields(&anonymizer, options, &mut run)?;
        }

        run.duration = start.elapsed();
        tracing::info!(
            entity_type = %entity_type,
            processed = run.checkpoint.processed,
            batches = run.batches,
            status = ?run.checkpoint.status,
            "Bulk anonymization finished"
        );
        Ok(run)
    }

    /// Run every registered anonymizer, optionally restricted to `only`
    ///
    /// Anonymizers run in registration order. `resume_from` applies to the
    /// run of its own entity type; a shutdown request stops the job after
    /// the current batch.
    pub fn run_all(&self, only: Option<&[EntityType]>, options: &BulkOptions) -> Result<BulkSummary> {
        let start = Instant::now();
        let mut summary = BulkSummary::default();

        if let Some(types) = only {
            for entity_type in types {
                if self.engine.registry().get(entity_type).is_none() {
                    tracing::warn!(entity_type = %entity_type, "No anonymizer registered, skipping");
                }
            }
        }

        let selected: Vec<EntityType> = self
            .engine
            .registry()
            .iter()
            .map(|a| a.entity_type().clone())
            .filter(|ty| only.map_or(true, |types| types.contains(ty)))
            .collect();

        for entity_type in &selected {
            let run_options = BulkOptions {
                resume_from: options
                    .resume_from
                    .clone()
                    .filter(|cp| &cp.entity_type == entity_type),
                shutdown: options.shutdown.clone(),
            };

            let run = self.run(entity_type, &run_options)?;
            let interrupted = run.is_interrupted();
            summary.runs.push(run);
            if interrupted {
                summary.interrupted = true;
                break;
            }
        }

        summary.duration = start.elapsed();
        summary.log_summary();
        Ok(summary)
    }

    fn run_fields(
        &self,
        anonymizer: &ModelAnonymizer,
        options: &BulkOptions,
        run: &mut BulkRun,
    ) -> Result<()> {
        let entity_type = anonymizer.entity_type();
        let store = self.engine.backend().store.as_ref();
        let total = store.count(&RecordQuery::all(entity_type.clone()))?;

        let mut cursor = PkCursor::new(entity_type.clone(), anonymizer.chunk_size())
            .resume_after(run.checkpoint.last_pk.clone());

        loop {
            if options.shutdown_requested() {
                tracing::warn!(entity_type = %entity_type, "Shutdown requested, stopping after last batch");
                run.checkpoint.mark_interrupted();
                return Ok(());
            }

            let batch = cursor.next_batch(store)?;
            if batch.is_empty() {
                break;
            }

            for record in &batch {
                match self
                    .engine
                    .update_by_id(entity_type, &record.pk, UpdateRequest::anonymize())
                {
                    Ok(report) => {
                        if report.fields_of(entity_type, &record.pk).is_some() {
                            run.objects_updated += 1;
                        }
                        run.fields_changed += report.fields_changed();
                        run.records_removed += report.records_removed();
                    }
                    Err(ObscuraError::Store(StoreError::NotFound { .. })) => run.skipped += 1,
                    Err(e @ ObscuraError::Configuration(_)) => return Err(e),
                    Err(e) => {
                        crate::log_error_with_context!(&e, "Failed to anonymize object");
                        run.errors.push(BulkError {
                            object_id: record.pk.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }

            run.batches += 1;
            run.checkpoint.advance(cursor.last_pk().cloned(), batch.len());
            let processed = run.checkpoint.processed;
            crate::log_batch_processing!(processed, total as u64);
        }

        run.checkpoint.mark_completed();
        Ok(())
    }

    fn run_delete(
        &self,
        anonymizer: &ModelAnonymizer,
        options: &BulkOptions,
        run: &mut BulkRun,
    ) -> Result<()> {
        let entity_type = anonymizer.entity_type();
        let store = self.engine.backend().store.as_ref();
        let total = store.count(&RecordQuery::all(entity_type.clone()))? as u64 + run.checkpoint.processed;

        loop {
            if options.shutdown_requested() {
                tracing::warn!(entity_type = %entity_type, "Shutdown requested, stopping after last batch");
                run.checkpoint.mark_interrupted();
                return Ok(());
            }

            let query = RecordQuery::all(entity_type.clone()).limit(anonymizer.chunk_size());
            let batch_len = store.count(&query)?;
            if batch_len == 0 {
                break;
            }

            let report = self.engine.anonymize_collection(entity_type, &query)?;
            if report.records_removed() == 0 {
                tracing::warn!(entity_type = %entity_type, "Batch delete removed nothing, stopping");
                break;
            }

            run.batches += 1;
            run.records_removed += report.records_removed();
            run.checkpoint.advance(None, batch_len);
            let processed = run.checkpoint.processed;
            crate::log_batch_processing!(processed, total);
        }

        run.checkpoint.mark_completed();
        Ok(())
    }
}
