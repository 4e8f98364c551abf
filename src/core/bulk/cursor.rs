//! Resumable primary-key cursor and its checkpoint

use crate::adapters::database::{RecordQuery, RecordStore, SortOrder};
use crate::domain::{EntityType, ObjectId, Record, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Batch iterator over one entity type in ascending pk order
///
/// Each batch is `pk > last_pk ORDER BY pk LIMIT chunk_size`. The cursor
/// advances to the last pk of the batch it returned, so a batch shorter
/// than the chunk size ends the iteration without another query.
#[derive(Debug, Clone)]
pub struct PkCursor {
    base: RecordQuery,
    chunk_size: usize,
    last_pk: Option<ObjectId>,
    exhausted: bool,
}

impl PkCursor {
    /// Cursor over every record of `entity_type`
    pub fn new(entity_type: EntityType, chunk_size: usize) -> Self {
        Self::over(RecordQuery::all(entity_type), chunk_size)
    }

    /// Cursor over the records matching `query`
    ///
    /// Ordering, offset and limit of `query` are replaced by the cursor's own.
    pub fn over(query: RecordQuery, chunk_size: usize) -> Self {
        Self {
            base: RecordQuery {
                order: SortOrder::PkAsc,
                offset: 0,
                limit: None,
                ..query
            },
            chunk_size: chunk_size.max(1),
            last_pk: None,
            exhausted: false,
        }
    }

    /// Continue after `last_pk`
    pub fn resume_after(mut self, last_pk: Option<ObjectId>) -> Self {
        self.last_pk = last_pk;
        self
    }

    /// Last pk handed out
    pub fn last_pk(&self) -> Option<&ObjectId> {
        self.last_pk.as_ref()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Next batch, empty once the records are exhausted
    pub fn next_batch(&mut self, store: &dyn RecordStore) -> StoreResult<Vec<Record>> {
        if self.exhausted {
            return Ok(Vec::new());
        }

        let mut query = self.base.clone().limit(self.chunk_size);
        if let Some(pk) = &self.last_pk {
            query = query.after(pk.clone());
        }

        let batch = store.query(&query)?;
        match batch.last() {
            Some(record) => self.last_pk = Some(record.pk.clone()),
            None => self.exhausted = true,
        }
        if batch.len() < self.chunk_size {
            self.exhausted = true;
        }
        Ok(batch)
    }
}

/// Progress of a bulk job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkStatus {
    /// Never started
    #[default]
    NotStarted,
    /// Batches remain
    InProgress,
    /// Stopped by a shutdown request
    Interrupted,
    /// Every record processed
    Completed,
}

/// Persistable position of a bulk job
///
/// Store it between runs and pass it back as
/// [`BulkOptions::resume_from`](super::BulkOptions) to continue after the
/// last processed pk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkCheckpoint {
    /// Entity type being processed
    pub entity_type: EntityType,

    /// Last pk of the last completed batch
    pub last_pk: Option<ObjectId>,

    /// Objects processed so far, across resumptions
    pub processed: u64,

    /// Job status
    pub status: BulkStatus,

    /// Last update of the checkpoint
    pub updated_at: DateTime<Utc>,
}

impl BulkCheckpoint {
    /// Fresh checkpoint for `entity_type`
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            last_pk: None,
            processed: 0,
            status: BulkStatus::NotStarted,
            updated_at: Utc::now(),
        }
    }

    /// Record a completed batch
    pub fn advance(&mut self, last_pk: Option<ObjectId>, processed: usize) {
        if last_pk.is_some() {
            self.last_pk = last_pk;
        }
        self.processed += processed as u64;
        self.status = BulkStatus::InProgress;
        self.updated_at = Utc::now();
    }

    pub fn mark_interrupted(&mut self) {
        self.status = BulkStatus::Interrupted;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self) {
        self.status = BulkStatus::Completed;
        self.updated_at = Utc::now();
    }

    pub fn is_completed(&self) -> bool {
        self.status == BulkStatus::Completed
    }
}
