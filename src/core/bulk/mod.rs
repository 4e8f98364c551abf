//! Chunked bulk anonymization
//!
//! - [`cursor`] - pk-ordered batches and the persistable checkpoint
//! - [`runner`] - the job running registered anonymizers over their types

pub mod cursor;
pub mod runner;

pub use cursor::{BulkCheckpoint, BulkStatus, PkCursor};
pub use runner::{BulkAnonymizer, BulkError, BulkOptions, BulkRun, BulkSummary};
