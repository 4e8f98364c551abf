//! Core job orchestration for Obscura.
//!
//! # Modules
//!
//! - [`bulk`] - Chunked, resumable anonymization of whole entity types
//!
//! # Bulk Workflow
//!
//! 1. **Select**: registered anonymizers, optionally filtered by entity type
//! 2. **Batch**: records in ascending pk order, `chunk_size` at a time
//! 3. **Process**: per-object anonymization, or batch deletion for delete anonymizers
//! 4. **Checkpoint**: the last pk of every completed batch
//! 5. **Report**: a bulk summary per anonymizer
//!
//! # Example
//!
//! ```rust,no_run
//! use obscura::anonymization::AnonymizationEngine;
//! use obscura::core::bulk::{BulkAnonymizer, BulkOptions};
//! use std::sync::Arc;
//!
//! # fn example(engine: AnonymizationEngine) -> Result<(), Box<dyn std::error::Error>> {
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let bulk = BulkAnonymizer::new(Arc::new(engine));
//! let summary = bulk.run_all(None, &BulkOptions::new().with_shutdown(shutdown_rx))?;
//!
//! println!("Processed: {}", summary.total_processed());
//! println!("Removed: {}", summary.total_records_removed());
//! # Ok(())
//! # }
//! ```

pub mod bulk;
