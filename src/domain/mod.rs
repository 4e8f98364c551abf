//! Domain models and types for Obscura.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`EntityType`], [`ObjectId`], [`LegalReasonRef`], [`PurposeRef`])
//! - **Records and bookkeeping** ([`Record`], [`HistoryEntry`], [`AnonymizedData`])
//! - **Error types** ([`ObscuraError`], [`StoreError`])
//! - **Result type aliases** ([`Result`], [`StoreResult`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, ObscuraError>`]:
//!
//! ```rust
//! use obscura::domain::{EntityType, ObscuraError, Result};
//!
//! fn example() -> Result<EntityType> {
//!     EntityType::new("shop.customer").map_err(ObscuraError::Validation)
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{ObscuraError, StoreError};
pub use ids::{EntityType, LegalReasonRef, ObjectId, PurposeRef};
pub use record::{AnonymizedData, FieldChange, HistoryEntry, Record};
pub use result::{Result, StoreResult};
