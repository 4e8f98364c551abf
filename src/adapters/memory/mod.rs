//! In-memory backend
//!
//! Reference implementation of the collaborator traits, used by the CLI
//! (over JSON dataset snapshots) and by the test suite.

pub mod backend;
pub mod schema;
pub mod snapshot;

pub use backend::MemoryBackend;
pub use schema::{EntitySchema, PropertyDefinition, PropertyPick};
pub use snapshot::Snapshot;
