//! External system integrations for Obscura.
//!
//! - [`database`] - Collaborator traits (record store, schema, markers, history)
//! - [`memory`] - In-memory reference backend with JSON snapshots
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate the anonymization core
//! from the storage engine. The engine only sees the traits in [`database`];
//! the in-memory backend implements all of them and is what the CLI and the
//! test-suite run against.
//!
//! ```rust
//! use obscura::adapters::database::Backend;
//! use obscura::adapters::memory::MemoryBackend;
//! use std::sync::Arc;
//!
//! let backend = Backend::from_shared(Arc::new(MemoryBackend::new()));
//! ```

pub mod database;
pub mod memory;
