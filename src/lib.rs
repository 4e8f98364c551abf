// Obscura - Record anonymization driven by legal reasons
// Copyright (c) 2025 Obscura Contributors
// Licensed under the MIT License

//! # Obscura - record anonymization driven by legal reasons
//!
//! Obscura anonymizes personal data held in a relational record store at
//! field granularity, following relations between records, and can reverse
//! the process when the anonymization was keyed and reversible.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Anonymizing** chosen fields of a record and of related records
//! - **Deanonymizing** them again with the same keys
//! - **Deleting** records whose anonymizer removes them outright
//! - **Tracking** which fields are anonymized through per-field markers
//! - **Rewriting or purging** the change history of anonymized records
//! - **Bulk jobs** over whole entity types in resumable pk-ordered batches
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Bulk job orchestration
//! - [`anonymization`] - Field anonymizers, registry, traversal engine, journal
//! - [`adapters`] - Collaborator traits and the in-memory backend
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use obscura::adapters::database::Backend;
//! use obscura::adapters::memory::{MemoryBackend, Snapshot};
//! use obscura::anonymization::{AnonymizationEngine, UpdateRequest};
//! use obscura::config::ObscuraConfig;
//! use obscura::domain::{EntityType, ObjectId};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ObscuraConfig::from_file("obscura.toml")?;
//!     let registry = Arc::new(config.build_registry()?);
//!
//!     let backend = Arc::new(MemoryBackend::with_schemas(config.entities.clone()));
//!     backend.restore(Snapshot::load(&config.dataset.path)?)?;
//!
//!     let engine = AnonymizationEngine::new(
//!         registry,
//!         Backend::from_shared(backend),
//!         config.anonymization.global_secret.clone().ok_or("no global secret")?,
//!     )?;
//!
//!     let customer = EntityType::new("shop.customer")?;
//!     let report = engine.update_by_id(
//!         &customer,
//!         &ObjectId::Int(42),
//!         UpdateRequest::anonymize().base_key("per-job-key"),
//!     )?;
//!
//!     println!("{}", report.format_console());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! The library returns [`domain::ObscuraError`]; the binary wraps it with
//! `anyhow` context at the command boundary.
//!
//! ## Logging
//!
//! Obscura uses structured logging with the `tracing` crate. Entity types,
//! primary keys, field names and counts are logged; field values never are.

pub mod adapters;
pub mod anonymization;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
