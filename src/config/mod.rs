//! Configuration management for Obscura.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Obscura uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `OBSCURA_*` environment overrides
//! - Default values for optional settings
//! - Declarative entity schemas and anonymizer definitions
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use obscura::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("obscura.toml")?;
//!
//! println!("Dataset: {}", config.dataset.path.display());
//! println!("Anonymizers: {}", config.anonymizers.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run switch
//! - [`AnonymizationConfig`](crate::anonymization::AnonymizationConfig) - Secrets, chunk size, audit journal
//! - [`LoggingConfig`] - Local file logging
//! - [`DatasetConfig`] - Snapshot read and written by the CLI
//! - `[[entities]]` - Relations and computed properties of each entity type
//! - `[[anonymizers]]` - Model anonymizer definitions
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [anonymization]
//! global_secret = "${OBSCURA_GLOBAL_SECRET}"
//! base_encryption_key = "${OBSCURA_BASE_KEY}"
//! chunk_size = 10000
//!
//! [dataset]
//! path = "./data/shop.json"
//!
//! [[anonymizers]]
//! entity_type = "shop.customer"
//!
//! [anonymizers.fields.first_name]
//! type = "text"
//! ```
//!
//! Secrets are held as [`SecretString`] and never logged.

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{ApplicationConfig, DatasetConfig, LoggingConfig, ObscuraConfig};
pub use secret::{secret_string, SecretString, SecretValue};
