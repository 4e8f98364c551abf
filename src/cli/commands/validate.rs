//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Obscura configuration file and its anonymizer definitions.

use crate::config::load_config;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let registry = match config.build_registry() {
            Ok(registry) => registry,
            Err(e) => {
                println!("❌ Anonymizer definitions are invalid");
                println!("   Error: {e}");
                println!();
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!("  Dataset: {}", config.dataset.path.display());
        println!("  Output: {}", config.dataset.output_path().display());
        println!("  Chunk Size: {}", config.anonymization.chunk_size);
        println!(
            "  Base Encryption Key: {}",
            match &config.anonymization.base_encryption_key {
                Some(key) => format!("configured (fingerprint {})", key.expose_secret().fingerprint()),
                None => "not configured".to_string(),
            }
        );
        println!(
            "  Audit Journal: {}",
            if config.anonymization.audit.enabled {
                config.anonymization.audit.log_path.display().to_string()
            } else {
                "disabled".to_string()
            }
        );
        println!("  Entity Schemas: {}", config.entities.len());
        println!("  Anonymizers: {}", registry.len());
        for anonymizer in registry.iter() {
            println!(
                "    - {} ({:?}, {} fields, {} relations, reversible: {})",
                anonymizer.entity_type(),
                anonymizer.kind(),
                anonymizer.field_names().count(),
                anonymizer.relations().count(),
                anonymizer.options().reversible
            );
        }
        println!();
        Ok(0)
    }
}
