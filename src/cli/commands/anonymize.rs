//! Anonymize command implementation
//!
//! This module implements the `anonymize` command: load the dataset snapshot,
//! run the bulk anonymization jobs and write the resulting snapshot.

use crate::adapters::database::Backend;
use crate::adapters::memory::{MemoryBackend, Snapshot};
use crate::anonymization::engine::AnonymizationEngine;
use crate::anonymization::registry::install_global;
use crate::config::load_config;
use crate::core::bulk::{BulkAnonymizer, BulkOptions, BulkSummary};
use crate::domain::EntityType;
use anyhow::Context;
use clap::Args;
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the anonymize command
#[derive(Args, Debug)]
pub struct AnonymizeArgs {
    /// Restrict to entity type(s) (comma-separated, e.g. shop.customer,shop.account)
    #[arg(long)]
    pub types: Option<String>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Dry run mode - anonymize in memory without writing the dataset or journal
    #[arg(long)]
    pub dry_run: bool,

    /// Write the anonymized dataset here instead of the configured output
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl AnonymizeArgs {
    /// Parse the `--types` filter
    pub fn entity_types(&self) -> Result<Option<Vec<EntityType>>, String> {
        let Some(types) = &self.types else {
            return Ok(None);
        };
        types
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(EntityType::new)
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Execute the anonymize command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting anonymize command");

        let config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Configuration validation failed");
                eprintln!("Configuration validation failed: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let types = match self.entity_types() {
            Ok(types) => types,
            Err(e) => {
                eprintln!("Invalid --types value: {e}");
                return Ok(2);
            }
        };

        let dry_run = self.dry_run || config.application.dry_run;
        if dry_run {
            tracing::info!("Dry run mode enabled - the dataset will not be written");
            println!("🔍 DRY RUN MODE - The dataset and journal will not be written");
            println!();
        }

        let snapshot = match Snapshot::load(&config.dataset.path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load dataset");
                eprintln!("Failed to load dataset: {e}");
                return Ok(4); // Dataset error exit code
            }
        };

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| config.dataset.output_path().to_path_buf());

        // Confirmation prompt (unless --yes or dry-run)
        if !self.yes && !dry_run {
            println!("Anonymization Configuration:");
            println!("  Dataset: {}", config.dataset.path.display());
            println!("  Output: {}", output.display());
            println!(
                "  Types: {}",
                match &types {
                    Some(types) => types
                        .iter()
                        .map(EntityType::as_str)
                        .collect::<Vec<_>>()
                        .join(", "),
                    None => "All registered".to_string(),
                }
            );
            println!("  Records: {}", snapshot.records.len());
            println!("  Chunk size: {}", config.anonymization.chunk_size);
            println!();
            print!("Proceed with anonymization? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Anonymization cancelled.");
                return Ok(0);
            }
        }

        let registry = install_global(config.build_registry()?)?;
        tracing::info!(anonymizers = registry.len(), "Anonymizer registry installed");

        let backend = Arc::new(MemoryBackend::with_schemas(config.entities.clone()));
        backend.restore(snapshot)?;

        let global_secret = config
            .anonymization
            .global_secret
            .clone()
            .context("anonymization.global_secret is not configured")?;
        let mut engine =
            AnonymizationEngine::from_global(Backend::from_shared(backend.clone()), global_secret)?;
        if let Some(key) = config.anonymization.base_encryption_key.clone() {
            tracing::info!(
                key_fingerprint = %key.expose_secret().fingerprint(),
                "Base encryption key configured"
            );
            engine = engine.with_base_key(key);
        }
        if !dry_run {
            if let Some(journal) = config.anonymization.build_journal()? {
                engine = engine.with_journal(journal);
            }
        }

        println!("🚀 Starting anonymization...");
        println!();

        let bulk = BulkAnonymizer::new(Arc::new(engine));
        let options = BulkOptions::new().with_shutdown(shutdown_signal);
        let result = tokio::task::spawn_blocking(move || bulk.run_all(types.as_deref(), &options))
            .await
            .context("Bulk anonymization task panicked")?;

        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Anonymization failed");
                eprintln!("Anonymization failed: {e}");
                return Ok(5); // Fatal error exit code
            }
        };

        print_summary(&summary);

        if !dry_run {
            backend
                .snapshot()?
                .save(&output)
                .with_context(|| format!("Failed to write dataset {}", output.display()))?;
            println!("💾 Dataset written to {}", output.display());
            println!();
        }

        let exit_code = if summary.interrupted {
            println!("⚠️  Anonymization interrupted gracefully. Completed batches were kept.");
            println!("   Run the same command again to continue; anonymized fields are skipped.");
            println!();
            tracing::info!("Anonymization interrupted by user signal");
            130 // SIGINT exit code (standard Unix convention)
        } else if summary.is_successful() {
            println!("✅ Anonymization completed successfully!");
            0
        } else {
            println!("⚠️  Anonymization completed with failures");
            1 // Partial success
        };

        Ok(exit_code)
    }
}

fn print_summary(summary: &BulkSummary) {
    println!();
    println!("📊 Anonymization Summary:");
    for run in &summary.runs {
        println!(
            "  {}: {} processed, {} updated, {} fields, {} removed, {} errors",
            run.entity_type(),
            run.checkpoint.processed,
            run.objects_updated,
            run.fields_changed,
            run.records_removed,
            run.errors.len()
        );
    }
    println!("  Total Processed: {}", summary.total_processed());
    println!("  Fields Changed: {}", summary.total_fields_changed());
    println!("  Records Removed: {}", summary.total_records_removed());
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!();

    if summary.total_errors() > 0 {
        println!("⚠️  Errors encountered:");
        for run in &summary.runs {
            for error in run.errors.iter().take(10) {
                println!("  - {} {}: {}", run.entity_type(), error.object_id, error.message);
            }
            if run.errors.len() > 10 {
                println!("    ... and {} more errors", run.errors.len() - 10);
            }
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(types: Option<&str>) -> AnonymizeArgs {
        AnonymizeArgs {
            types: types.map(str::to_string),
            yes: true,
            dry_run: false,
            output: None,
        }
    }

    #[test]
    fn test_entity_types_none() {
        assert_eq!(args(None).entity_types().unwrap(), None);
    }

    #[test]
    fn test_entity_types_parsed() {
        let types = args(Some("shop.customer, Shop.Account,")).entity_types().unwrap().unwrap();
        assert_eq!(
            types,
            vec![
                EntityType::new("shop.customer").unwrap(),
                EntityType::new("shop.account").unwrap()
            ]
        );
    }

    #[test]
    fn test_entity_types_invalid() {
        assert!(args(Some("shop customer")).entity_types().is_err());
    }
}
