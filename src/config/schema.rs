//! Configuration schema types
//!
//! This module defines the configuration structure for Obscura.

use crate::adapters::memory::EntitySchema;
use crate::anonymization::config::AnonymizationConfig;
use crate::anonymization::definition::{build_registry, AnonymizerDefinition};
use crate::anonymization::registry::AnonymizerRegistry;
use crate::domain::Result as ObscuraResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Main Obscura configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObscuraConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Anonymization secrets, batching and journal
    #[serde(default)]
    pub anonymization: AnonymizationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Dataset processed by the CLI
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Schema reflection for the in-memory backend
    #[serde(default)]
    pub entities: Vec<EntitySchema>,

    /// Declarative model anonymizers
    #[serde(default)]
    pub anonymizers: Vec<AnonymizerDefinition>,
}

impl ObscuraConfig {
    /// Load, substitute, override and validate a configuration file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> ObscuraResult<Self> {
        super::loader::load_config(path)
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.anonymization
            .validate()
            .map_err(|e| format!("{e:#}"))?;
        self.logging.validate()?;
        self.dataset.validate()?;

        let mut seen = HashSet::new();
        for schema in &self.entities {
            if !seen.insert(&schema.entity_type) {
                return Err(format!(
                    "Entity type '{}' is declared more than once",
                    schema.entity_type
                ));
            }
            schema.validate()?;
        }

        self.build_registry().map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Registry of the declared anonymizers
    pub fn build_registry(&self) -> ObscuraResult<AnonymizerRegistry> {
        Ok(build_registry(&self.anonymizers, self.anonymization.chunk_size)?.build())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode (process the dataset without writing it back)
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// Dataset snapshot locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// JSON snapshot loaded into the in-memory backend
    #[serde(default = "default_dataset_path")]
    pub path: PathBuf,

    /// Where the processed snapshot is written (defaults to `path`)
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl DatasetConfig {
    fn validate(&self) -> Result<(), String> {
        if self.path.as_os_str().is_empty() {
            return Err("dataset.path cannot be empty".to_string());
        }
        Ok(())
    }

    /// Output path, falling back to the input path
    pub fn output_path(&self) -> &std::path::Path {
        self.output.as_deref().unwrap_or(&self.path)
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
            output: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when file logging is enabled".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("./dataset.json")
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    fn valid_config() -> ObscuraConfig {
        let mut config = ObscuraConfig::default();
        config.anonymization.global_secret = Some(secret_string("0123456789abcdef".to_string()));
        config
    }

    #[test]
    fn test_application_config_validation() {
        let mut config = ApplicationConfig {
            log_level: "info".to_string(),
            dry_run: false,
        };

        assert!(config.validate().is_ok());

        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(config.local_enabled);
        assert_eq!(config.local_path, "./logs");
        assert_eq!(config.local_rotation, "daily");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_logging_rotation_validation() {
        let config = LoggingConfig {
            local_rotation: "weekly".to_string(),
            ..LoggingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_requires_secret() {
        let err = ObscuraConfig::default().validate().unwrap_err();
        assert!(err.contains("global_secret"));
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_duplicate_entity_schema_rejected() {
        let mut config = valid_config();
        let schema = EntitySchema::new(crate::domain::EntityType::new("shop.customer").unwrap());
        config.entities = vec![schema.clone(), schema];
        assert!(config.validate().unwrap_err().contains("more than once"));
    }

    #[test]
    fn test_dataset_output_defaults_to_input() {
        let mut dataset = DatasetConfig::default();
        assert_eq!(dataset.output_path(), dataset.path.as_path());

        dataset.output = Some(PathBuf::from("out.json"));
        assert_eq!(dataset.output_path(), std::path::Path::new("out.json"));
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_local_rotation(), "daily");
        assert_eq!(default_dataset_path(), PathBuf::from("./dataset.json"));
    }
}
