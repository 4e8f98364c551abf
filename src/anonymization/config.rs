//! Anonymization configuration

use super::audit::AuditLogger;
use super::model::DEFAULT_CHUNK_SIZE;
use crate::config::{secret_string, SecretString};
use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Minimum length of the global secret
pub const MIN_GLOBAL_SECRET_LEN: usize = 16;

/// Largest accepted bulk batch
pub const MAX_CHUNK_SIZE: usize = 1_000_000;

/// Anonymization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizationConfig {
    /// Process-wide secret mixed into every derived key
    #[serde(default)]
    pub global_secret: Option<SecretString>,

    /// Base key for reversible types without a per-model key source
    #[serde(default)]
    pub base_encryption_key: Option<SecretString>,

    /// Records per bulk batch
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Audit journal configuration
    #[serde(default)]
    pub audit: AuditConfig,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for AnonymizationConfig {
    fn default() -> Self {
        Self {
            global_secret: None,
            base_encryption_key: None,
            chunk_size: default_chunk_size(),
            audit: AuditConfig::default(),
        }
    }
}

impl AnonymizationConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let Some(secret) = &self.global_secret else {
            anyhow::bail!("anonymization.global_secret is required");
        };
        let len = secret.expose_secret().char_len();
        if len < MIN_GLOBAL_SECRET_LEN {
            anyhow::bail!(
                "anonymization.global_secret must be at least {} characters (got {})",
                MIN_GLOBAL_SECRET_LEN,
                len
            );
        }

        if let Some(key) = &self.base_encryption_key {
            if key.expose_secret().is_empty() {
                anyhow::bail!("anonymization.base_encryption_key cannot be empty when set");
            }
        }

        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            anyhow::bail!(
                "anonymization.chunk_size must be between 1 and {}",
                MAX_CHUNK_SIZE
            );
        }

        self.audit.validate().context("Invalid audit configuration")?;

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("OBSCURA_ANONYMIZATION_GLOBAL_SECRET") {
            self.global_secret = Some(secret_string(val));
        }

        if let Ok(val) = std::env::var("OBSCURA_ANONYMIZATION_BASE_ENCRYPTION_KEY") {
            self.base_encryption_key = Some(secret_string(val));
        }

        if let Ok(val) = std::env::var("OBSCURA_ANONYMIZATION_CHUNK_SIZE") {
            self.chunk_size = val
                .parse()
                .context("Invalid OBSCURA_ANONYMIZATION_CHUNK_SIZE value")?;
        }

        self.audit.apply_env_overrides()?;

        Ok(())
    }

    /// Journal described by the audit section, if enabled
    pub fn build_journal(&self) -> Result<Option<AuditLogger>> {
        if !self.audit.enabled {
            return Ok(None);
        }
        let logger = AuditLogger::new(self.audit.log_path.clone(), self.audit.json_format, true)
            .context("Failed to open audit journal")?;
        Ok(Some(logger))
    }
}

/// Audit journal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable the journal
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,

    /// Journal file path
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,

    /// Use JSON lines
    #[serde(default = "default_audit_json_format")]
    pub json_format: bool,
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("./audit/obscura.log")
}

fn default_audit_json_format() -> bool {
    true
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_log_path(),
            json_format: default_audit_json_format(),
        }
    }
}

impl AuditConfig {
    /// Validate audit configuration
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.log_path.as_os_str().is_empty() {
            anyhow::bail!("anonymization.audit.log_path cannot be empty when the journal is enabled");
        }
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("OBSCURA_ANONYMIZATION_AUDIT_ENABLED") {
            self.enabled = val
                .parse()
                .context("Invalid OBSCURA_ANONYMIZATION_AUDIT_ENABLED value")?;
        }

        if let Ok(val) = std::env::var("OBSCURA_ANONYMIZATION_AUDIT_LOG_PATH") {
            self.log_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("OBSCURA_ANONYMIZATION_AUDIT_JSON_FORMAT") {
            self.json_format = val
                .parse()
                .context("Invalid OBSCURA_ANONYMIZATION_AUDIT_JSON_FORMAT value")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_with_secret(secret: &str) -> AnonymizationConfig {
        AnonymizationConfig {
            global_secret: Some(secret_string(secret.to_string())),
            ..AnonymizationConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = AnonymizationConfig::default();
        assert!(config.global_secret.is_none());
        assert_eq!(config.chunk_size, 10_000);
        assert!(config.audit.enabled);
        assert!(config.audit.json_format);
    }

    #[test]
    fn test_global_secret_required() {
        let err = AnonymizationConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("global_secret"));
    }

    #[test]
    fn test_global_secret_min_length() {
        assert!(config_with_secret("too-short").validate().is_err());
        assert!(config_with_secret("sixteen-chars-ok").validate().is_ok());
    }

    #[test]
    fn test_chunk_size_bounds() {
        let mut config = config_with_secret("a-long-enough-secret");
        config.chunk_size = 0;
        assert!(config.validate().is_err());
        config.chunk_size = MAX_CHUNK_SIZE + 1;
        assert!(config.validate().is_err());
        config.chunk_size = 500;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: AnonymizationConfig = toml::from_str(
            r#"
global_secret = "a-long-enough-secret"

[audit]
enabled = false
"#,
        )
        .unwrap();

        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(!config.audit.enabled);
        assert!(config.audit.json_format);
        assert!(config.build_journal().unwrap().is_none());
    }

    #[test]
    fn test_build_journal() {
        let dir = tempdir().unwrap();
        let mut config = config_with_secret("a-long-enough-secret");
        config.audit.log_path = dir.path().join("audit").join("journal.log");

        let journal = config.build_journal().unwrap().unwrap();
        assert_eq!(journal.path(), config.audit.log_path.as_path());
    }
}
