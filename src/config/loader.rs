//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::ObscuraConfig;
use crate::domain::errors::ObscuraError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into ObscuraConfig
/// 4. Applies environment variable overrides (OBSCURA_* prefix)
/// 5. Validates the configuration, including the anonymizer definitions
///
/// # Errors
///
/// Returns [`ObscuraError::Configuration`] if the file cannot be read or
/// parsed, a referenced environment variable is missing, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use obscura::config::loader::load_config;
///
/// let config = load_config("obscura.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<ObscuraConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ObscuraError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ObscuraError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: ObscuraConfig = toml::from_str(&contents)
        .map_err(|e| ObscuraError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        ObscuraError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| ObscuraError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(ObscuraError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Applies environment variable overrides using the OBSCURA_* prefix
///
/// Environment variables follow the pattern: OBSCURA_<SECTION>_<KEY>,
/// for example OBSCURA_APPLICATION_LOG_LEVEL or OBSCURA_DATASET_PATH.
fn apply_env_overrides(config: &mut ObscuraConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("OBSCURA_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("OBSCURA_APPLICATION_DRY_RUN") {
        config.application.dry_run = val.parse().unwrap_or(false);
    }

    // Anonymization overrides
    config
        .anonymization
        .apply_env_overrides()
        .map_err(|e| ObscuraError::Configuration(format!("{e:#}")))?;

    // Dataset overrides
    if let Ok(val) = std::env::var("OBSCURA_DATASET_PATH") {
        config.dataset.path = val.into();
    }
    if let Ok(val) = std::env::var("OBSCURA_DATASET_OUTPUT") {
        config.dataset.output = Some(val.into());
    }

    // Logging overrides
    if let Ok(val) = std::env::var("OBSCURA_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("OBSCURA_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("OBSCURA_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}
