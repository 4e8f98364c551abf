//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console output with configurable log levels
//! - JSON-formatted local file logs with rotation
//!
//! Field values never reach the logs: the engine logs entity types, primary
//! keys, field names and counts only.
//!
//! # Example
//!
//! ```no_run
//! use obscura::logging::init_logging;
//! use obscura::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of a root update call
///
/// # Example
///
/// ```no_run
/// use obscura::log_update_start;
/// use obscura::domain::{EntityType, ObjectId};
///
/// let entity_type = EntityType::new("shop.customer").unwrap();
/// let object_id = ObjectId::Int(42);
/// log_update_start!(&entity_type, &object_id, "anonymize");
/// ```
#[macro_export]
macro_rules! log_update_start {
    ($entity_type:expr, $object_id:expr, $mode:expr) => {
        tracing::info!(
            entity_type = %$entity_type,
            object_id = %$object_id,
            mode = %$mode,
            "Starting update"
        );
    };
}

/// Log the completion of a root update call
///
/// # Example
///
/// ```no_run
/// use obscura::log_update_complete;
/// use std::time::Duration;
///
/// log_update_complete!(3, 7, Duration::from_millis(12));
/// ```
#[macro_export]
macro_rules! log_update_complete {
    ($objects:expr, $fields:expr, $duration:expr) => {
        tracing::info!(
            objects = $objects,
            fields = $fields,
            duration_ms = $duration.as_millis() as u64,
            "Update completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use obscura::log_error_with_context;
/// use obscura::domain::ObscuraError;
///
/// let error = ObscuraError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a bulk batch
///
/// # Example
///
/// ```no_run
/// use obscura::log_batch_processing;
///
/// log_batch_processing!(100, 1000);
/// ```
#[macro_export]
macro_rules! log_batch_processing {
    ($current:expr, $total:expr) => {
        tracing::info!(
            current = $current,
            total = $total,
            progress_pct = if $total == 0 {
                100.0
            } else {
                $current as f64 / $total as f64 * 100.0
            },
            "Processing batch"
        );
    };
}
