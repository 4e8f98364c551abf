//! Journal of anonymization operations

use crate::anonymization::report::UpdateReport;
use crate::domain::{ObscuraError, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Journal entry of one root call
#[derive(Debug, Serialize)]
struct AuditLogEntry {
    timestamp: String,
    entity_type: String,
    /// SHA-256 of the root object id (never log raw identifiers)
    object_id_hash: Option<String>,
    mode: String,
    requested_fields: Vec<String>,
    objects_visited: usize,
    fields_changed: usize,
    records_removed: usize,
    history_rewritten: usize,
    history_deleted: usize,
    warnings: usize,
    processing_time_ms: u64,
}

/// Append-only journal of root update calls
///
/// One line per call; field values never reach the journal.
#[derive(Debug)]
pub struct AuditLogger {
    log_path: PathBuf,
    json_format: bool,
    enabled: bool,
}

impl AuditLogger {
    /// Create a new audit logger
    pub fn new(log_path: PathBuf, json_format: bool, enabled: bool) -> Result<Self> {
        if enabled {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ObscuraError::Io(format!(
                        "Failed to create audit log directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Ok(Self {
            log_path,
            json_format,
            enabled,
        })
    }

    /// Journal path
    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Log one root call
    pub fn log_update(&self, report: &UpdateReport, requested_fields: &[String]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let entry = AuditLogEntry {
            timestamp: report.started_at.to_rfc3339(),
            entity_type: report.entity_type.to_string(),
            object_id_hash: report.root.as_ref().map(|pk| self.hash_identifier(&pk.to_string())),
            mode: report.mode.to_string(),
            requested_fields: requested_fields.to_vec(),
            objects_visited: report.objects_visited,
            fields_changed: report.fields_changed(),
            records_removed: report.records_removed(),
            history_rewritten: report.history_rewritten,
            history_deleted: report.history_deleted,
            warnings: report.warnings.len(),
            processing_time_ms: report.duration_ms,
        };

        self.write_entry(&entry)
    }

    /// Hash an identifier using SHA-256
    fn hash_identifier(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        let result = hasher.finalize();
        format!("{result:x}")
    }

    /// Write an audit entry to the log file
    fn write_entry(&self, entry: &AuditLogEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| {
                ObscuraError::Io(format!(
                    "Failed to open audit log {}: {}",
                    self.log_path.display(),
                    e
                ))
            })?;

        if self.json_format {
            let json_line = serde_json::to_string(entry)?;
            writeln!(file, "{json_line}")?;
        } else {
            writeln!(
                file,
                "[{}] {} {} | Object: {} | Fields: {} | Changed: {} | Removed: {} | Time: {}ms",
                entry.timestamp,
                entry.mode,
                entry.entity_type,
                entry.object_id_hash.as_deref().unwrap_or("(collection)"),
                entry.requested_fields.join(","),
                entry.fields_changed,
                entry.records_removed,
                entry.processing_time_ms
            )?;
        }

        Ok(())
    }
}
