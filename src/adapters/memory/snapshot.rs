//! Dataset snapshots
//!
//! A snapshot is the full contents of a [`MemoryBackend`](super::MemoryBackend)
//! as one JSON document. The CLI loads the dataset from a snapshot, runs the
//! anonymization jobs against it and writes the result back out.

use crate::domain::{AnonymizedData, HistoryEntry, ObscuraError, Record, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Serialized contents of an in-memory backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Records of every entity type
    #[serde(default)]
    pub records: Vec<Record>,

    /// Anonymization markers
    #[serde(default)]
    pub markers: Vec<AnonymizedData>,

    /// Change history
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Snapshot {
    /// Read a snapshot from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ObscuraError::Io(format!(
                "Failed to read dataset {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            ObscuraError::Serialization(format!(
                "Failed to parse dataset {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Write the snapshot as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntityType;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("dataset.json");

        let snapshot = Snapshot {
            records: vec![Record::new(EntityType::new("shop.customer").unwrap(), 1)
                .with("first_name", "Ada")],
            ..Snapshot::default()
        };
        snapshot.save(&path).unwrap();

        let loaded = Snapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Snapshot::load(Path::new("/nonexistent/dataset.json"));
        assert!(matches!(result, Err(ObscuraError::Io(_))));
    }

    #[test]
    fn test_load_defaults_sections() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dataset.json");
        fs::write(&path, r#"{"records": []}"#).unwrap();

        let loaded = Snapshot::load(&path).unwrap();
        assert!(loaded.markers.is_empty());
        assert!(loaded.history.is_empty());
    }
}
