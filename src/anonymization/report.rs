//! Update reports
//!
//! Every root `update` call returns an [`UpdateReport`] describing what the
//! traversal did: objects visited, fields transformed per object, objects
//! deleted, history entries rewritten or deleted and skipped branches.
//! Reports never carry field values.

use super::engine::UpdateMode;
use crate::domain::{EntityType, ObjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields transformed on one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectUpdate {
    /// Entity type of the object
    pub entity_type: EntityType,
    /// Primary key of the object
    pub object_id: ObjectId,
    /// Transformed fields
    pub fields: Vec<String>,
}

/// Records removed by a delete anonymizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedObjects {
    /// Entity type deleted from
    pub entity_type: EntityType,
    /// Deleted object, `None` for a whole-collection delete
    pub object_id: Option<ObjectId>,
    /// Number of records removed, cascades included
    pub records_removed: usize,
}

/// Outcome of one root call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReport {
    /// Direction of the call
    pub mode: UpdateMode,

    /// Entity type of the root
    pub entity_type: EntityType,

    /// Root object, `None` for a whole-collection delete
    pub root: Option<ObjectId>,

    /// Number of distinct objects visited
    pub objects_visited: usize,

    /// Objects whose fields were transformed
    pub updated: Vec<ObjectUpdate>,

    /// Objects deleted
    pub deleted: Vec<DeletedObjects>,

    /// History entries rewritten
    pub history_rewritten: usize,

    /// History entries deleted
    pub history_deleted: usize,

    /// Skipped branches
    pub warnings: Vec<String>,

    /// Start of the call
    pub started_at: DateTime<Utc>,

    /// Duration of the call
    pub duration_ms: u64,
}

impl UpdateReport {
    /// Creates an empty report
    pub fn new(mode: UpdateMode, entity_type: EntityType, root: Option<ObjectId>) -> Self {
        Self {
            mode,
            entity_type,
            root,
            objects_visited: 0,
            updated: Vec::new(),
            deleted: Vec::new(),
            history_rewritten: 0,
            history_deleted: 0,
            warnings: Vec::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// Records transformed fields of one object
    pub fn add_update(&mut self, entity_type: &EntityType, object_id: &ObjectId, fields: Vec<String>) {
        if fields.is_empty() {
            return;
        }
        self.updated.push(ObjectUpdate {
            entity_type: entity_type.clone(),
            object_id: object_id.clone(),
            fields,
        });
    }

    /// Records a delete
    pub fn add_delete(
        &mut self,
        entity_type: &EntityType,
        object_id: Option<&ObjectId>,
        records_removed: usize,
    ) {
        self.deleted.push(DeletedObjects {
            entity_type: entity_type.clone(),
            object_id: object_id.cloned(),
            records_removed,
        });
    }

    /// Adds a warning
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Total number of transformed fields
    pub fn fields_changed(&self) -> usize {
        self.updated.iter().map(|u| u.fields.len()).sum()
    }

    /// Total number of records removed
    pub fn records_removed(&self) -> usize {
        self.deleted.iter().map(|d| d.records_removed).sum()
    }

    /// Fields transformed on one object
    pub fn fields_of(&self, entity_type: &EntityType, object_id: &ObjectId) -> Option<&[String]> {
        self.updated
            .iter()
            .find(|u| &u.entity_type == entity_type && &u.object_id == object_id)
            .map(|u| u.fields.as_slice())
    }

    /// Whether the call changed nothing
    pub fn is_noop(&self) -> bool {
        self.updated.is_empty()
            && self.deleted.is_empty()
            && self.history_rewritten == 0
            && self.history_deleted == 0
    }

    /// Format report for console output
    pub fn format_console(&self) -> String {
        let mut output = String::new();
        let root = self
            .root
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "(collection)".to_string());

        output.push('\n');
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push_str("                      ANONYMIZATION REPORT                     \n");
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push('\n');

        output.push_str("📊 SUMMARY\n");
        output.push_str("───────────────────────────────────────────────────────────────\n");
        output.push_str(&format!("  Mode:                {}\n", self.mode));
        output.push_str(&format!("  Root:                {} {}\n", self.entity_type, root));
        output.push_str(&format!("  Objects Visited:     {}\n", self.objects_visited));
        output.push_str(&format!("  Fields Changed:      {}\n", self.fields_changed()));
        output.push_str(&format!("  Records Removed:     {}\n", self.records_removed()));
        output.push_str(&format!("  History Rewritten:   {}\n", self.history_rewritten));
        output.push_str(&format!("  History Deleted:     {}\n", self.history_deleted));
        output.push_str(&format!("  Duration:            {} ms\n", self.duration_ms));
        output.push('\n');

        if !self.updated.is_empty() {
            output.push_str("🔒 UPDATED OBJECTS\n");
            output.push_str("───────────────────────────────────────────────────────────────\n");
            for update in &self.updated {
                output.push_str(&format!(
                    "  {} {}: {}\n",
                    update.entity_type,
                    update.object_id,
                    update.fields.join(", ")
                ));
            }
            output.push('\n');
        }

        if !self.deleted.is_empty() {
            output.push_str("🗑️  DELETED OBJECTS\n");
            output.push_str("───────────────────────────────────────────────────────────────\n");
            for deleted in &self.deleted {
                let target = deleted
                    .object_id
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "(collection)".to_string());
                output.push_str(&format!(
                    "  {} {}: {} record(s)\n",
                    deleted.entity_type, target, deleted.records_removed
                ));
            }
            output.push('\n');
        }

        if !self.warnings.is_empty() {
            output.push_str("⚠️  WARNINGS\n");
            output.push_str("───────────────────────────────────────────────────────────────\n");
            for warning in &self.warnings {
                output.push_str(&format!("  • {}\n", warning));
            }
            output.push('\n');
        }

        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push('\n');

        output
    }

    /// Format report as JSON
    pub fn format_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> EntityType {
        EntityType::new("shop.customer").unwrap()
    }

    #[test]
    fn test_report_creation() {
        let report = UpdateReport::new(UpdateMode::Anonymize, customer(), Some(ObjectId::Int(1)));
        assert!(report.is_noop());
        assert_eq!(report.fields_changed(), 0);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_empty_updates_are_not_recorded() {
        let mut report = UpdateReport::new(UpdateMode::Anonymize, customer(), Some(ObjectId::Int(1)));
        report.add_update(&customer(), &ObjectId::Int(1), Vec::new());
        assert!(report.updated.is_empty());
    }

    #[test]
    fn test_totals() {
        let mut report = UpdateReport::new(UpdateMode::Anonymize, customer(), Some(ObjectId::Int(1)));
        report.add_update(
            &customer(),
            &ObjectId::Int(1),
            vec!["first_name".to_string(), "last_name".to_string()],
        );
        report.add_delete(&customer(), Some(&ObjectId::Int(2)), 3);

        assert_eq!(report.fields_changed(), 2);
        assert_eq!(report.records_removed(), 3);
        assert_eq!(
            report.fields_of(&customer(), &ObjectId::Int(1)),
            Some(&["first_name".to_string(), "last_name".to_string()][..])
        );
        assert!(!report.is_noop());
    }

    #[test]
    fn test_format_console() {
        let mut report = UpdateReport::new(UpdateMode::Deanonymize, customer(), Some(ObjectId::Int(7)));
        report.objects_visited = 3;
        report.add_warning("skipped nickname".to_string());

        let output = report.format_console();
        assert!(output.contains("ANONYMIZATION REPORT"));
        assert!(output.contains("Mode:                deanonymize"));
        assert!(output.contains("Objects Visited:     3"));
        assert!(output.contains("skipped nickname"));
    }

    #[test]
    fn test_format_json() {
        let report = UpdateReport::new(UpdateMode::Anonymize, customer(), None);
        let json = report.format_json().unwrap();
        assert!(json.contains("\"mode\": \"anonymize\""));
        assert!(json.contains("\"root\": null"));
    }
}
