//! The on-disk snapshot format and the persistence adapter around it.
//!
//! A whole table -- settings, statistics, columns and data -- serializes
//! as one JSON document. The reserved extension for snapshot files is
//! `.kiod`.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{KiodbError, Result};
use crate::schema::Column;

/// The reserved extension for snapshot files.
pub const SNAPSHOT_EXTENSION: &str = "kiod";

/// One document conforming to the current schema: a mapping from
/// column name to value.
pub type Record = Map<String, Value>;

/// Creation and edit timestamps for a table, in epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub created_at: i64,
    pub last_edit_at: i64,
    pub last_saved_at: i64,
}

impl Statistics {
    pub fn now() -> Self {
        let now = Utc::now().timestamp_millis();
        Statistics {
            created_at: now,
            last_edit_at: now,
            last_saved_at: now,
        }
    }
}

/// The serialized representation of a table at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Opaque passthrough settings; the engine never interprets these.
    #[serde(default)]
    pub settings: Map<String, Value>,
    pub statistics: Statistics,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub data: Vec<Record>,
}

impl Snapshot {
    /// An empty table with current timestamps.
    pub fn empty() -> Self {
        Snapshot {
            settings: Map::new(),
            statistics: Statistics::now(),
            columns: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Read a snapshot verbatim from disk.
    pub fn load(path: &Path) -> Result<Snapshot> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot = serde_json::from_str(&raw)?;
        log::debug!("Loaded snapshot from {}", path.display());
        Ok(snapshot)
    }

    /// Write the snapshot to disk, replacing any previous file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string(self)?;
        std::fs::write(path, raw)?;
        log::debug!("Saved snapshot to {}", path.display());
        Ok(())
    }
}

/// Whether a path is unusable as a file location: empty, or containing
/// characters no filesystem accepts in a file name once the root prefix
/// is stripped.
pub fn is_invalid_path(path: &str) -> bool {
    if path.is_empty() {
        return true;
    }
    let without_root = path.trim_start_matches('/');
    without_root
        .chars()
        .any(|c| matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*'))
}

/// Validate a snapshot location: the path must be well-formed and carry
/// the reserved `.kiod` extension.
pub fn validate_path(path: &str) -> Result<()> {
    if is_invalid_path(path) {
        return Err(KiodbError::InvalidPath(path.to_string()));
    }
    let has_extension = Path::new(path)
        .extension()
        .map(|ext| ext == SNAPSHOT_EXTENSION)
        .unwrap_or(false);
    if !has_extension {
        return Err(KiodbError::InvalidPath(format!(
            "{path}: must end with .{SNAPSHOT_EXTENSION}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::schema::ColumnType;

    #[test]
    fn test_empty_snapshot_timestamps() {
        let snapshot = Snapshot::empty();
        assert_eq!(
            snapshot.statistics.created_at,
            snapshot.statistics.last_edit_at
        );
        assert!(snapshot.columns.is_empty());
        assert!(snapshot.data.is_empty());
    }

    #[test]
    fn test_statistics_camel_case_on_disk() {
        let snapshot = Snapshot::empty();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["statistics"]["createdAt"].is_i64());
        assert!(json["statistics"]["lastEditAt"].is_i64());
        assert!(json["statistics"]["lastSavedAt"].is_i64());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("table.kiod");

        let mut snapshot = Snapshot::empty();
        snapshot
            .columns
            .push(Column::new("id", ColumnType::Number).with_unique(true));
        let mut record = Record::new();
        record.insert("id".into(), json!(1));
        snapshot.data.push(record);
        snapshot.settings.insert("theme".into(), json!("dark"));

        snapshot.save(&path).unwrap();
        let loaded = Snapshot::load(&path).unwrap();

        assert_eq!(loaded.columns.len(), 1);
        assert_eq!(loaded.columns[0].name, "id");
        assert!(loaded.columns[0].unique);
        assert_eq!(loaded.data, snapshot.data);
        assert_eq!(loaded.settings["theme"], json!("dark"));
        assert_eq!(
            loaded.statistics.created_at,
            snapshot.statistics.created_at
        );
    }

    #[test]
    fn test_load_tolerates_missing_optional_sections() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sparse.kiod");
        std::fs::write(
            &path,
            r#"{"statistics":{"createdAt":1,"lastEditAt":2,"lastSavedAt":3}}"#,
        )
        .unwrap();

        let loaded = Snapshot::load(&path).unwrap();
        assert!(loaded.columns.is_empty());
        assert!(loaded.data.is_empty());
        assert!(loaded.settings.is_empty());
    }

    #[test]
    fn test_is_invalid_path() {
        assert!(is_invalid_path(""));
        assert!(is_invalid_path("data<1>.kiod"));
        assert!(is_invalid_path("what?.kiod"));
        assert!(!is_invalid_path("data.kiod"));
        assert!(!is_invalid_path("/var/lib/app/data.kiod"));
        assert!(!is_invalid_path("nested/dir/data.kiod"));
    }

    #[test]
    fn test_validate_path_requires_extension() {
        assert!(validate_path("table.kiod").is_ok());
        assert!(matches!(
            validate_path("table.json"),
            Err(KiodbError::InvalidPath(_))
        ));
        assert!(matches!(
            validate_path("table"),
            Err(KiodbError::InvalidPath(_))
        ));
        assert!(matches!(validate_path(""), Err(KiodbError::InvalidPath(_))));
    }
}
