//! Files observed in the watched location and their progress through a cycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One entry enumerated by a file source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Identifier in the source namespace (local path or remote path string)
    pub path: String,
    /// Basename, used as the uniqueness key in the destination
    pub name: String,
    /// Lower-cased suffix including the leading dot, empty if none
    pub extension: String,
    /// Creation or modification time as observed by the source
    pub timestamp: Option<DateTime<Utc>>,
}

impl FileEntry {
    /// Build an entry from a path string, deriving name and extension
    pub fn from_path(path: impl Into<String>, timestamp: Option<DateTime<Utc>>) -> Self {
        let path = path.into();
        let as_path = Path::new(&path);
        let name = as_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        let extension = as_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();

        Self {
            path,
            name,
            extension,
            timestamp,
        }
    }
}

/// Where a record is in its per-cycle lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordState {
    Discovered,
    Uploading,
    Synced,
    Failed,
}

/// A file considered for sync during one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub path: String,
    pub name: String,
    pub extension: String,
    /// When this cycle first observed the file
    pub discovered_at: DateTime<Utc>,
    /// Timestamp reported by the source, if any
    pub observed_at: Option<DateTime<Utc>>,
    pub state: RecordState,
}

impl SyncRecord {
    /// Create a freshly discovered record from a source entry
    pub fn discovered(entry: FileEntry) -> Self {
        Self {
            path: entry.path,
            name: entry.name,
            extension: entry.extension,
            discovered_at: Utc::now(),
            observed_at: entry.timestamp,
            state: RecordState::Discovered,
        }
    }

    /// Source entry this record was built from
    pub fn entry(&self) -> FileEntry {
        FileEntry {
            path: self.path.clone(),
            name: self.name.clone(),
            extension: self.extension.clone(),
            timestamp: self.observed_at,
        }
    }

    pub fn mark(&mut self, state: RecordState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_from_local_path() {
        let entry = FileEntry::from_path("/workspace/output/ComfyUI_0001_.PNG", None);
        assert_eq!(entry.name, "ComfyUI_0001_.PNG");
        assert_eq!(entry.extension, ".png");
    }

    #[test]
    fn test_entry_without_extension() {
        let entry = FileEntry::from_path("/workspace/output/README", None);
        assert_eq!(entry.name, "README");
        assert_eq!(entry.extension, "");
    }

    #[test]
    fn test_entry_with_spaces_and_dots() {
        let entry = FileEntry::from_path("/out/my render.v2.jpeg", None);
        assert_eq!(entry.name, "my render.v2.jpeg");
        assert_eq!(entry.extension, ".jpeg");
    }

    #[test]
    fn test_record_starts_discovered() {
        let ts = Utc::now();
        let mut record = SyncRecord::discovered(FileEntry::from_path("/out/a.png", Some(ts)));
        assert_eq!(record.state, RecordState::Discovered);
        assert_eq!(record.observed_at, Some(ts));

        record.mark(RecordState::Uploading);
        record.mark(RecordState::Synced);
        assert_eq!(record.state, RecordState::Synced);
        assert_eq!(record.entry().path, "/out/a.png");
    }
}
