//! Local filesystem source

use chrono::{DateTime, Utc};
use log::debug;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::FileSource;
use crate::error::SourceError;
use crate::models::FileEntry;

/// Lists regular files directly under a local directory
///
/// Content is uploaded straight from the original path, so nothing is
/// ever written to the staging directory.
#[derive(Debug, Default, Clone)]
pub struct LocalFileSource;

impl LocalFileSource {
    pub fn new() -> Self {
        Self
    }
}

impl FileSource for LocalFileSource {
    fn list_candidates(&self, location: &Path) -> Result<Vec<FileEntry>, SourceError> {
        if !location.is_dir() {
            return Err(SourceError::NotFound(location.display().to_string()));
        }

        let pattern = format!("{}/*", glob::Pattern::escape(&location.to_string_lossy()));

        let paths = glob::glob(&pattern)
            .map_err(|e| SourceError::Rejected(format!("invalid glob {}: {}", pattern, e)))?;

        let mut entries = Vec::new();
        for path in paths {
            let path = match path {
                Ok(path) => path,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            let metadata = match path.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };

            let timestamp = metadata
                .modified()
                .or_else(|_| metadata.created())
                .ok()
                .map(DateTime::<Utc>::from);

            entries.push(FileEntry::from_path(
                path.to_string_lossy().into_owned(),
                timestamp,
            ));
        }

        Ok(entries)
    }

    fn fetch(&self, entry: &FileEntry, _staging: &Path) -> Result<PathBuf, SourceError> {
        let path = PathBuf::from(&entry.path);
        // Open once so permission problems surface as a per-file read error
        File::open(&path).map_err(|e| SourceError::Read {
            path: entry.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(path)
    }
}
