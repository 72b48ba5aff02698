//! Remote source reached through a command execution proxy

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::FileSource;
use crate::error::SourceError;
use crate::models::FileEntry;
use crate::runpod::{CommandExecutor, shell_quote};

/// Lists and downloads files on another host by running shell commands
pub struct RemoteFileSource {
    executor: Arc<dyn CommandExecutor>,
}

impl RemoteFileSource {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }
}

impl FileSource for RemoteFileSource {
    fn list_candidates(&self, location: &Path) -> Result<Vec<FileEntry>, SourceError> {
        let dir = location.to_string_lossy();
        let command = format!("ls -la --time-style=+%s {}", shell_quote(&dir));
        let result = self.executor.execute(&command)?;

        if !result.is_success() {
            let text = result.error_text();
            if text.contains("No such file or directory") {
                return Err(SourceError::NotFound(dir.into_owned()));
            }
            return Err(SourceError::Unreachable(format!(
                "listing {} failed: {}",
                dir, text
            )));
        }

        Ok(parse_listing(&dir, &result.output))
    }

    fn fetch(&self, entry: &FileEntry, staging: &Path) -> Result<PathBuf, SourceError> {
        let read_error = |reason: String| SourceError::Read {
            path: entry.path.clone(),
            reason,
        };

        let result = self
            .executor
            .execute(&format!("base64 {}", shell_quote(&entry.path)))?;
        if !result.is_success() {
            let text = result.error_text();
            if FILE_ERRORS.iter().any(|marker| text.contains(marker)) {
                return Err(read_error(text.to_string()));
            }
            return Err(SourceError::Unreachable(format!(
                "reading {} failed: {}",
                entry.path, text
            )));
        }

        let encoded: String = result
            .output
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| read_error(format!("invalid base64 payload: {}", e)))?;

        let local = staging.join(&entry.name);
        std::fs::write(&local, bytes)
            .map_err(|e| read_error(format!("cannot stage {}: {}", local.display(), e)))?;
        Ok(local)
    }
}

/// Command output that means the file itself is the problem
const FILE_ERRORS: [&str; 3] = [
    "No such file or directory",
    "Permission denied",
    "Is a directory",
];

/// Fields before the name in `ls -la --time-style=+%s` output
const LISTING_FIELDS: usize = 6;

/// Parse `ls -la --time-style=+%s` output into regular-file entries
///
/// Line layout: `perms links owner group size epoch name`. The name is the
/// rest of the line verbatim, so runs of spaces inside it survive.
fn parse_listing(dir: &str, output: &str) -> Vec<FileEntry> {
    let dir = dir.trim_end_matches('/');
    let mut entries = Vec::new();

    for line in output.lines() {
        let Some((fields, name)) = split_listing_line(line) else {
            continue;
        };
        if !fields[0].starts_with('-') || name == "." || name == ".." {
            continue;
        }

        let timestamp = fields[5]
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
        if timestamp.is_none() {
            debug!("Unparseable timestamp in listing line: {}", line);
        }

        entries.push(FileEntry::from_path(format!("{}/{}", dir, name), timestamp));
    }

    entries
}

/// Split off the fixed leading fields, returning them and the untouched name
fn split_listing_line(line: &str) -> Option<([&str; LISTING_FIELDS], &str)> {
    let mut fields = [""; LISTING_FIELDS];
    let mut rest = line.trim_start();
    for field in fields.iter_mut() {
        let end = rest.find(char::is_whitespace)?;
        *field = &rest[..end];
        rest = rest[end..].trim_start();
    }
    let name = rest.trim_end_matches('\r');
    if name.is_empty() {
        return None;
    }
    Some((fields, name))
}
