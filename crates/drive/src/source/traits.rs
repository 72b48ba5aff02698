//! File source trait definitions

use std::path::{Path, PathBuf};

use crate::error::SourceError;
use crate::models::FileEntry;

/// Enumerates candidate files in a watched location
pub trait FileSource: Send + Sync {
    /// List the entries directly under `location`
    ///
    /// Returns [`SourceError::NotFound`] if the location does not exist and
    /// [`SourceError::Unreachable`] if the source itself cannot be contacted.
    fn list_candidates(&self, location: &Path) -> Result<Vec<FileEntry>, SourceError>;

    /// Make an entry's content available as a local file
    ///
    /// Sources that have to download content write it into `staging` and
    /// return a path inside it; the caller removes such copies after use.
    fn fetch(&self, entry: &FileEntry, staging: &Path) -> Result<PathBuf, SourceError>;
}
