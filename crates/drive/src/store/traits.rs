//! Object store trait definitions

use std::path::Path;

use crate::error::StoreError;
use crate::models::{FileHandle, FolderId};

/// Folder-scoped remote file storage
///
/// The store is the durable record of what has already been uploaded.
/// Authentication and token refresh are the implementation's concern;
/// callers only observe success or a tagged [`StoreError`].
pub trait ObjectStore: Send + Sync {
    /// Check whether a file with this name exists in the folder
    fn exists(&self, folder: &FolderId, name: &str) -> Result<bool, StoreError>;

    /// Upload the content at `content` as a new file named `name`
    fn create(&self, folder: &FolderId, name: &str, content: &Path)
    -> Result<FileHandle, StoreError>;

    /// List every file currently in the folder
    fn list(&self, folder: &FolderId) -> Result<Vec<FileHandle>, StoreError>;
}
