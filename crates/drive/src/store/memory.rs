//! In-memory object store
//!
//! Used by tests and dry runs. Folders must be registered before use so
//! that a wrong folder id behaves like it does against the real store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::ObjectStore;
use crate::error::StoreError;
use crate::models::{FileHandle, FolderId};

/// In-memory implementation of ObjectStore
///
/// Folder contents live in a HashMap protected by a RwLock. Call counts
/// are tracked so tests can assert which remote calls were made.
pub struct InMemoryObjectStore {
    folders: RwLock<HashMap<String, Vec<FileHandle>>>,
    contents: RwLock<HashMap<String, Vec<u8>>>,
    next_id: AtomicU64,
    exists_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl InMemoryObjectStore {
    /// Create a store with no folders
    pub fn new() -> Self {
        Self {
            folders: RwLock::new(HashMap::new()),
            contents: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            exists_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Create a store with a single empty folder
    pub fn with_folder(folder: &FolderId) -> Self {
        let store = Self::new();
        store.add_folder(folder);
        store
    }

    /// Register an empty folder
    pub fn add_folder(&self, folder: &FolderId) {
        let mut folders = self.folders.write().unwrap();
        folders.entry(folder.0.clone()).or_default();
    }

    /// Place a file in a folder without going through `create`
    pub fn seed(&self, folder: &FolderId, name: &str, data: &[u8]) -> FileHandle {
        let handle = FileHandle::new(self.allocate_id(), name, folder.clone());
        self.contents
            .write()
            .unwrap()
            .insert(handle.id.clone(), data.to_vec());
        self.folders
            .write()
            .unwrap()
            .entry(folder.0.clone())
            .or_default()
            .push(handle.clone());
        handle
    }

    /// Names currently in a folder, in insertion order
    pub fn names(&self, folder: &FolderId) -> Vec<String> {
        let folders = self.folders.read().unwrap();
        folders
            .get(&folder.0)
            .map(|files| files.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Stored bytes for a file, looked up by name
    pub fn content(&self, folder: &FolderId, name: &str) -> Option<Vec<u8>> {
        let folders = self.folders.read().unwrap();
        let handle = folders.get(&folder.0)?.iter().find(|f| f.name == name)?;
        self.contents.read().unwrap().get(&handle.id).cloned()
    }

    /// Number of `exists` calls made so far
    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    /// Number of `create` calls made so far
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    fn allocate_id(&self) -> String {
        format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn exists(&self, folder: &FolderId, name: &str) -> Result<bool, StoreError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        let folders = self.folders.read().unwrap();
        let files = folders
            .get(&folder.0)
            .ok_or_else(|| StoreError::NotFound(format!("folder {}", folder)))?;
        Ok(files.iter().any(|f| f.name == name))
    }

    fn create(
        &self,
        folder: &FolderId,
        name: &str,
        content: &Path,
    ) -> Result<FileHandle, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let data = std::fs::read(content).map_err(|e| {
            StoreError::Permanent(format!("cannot read {}: {}", content.display(), e))
        })?;

        let mut folders = self.folders.write().unwrap();
        let files = folders
            .get_mut(&folder.0)
            .ok_or_else(|| StoreError::NotFound(format!("folder {}", folder)))?;
        if files.iter().any(|f| f.name == name) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }

        let handle = FileHandle::new(self.allocate_id(), name, folder.clone());
        files.push(handle.clone());
        self.contents
            .write()
            .unwrap()
            .insert(handle.id.clone(), data);
        Ok(handle)
    }

    fn list(&self, folder: &FolderId) -> Result<Vec<FileHandle>, StoreError> {
        let folders = self.folders.read().unwrap();
        folders
            .get(&folder.0)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("folder {}", folder)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_create_then_exists() {
        let dir = tempfile::tempdir().unwrap();
        let folder = FolderId::new("folder-1");
        let store = InMemoryObjectStore::with_folder(&folder);
        let path = write_file(dir.path(), "a.png", b"png-bytes");

        assert!(!store.exists(&folder, "a.png").unwrap());
        let handle = store.create(&folder, "a.png", &path).unwrap();
        assert_eq!(handle.name, "a.png");
        assert_eq!(handle.folder, folder);
        assert!(store.exists(&folder, "a.png").unwrap());
        assert_eq!(store.content(&folder, "a.png").unwrap(), b"png-bytes");
        assert_eq!(store.exists_calls(), 2);
        assert_eq!(store.create_calls(), 1);
    }

    #[test]
    fn test_create_duplicate_is_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let folder = FolderId::new("folder-1");
        let store = InMemoryObjectStore::with_folder(&folder);
        store.seed(&folder, "a.png", b"old");
        let path = write_file(dir.path(), "a.png", b"new");

        let err = store.create(&folder, "a.png", &path).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(store.content(&folder, "a.png").unwrap(), b"old");
    }

    #[test]
    fn test_unknown_folder_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new();
        let folder = FolderId::new("missing");
        let path = write_file(dir.path(), "a.png", b"x");

        assert!(matches!(
            store.exists(&folder, "a.png"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.create(&folder, "a.png", &path),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.list(&folder), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_list_returns_insertion_order() {
        let folder = FolderId::new("f");
        let store = InMemoryObjectStore::with_folder(&folder);
        store.seed(&folder, "b.png", b"");
        store.seed(&folder, "a.png", b"");

        let names: Vec<String> = store
            .list(&folder)
            .unwrap()
            .into_iter()
            .map(|h| h.name)
            .collect();
        assert_eq!(names, vec!["b.png", "a.png"]);
        assert_eq!(store.names(&folder), names);
    }
}
