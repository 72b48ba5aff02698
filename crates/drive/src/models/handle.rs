//! Destination-side identifiers

use serde::{Deserialize, Serialize};

/// Identifier of a destination folder (a Drive folder id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderId(pub String);

impl FolderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A folder id consisting only of whitespace is treated as unset
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for FolderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FolderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for FolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file as it exists in the destination store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    /// Store-assigned file id
    pub id: String,
    /// File name, unique within the folder for our purposes
    pub name: String,
    /// Folder the file lives in
    pub folder: FolderId,
}

impl FileHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>, folder: FolderId) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            folder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_folder_id() {
        assert!(FolderId::new("").is_blank());
        assert!(FolderId::new("   ").is_blank());
        assert!(!FolderId::new("1AbC").is_blank());
    }
}
