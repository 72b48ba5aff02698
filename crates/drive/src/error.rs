//! Error kinds for the sync pipeline
//!
//! Each collaborator reports a tagged error so retry logic can branch on
//! the kind of failure instead of inspecting messages.

use thiserror::Error;

/// Errors that can be retried with backoff report themselves as transient.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

/// Failures reported by an [`ObjectStore`](crate::store::ObjectStore)
#[derive(Debug, Error)]
pub enum StoreError {
    /// Credentials were rejected or could not be obtained
    #[error("authentication failed: {0}")]
    Auth(String),
    /// The destination folder (or file) does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// A file with the same name is already present in the folder
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// Network error, timeout or rate limiting
    #[error("transient store failure: {0}")]
    Transient(String),
    /// Anything else the store refused
    #[error("store rejected request: {0}")]
    Permanent(String),
}

impl Retryable for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl StoreError {
    /// True when the failure is about this file rather than the account,
    /// folder or network, so retrying it later cannot help
    pub fn rejects_file(&self) -> bool {
        matches!(self, StoreError::Permanent(_))
    }
}

/// Failures reported by a [`FileSource`](crate::source::FileSource)
#[derive(Debug, Error)]
pub enum SourceError {
    /// The watched location does not exist
    #[error("watched location not found: {0}")]
    NotFound(String),
    /// The source could not be reached at all (e.g. the remote host is down)
    #[error("file source unreachable: {0}")]
    Unreachable(String),
    /// The command proxy rejected our credentials
    #[error("file source rejected credentials: {0}")]
    Auth(String),
    /// The command proxy refused the request outright
    #[error("file source refused request: {0}")]
    Rejected(String),
    /// A single file's content could not be read
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },
}

impl Retryable for SourceError {
    fn is_transient(&self) -> bool {
        matches!(self, SourceError::Unreachable(_))
    }
}

impl SourceError {
    /// True when the failure is about this file's content
    pub fn rejects_file(&self) -> bool {
        matches!(self, SourceError::Read { .. })
    }
}

/// Startup errors raised while building the engine
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("destination folder id is not configured")]
    MissingFolderId,
    #[error("poll interval must be greater than zero")]
    InvalidInterval,
    #[error("failed to create staging directory")]
    Staging(#[source] std::io::Error),
    #[error("failed to start upload workers: {0}")]
    WorkerPool(String),
}

/// Errors that make a whole cycle meaningless
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_store_errors_retry() {
        assert!(StoreError::Transient("429".into()).is_transient());
        assert!(!StoreError::Auth("expired".into()).is_transient());
        assert!(!StoreError::NotFound("folder".into()).is_transient());
        assert!(!StoreError::AlreadyExists("a.png".into()).is_transient());
        assert!(!StoreError::Permanent("400".into()).is_transient());
    }

    #[test]
    fn test_only_permanent_store_errors_reject_the_file() {
        assert!(StoreError::Permanent("400".into()).rejects_file());
        assert!(!StoreError::Auth("401".into()).rejects_file());
        assert!(!StoreError::NotFound("folder".into()).rejects_file());
        assert!(!StoreError::Transient("503".into()).rejects_file());
    }

    #[test]
    fn test_only_unreachable_source_errors_retry() {
        assert!(SourceError::Unreachable("pod offline".into()).is_transient());
        assert!(!SourceError::NotFound("/out".into()).is_transient());
        let read = SourceError::Read {
            path: "/out/a.png".into(),
            reason: "permission denied".into(),
        };
        assert!(!read.is_transient());
        assert!(read.rejects_file());
        assert!(!SourceError::Auth("401".into()).is_transient());
        assert!(!SourceError::Auth("401".into()).rejects_file());
        assert!(!SourceError::Rejected("400".into()).is_transient());
        assert!(!SourceError::Unreachable("down".into()).rejects_file());
        assert_eq!(read.to_string(), "failed to read /out/a.png: permission denied");
    }
}
