//! Drive crate - Business logic for syncing image output to Google Drive
//!
//! This crate provides the platform-independent sync machinery:
//! - Domain models (FolderId, FileEntry, SyncRecord)
//! - Google Drive API client and OAuth authentication
//! - File source and object store trait abstractions
//! - Local and RunPod-backed file sources
//! - Idempotent reconciliation engine and polling loop
//!
//! The binary crate only wires these together and owns the process.

pub mod config;
pub mod error;
pub mod gdrive;
pub mod models;
pub mod runpod;
pub mod settings;
pub mod source;
pub mod store;
pub mod sync;

pub use config::{ClientSource, GoogleCredentials};
pub use error::{ConfigError, Retryable, SourceError, StoreError, SyncError};
pub use gdrive::{DriveAuth, DriveClient, SignInMode};
pub use models::{FileEntry, FileHandle, FolderId, RecordState, SyncRecord};
pub use runpod::{CommandExecutor, CommandOutput, RunPodClient};
pub use settings::{Overrides, SETTINGS_FILE, SettingsFile, SourceSettings, SyncConfig};
pub use source::{FileSource, LocalFileSource, RemoteFileSource};
pub use store::{InMemoryObjectStore, ObjectStore};
pub use sync::{
    LoopState, LoopSummary, ReconciliationEngine, RetryPolicy, StopSignal, SyncLedger, SyncLoop,
    SyncStats, accepts_extension, passes_cutoff,
};
