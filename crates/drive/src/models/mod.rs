//! Domain models for sync entities

mod handle;
mod record;

pub use handle::{FileHandle, FolderId};
pub use record::{FileEntry, RecordState, SyncRecord};
