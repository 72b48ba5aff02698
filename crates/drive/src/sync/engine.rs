//! Reconciliation engine
//!
//! Decides which observed files still need uploading and uploads them.
//! The destination store is checked before every upload, so a fresh
//! process never re-uploads what an earlier run already delivered. The
//! check and the upload are separate remote calls; a second writer to the
//! same folder could slip a duplicate in between. Deployments run one
//! sync process per destination folder.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use super::filter::{accepts_extension, passes_cutoff};
use super::{RetryPolicy, SyncLedger};
use crate::error::{ConfigError, StoreError, SyncError};
use crate::models::{FileEntry, FolderId, RecordState, SyncRecord};
use crate::settings::SyncConfig;
use crate::source::FileSource;
use crate::store::ObjectStore;

/// Prefix for the per-process staging directory
const STAGING_PREFIX: &str = "courier_staging_";

/// Statistics from one cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    /// Entries enumerated by the source
    pub discovered: usize,
    /// Dropped because the extension is not accepted
    pub filtered_extension: usize,
    /// Dropped because they are not newer than the cutoff
    pub filtered_cutoff: usize,
    /// Dropped because this process already synced them
    pub skipped_ledger: usize,
    /// Dropped because an earlier cycle rejected them for good
    pub skipped_rejected: usize,
    /// Dropped because the destination already has them
    pub skipped_remote: usize,
    /// Files uploaded this cycle
    pub uploaded: usize,
    /// Uploads rejected as duplicates by the store
    pub already_present: usize,
    /// Files that failed at any step
    pub failed: usize,
    pub duration_ms: u64,
}

/// Result of attempting one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadOutcome {
    Uploaded,
    AlreadyPresent,
    Failed,
}

/// Computes the per-cycle delta and uploads it
pub struct ReconciliationEngine {
    source: Arc<dyn FileSource>,
    store: Arc<dyn ObjectStore>,
    watch_dir: PathBuf,
    extensions: Vec<String>,
    folder: FolderId,
    since: Option<DateTime<Utc>>,
    retry: RetryPolicy,
    ledger: SyncLedger,
    staging: TempDir,
    pool: Option<rayon::ThreadPool>,
}

impl ReconciliationEngine {
    /// Build an engine, acquiring its staging directory
    ///
    /// Fails fast if no destination folder is configured.
    pub fn new(
        config: &SyncConfig,
        source: Arc<dyn FileSource>,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self, ConfigError> {
        let folder = config.require_folder_id()?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir()
            .map_err(ConfigError::Staging)?;
        info!("Created staging directory: {}", staging.path().display());

        let pool = if config.max_parallel_uploads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.max_parallel_uploads)
                .thread_name(|i| format!("courier-upload-{}", i))
                .build()
                .map_err(|e| ConfigError::WorkerPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            source,
            store,
            watch_dir: config.watch_dir.clone(),
            extensions: config.extensions.clone(),
            folder,
            since: config.since,
            retry: config.retry,
            ledger: SyncLedger::new(),
            staging,
            pool,
        })
    }

    pub fn folder(&self) -> &FolderId {
        &self.folder
    }

    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    pub fn ledger(&self) -> &SyncLedger {
        &self.ledger
    }

    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    /// Files that should be uploaded this cycle, in enumeration order
    pub fn compute_candidates(&self) -> Result<Vec<SyncRecord>, SyncError> {
        let mut stats = SyncStats::default();
        self.collect_candidates(&mut stats)
    }

    /// Run one cycle, returning how many files were uploaded
    ///
    /// Cycle-fatal errors (watched location missing, source unreachable)
    /// are logged and reported as zero uploads.
    pub fn sync_once(&self) -> usize {
        match self.run_cycle() {
            Ok(stats) => stats.uploaded,
            Err(e) => {
                error!("Sync cycle aborted: {}", e);
                0
            }
        }
    }

    /// Run one cycle and report detailed statistics
    ///
    /// Per-file failures are counted, never returned. Only errors that make
    /// the whole cycle meaningless surface as `Err`.
    pub fn run_cycle(&self) -> Result<SyncStats, SyncError> {
        let start = std::time::Instant::now();
        let mut stats = SyncStats::default();

        info!("Checking for files in {}", self.watch_dir.display());
        let mut candidates = self.collect_candidates(&mut stats)?;
        info!("Found {} files to sync", candidates.len());

        let outcomes: Vec<UploadOutcome> = match &self.pool {
            Some(pool) => pool.install(|| {
                candidates
                    .par_iter_mut()
                    .map(|record| self.upload(record))
                    .collect()
            }),
            None => candidates
                .iter_mut()
                .map(|record| self.upload(record))
                .collect(),
        };

        for outcome in outcomes {
            match outcome {
                UploadOutcome::Uploaded => stats.uploaded += 1,
                UploadOutcome::AlreadyPresent => stats.already_present += 1,
                UploadOutcome::Failed => stats.failed += 1,
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Uploaded {} files ({} failed, {} already in destination) in {}ms",
            stats.uploaded,
            stats.failed,
            stats.skipped_remote + stats.already_present,
            stats.duration_ms
        );
        Ok(stats)
    }

    /// Release the staging directory, logging any cleanup failure
    pub fn shutdown(self) {
        let path = self.staging.path().to_path_buf();
        match self.staging.close() {
            Ok(()) => info!("Removed staging directory: {}", path.display()),
            Err(e) => warn!("Failed to remove staging directory {}: {}", path.display(), e),
        }
    }

    fn collect_candidates(&self, stats: &mut SyncStats) -> Result<Vec<SyncRecord>, SyncError> {
        let entries: Vec<FileEntry> = self.retry.run("list files", || {
            self.source.list_candidates(&self.watch_dir)
        })?;
        stats.discovered = entries.len();

        let mut candidates = Vec::new();
        for entry in entries {
            if !accepts_extension(&entry.extension, &self.extensions) {
                stats.filtered_extension += 1;
                continue;
            }
            if !passes_cutoff(entry.timestamp, self.since) {
                debug!("Skipping {}: not newer than cutoff", entry.name);
                stats.filtered_cutoff += 1;
                continue;
            }
            if self.ledger.contains(&entry.name) {
                stats.skipped_ledger += 1;
                continue;
            }
            if self.ledger.is_rejected(&entry.name) {
                stats.skipped_rejected += 1;
                continue;
            }

            let exists = self.retry.run("check destination", || {
                self.store.exists(&self.folder, &entry.name)
            });
            match exists {
                Ok(true) => {
                    info!("File {} already exists in destination, skipping", entry.name);
                    stats.skipped_remote += 1;
                }
                Ok(false) => candidates.push(SyncRecord::discovered(entry)),
                Err(e) => {
                    error!("Failed to check whether {} exists: {}", entry.name, e);
                    if e.rejects_file() {
                        self.reject(&entry.name);
                    }
                    stats.failed += 1;
                }
            }
        }

        Ok(candidates)
    }

    /// Fetch and upload one candidate, folding its name into the ledger on success
    fn upload(&self, record: &mut SyncRecord) -> UploadOutcome {
        record.mark(RecordState::Uploading);
        let entry = record.entry();

        let content = match self.retry.run("fetch content", || {
            self.source.fetch(&entry, self.staging.path())
        }) {
            Ok(path) => path,
            Err(e) => {
                error!("Failed to read {}: {}", entry.path, e);
                if e.rejects_file() {
                    self.reject(&record.name);
                }
                record.mark(RecordState::Failed);
                return UploadOutcome::Failed;
            }
        };

        info!("Uploading {}", record.name);
        let result = self.retry.run("upload", || {
            self.store.create(&self.folder, &record.name, &content)
        });
        self.discard_staged(&content);

        match result {
            Ok(handle) => {
                self.ledger.insert(&record.name);
                record.mark(RecordState::Synced);
                info!("Successfully uploaded {} (id {})", handle.name, handle.id);
                UploadOutcome::Uploaded
            }
            Err(StoreError::AlreadyExists(_)) => {
                self.ledger.insert(&record.name);
                record.mark(RecordState::Synced);
                info!("File {} already exists in destination", record.name);
                UploadOutcome::AlreadyPresent
            }
            Err(e) => {
                error!("Failed to upload {}: {}", record.name, e);
                if e.rejects_file() {
                    self.reject(&record.name);
                }
                record.mark(RecordState::Failed);
                UploadOutcome::Failed
            }
        }
    }

    fn reject(&self, name: &str) {
        if self.ledger.reject(name) {
            warn!(
                "Giving up on {} for the rest of this run ({} files given up so far)",
                name,
                self.ledger.rejected_len()
            );
        }
    }

    /// Remove a downloaded copy; original local files are left alone
    fn discard_staged(&self, content: &Path) {
        if content.starts_with(self.staging.path())
            && let Err(e) = std::fs::remove_file(content)
        {
            debug!("Could not remove staged file {}: {}", content.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::LocalFileSource;
    use crate::store::InMemoryObjectStore;

    fn config_for(dir: &Path) -> SyncConfig {
        SyncConfig {
            watch_dir: dir.to_path_buf(),
            folder_id: Some(FolderId::new("folder")),
            retry: RetryPolicy::none(),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_folder_id_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig {
            folder_id: None,
            ..config_for(dir.path())
        };
        let result = ReconciliationEngine::new(
            &config,
            Arc::new(LocalFileSource::new()),
            Arc::new(InMemoryObjectStore::new()),
        );
        assert!(matches!(result, Err(ConfigError::MissingFolderId)));
    }

    #[test]
    fn test_shutdown_removes_staging() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryObjectStore::with_folder(&FolderId::new("folder")));
        let engine =
            ReconciliationEngine::new(&config_for(dir.path()), Arc::new(LocalFileSource::new()), store)
                .unwrap();

        let staging = engine.staging_dir().to_path_buf();
        assert!(staging.is_dir());
        engine.shutdown();
        assert!(!staging.exists());
    }

    #[test]
    fn test_drop_removes_staging() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryObjectStore::with_folder(&FolderId::new("folder")));
        let engine =
            ReconciliationEngine::new(&config_for(dir.path()), Arc::new(LocalFileSource::new()), store)
                .unwrap();

        let staging = engine.staging_dir().to_path_buf();
        drop(engine);
        assert!(!staging.exists());
    }

    #[test]
    fn test_stats_count_each_filter() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.txt", "c.jpg", "d.png"] {
            std::fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }
        let folder = FolderId::new("folder");
        let store = Arc::new(InMemoryObjectStore::with_folder(&folder));
        store.seed(&folder, "c.jpg", b"already there");

        let engine = ReconciliationEngine::new(
            &config_for(dir.path()),
            Arc::new(LocalFileSource::new()),
            store.clone(),
        )
        .unwrap();

        let stats = engine.run_cycle().unwrap();
        assert_eq!(stats.discovered, 4);
        assert_eq!(stats.filtered_extension, 1);
        assert_eq!(stats.skipped_remote, 1);
        assert_eq!(stats.uploaded, 2);
        assert_eq!(stats.failed, 0);

        let stats = engine.run_cycle().unwrap();
        assert_eq!(stats.skipped_ledger, 2);
        assert_eq!(stats.uploaded, 0);
    }

    #[test]
    fn test_parallel_uploads_record_every_file() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..12 {
            std::fs::write(dir.path().join(format!("img_{:02}.png", i)), b"x").unwrap();
        }
        let folder = FolderId::new("folder");
        let store = Arc::new(InMemoryObjectStore::with_folder(&folder));
        let config = SyncConfig {
            max_parallel_uploads: 4,
            ..config_for(dir.path())
        };

        let engine =
            ReconciliationEngine::new(&config, Arc::new(LocalFileSource::new()), store.clone())
                .unwrap();
        assert_eq!(engine.sync_once(), 12);
        assert_eq!(engine.ledger().len(), 12);
        assert_eq!(store.names(&folder).len(), 12);
        assert_eq!(engine.sync_once(), 0);
    }
}
