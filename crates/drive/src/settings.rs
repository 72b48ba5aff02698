//! Sync settings
//!
//! Settings are layered with precedence: explicit CLI value, then the
//! settings file, then built-in defaults. The resolved [`SyncConfig`] is
//! built once at startup and handed to the engine and loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{ClientSource, GoogleCredentials};
use crate::error::ConfigError;
use crate::gdrive::{DEFAULT_TOKEN_FILE, SignInMode};
use crate::models::FolderId;
use crate::sync::RetryPolicy;

/// Settings filename in the Courier config directory
pub const SETTINGS_FILE: &str = "config.json";

const DEFAULT_OUTPUT_DIR: &str = "/workspace/ComfyUI/output";
const DEFAULT_EXTENSIONS: [&str; 3] = [".png", ".jpg", ".jpeg"];
const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Where candidate files come from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceSettings {
    /// The watched directory is on this machine
    #[default]
    Local,
    /// The watched directory is on a RunPod pod
    Runpod {
        #[serde(default)]
        pod_id: Option<String>,
    },
}

/// On-disk settings; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    pub output_directory: Option<PathBuf>,
    pub file_extensions: Option<Vec<String>>,
    pub folder_id: Option<String>,
    pub sync_interval_secs: Option<u64>,
    pub only_new_files: Option<bool>,
    pub max_parallel_uploads: Option<usize>,
    pub source: Option<SourceSettings>,
    /// OAuth client given inline instead of a client secrets file
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub token_file: Option<PathBuf>,
    pub sign_in: Option<SignInMode>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
}

/// Values given explicitly on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub folder_id: Option<String>,
    pub output_directory: Option<PathBuf>,
    pub file_extensions: Option<Vec<String>>,
    pub sync_interval_secs: Option<u64>,
    pub only_new_files: Option<bool>,
    pub max_parallel_uploads: Option<usize>,
    pub source: Option<SourceSettings>,
    pub pod_id: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub sign_in: Option<SignInMode>,
    pub log_level: Option<String>,
    pub run_once: bool,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub watch_dir: PathBuf,
    /// Lower-cased, each with a leading dot
    pub extensions: Vec<String>,
    pub folder_id: Option<FolderId>,
    pub poll_interval: Duration,
    /// Only files newer than this are considered
    pub since: Option<DateTime<Utc>>,
    pub run_once: bool,
    pub max_parallel_uploads: usize,
    pub source: SourceSettings,
    pub retry: RetryPolicy,
    pub client: ClientSource,
    /// Relative paths resolve against the working directory
    pub token_file: PathBuf,
    pub sign_in: SignInMode,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            folder_id: None,
            poll_interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            since: None,
            run_once: false,
            max_parallel_uploads: 1,
            source: SourceSettings::Local,
            retry: RetryPolicy::default(),
            client: ClientSource::Discover,
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            sign_in: SignInMode::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_file: None,
        }
    }
}

impl SyncConfig {
    /// Merge CLI overrides over the settings file over defaults
    ///
    /// `started_at` becomes the cutoff when only-new-files mode is on.
    pub fn resolve(file: SettingsFile, overrides: Overrides, started_at: DateTime<Utc>) -> Self {
        let defaults = Self::default();

        let extensions = overrides
            .file_extensions
            .or(file.file_extensions)
            .map(|exts| normalize_extensions(&exts))
            .unwrap_or(defaults.extensions);

        let folder_id = overrides
            .folder_id
            .or(file.folder_id)
            .map(FolderId::from)
            .filter(|f| !f.is_blank());

        let only_new = overrides
            .only_new_files
            .or(file.only_new_files)
            .unwrap_or(false);

        let file_pod = match &file.source {
            Some(SourceSettings::Runpod { pod_id }) => pod_id.clone(),
            _ => None,
        };
        let mut source = overrides.source.or(file.source).unwrap_or_default();
        if let SourceSettings::Runpod { pod_id } = &mut source {
            *pod_id = overrides.pod_id.or(pod_id.take()).or(file_pod);
        }

        let client = match overrides.credentials_file {
            Some(path) => ClientSource::File(path),
            None => GoogleCredentials::from_pair(
                file.client_id.as_deref(),
                file.client_secret.as_deref(),
            )
            .map(ClientSource::Inline)
            .or(file.credentials_file.map(ClientSource::File))
            .unwrap_or(ClientSource::Discover),
        };

        Self {
            watch_dir: overrides
                .output_directory
                .or(file.output_directory)
                .unwrap_or(defaults.watch_dir),
            extensions,
            folder_id,
            poll_interval: overrides
                .sync_interval_secs
                .or(file.sync_interval_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            since: only_new.then_some(started_at),
            run_once: overrides.run_once,
            max_parallel_uploads: overrides
                .max_parallel_uploads
                .or(file.max_parallel_uploads)
                .unwrap_or(defaults.max_parallel_uploads)
                .max(1),
            source,
            retry: defaults.retry,
            client,
            token_file: file.token_file.unwrap_or(defaults.token_file),
            sign_in: overrides.sign_in.or(file.sign_in).unwrap_or_default(),
            log_level: overrides
                .log_level
                .or(file.log_level)
                .unwrap_or(defaults.log_level),
            log_file: file.log_file,
        }
    }

    /// The destination folder, or a startup error if none is configured
    pub fn require_folder_id(&self) -> Result<FolderId, ConfigError> {
        self.folder_id.clone().ok_or(ConfigError::MissingFolderId)
    }

    /// Reject combinations the loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.require_folder_id()?;
        if !self.run_once && self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(())
    }
}

/// Lower-case an extension and ensure it has a leading dot
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

fn normalize_extensions(exts: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ext in exts {
        let ext = normalize_extension(ext);
        if !ext.is_empty() && !out.contains(&ext) {
            out.push(ext);
        }
    }
    out
}
