//! Startup wiring for the sync process
//!
//! Everything that can fail before the first cycle fails here, so the
//! process exits non-zero instead of looping on a broken setup.

use anyhow::{Context, Result, bail};
use drive::{
    DriveAuth, DriveClient, FileSource, LocalFileSource, ObjectStore, ReconciliationEngine,
    RemoteFileSource, RunPodClient, SETTINGS_FILE, SettingsFile, SourceSettings, SyncConfig,
    SyncLoop,
};
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

use crate::cli::Cli;

/// Read the settings file, if any
///
/// An explicit path must exist; the default location is optional.
pub fn load_settings(explicit: Option<&Path>) -> Result<SettingsFile> {
    if let Some(path) = explicit {
        return config::load_json_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()));
    }

    if config::config_exists(SETTINGS_FILE) {
        return config::load_json(SETTINGS_FILE).context("Failed to load settings file");
    }

    Ok(SettingsFile::default())
}

/// Validate, authenticate and run until done or interrupted
pub fn run(cli: &Cli, config: SyncConfig) -> Result<()> {
    config.validate()?;
    let folder = config.require_folder_id()?;

    let client = Arc::new(connect_drive(&config)?);

    if cli.list_remote {
        let files = client
            .list(&folder)
            .with_context(|| format!("Failed to list folder {}", folder))?;
        for file in files {
            println!("{}", file.name);
        }
        return Ok(());
    }

    let source = build_source(cli, &config)?;
    let store: Arc<dyn ObjectStore> = client;
    let engine = ReconciliationEngine::new(&config, source, store)?;

    info!(
        "Syncing {} ({}) to Drive folder {}",
        config.watch_dir.display(),
        config.extensions.join(", "),
        folder
    );
    if let Some(since) = config.since {
        info!("Only files newer than {} will be uploaded", since);
    }

    let sync_loop = SyncLoop::new(engine, config.poll_interval);
    let stop = sync_loop.stop_signal();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, stopping after the current cycle...");
        stop.stop();
    }) {
        warn!("Failed to install interrupt handler: {}", e);
    }

    let summary = if config.run_once {
        sync_loop.run_once()
    } else {
        sync_loop.run()
    };
    info!(
        "Finished: {} cycles ({} failed), {} files uploaded",
        summary.cycles, summary.failed_cycles, summary.uploaded
    );
    Ok(())
}

/// Build the Drive client and make sure it holds a usable token
fn connect_drive(config: &SyncConfig) -> Result<DriveClient> {
    let creds = config
        .client
        .load()
        .context("Google OAuth client credentials not found")?;

    let auth = DriveAuth::new(creds, config.token_file.clone(), config.sign_in);
    if !auth.has_cached_token() {
        info!(
            "No Drive token at {}, starting {:?} sign-in",
            auth.token_path().display(),
            config.sign_in
        );
    }
    let client = DriveClient::new(auth);
    client
        .authenticate()
        .context("Failed to authenticate with Google Drive")?;
    info!("Google Drive client authenticated");
    Ok(client)
}

fn build_source(cli: &Cli, config: &SyncConfig) -> Result<Arc<dyn FileSource>> {
    match &config.source {
        SourceSettings::Local => Ok(Arc::new(LocalFileSource::new())),
        SourceSettings::Runpod { pod_id } => {
            let Some(pod_id) = pod_id else {
                bail!("RunPod source selected but no pod id configured (--pod-id or RUNPOD_POD_ID)");
            };
            let api_key = cli
                .runpod_api_key
                .clone()
                .context("RunPod source selected but RUNPOD_API_KEY is not set")?;
            let client = RunPodClient::new(api_key, pod_id.clone())?;
            info!("Reading files from RunPod pod {}", client.pod_id());
            Ok(Arc::new(RemoteFileSource::new(Arc::new(client))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_explicit_settings_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_settings(Some(&dir.path().join("missing.json"))).is_err());
    }

    #[test]
    fn test_load_explicit_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.json");
        std::fs::write(&path, r#"{"sync_interval_secs": 5, "only_new_files": true}"#).unwrap();

        let file = load_settings(Some(&path)).unwrap();
        assert_eq!(file.sync_interval_secs, Some(5));
        assert_eq!(file.only_new_files, Some(true));
    }

    #[test]
    fn test_runpod_source_requires_pod_id() {
        let cli = Cli::try_parse_from(["courier", "folder", "--runpod-api-key", "key"]).unwrap();
        let config = SyncConfig {
            source: SourceSettings::Runpod { pod_id: None },
            ..Default::default()
        };
        assert!(build_source(&cli, &config).is_err());
    }

    #[test]
    fn test_missing_client_file_fails_before_sign_in() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig {
            client: drive::ClientSource::File(dir.path().join("absent.json")),
            token_file: dir.path().join("token.json"),
            ..Default::default()
        };
        let err = connect_drive(&config).err().unwrap();
        assert!(err.to_string().contains("client credentials not found"));
        assert!(!dir.path().join("token.json").exists());
    }

    #[test]
    fn test_missing_folder_id_fails_before_auth() {
        let cli = Cli::try_parse_from(["courier", ""]).unwrap();
        let err = run(&cli, SyncConfig::default()).unwrap_err();
        assert!(err.to_string().contains("folder id"));
    }
}
