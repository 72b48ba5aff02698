//! Command line surface

use clap::{Parser, ValueEnum};
use drive::{Overrides, SignInMode, SourceSettings};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "courier",
    version,
    about = "Upload new image outputs to a Google Drive folder"
)]
pub struct Cli {
    /// Destination Google Drive folder id
    #[arg(env = "GOOGLE_DRIVE_FOLDER_ID")]
    pub folder_id: Option<String>,

    /// Run a single sync cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Settings file (defaults to ~/.config/courier/config.json)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory to watch
    #[arg(long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Accepted extensions, comma separated
    #[arg(long, value_delimiter = ',', value_name = "EXT")]
    pub extensions: Option<Vec<String>>,

    /// Seconds to pause between cycles
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Only upload files created after startup
    #[arg(long)]
    pub only_new: bool,

    /// Maximum concurrent uploads
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..=64))]
    pub parallel: Option<u64>,

    /// Where the watched directory lives
    #[arg(long, value_enum)]
    pub source: Option<SourceKind>,

    /// RunPod pod that holds the watched directory
    #[arg(long, env = "RUNPOD_POD_ID")]
    pub pod_id: Option<String>,

    /// RunPod API key
    #[arg(long, env = "RUNPOD_API_KEY", hide_env_values = true)]
    pub runpod_api_key: Option<String>,

    /// Google OAuth client credentials file
    #[arg(long, value_name = "PATH")]
    pub credentials: Option<PathBuf>,

    /// Sign in by pasting the authorization code instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Print the destination folder's file names and exit
    #[arg(long)]
    pub list_remote: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Local,
    Runpod,
}

impl Cli {
    /// Values the user gave explicitly, for layering over the settings file
    pub fn overrides(&self) -> Overrides {
        Overrides {
            folder_id: self.folder_id.clone(),
            output_directory: self.dir.clone(),
            file_extensions: self.extensions.clone(),
            sync_interval_secs: self.interval,
            only_new_files: self.only_new.then_some(true),
            max_parallel_uploads: self.parallel.map(|n| n as usize),
            source: self.source.map(|kind| match kind {
                SourceKind::Local => SourceSettings::Local,
                SourceKind::Runpod => SourceSettings::Runpod { pod_id: None },
            }),
            pod_id: self.pod_id.clone(),
            credentials_file: self.credentials.clone(),
            sign_in: self.no_browser.then_some(SignInMode::Console),
            log_level: self.log_level.clone(),
            run_once: self.once,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let cli = Cli::try_parse_from(["courier", "abc123", "--once"]).unwrap();
        assert_eq!(cli.folder_id.as_deref(), Some("abc123"));
        assert!(cli.once);

        let overrides = cli.overrides();
        assert!(overrides.run_once);
        assert_eq!(overrides.only_new_files, None);
        assert_eq!(overrides.source, None);
        assert_eq!(overrides.sign_in, None);
    }

    #[test]
    fn test_no_browser_selects_console_sign_in() {
        let cli = Cli::try_parse_from(["courier", "f", "--no-browser"]).unwrap();
        assert_eq!(cli.overrides().sign_in, Some(SignInMode::Console));
    }

    #[test]
    fn test_extensions_split_on_comma() {
        let cli = Cli::try_parse_from(["courier", "f", "--extensions", ".png,.webp"]).unwrap();
        assert_eq!(
            cli.extensions,
            Some(vec![".png".to_string(), ".webp".to_string()])
        );
    }

    #[test]
    fn test_runpod_source_override() {
        let cli = Cli::try_parse_from([
            "courier", "f", "--source", "runpod", "--pod-id", "pod-1", "--only-new",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.source, Some(SourceSettings::Runpod { pod_id: None }));
        assert_eq!(overrides.pod_id.as_deref(), Some("pod-1"));
        assert_eq!(overrides.only_new_files, Some(true));
    }

    #[test]
    fn test_zero_parallel_rejected() {
        assert!(Cli::try_parse_from(["courier", "f", "--parallel", "0"]).is_err());
    }
}
