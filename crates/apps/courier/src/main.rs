//! Courier - Uploads new image outputs to Google Drive
//!
//! This is the main entry point for the courier sync process.

use chrono::Utc;
use clap::Parser;
use drive::SyncConfig;
use log::{error, warn};
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};

mod app;
mod cli;

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let started_at = Utc::now();

    let file = match app::load_settings(cli.config.as_deref()) {
        Ok(file) => file,
        Err(e) => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"), None);
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };
    let config = SyncConfig::resolve(file, cli.overrides(), started_at);

    init_logging(&config.log_level, config.log_file.as_deref());

    // Bootstrap config directory
    if let Err(e) = config::init() {
        warn!("Failed to initialize config directory: {}", e);
    }

    match app::run(&cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Rotated log files kept next to the active one
const KEEP_LOG_FILES: usize = 5;

/// Install env_logger; `RUST_LOG` wins over the configured level
///
/// With a log file, records go to stderr and to a daily-rotated file.
fn init_logging(level: &str, log_file: Option<&Path>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    builder.format_timestamp_millis();

    let mut file_error = None;
    if let Some(path) = log_file {
        match rolling_appender(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
            }
            Err(e) => file_error = Some(e),
        }
    }
    builder.init();

    if let (Some(path), Some(e)) = (log_file, file_error) {
        warn!("Cannot open log file {}, logging to stderr: {}", path.display(), e);
    }
}

/// `courier.log` in `/var/log` rotates as `/var/log/courier.<date>.log`
fn rolling_appender(path: &Path) -> Result<RollingFileAppender, InitError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let prefix = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "courier".to_string());

    let mut builder = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(KEEP_LOG_FILES);
    if let Some(ext) = path.extension() {
        builder = builder.filename_suffix(ext.to_string_lossy().into_owned());
    }
    builder.build(dir)
}

/// Copies every record to stderr as well as the log file
struct Tee<W> {
    file: W,
}

impl<W: Write> Write for Tee<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}
