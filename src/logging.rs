//! Structured logging setup: console plus a daily rolling file.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::{ClientError, ClientResult};

pub const DEFAULT_FILTER: &str = "info,foodhub_client=debug";

/// Prefix of the rolling log files (`foodhub.2025-03-01`).
const LOG_FILE_PREFIX: &str = "foodhub";

/// Maximum number of log files to retain.
pub const MAX_LOG_FILES: usize = 10;

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    /// Used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
    pub max_files: usize,
    /// Write the file layer as JSON lines instead of plain text.
    pub json_file: bool,
    pub console: bool,
}

impl LogConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            default_filter: DEFAULT_FILTER.to_string(),
            max_files: MAX_LOG_FILES,
            json_file: false,
            console: true,
        }
    }

    /// `logs/` under the client's data directory.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("logs"))
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new(default_log_dir())
    }
}

/// Per-user log directory (`$XDG_DATA_HOME`/`%LOCALAPPDATA%`).
pub fn default_log_dir() -> PathBuf {
    let base = std::env::var("LOCALAPPDATA")
        .or_else(|_| std::env::var("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(target_os = "windows")]
            {
                PathBuf::from(std::env::var("USERPROFILE").unwrap_or_else(|_| ".".into()))
                    .join("AppData")
                    .join("Local")
            }
            #[cfg(not(target_os = "windows"))]
            {
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                    .join(".local")
                    .join("share")
            }
        });
    base.join("foodhub-client").join("logs")
}

/// Install the global subscriber. Keep the returned guard alive for as long
/// as logs should be written; dropping it flushes the file writer.
pub fn init_logging(config: &LogConfig) -> ClientResult<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    fs::create_dir_all(&config.log_dir)
        .map_err(|e| ClientError::Storage(format!("log directory: {e}")))?;
    prune_old_logs(&config.log_dir, config.max_files);

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = if config.json_file {
        fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed()
    };
    let console_layer = config.console.then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ClientError::System(format!("logging already initialised: {e}")))?;

    info!(
        log_dir = %config.log_dir.display(),
        "Starting FoodHub client v{}",
        env!("CARGO_PKG_VERSION")
    );
    Ok(guard)
}

/// Delete the oldest log files so at most `keep` remain.
pub fn prune_old_logs(log_dir: &Path, keep: usize) {
    let Ok(entries) = fs::read_dir(log_dir) else {
        return;
    };

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = entries
        .flatten()
        .filter(|entry| {
            entry.path().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX))
        })
        .map(|entry| {
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(std::time::UNIX_EPOCH);
            (entry.path(), modified)
        })
        .collect();

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(keep) {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to prune log file {}: {e}", path.display());
        }
    }
}
