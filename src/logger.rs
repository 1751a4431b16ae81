use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Per-run log file `<app>_<YYYYmmdd_HHMMSS>.log` in the log directory.
pub struct SessionLogger {
    log_path: PathBuf,
    app_name: String,
}

impl SessionLogger {
    pub fn new(log_dir: &Path, app_name: &str, retention_count: usize) -> Result<Self> {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;

        // keep room for the file this session is about to create
        prune_logs(log_dir, app_name, retention_count.saturating_sub(1))?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("{}_{}.log", app_name, timestamp));

        Ok(Self {
            log_path,
            app_name: app_name.to_string(),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

/// Delete all but the `keep` newest `<app>_*.log` files in `log_dir`.
/// Returns how many were removed.
pub fn prune_logs(log_dir: &Path, app_name: &str, keep: usize) -> Result<usize> {
    let prefix = format!("{}_", app_name);
    let mut log_files: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();

    let entries = fs::read_dir(log_dir).context("Failed to read log directory")?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("log") {
            continue;
        }
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(&prefix));
        if !matches {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            log_files.push((modified, path));
        }
    }

    // newest first; names carry the timestamp and break mtime ties
    log_files.sort_by(|a, b| b.cmp(a));

    let mut removed = 0;
    for (_, path) in log_files.iter().skip(keep) {
        if fs::remove_file(path).is_ok() {
            removed += 1;
        }
    }

    Ok(removed)
}

static LOGGER: once_cell::sync::OnceCell<SessionLogger> = once_cell::sync::OnceCell::new();

/// Install the global tracing subscriber: the session file, plus stdout when
/// `stream_to_stdout` is set. `RUST_LOG` overrides the default `info` level.
pub fn init_logger(log_dir: PathBuf, app_name: &str, retention_count: usize, stream_to_stdout: bool) -> Result<()> {
    let logger = SessionLogger::new(&log_dir, app_name, retention_count)?;

    let file = fs::File::create(&logger.log_path).context("Failed to create log file")?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(file));
    let stdout_layer = stream_to_stdout.then(|| fmt::layer().with_target(false).with_writer(std::io::stdout));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Logger already initialized: {}", e))?;

    LOGGER
        .set(logger)
        .map_err(|_| anyhow::anyhow!("Logger already initialized"))?;

    tracing::info!("=== {} Session Started ===", app_name);
    Ok(())
}

pub fn finalize_logs() -> Result<()> {
    if let Some(logger) = LOGGER.get() {
        tracing::info!("=== {} Session Ended ===", logger.app_name);
    }
    Ok(())
}

pub fn get_log_path() -> Option<PathBuf> {
    LOGGER.get().map(|logger| logger.log_path.clone())
}
