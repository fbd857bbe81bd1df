//! Tracing configuration and log routing.
//!
//! Run progress goes to stdout through a compact formatter and is mirrored into a log file so a
//! long mining run can be audited afterwards. `STYLEMINE_LOG_FILE` selects the file (appended);
//! otherwise `logs/stylemine.log` is used. The file writer is non‑blocking.
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "STYLEMINE_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_NAME: &str = "stylemine.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects `debug` over `info`.
pub fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let log_path = log_file_path(std::env::var(LOG_FILE_ENV).ok());
    let file_layer = open_log_writer(&log_path).map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact()
    });

    registry.with(file_layer).init();
}

/// Resolve where the log file lives, honoring an explicit override.
fn log_file_path(explicit: Option<String>) -> PathBuf {
    match explicit.filter(|value| !value.trim().is_empty()) {
        Some(path) => PathBuf::from(path),
        None => Path::new(DEFAULT_LOG_DIR).join(DEFAULT_LOG_NAME),
    }
}

/// Open `path` for appending behind a non‑blocking writer.
///
/// Returns `None` (stdout only) when the parent directory or the file cannot be created.
fn open_log_writer(path: &Path) -> Option<NonBlocking> {
    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(Err(err)) = parent.map(std::fs::create_dir_all) {
        eprintln!("Failed to create log directory for {}: {err}", path.display());
        return None;
    }

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_defaults_under_logs_dir() {
        assert_eq!(log_file_path(None), PathBuf::from("logs/stylemine.log"));
        assert_eq!(
            log_file_path(Some("  ".into())),
            PathBuf::from("logs/stylemine.log")
        );
    }

    #[test]
    fn log_path_honors_override() {
        assert_eq!(
            log_file_path(Some("/var/log/mine.log".into())),
            PathBuf::from("/var/log/mine.log")
        );
    }

    #[test]
    fn open_log_writer_creates_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("run.log");
        assert!(open_log_writer(&path).is_some());
        assert!(path.exists());
    }
}
