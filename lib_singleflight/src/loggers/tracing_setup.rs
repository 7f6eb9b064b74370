//! # Tracing Bootstrap
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` (`RUST_LOG` wins over
//! the configured level), a stdout layer and, when a log directory is given, a
//! non-blocking file layer. One log file is written per run; older ones for the
//! same application are removed so that at most one previous run is kept.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber.
///
/// Returns the appender guard when file logging is enabled; keep it alive for
/// the lifetime of the process or buffered lines are lost on exit.
///
/// # Errors
/// Fails if the log directory cannot be created or a global subscriber is
/// already installed.
pub fn init_tracing(app_name: &str, log_dir: Option<&Path>, log_level: &str) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true));

    let Some(dir) = log_dir else {
        registry.try_init()?;
        return Ok(None);
    };

    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }

    // Clean up old log files, keeping only the most recent one
    cleanup_old_logs(dir, app_name)?;

    let file_name = log_file_name(app_name);
    let appender = tracing_appender::rolling::never(dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    registry
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()?;

    tracing::info!(file = %dir.join(&file_name).display(), "file logging enabled");
    Ok(Some(guard))
}

fn log_file_name(app_name: &str) -> String {
    format!("{}_{}.log", app_name, chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"))
}

/// Deletes all but the newest `<app_name>_*.log` file in `log_dir`.
///
/// Returns the files that were removed. Files of other applications are left alone.
pub fn cleanup_old_logs(log_dir: &Path, app_name: &str) -> Result<Vec<PathBuf>> {
    let prefix = format!("{}_", app_name);
    let mut entries: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map_or(false, |ext| ext == "log"))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with(&prefix))
        })
        .collect();

    // Timestamped names sort chronologically, newest first
    entries.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    let mut removed = Vec::new();
    for path in entries.into_iter().skip(1) {
        match fs::remove_file(&path) {
            Ok(()) => removed.push(path),
            Err(e) => eprintln!("Failed to delete old log file {:?}: {}", path, e),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_keeps_newest_of_same_app() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "probe_2024-01-01_10-00-00.log",
            "probe_2024-01-02_10-00-00.log",
            "probe_2024-01-03_10-00-00.log",
            "other_2024-01-01_10-00-00.log",
            "probe_notes.txt",
        ] {
            fs::write(dir.path().join(name), "x").unwrap();
        }

        let removed = cleanup_old_logs(dir.path(), "probe").unwrap();
        assert_eq!(removed.len(), 2);

        assert!(dir.path().join("probe_2024-01-03_10-00-00.log").exists());
        assert!(!dir.path().join("probe_2024-01-01_10-00-00.log").exists());
        assert!(dir.path().join("other_2024-01-01_10-00-00.log").exists());
        assert!(dir.path().join("probe_notes.txt").exists());
    }

    #[test]
    fn test_log_file_name_shape() {
        let name = log_file_name("probe");
        assert!(name.starts_with("probe_"));
        assert!(name.ends_with(".log"));
        assert_eq!(name.len(), "probe_".len() + "YYYY-MM-DD_HH-MM-SS".len() + ".log".len());
    }
}
