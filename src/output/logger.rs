//! Raw NDJSON run logs and diagnostic tracing setup.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Per-process sequence number so runs started in the same millisecond
/// still get their own file.
static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

/// An open, exclusively created log file for one agent run.
#[derive(Debug)]
pub struct RawLog {
    path: PathBuf,
    file: File,
}

impl RawLog {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one raw stdout line.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.file, "{}", line)
    }
}

/// Create a fresh raw log under [`log_directory`].
pub fn create_raw_log() -> Result<RawLog> {
    create_raw_log_in(&log_directory())
}

/// Create a fresh raw log in `dir`, creating the directory if needed.
///
/// Names are `<local time to the ms>-<pid>-<seq>.log`; the file is opened
/// with `create_new`, so an existing log is never reused.
pub fn create_raw_log_in(dir: &Path) -> Result<RawLog> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let stamp = Local::now().format("%Y%m%d-%H%M%S-%3f");
    let pid = std::process::id();

    loop {
        let seq = RUN_SEQ.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!("{}-{}-{}.log", stamp, pid, seq));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok(RawLog { path, file }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create log file {}", path.display()))
            }
        }
    }
}

/// Open a run log when `enabled`.
///
/// A log that cannot be created is reported and the run goes on without one.
pub fn open_run_log(enabled: bool) -> Option<RawLog> {
    if !enabled {
        return None;
    }
    match create_raw_log() {
        Ok(log) => {
            tracing::info!("raw log: {}", log.path().display());
            Some(log)
        }
        Err(e) => {
            tracing::warn!("running without a raw log: {:#}", e);
            None
        }
    }
}

/// `<tmp>/claude-relay/logs/<name of the working directory>`.
pub fn log_directory() -> PathBuf {
    let project = std::env::current_dir()
        .ok()
        .and_then(|cwd| cwd.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unknown".to_string());

    std::env::temp_dir()
        .join("claude-relay")
        .join("logs")
        .join(project)
}

/// Install the global `tracing` subscriber on stderr.
///
/// `RUST_LOG` wins over `level`. Calling this twice is harmless.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("claude_relay={}", level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn log_directory_is_namespaced() {
        let dir = log_directory();
        let parts: Vec<_> = dir
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        assert!(parts.windows(2).any(|w| w[0] == "claude-relay" && w[1] == "logs"));
    }

    #[test]
    fn back_to_back_logs_get_distinct_files() {
        let tmp = TempDir::new().unwrap();
        let first = create_raw_log_in(tmp.path()).unwrap();
        let second = create_raw_log_in(tmp.path()).unwrap();

        assert_ne!(first.path(), second.path());
        assert!(first.path().is_file());
        assert!(second.path().is_file());
        assert!(first.path().extension().is_some_and(|e| e == "log"));
    }

    #[test]
    fn creates_missing_directory_and_writes_lines() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a").join("b");
        let mut log = create_raw_log_in(&dir).unwrap();
        log.write_line("{\"type\":\"x\"}").unwrap();
        log.write_line("second").unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content, "{\"type\":\"x\"}\nsecond\n");
    }

    #[test]
    fn unusable_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let err = create_raw_log_in(&blocker.join("logs")).unwrap_err();
        assert!(err.to_string().contains("Failed to create log directory"));
    }

    #[test]
    fn disabled_run_log_is_none() {
        assert!(open_run_log(false).is_none());
    }

    #[test]
    fn init_tracing_twice_does_not_panic() {
        init_tracing("debug");
        init_tracing("info");
    }
}
