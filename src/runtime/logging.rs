//! File logging. The terminal belongs to the TUI, so `tracing` output goes
//! to a log file instead of stderr.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{LogSettings, default_log_path};

/// `RUST_LOG` wins over the configured directive; a bad directive falls
/// back to `info`.
fn filter(settings: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Returns the log file path, or `None` when
/// no location could be determined.
pub fn init(settings: &LogSettings) -> io::Result<Option<PathBuf>> {
    let Some(path) = settings.path.clone().or_else(default_log_path) else {
        return Ok(None);
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(settings))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    Ok(Some(path))
}
