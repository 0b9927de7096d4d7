//! File logging setup shared by the binaries.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

impl LogLevel {
    /// `--debug` wins over `--info`; neither means warnings only.
    pub fn from_flags(debug: bool, info: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else if info {
            LogLevel::Info
        } else {
            LogLevel::Warn
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            LogLevel::Debug => "listener-debug.log",
            LogLevel::Info => "listener-info.log",
            LogLevel::Warn => "listener.log",
        }
    }

    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
        }
    }
}

/// Truncate the log file for `level` in `dir` and route all tracing output
/// to it. `RUST_LOG` takes precedence over the flag-derived level.
pub fn init(level: LogLevel, dir: &Path) -> io::Result<PathBuf> {
    let path = dir.join(level.file_name());
    let file = File::create(&path)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| io::Error::other(e.to_string()))?;

    Ok(path)
}
