//! Run logging for the command-line binary.
//!
//! Every run logs to stderr and to its own file,
//! `<log_dir>/run-YYYYMMDD-HHMMSS.log`. `RUST_LOG` overrides the default
//! `info` level unless a verbosity flag forces one.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Error, Result};

/// Keeps the file writer alive; dropping it flushes the log file.
#[derive(Debug)]
pub struct LogGuard {
    _guard: WorkerGuard,
    path: PathBuf,
}

impl LogGuard {
    /// The file this run logs to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Log file name for a run started at `started`.
///
/// ```rust
/// use chrono::{Local, TimeZone};
/// use renzoku::logging::log_file_name;
///
/// let started = Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).unwrap();
/// assert_eq!(log_file_name(started), "run-20250307-090501.log");
/// ```
pub fn log_file_name(started: DateTime<Local>) -> String {
    format!("run-{}.log", started.format("%Y%m%d-%H%M%S"))
}

/// Level implied by the number of `-v` flags.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber.
///
/// With `verbosity > 0` the level is forced; otherwise `RUST_LOG` applies,
/// falling back to `info`.
pub fn init(log_dir: &Path, verbosity: u8) -> Result<LogGuard> {
    std::fs::create_dir_all(log_dir).map_err(|e| Error::filesystem(log_dir, e))?;

    let file_name = log_file_name(Local::now());
    let path = log_dir.join(&file_name);
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, &file_name));

    let level = level_for(verbosity);
    let filter = || {
        if verbosity > 0 {
            EnvFilter::new(level)
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
        }
    };

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(filter());

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(filter());

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("logging already initialized: {}", e)))?;

    tracing::debug!(path = %path.display(), "logging initialized");
    Ok(LogGuard {
        _guard: guard,
        path,
    })
}
