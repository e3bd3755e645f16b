//! Subscriber setup for the `stress-run` binary.
//!
//! Two layers:
//! - console (stderr) at `info`, overridable through `RUST_LOG`
//! - optional debug file at `debug`, truncated when the process starts

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Logging setup errors.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The debug log could not be created.
    #[error("failed to create debug log {path}: {source}")]
    DebugLog {
        /// Log path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A global subscriber was already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails when the debug log cannot be created or a subscriber is already set.
pub fn init(debug_log: Option<&Path>) -> Result<(), LoggingError> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let file = match debug_log {
        Some(path) => {
            let handle = File::create(path).map_err(|source| LoggingError::DebugLog {
                path: path.to_path_buf(),
                source,
            })?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(handle))
                    .with_ansi(false)
                    .with_thread_ids(true)
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()?;
    Ok(())
}
