//! Error types for stress-run.
//!
//! Only configuration problems and startup aborts cross the run boundary.
//! Everything that happens while workers run is folded into the
//! [`RunReport`](crate::report::RunReport) instead.

/// Main error type for stress-run operations.
#[derive(Debug, thiserror::Error)]
pub enum StressError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A test spec is malformed.
    #[error("invalid test #{index}: {reason}")]
    InvalidTest {
        /// Position of the spec in the test list.
        index: usize,
        /// Why it was rejected.
        reason: String,
    },

    /// The tests file could not be parsed.
    #[error("invalid tests file: {0}")]
    TestsFile(#[from] serde_json::Error),

    /// No factory is registered under this name.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// A worker could not be started.
    #[error("worker {index} of {action} failed to start: {reason}")]
    Startup {
        /// Action reference of the worker.
        action: String,
        /// Replica index of the worker.
        index: usize,
        /// What went wrong.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for stress-run operations.
pub type Result<T> = std::result::Result<T, StressError>;
