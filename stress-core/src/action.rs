//! The contract every stress action implements.
//!
//! An action is an opaque unit of repeated work. The supervisor calls
//! [`StressAction::setup`] once before the worker starts, then hands the
//! worker's [`WorkerStatistics`] to [`StressAction::execute`], which loops
//! until the run budget is spent or the worker is terminated.

use crate::identity::Credentials;
use crate::stats::WorkerStatistics;
use async_trait::async_trait;

/// Free-form options passed to `setup` (the `kwargs` of a test spec).
pub type ActionOptions = serde_json::Map<String, serde_json::Value>;

/// Errors raised by an action's `setup` or a single `run` iteration.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// An option was missing or had the wrong type.
    #[error("invalid option {key}: {reason}")]
    InvalidOption {
        /// Option name.
        key: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The iteration failed.
    #[error("action failed: {0}")]
    Failed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Loop policy shared by every worker of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunPolicy {
    /// Iteration budget per worker; `None` loops until terminated.
    pub max_runs: Option<u64>,
    /// Stop the worker after its first failed iteration.
    pub stop_on_error: bool,
}

/// What an action factory receives when a worker is built.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// Replica index within the owning test spec.
    pub index: usize,
    /// Identity the action should act as.
    pub credentials: Credentials,
    /// Loop policy for this run.
    pub policy: RunPolicy,
}

/// A pluggable stress action.
#[async_trait]
pub trait StressAction: Send {
    /// Prepare the action. Failing here aborts only this worker's startup.
    async fn setup(&mut self, _options: &ActionOptions) -> Result<(), ActionError> {
        Ok(())
    }

    /// Perform one iteration.
    async fn run(&mut self) -> Result<(), ActionError>;

    /// Release whatever `setup` acquired. Called when the loop ends on its own.
    async fn teardown(&mut self) {}

    /// Iterate until the budget is spent or the worker is terminated.
    ///
    /// Every iteration counts in `runs`; a failed one also counts in `fails`
    /// and never escapes the loop. Under `stop_on_error` the loop ends after
    /// the first failure.
    async fn execute(&mut self, stats: &WorkerStatistics, policy: &RunPolicy) {
        loop {
            if let Some(max_runs) = policy.max_runs {
                if stats.read().runs >= max_runs {
                    break;
                }
            }

            match self.run().await {
                Ok(()) => stats.record_success(),
                Err(e) => {
                    stats.record_failure();
                    tracing::warn!(error = %e, "failure in run");
                    if policy.stop_on_error {
                        tracing::warn!("stopping worker due to stop-on-error");
                        break;
                    }
                }
            }

            // Iterations that never suspend would otherwise starve abort().
            tokio::task::yield_now().await;
        }

        self.teardown().await;
    }
}
