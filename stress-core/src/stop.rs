//! Run-wide stop signal.
//!
//! Both the polling loop and asynchronous sources (a failing worker, Ctrl+C)
//! record a [`StopReason`] here. The first reason recorded wins; later
//! triggers are no-ops. Nothing does real work from the trigger side: the
//! driver observes the signal and performs the shutdown itself.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// The configured duration elapsed.
    DurationElapsed,
    /// Every worker exited on its own (run-count mode).
    AllWorkersExited,
    /// A worker reported a failure under stop-on-error.
    WorkerFailed {
        /// Spawn sequence number of the worker.
        worker: usize,
    },
    /// An error marker showed up in a node's logs.
    LogErrors {
        /// Node whose logs matched.
        node: String,
    },
    /// An external interrupt was received.
    Interrupted,
    /// The run was aborted while starting workers.
    StartupAborted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DurationElapsed => write!(f, "duration elapsed"),
            Self::AllWorkersExited => write!(f, "all workers exited"),
            Self::WorkerFailed { worker } => write!(f, "worker {} failed", worker),
            Self::LogErrors { node } => write!(f, "errors in logs of {}", node),
            Self::Interrupted => write!(f, "interrupted"),
            Self::StartupAborted => write!(f, "startup aborted"),
        }
    }
}

/// Cloneable, first-writer-wins stop flag.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<Option<StopReason>>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    /// Create an untriggered signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Record `reason` unless a reason is already set.
    ///
    /// Returns `true` if this call set the reason.
    pub fn trigger(&self, reason: StopReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            tracing::debug!(%reason, "stop requested");
            *current = Some(reason);
            true
        })
    }

    /// The recorded reason, if any.
    pub fn reason(&self) -> Option<StopReason> {
        self.tx.borrow().clone()
    }

    /// Whether a reason has been recorded.
    pub fn is_triggered(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait until a reason is recorded and return it.
    pub async fn triggered(&self) -> StopReason {
        let mut rx = self.tx.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(reason) = current {
                return reason;
            }
            // The sender lives in `self`, so the channel cannot close here.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
