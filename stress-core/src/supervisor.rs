//! Worker supervision.
//!
//! Each worker is a tokio task driving one action's `execute` loop against
//! its own [`WorkerStatistics`]. The supervisor owns the registry of
//! [`WorkerRecord`]s and is the only party that terminates workers.
//!
//! ## Termination
//!
//! `terminate_all` aborts every live task and then joins it. The registry
//! lock is held for the whole operation, so a concurrent second caller
//! returns only once every worker has exited, and finds every handle already
//! released.

use crate::action::{ActionContext, ActionOptions, RunPolicy, StressAction};
use crate::error::{Result, StressError};
use crate::registry::ActionRegistry;
use crate::stats::{StatsSnapshot, WorkerStatistics};
use crate::stop::{StopReason, StopSignal};
use futures_util::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

/// A spawned worker.
#[derive(Debug)]
pub struct WorkerRecord {
    /// Spawn sequence number, unique within the run.
    seq: usize,
    /// Replica index within the owning test spec.
    index: usize,
    /// Action reference the worker runs.
    action: String,
    /// Counters written by the worker.
    statistics: Arc<WorkerStatistics>,
    /// Set by the worker as it leaves its loop.
    done: Arc<AtomicBool>,
    /// Task handle; `None` once joined.
    handle: Option<JoinHandle<()>>,
}

impl WorkerRecord {
    fn is_alive(&self) -> bool {
        if self.done.load(Ordering::Acquire) {
            return false;
        }
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// Point-in-time view of a worker for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerSnapshot {
    /// Spawn sequence number.
    pub seq: usize,
    /// Replica index within the owning test spec.
    pub index: usize,
    /// Action reference.
    pub action: String,
    /// Counters as of the snapshot.
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    /// Whether the worker task was still running.
    pub alive: bool,
}

/// Spawns, tracks and terminates workers.
#[derive(Debug)]
pub struct WorkerSupervisor {
    workers: Mutex<Vec<WorkerRecord>>,
    stop: StopSignal,
    /// Signalled whenever a worker leaves its loop on its own.
    exited: Arc<Notify>,
}

impl WorkerSupervisor {
    /// Create a supervisor. Under stop-on-error, failing workers trigger `stop`.
    pub fn new(stop: StopSignal) -> Self {
        Self {
            workers: Mutex::new(Vec::new()),
            stop,
            exited: Arc::new(Notify::new()),
        }
    }

    /// Build, set up and start one worker.
    ///
    /// The worker is registered only after `setup` succeeded; a setup
    /// failure leaves the registry untouched and returns
    /// [`StressError::Startup`].
    pub async fn spawn(
        &self,
        registry: &ActionRegistry,
        action_reference: &str,
        ctx: ActionContext,
        options: &ActionOptions,
    ) -> Result<Arc<WorkerStatistics>> {
        let mut action = registry.create(action_reference, &ctx)?;
        action
            .setup(options)
            .await
            .map_err(|e| StressError::Startup {
                action: action_reference.to_string(),
                index: ctx.index,
                reason: e.to_string(),
            })?;

        let statistics = Arc::new(WorkerStatistics::new());
        let done = Arc::new(AtomicBool::new(false));
        let mut workers = self.workers.lock().await;
        let seq = workers.len();

        tracing::debug!(
            worker = seq,
            index = ctx.index,
            action = action_reference,
            "calling target object"
        );

        let task = WorkerTask {
            seq,
            action_reference: action_reference.to_string(),
            statistics: Arc::clone(&statistics),
            policy: ctx.policy,
            stop: self.stop.clone(),
            done: Arc::clone(&done),
            exited: Arc::clone(&self.exited),
        };
        let handle = tokio::spawn(task.run(action));

        workers.push(WorkerRecord {
            seq,
            index: ctx.index,
            action: action_reference.to_string(),
            statistics: Arc::clone(&statistics),
            done,
            handle: Some(handle),
        });

        Ok(statistics)
    }

    /// Abort and join every live worker. Idempotent.
    pub async fn terminate_all(&self) {
        let mut workers = self.workers.lock().await;

        let mut pending = Vec::new();
        for worker in workers.iter_mut() {
            if let Some(handle) = worker.handle.take() {
                // abort() on a finished task is a no-op
                handle.abort();
                pending.push((worker.seq, handle));
            }
        }

        if pending.is_empty() {
            return;
        }
        tracing::debug!(workers = pending.len(), "terminating workers");

        for (seq, handle) in pending {
            match handle.await {
                Ok(()) => tracing::debug!(worker = seq, "worker had already exited"),
                Err(e) if e.is_cancelled() => tracing::debug!(worker = seq, "worker terminated"),
                Err(e) => tracing::error!(worker = seq, error = %e, "worker task failed"),
            }
        }
    }

    /// Wait until some worker exits on its own.
    ///
    /// An exit that happened since the last call completes this immediately.
    pub async fn worker_exited(&self) {
        self.exited.notified().await;
    }

    /// Whether every worker has exited (or none was spawned).
    pub async fn all_exited(&self) -> bool {
        self.workers.lock().await.iter().all(|w| !w.is_alive())
    }

    /// Current counters of every registered worker, in spawn order.
    pub async fn snapshot(&self) -> Vec<WorkerSnapshot> {
        self.workers
            .lock()
            .await
            .iter()
            .map(|w| WorkerSnapshot {
                seq: w.seq,
                index: w.index,
                action: w.action.clone(),
                stats: w.statistics.read(),
                alive: w.is_alive(),
            })
            .collect()
    }

    /// Number of registered workers.
    pub async fn len(&self) -> usize {
        self.workers.lock().await.len()
    }

    /// Whether no worker has been registered.
    pub async fn is_empty(&self) -> bool {
        self.workers.lock().await.is_empty()
    }
}

impl Drop for WorkerSupervisor {
    fn drop(&mut self) {
        for worker in self.workers.get_mut().iter() {
            if let Some(handle) = &worker.handle {
                handle.abort();
            }
        }
    }
}

/// What a worker task owns besides its action.
struct WorkerTask {
    seq: usize,
    action_reference: String,
    statistics: Arc<WorkerStatistics>,
    policy: RunPolicy,
    stop: StopSignal,
    done: Arc<AtomicBool>,
    exited: Arc<Notify>,
}

impl WorkerTask {
    async fn run(self, mut action: Box<dyn StressAction>) {
        let seq = self.seq;
        tracing::debug!(worker = seq, action = %self.action_reference, "worker started");

        let outcome = AssertUnwindSafe(action.execute(&self.statistics, &self.policy))
            .catch_unwind()
            .await;
        if outcome.is_err() {
            self.statistics.record_failure();
            tracing::error!(worker = seq, action = %self.action_reference, "worker panicked");
        }

        let snap = self.statistics.read();
        tracing::debug!(
            worker = seq,
            runs = snap.runs,
            fails = snap.fails,
            "worker exited"
        );

        if self.policy.stop_on_error && snap.has_failures() {
            self.stop.trigger(StopReason::WorkerFailed { worker: seq });
        }
        self.done.store(true, Ordering::Release);
        self.exited.notify_one();
    }
}
