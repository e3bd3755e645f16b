//! Per-worker run/fail counters.
//!
//! A [`WorkerStatistics`] is shared between exactly one worker (the only
//! writer) and the supervisor (reader). Counters are plain atomics, so reads
//! never block the worker and never observe a torn value.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Run counters for a single worker.
///
/// All counters are monotonically increasing and never reset during a run.
/// `fails <= runs` holds at every observation as long as the writer bumps
/// `runs` before `fails` for a failed iteration (see [`record_failure`]).
///
/// [`record_failure`]: WorkerStatistics::record_failure
#[derive(Debug, Default)]
pub struct WorkerStatistics {
    /// Iterations attempted.
    runs: AtomicU64,
    /// Iterations that failed.
    fails: AtomicU64,
}

/// Point-in-time copy of a worker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Iterations attempted.
    pub runs: u64,
    /// Iterations that failed.
    pub fails: u64,
}

impl WorkerStatistics {
    /// Create counters initialised to `(0, 0)`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one attempted iteration.
    pub fn increment_runs(&self) {
        self.runs.fetch_add(1, Ordering::Release);
    }

    /// Count one failed iteration. Must follow the matching `increment_runs`.
    pub fn increment_fails(&self) {
        self.fails.fetch_add(1, Ordering::Release);
    }

    /// Count one successful iteration.
    pub fn record_success(&self) {
        self.increment_runs();
    }

    /// Count one failed iteration (runs first, then fails).
    pub fn record_failure(&self) {
        self.increment_runs();
        self.increment_fails();
    }

    /// Read both counters.
    ///
    /// `fails` is loaded before `runs`; paired with the writer's ordering this
    /// keeps `fails <= runs` in every snapshot.
    pub fn read(&self) -> StatsSnapshot {
        let fails = self.fails.load(Ordering::Acquire);
        let runs = self.runs.load(Ordering::Acquire);
        StatsSnapshot { runs, fails }
    }
}

impl StatsSnapshot {
    /// Fold another snapshot into this one.
    pub fn merge(&mut self, other: &StatsSnapshot) {
        self.runs += other.runs;
        self.fails += other.fails;
    }

    /// Whether any iteration failed.
    pub fn has_failures(&self) -> bool {
        self.fails > 0
    }
}
