//! Termination decisions.
//!
//! [`TerminationDecider::decide`] is a pure function of one polling tick's
//! [`Observation`]. Precedence, highest first:
//!
//! 1. a reason already recorded on the stop signal
//! 2. duration expired (duration mode) / every worker exited (run-count mode)
//! 3. a worker reported a failure, under stop-on-error
//! 4. an error marker was found in remote logs
//!
//! Otherwise the run continues and the decider says how long to sleep.

use crate::monitor::LogHit;
use crate::stop::StopReason;
use crate::supervisor::WorkerSnapshot;
use std::time::{Duration, Instant};

/// How the end of a run is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Stop at a wall-clock deadline.
    Duration {
        /// Deadline.
        end: Instant,
    },
    /// Stop once every worker has used up its own iteration budget.
    RunCount,
    /// No deadline; only a signal, a failure or a log hit stops the run.
    Unbounded,
}

/// Everything the decider looks at on one tick.
#[derive(Debug, Clone)]
pub struct Observation<'a> {
    /// Current time.
    pub now: Instant,
    /// Workers as of this tick.
    pub workers: &'a [WorkerSnapshot],
    /// Most recent log scan result, if monitoring is on.
    pub log_hit: Option<&'a LogHit>,
    /// Reason recorded asynchronously on the stop signal.
    pub signalled: Option<StopReason>,
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Keep running; evaluate again after `sleep`.
    Continue {
        /// Time until the next tick.
        sleep: Duration,
    },
    /// Stop the run.
    Stop(StopReason),
}

/// Stop policy for one run.
#[derive(Debug, Clone, Copy)]
pub struct TerminationDecider {
    mode: RunMode,
    stop_on_error: bool,
    log_check_interval: Duration,
}

impl TerminationDecider {
    /// Create a decider.
    pub fn new(mode: RunMode, stop_on_error: bool, log_check_interval: Duration) -> Self {
        Self {
            mode,
            stop_on_error,
            log_check_interval,
        }
    }

    /// The run mode.
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Upper bound on a tick, and the log scan period.
    pub fn log_check_interval(&self) -> Duration {
        self.log_check_interval
    }

    /// Decide whether to stop on this tick.
    pub fn decide(&self, obs: &Observation<'_>) -> Decision {
        if let Some(reason) = &obs.signalled {
            return Decision::Stop(reason.clone());
        }

        match self.mode {
            RunMode::Duration { end } => {
                if obs.now >= end {
                    return Decision::Stop(StopReason::DurationElapsed);
                }
            }
            RunMode::RunCount => {
                if obs.workers.iter().all(|w| !w.alive) {
                    return Decision::Stop(StopReason::AllWorkersExited);
                }
            }
            RunMode::Unbounded => {}
        }

        if self.stop_on_error {
            if let Some(failed) = obs.workers.iter().find(|w| w.stats.has_failures()) {
                return Decision::Stop(StopReason::WorkerFailed { worker: failed.seq });
            }
        }

        if let Some(hit) = obs.log_hit {
            return Decision::Stop(StopReason::LogErrors {
                node: hit.node.clone(),
            });
        }

        Decision::Continue {
            sleep: self.cadence(obs.now),
        }
    }

    /// `min(time_remaining, log_check_interval)`; just the interval without a deadline.
    fn cadence(&self, now: Instant) -> Duration {
        match self.mode {
            RunMode::Duration { end } => end.saturating_duration_since(now).min(self.log_check_interval),
            RunMode::RunCount | RunMode::Unbounded => self.log_check_interval,
        }
    }
}
