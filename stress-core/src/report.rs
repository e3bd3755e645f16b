//! End-of-run report.

use crate::monitor::LogHit;
use crate::stats::StatsSnapshot;
use crate::stop::StopReason;
use crate::supervisor::WorkerSnapshot;
use serde::Serialize;
use std::time::Duration;

/// One worker's final counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerLine {
    /// Replica index within the owning test spec.
    pub index: usize,
    /// Action reference.
    pub action: String,
    /// Iterations attempted.
    pub runs: u64,
    /// Iterations that failed.
    pub fails: u64,
}

/// Aggregate result of a run, built once after every worker was joined.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Per-worker counters in spawn order.
    pub per_worker: Vec<WorkerLine>,
    /// Sum of `runs`.
    pub total_runs: u64,
    /// Sum of `fails`.
    pub total_fails: u64,
    /// Whether the run counts as failed.
    pub had_errors: bool,
    /// What ended the run.
    pub stop_reason: StopReason,
    /// First error found in remote logs.
    pub log_error: Option<LogHit>,
    /// Workers that failed to start and were skipped.
    pub startup_failures: usize,
    /// Wall-clock time from the first spawn to the report.
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl RunReport {
    /// Build a report from the final worker snapshot.
    ///
    /// The run is errored when any worker failed, when remote logs showed
    /// an error, or when a worker could not be started.
    pub fn new(
        workers: &[WorkerSnapshot],
        stop_reason: StopReason,
        log_error: Option<LogHit>,
        startup_failures: usize,
        elapsed: Duration,
    ) -> Self {
        let mut total = StatsSnapshot::default();
        let per_worker = workers
            .iter()
            .map(|w| {
                total.merge(&w.stats);
                WorkerLine {
                    index: w.index,
                    action: w.action.clone(),
                    runs: w.stats.runs,
                    fails: w.stats.fails,
                }
            })
            .collect();

        let had_errors = total.has_failures() || log_error.is_some() || startup_failures > 0;

        Self {
            per_worker,
            total_runs: total.runs,
            total_fails: total.fails,
            had_errors,
            stop_reason,
            log_error,
            startup_failures,
            elapsed,
        }
    }

    /// Process exit status: 1 when the run had errors, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.had_errors)
    }

    /// Emit the per-worker and summary lines.
    pub fn log(&self) {
        tracing::info!("Statistics (per process):");
        for line in &self.per_worker {
            tracing::info!(
                index = line.index,
                action = %line.action,
                runs = line.runs,
                fails = line.fails,
                " Process {} ({}): Run {} actions ({} failed)",
                line.index,
                line.action,
                line.runs,
                line.fails
            );
        }
        tracing::info!("Summary:");
        tracing::info!(
            total_runs = self.total_runs,
            total_fails = self.total_fails,
            stop_reason = %self.stop_reason,
            "Run {} actions ({} failed)",
            self.total_runs,
            self.total_fails
        );
        if self.startup_failures > 0 {
            tracing::warn!(
                startup_failures = self.startup_failures,
                "some workers never started"
            );
        }
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(index: usize, runs: u64, fails: u64) -> WorkerSnapshot {
        WorkerSnapshot {
            seq: index,
            index,
            action: "echo".into(),
            stats: StatsSnapshot { runs, fails },
            alive: false,
        }
    }

    #[test]
    fn totals_and_clean_run() {
        let report = RunReport::new(
            &[worker(0, 10, 0), worker(1, 7, 0)],
            StopReason::DurationElapsed,
            None,
            0,
            Duration::from_secs(2),
        );
        assert_eq!(report.total_runs, 17);
        assert_eq!(report.total_fails, 0);
        assert!(!report.had_errors);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.per_worker[1].runs, 7);
    }

    #[test]
    fn worker_failure_marks_errors() {
        let report = RunReport::new(
            &[worker(0, 10, 2)],
            StopReason::DurationElapsed,
            None,
            0,
            Duration::ZERO,
        );
        assert!(report.had_errors);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn log_error_marks_errors_without_fails() {
        let report = RunReport::new(
            &[worker(0, 10, 0)],
            StopReason::LogErrors { node: "c1".into() },
            Some(LogHit {
                node: "c1".into(),
                excerpt: "TRACE".into(),
            }),
            0,
            Duration::ZERO,
        );
        assert_eq!(report.total_fails, 0);
        assert!(report.had_errors);
    }

    #[test]
    fn startup_failures_mark_errors() {
        let report = RunReport::new(&[], StopReason::AllWorkersExited, None, 1, Duration::ZERO);
        assert!(report.had_errors);
        assert_eq!(report.total_runs, 0);
    }

    #[test]
    fn report_serializes_to_json() {
        let report = RunReport::new(
            &[worker(0, 3, 0)],
            StopReason::AllWorkersExited,
            None,
            0,
            Duration::from_millis(1500),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total_runs"], 3);
        assert_eq!(json["stop_reason"]["kind"], "all_workers_exited");
        assert_eq!(json["elapsed"], 1.5);
        assert!(json["log_error"].is_null());
    }
}
