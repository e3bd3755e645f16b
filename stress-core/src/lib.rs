//! # stress-run-core
//!
//! Worker supervision and termination decisions for long-running stress
//! tests against a remote deployment.
//!
//! A run expands a list of [`TestSpec`]s into concurrent workers, each
//! looping over one registered [`StressAction`] and counting runs and
//! failures. The [`StressDriver`] polls those counters, watches the target's
//! log files over SSH, and stops the run on the first of:
//!
//! - the duration elapsing (or every worker exhausting its run budget)
//! - a worker failure, under stop-on-error
//! - an error marker appearing in a remote log
//! - an external interrupt
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!  tests.json ───►│          StressDriver        │──► RunReport
//!                 │  ┌────────────────────────┐  │
//!                 │  │   TerminationDecider   │  │
//!                 │  └───────────▲────────────┘  │
//!                 │   snapshots  │   log hits    │
//!                 │  ┌───────────┴──┐ ┌───────┐  │
//!                 │  │ Supervisor   │ │Monitor│──┼──► ssh nodes
//!                 │  │ worker..N    │ └───────┘  │
//!                 │  └──────────────┘            │
//!                 └──────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
pub mod actions;
pub mod cleanup;
pub mod config;
pub mod decider;
pub mod driver;
pub mod error;
pub mod hooks;
pub mod identity;
pub mod logging;
pub mod monitor;
pub mod registry;
pub mod remote;
pub mod report;
pub mod stats;
pub mod stop;
pub mod supervisor;
pub mod tests_file;

#[cfg(test)]
mod testkit;

pub use action::{ActionContext, ActionError, ActionOptions, RunPolicy, StressAction};
pub use config::{StartupPolicy, StressConfig};
pub use driver::{RunParams, StressDriver};
pub use error::{Result, StressError};
pub use registry::ActionRegistry;
pub use report::RunReport;
pub use stats::{StatsSnapshot, WorkerStatistics};
pub use stop::{StopReason, StopSignal};
pub use tests_file::{load_tests, parse_tests, TestSpec};
