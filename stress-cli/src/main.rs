//! # stress-run
//!
//! Run stress tests described in a JSON file.
//!
//! ## Example
//!
//! ```bash
//! # Five minutes of every test in parallel
//! stress-run tests.json
//!
//! # Fail fast, ten iterations per worker, with a deployment config
//! stress-run -c stress.toml -n 10 -s tests.json
//!
//! # See what the tests file may reference
//! stress-run --list-actions
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use stress_core::logging::{self, LoggingError};

mod commands;

use commands::{list, run};

/// Stress test driver: runs workers in parallel and watches the target's logs.
#[derive(Parser, Debug)]
#[command(name = "stress-run")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON file with an array of test specs
    #[arg(required_unless_present = "list_actions")]
    tests: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Duration of the run in seconds
    #[arg(long, short, default_value = "300")]
    duration: u64,

    /// Run-count mode: iterations per worker
    #[arg(long, short)]
    number: Option<u64>,

    /// Stop the run at the first failure
    #[arg(long, short)]
    stop_on_error: bool,

    /// Run each test spec as its own sequential run
    #[arg(long, short = 'S')]
    serial: bool,

    /// Debug log file (overrides the configuration)
    #[arg(long)]
    debug_log: Option<PathBuf>,

    /// Print the run report(s) as JSON on stdout
    #[arg(long)]
    json: bool,

    /// List registered actions and exit
    #[arg(long)]
    list_actions: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            report_fatal(&e);
            ExitCode::FAILURE
        }
    }
}

/// Log a fatal error, installing a console subscriber if none is set yet.
fn report_fatal(e: &anyhow::Error) {
    match logging::init(None) {
        Ok(()) | Err(LoggingError::AlreadyInitialized(_)) => tracing::error!("{e:#}"),
        Err(init_err) => eprintln!("Error: {e:#} (logging unavailable: {init_err})"),
    }
}

/// Returns whether the invocation succeeded.
async fn dispatch(cli: Cli) -> Result<bool> {
    if cli.list_actions {
        list::run();
        return Ok(true);
    }

    let Some(tests) = cli.tests else {
        anyhow::bail!("a tests file is required");
    };

    run::run(run::RunArgs {
        tests,
        config: cli.config,
        duration: cli.duration,
        number: cli.number,
        stop_on_error: cli.stop_on_error,
        serial: cli.serial,
        debug_log: cli.debug_log,
        json: cli.json,
    })
    .await
}
