//! Execute a tests file.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use stress_core::{
    load_tests, logging, ActionRegistry, RunParams, RunReport, StopReason, StopSignal,
    StressConfig, StressDriver,
};

/// Arguments of the run command.
#[derive(Debug)]
pub struct RunArgs {
    pub tests: PathBuf,
    pub config: Option<PathBuf>,
    pub duration: u64,
    pub number: Option<u64>,
    pub stop_on_error: bool,
    pub serial: bool,
    pub debug_log: Option<PathBuf>,
    pub json: bool,
}

/// Run the tests. Returns whether every run was free of errors.
pub async fn run(args: RunArgs) -> Result<bool> {
    let config = match &args.config {
        Some(path) => StressConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => StressConfig::default(),
    };

    let debug_log = args.debug_log.or_else(|| config.logging.debug_log.clone());
    logging::init(debug_log.as_deref()).context("failed to initialize logging")?;

    let tests = load_tests(&args.tests)
        .with_context(|| format!("failed to read tests file {}", args.tests.display()))?;

    let interrupt = StopSignal::new();
    listen_for_interrupt(interrupt.clone());

    let driver = StressDriver::new(config, ActionRegistry::with_builtins())
        .with_interrupt(interrupt.clone());
    let params = RunParams {
        duration: Duration::from_secs(args.duration),
        max_runs: args.number,
        stop_on_error: args.stop_on_error,
    };

    let mut reports = Vec::new();
    if args.serial {
        for test in &tests {
            if interrupt.is_triggered() {
                tracing::warn!("interrupted, skipping remaining tests");
                break;
            }
            tracing::info!(action = %test.action, threads = test.threads, "starting serial run");
            reports.push(driver.run(std::slice::from_ref(test), params).await?);
        }
    } else {
        reports.push(driver.run(&tests, params).await?);
    }

    if args.json {
        print_json(&reports)?;
    }

    Ok(reports.iter().all(|r| !r.had_errors))
}

fn listen_for_interrupt(interrupt: StopSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping workers");
            interrupt.trigger(StopReason::Interrupted);
        }
    });
}

fn print_json(reports: &[RunReport]) -> Result<()> {
    let json = match reports {
        [single] => serde_json::to_string_pretty(single)?,
        all => serde_json::to_string_pretty(all)?,
    };
    println!("{}", json);
    Ok(())
}
