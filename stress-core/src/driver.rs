//! Top-level run orchestration.
//!
//! A run moves through `SETUP → RUNNING → STOPPING → REPORTED`:
//!
//! - **SETUP**: validate the tests, clear remote logs and enumerate nodes,
//!   then spawn `threads` workers per test spec.
//! - **RUNNING**: evaluate the [`TerminationDecider`] each tick. A tick ends
//!   after `min(time_remaining, log_check_interval)`, or earlier when the
//!   stop signal fires or (in run-count mode) a worker exits.
//! - **STOPPING**: `terminate_all` joins every worker.
//! - **REPORTED**: aggregate the final snapshot, log it, and run cleanup if
//!   the run had no errors.

use crate::action::{ActionContext, RunPolicy};
use crate::cleanup::{Cleanup, CommandCleanup};
use crate::config::{StartupPolicy, StressConfig};
use crate::decider::{Decision, Observation, RunMode, TerminationDecider};
use crate::error::{Result, StressError};
use crate::hooks::HookError;
use crate::identity::{CommandProvisioner, Credentials, IdentityProvisioner, IsolatedIdentity};
use crate::monitor::{LogHit, RemoteLogMonitor};
use crate::registry::ActionRegistry;
use crate::remote::{RemoteExec, SshChannel};
use crate::report::RunReport;
use crate::stop::{StopReason, StopSignal};
use crate::supervisor::WorkerSupervisor;
use crate::tests_file::{validate_tests, TestSpec};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Lower bound on the polling interval.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Per-invocation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunParams {
    /// Wall-clock bound; ignored in run-count mode.
    pub duration: Duration,
    /// Iterations per worker; switches to run-count mode when set.
    pub max_runs: Option<u64>,
    /// Stop everything at the first failure.
    pub stop_on_error: bool,
}

/// State owned by a single run.
///
/// Built fresh for every call to [`StressDriver::run`], so concurrent or
/// consecutive runs never share workers or stop reasons.
#[derive(Debug)]
pub struct DriverContext {
    run_id: uuid::Uuid,
    span: tracing::Span,
    supervisor: WorkerSupervisor,
    stop: StopSignal,
}

impl DriverContext {
    fn new() -> Self {
        let run_id = uuid::Uuid::new_v4();
        let stop = StopSignal::new();
        Self {
            run_id,
            span: tracing::info_span!("stress_run", run_id = %run_id.as_simple()),
            supervisor: WorkerSupervisor::new(stop.clone()),
            stop,
        }
    }

    /// Unique id of this run.
    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }
}

/// Remote log monitoring prepared during SETUP.
struct LogWatch {
    monitor: RemoteLogMonitor,
    nodes: Vec<String>,
    logfiles: String,
}

impl LogWatch {
    async fn scan(&self) -> Option<LogHit> {
        self.monitor.scan(&self.nodes, &self.logfiles).await
    }
}

/// Runs test specs against the target and reports the outcome.
pub struct StressDriver {
    config: StressConfig,
    registry: ActionRegistry,
    remote: Option<Arc<dyn RemoteExec>>,
    provisioner: Arc<dyn IdentityProvisioner>,
    cleanup: Arc<dyn Cleanup>,
    interrupt: StopSignal,
    log_check_interval: Duration,
}

impl std::fmt::Debug for StressDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StressDriver")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("remote", &self.remote.is_some())
            .field("log_check_interval", &self.log_check_interval)
            .finish_non_exhaustive()
    }
}

impl StressDriver {
    /// Create a driver wired to the collaborators named in `config`.
    ///
    /// The SSH channel is only set up when both the SSH user and key are
    /// configured.
    pub fn new(config: StressConfig, registry: ActionRegistry) -> Self {
        let remote = SshChannel::from_config(&config.stress)
            .map(|channel| Arc::new(channel) as Arc<dyn RemoteExec>);
        let provisioner = Arc::new(CommandProvisioner::new(config.hooks.provision_command.clone()));
        let cleanup = Arc::new(CommandCleanup::new(config.hooks.cleanup_command.clone()));
        let log_check_interval = config.stress.log_check_interval();

        Self {
            config,
            registry,
            remote,
            provisioner,
            cleanup,
            interrupt: StopSignal::new(),
            log_check_interval,
        }
    }

    /// Replace the remote channel (`None` disables log monitoring).
    pub fn with_remote(mut self, remote: Option<Arc<dyn RemoteExec>>) -> Self {
        self.remote = remote;
        self
    }

    /// Replace the identity provisioner.
    pub fn with_provisioner(mut self, provisioner: Arc<dyn IdentityProvisioner>) -> Self {
        self.provisioner = provisioner;
        self
    }

    /// Replace the cleanup collaborator.
    pub fn with_cleanup(mut self, cleanup: Arc<dyn Cleanup>) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Observe an external interrupt signal (e.g. Ctrl+C) in every run.
    pub fn with_interrupt(mut self, interrupt: StopSignal) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Override the polling / log-scan interval from configuration.
    pub fn with_log_check_interval(mut self, interval: Duration) -> Self {
        self.log_check_interval = interval;
        self
    }

    /// The action registry.
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Execute one run of `tests`.
    ///
    /// # Errors
    ///
    /// Fails before any worker starts when a test spec is invalid, and
    /// during SETUP when a worker cannot start under the `abort` startup
    /// policy. Everything else is reported through the [`RunReport`].
    pub async fn run(&self, tests: &[TestSpec], params: RunParams) -> Result<RunReport> {
        validate_tests(tests, &self.registry)?;

        let ctx = DriverContext::new();
        let span = ctx.span.clone();
        self.run_in(&ctx, tests, params).instrument(span).await
    }

    async fn run_in(
        &self,
        ctx: &DriverContext,
        tests: &[TestSpec],
        params: RunParams,
    ) -> Result<RunReport> {
        let started = Instant::now();
        let policy = RunPolicy {
            max_runs: params.max_runs,
            stop_on_error: params.stop_on_error,
        };

        // SETUP
        let watch = self.prepare_log_watch().await;
        let startup_failures = match self.spawn_workers(ctx, tests, policy).await {
            Ok(failures) => failures,
            Err(e) => {
                tracing::error!(error = %e, "aborting run during startup");
                ctx.stop.trigger(StopReason::StartupAborted);
                ctx.supervisor.terminate_all().await;
                return Err(e);
            }
        };
        tracing::info!(
            workers = ctx.supervisor.len().await,
            duration_secs = params.duration.as_secs_f64(),
            max_runs = ?params.max_runs,
            stop_on_error = params.stop_on_error,
            "workers started"
        );

        // RUNNING
        let mode = match params.max_runs {
            Some(_) => RunMode::RunCount,
            None => match Instant::now().checked_add(params.duration) {
                Some(end) => RunMode::Duration { end },
                None => {
                    tracing::warn!(
                        duration_secs = params.duration.as_secs(),
                        "duration exceeds the clock range, running until stopped"
                    );
                    RunMode::Unbounded
                }
            },
        };
        let decider = TerminationDecider::new(
            mode,
            params.stop_on_error,
            self.log_check_interval.max(MIN_POLL_INTERVAL),
        );
        let (stop_reason, log_error) = self.poll(ctx, &decider, watch.as_ref()).await;

        // STOPPING
        tracing::info!(reason = %stop_reason, "stopping workers");
        ctx.supervisor.terminate_all().await;

        // REPORTED
        let report = RunReport::new(
            &ctx.supervisor.snapshot().await,
            stop_reason,
            log_error,
            startup_failures,
            started.elapsed(),
        );
        report.log();

        if !report.had_errors {
            tracing::info!("cleaning up");
            if let Err(e) = self.cleanup.cleanup().await {
                tracing::error!(error = %e, "cleanup failed");
            }
        }

        Ok(report)
    }

    /// Enumerate nodes and clear their logs, if monitoring is configured.
    async fn prepare_log_watch(&self) -> Option<LogWatch> {
        let stress = &self.config.stress;
        let logfiles = stress.target_logfiles.clone()?;
        let Some(remote) = self.remote.clone() else {
            tracing::debug!("remote channel unavailable, log monitoring disabled");
            return None;
        };
        let Some(controller) = stress.target_controller.as_deref() else {
            tracing::warn!("target_logfiles set without target_controller, log monitoring disabled");
            return None;
        };

        let monitor = RemoteLogMonitor::new(remote, stress);
        let nodes = monitor.list_active_nodes(controller).await;
        monitor.clear_logs(&nodes, &logfiles).await;
        tracing::info!(nodes = nodes.len(), logfiles = %logfiles, "log monitoring enabled");

        Some(LogWatch {
            monitor,
            nodes,
            logfiles,
        })
    }

    /// Spawn every replica of every test. Returns the number of workers
    /// skipped under the `continue` startup policy.
    async fn spawn_workers(
        &self,
        ctx: &DriverContext,
        tests: &[TestSpec],
        policy: RunPolicy,
    ) -> Result<usize> {
        let mut failures = 0;
        for test in tests {
            for index in 0..test.threads {
                if ctx.stop.is_triggered() || self.interrupt.is_triggered() {
                    tracing::warn!("stop requested during startup, not spawning further workers");
                    return Ok(failures);
                }

                let Err(e) = self.spawn_one(ctx, test, index, policy).await else {
                    continue;
                };
                match self.config.stress.on_startup_failure {
                    StartupPolicy::Abort => return Err(e),
                    StartupPolicy::Continue => {
                        tracing::error!(error = %e, "worker failed to start, continuing without it");
                        failures += 1;
                    }
                }
            }
        }
        Ok(failures)
    }

    async fn spawn_one(
        &self,
        ctx: &DriverContext,
        test: &TestSpec,
        index: usize,
        policy: RunPolicy,
    ) -> Result<()> {
        let credentials = self
            .credentials_for(test)
            .await
            .map_err(|e| StressError::Startup {
                action: test.action.clone(),
                index,
                reason: e.to_string(),
            })?;

        let action_ctx = ActionContext {
            index,
            credentials,
            policy,
        };
        ctx.supervisor
            .spawn(&self.registry, &test.action, action_ctx, &test.kwargs)
            .await?;
        Ok(())
    }

    async fn credentials_for(&self, test: &TestSpec) -> std::result::Result<Credentials, HookError> {
        if test.use_isolated_tenants {
            let identity = IsolatedIdentity::generate();
            self.provisioner.provision(&identity).await?;
            return Ok(identity.credentials());
        }
        let identity = &self.config.identity;
        Ok(if test.use_admin {
            Credentials::admin(identity)
        } else {
            Credentials::user(identity)
        })
    }

    /// RUNNING: tick until the decider says stop.
    ///
    /// Log scans keep their own schedule, so wakeups from exiting workers
    /// never postpone a due scan.
    async fn poll(
        &self,
        ctx: &DriverContext,
        decider: &TerminationDecider,
        watch: Option<&LogWatch>,
    ) -> (StopReason, Option<LogHit>) {
        let wake_on_exit = decider.mode() == RunMode::RunCount;
        let scan_interval = decider.log_check_interval();
        let mut next_scan = Instant::now() + scan_interval;
        let mut log_hit: Option<LogHit> = None;

        loop {
            if let Some(watch) = watch {
                if log_hit.is_none() && Instant::now() >= next_scan {
                    log_hit = watch.scan().await;
                    next_scan = Instant::now() + scan_interval;
                }
            }

            let workers = ctx.supervisor.snapshot().await;
            let decision = decider.decide(&Observation {
                now: Instant::now(),
                workers: &workers,
                log_hit: log_hit.as_ref(),
                signalled: ctx.stop.reason().or_else(|| self.interrupt.reason()),
            });

            let mut sleep = match decision {
                Decision::Stop(reason) => return (reason, log_hit),
                Decision::Continue { sleep } => sleep,
            };
            if watch.is_some() {
                sleep = sleep.min(next_scan.saturating_duration_since(Instant::now()));
            }

            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                _ = ctx.stop.triggered() => {}
                _ = self.interrupt.triggered() => {}
                _ = ctx.supervisor.worker_exited(), if wake_on_exit => {}
            }
        }
    }
}
