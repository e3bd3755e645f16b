//! In-memory fakes for the collaborator traits, shared by unit tests.

use crate::action::{ActionError, ActionOptions, StressAction};
use crate::cleanup::Cleanup;
use crate::hooks::HookError;
use crate::identity::{IdentityProvisioner, IsolatedIdentity};
use crate::registry::ActionRegistry;
use crate::remote::{RemoteError, RemoteExec};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Remote channel answering from a per-host script.
///
/// Commands are matched by prefix; hosts without a matching entry fail
/// like an unreachable node.
#[derive(Default)]
pub(crate) struct ScriptedRemote {
    replies: Mutex<HashMap<(String, String), String>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedRemote {
    pub(crate) fn reply(&self, host: &str, prefix: &str, output: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert((host.to_string(), prefix.to_string()), output.to_string());
    }

    pub(crate) fn calls_to(&self, host: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, c)| c.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteExec for ScriptedRemote {
    async fn run(&self, command: &str, host: &str) -> Result<String, RemoteError> {
        self.calls
            .lock()
            .unwrap()
            .push((host.to_string(), command.to_string()));
        self.replies
            .lock()
            .unwrap()
            .iter()
            .find(|((h, prefix), _)| h == host && command.starts_with(prefix.as_str()))
            .map(|(_, out)| out.clone())
            .ok_or_else(|| RemoteError::CommandFailed {
                host: host.to_string(),
                exit_code: 255,
                stderr: "unreachable".to_string(),
            })
    }
}

/// Succeeds `ok_runs` times, then fails every iteration.
pub(crate) struct FailAfter {
    pub(crate) ok_runs: u64,
    done: u64,
}

impl FailAfter {
    pub(crate) fn new(ok_runs: u64) -> Self {
        Self { ok_runs, done: 0 }
    }
}

#[async_trait]
impl StressAction for FailAfter {
    async fn run(&mut self) -> Result<(), ActionError> {
        self.done += 1;
        if self.done > self.ok_runs {
            return Err(ActionError::Failed("scripted failure".into()));
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        Ok(())
    }
}

/// Rejects every setup.
pub(crate) struct BadSetup;

#[async_trait]
impl StressAction for BadSetup {
    async fn setup(&mut self, _options: &ActionOptions) -> Result<(), ActionError> {
        Err(ActionError::InvalidOption {
            key: "flavor".into(),
            reason: "missing".into(),
        })
    }

    async fn run(&mut self) -> Result<(), ActionError> {
        Ok(())
    }
}

/// Panics on its first iteration.
pub(crate) struct Panics;

#[async_trait]
impl StressAction for Panics {
    async fn run(&mut self) -> Result<(), ActionError> {
        panic!("action blew up");
    }
}

/// Never finishes an iteration.
pub(crate) struct Hangs;

#[async_trait]
impl StressAction for Hangs {
    async fn run(&mut self) -> Result<(), ActionError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Builtins plus the fakes above.
pub(crate) fn registry() -> ActionRegistry {
    let mut registry = ActionRegistry::with_builtins();
    registry.register("fail_after_3", |_| Box::new(FailAfter::new(3)));
    registry.register("bad_setup", |_| Box::new(BadSetup));
    registry.register("panics", |_| Box::new(Panics));
    registry.register("hangs", |_| Box::new(Hangs));
    registry
}

/// Counts cleanup invocations.
#[derive(Default)]
pub(crate) struct RecordingCleanup {
    pub(crate) calls: AtomicUsize,
}

impl RecordingCleanup {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Cleanup for RecordingCleanup {
    async fn cleanup(&self) -> Result<(), HookError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records provisioned identities; optionally fails every request.
#[derive(Default)]
pub(crate) struct RecordingProvisioner {
    pub(crate) fail: bool,
    pub(crate) identities: Mutex<Vec<IsolatedIdentity>>,
}

impl RecordingProvisioner {
    pub(crate) fn provisioned(&self) -> Vec<IsolatedIdentity> {
        self.identities.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvisioner for RecordingProvisioner {
    async fn provision(&self, identity: &IsolatedIdentity) -> Result<(), HookError> {
        if self.fail {
            return Err(HookError::NotConfigured { hook: "provision" });
        }
        self.identities.lock().unwrap().push(identity.clone());
        Ok(())
    }
}
