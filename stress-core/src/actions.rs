//! Built-in actions.
//!
//! - `echo`: succeeds every iteration
//! - `sleep`: sleeps `duration_ms` (default 100) per iteration
//! - `command`: runs `sh -c <command>` locally; non-zero exit fails the iteration

use crate::action::{ActionError, ActionOptions, StressAction};
use async_trait::async_trait;
use std::time::Duration;

const DEFAULT_SLEEP_MS: u64 = 100;

/// Succeeds on every iteration.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoAction;

#[async_trait]
impl StressAction for EchoAction {
    async fn run(&mut self) -> Result<(), ActionError> {
        tracing::trace!("echo");
        Ok(())
    }
}

/// Sleeps for a fixed interval per iteration.
#[derive(Debug, Clone)]
pub struct SleepAction {
    interval: Duration,
}

impl Default for SleepAction {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_SLEEP_MS),
        }
    }
}

#[async_trait]
impl StressAction for SleepAction {
    async fn setup(&mut self, options: &ActionOptions) -> Result<(), ActionError> {
        if let Some(ms) = optional_u64(options, "duration_ms")? {
            self.interval = Duration::from_millis(ms);
        }
        Ok(())
    }

    async fn run(&mut self) -> Result<(), ActionError> {
        tokio::time::sleep(self.interval).await;
        Ok(())
    }
}

/// Runs a local shell command per iteration.
#[derive(Debug, Clone, Default)]
pub struct CommandAction {
    command: String,
    fail_on_stderr: bool,
}

#[async_trait]
impl StressAction for CommandAction {
    async fn setup(&mut self, options: &ActionOptions) -> Result<(), ActionError> {
        self.command = match options.get("command") {
            Some(serde_json::Value::String(cmd)) if !cmd.trim().is_empty() => cmd.clone(),
            Some(_) => return Err(invalid("command", "expected a non-empty string")),
            None => return Err(invalid("command", "missing")),
        };
        self.fail_on_stderr = match options.get("fail_on_stderr") {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(_) => return Err(invalid("fail_on_stderr", "expected a boolean")),
            None => false,
        };
        Ok(())
    }

    async fn run(&mut self) -> Result<(), ActionError> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ActionError::Failed(format!(
                "`{}` exited with {}",
                self.command, output.status
            )));
        }
        if self.fail_on_stderr && !output.stderr.is_empty() {
            return Err(ActionError::Failed(format!(
                "`{}` wrote to stderr: {}",
                self.command,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ActionError {
    ActionError::InvalidOption {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn optional_u64(options: &ActionOptions, key: &str) -> Result<Option<u64>, ActionError> {
    match options.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| invalid(key, "expected a non-negative integer")),
    }
}
