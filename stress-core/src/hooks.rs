//! Local shell-command hooks.
//!
//! Provisioning and cleanup both delegate to an operator-supplied command
//! run through `sh -c`. Inputs travel as environment variables.

use thiserror::Error;

/// Errors from running a hook command.
#[derive(Debug, Error)]
pub enum HookError {
    /// No command is configured for this hook.
    #[error("{hook} hook is not configured")]
    NotConfigured {
        /// Hook name.
        hook: &'static str,
    },

    /// The command could not be started.
    #[error("hook spawn error: {0}")]
    Spawn(#[from] std::io::Error),

    /// The command exited non-zero.
    #[error("{hook} hook failed: exit={exit_code}, stderr={stderr}")]
    Failed {
        /// Hook name.
        hook: &'static str,
        /// Exit code (-1 when killed by a signal).
        exit_code: i32,
        /// Standard error output.
        stderr: String,
    },
}

/// A configured shell command.
#[derive(Debug, Clone)]
pub struct CommandHook {
    name: &'static str,
    command: Option<String>,
}

impl CommandHook {
    /// Create a hook; `command = None` leaves it unconfigured.
    pub fn new(name: &'static str, command: Option<String>) -> Self {
        Self { name, command }
    }

    /// Whether a command is configured.
    pub fn is_configured(&self) -> bool {
        self.command.is_some()
    }

    /// Run the command with `env` added to its environment.
    ///
    /// Returns the command's standard output.
    pub async fn run(&self, env: &[(&str, &str)]) -> Result<String, HookError> {
        let command = self
            .command
            .as_deref()
            .ok_or(HookError::NotConfigured { hook: self.name })?;

        tracing::debug!(hook = self.name, command, "running hook");

        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .envs(env.iter().copied())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(HookError::Failed {
                hook: self.name,
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
