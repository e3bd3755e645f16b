//! Remote command execution on target nodes.
//!
//! [`SshChannel`] shells out to `ssh` via `tokio::process::Command`. Key
//! material must already be deployed; when the user or key is not
//! configured the channel is simply unavailable.

use crate::config::StressSection;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from remote command execution.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// SSH command failed to execute (process spawn error).
    #[error("ssh spawn error: {0}")]
    Spawn(#[from] std::io::Error),

    /// SSH command returned non-zero exit code.
    #[error("ssh command failed on {host}: exit={exit_code}, stderr={stderr}")]
    CommandFailed {
        /// Target host.
        host: String,
        /// Exit code.
        exit_code: i32,
        /// Standard error output.
        stderr: String,
    },

    /// The command did not finish in time.
    #[error("ssh command on {host} timed out after {after:?}")]
    Timeout {
        /// Target host.
        host: String,
        /// Configured bound.
        after: Duration,
    },
}

/// Runs a command on a named host.
#[async_trait]
pub trait RemoteExec: Send + Sync {
    /// Run `command` on `host`, returning its standard output.
    ///
    /// A non-zero exit status is an error.
    async fn run(&self, command: &str, host: &str) -> Result<String, RemoteError>;
}

/// SSH-backed [`RemoteExec`].
#[derive(Debug, Clone)]
pub struct SshChannel {
    /// SSH username.
    user: String,
    /// Private key passed with `-i`.
    key_path: PathBuf,
    /// Bound on a single command, connect included.
    timeout: Duration,
    /// Client binary (default: `ssh` from `PATH`).
    program: PathBuf,
}

impl SshChannel {
    /// Create a channel for `user` authenticating with `key_path`.
    pub fn new(user: impl Into<String>, key_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            user: user.into(),
            key_path: key_path.into(),
            timeout,
            program: PathBuf::from("ssh"),
        }
    }

    /// Use a different client binary taking `ssh`-compatible arguments.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Build a channel from configuration.
    ///
    /// Returns `None` when the SSH user or private key is missing.
    pub fn from_config(config: &StressSection) -> Option<Self> {
        let user = config.target_ssh_user.as_deref().filter(|u| !u.is_empty())?;
        let key_path = config.target_private_key_path.as_ref()?;
        Some(Self::new(user, key_path.clone(), config.ssh_timeout()))
    }

    fn args(&self, command: &str, host: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.key_path.display().to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.timeout.as_secs().max(1)),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            format!("{}@{}", self.user, host),
            command.to_string(),
        ]
    }
}

#[async_trait]
impl RemoteExec for SshChannel {
    async fn run(&self, command: &str, host: &str) -> Result<String, RemoteError> {
        let child = tokio::process::Command::new(&self.program)
            .args(self.args(command, host))
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| RemoteError::Timeout {
                host: host.to_string(),
                after: self.timeout,
            })??;

        if !output.status.success() {
            return Err(RemoteError::CommandFailed {
                host: host.to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
