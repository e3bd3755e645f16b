//! Post-run environment cleanup.
//!
//! Invoked exactly once, and only when the run finished without errors.

use crate::hooks::{CommandHook, HookError};
use async_trait::async_trait;

/// Tears down whatever the run left behind on the target.
#[async_trait]
pub trait Cleanup: Send + Sync {
    /// Perform the cleanup.
    async fn cleanup(&self) -> Result<(), HookError>;
}

/// Cleanup that runs `hooks.cleanup_command`; a no-op when none is set.
#[derive(Debug, Clone)]
pub struct CommandCleanup {
    hook: CommandHook,
}

impl CommandCleanup {
    /// Create a cleanup around an optional shell command.
    pub fn new(command: Option<String>) -> Self {
        Self {
            hook: CommandHook::new("cleanup", command),
        }
    }
}

#[async_trait]
impl Cleanup for CommandCleanup {
    async fn cleanup(&self) -> Result<(), HookError> {
        if !self.hook.is_configured() {
            tracing::debug!("Cleanup hook not configured, nothing to do");
            return Ok(());
        }

        let output = self.hook.run(&[]).await?;
        for line in output.lines().filter(|l| !l.trim().is_empty()) {
            tracing::info!("cleanup: {}", line);
        }
        Ok(())
    }
}
