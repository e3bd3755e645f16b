//! Test specs and the JSON tests file.
//!
//! ```json
//! [
//!   {
//!     "action": "command",
//!     "threads": 4,
//!     "use_admin": false,
//!     "use_isolated_tenants": true,
//!     "kwargs": { "command": "curl -sf http://target/health" }
//!   }
//! ]
//! ```

use crate::action::ActionOptions;
use crate::error::{Result, StressError};
use crate::registry::ActionRegistry;
use serde::Deserialize;
use std::path::Path;

/// One entry of the tests file; expands into `threads` workers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestSpec {
    /// Registered action name.
    pub action: String,
    /// Number of concurrent workers (default: 1).
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Run as the admin identity.
    #[serde(default)]
    pub use_admin: bool,
    /// Provision a fresh tenant/user per worker.
    #[serde(default, alias = "use_isolated_tenant")]
    pub use_isolated_tenants: bool,
    /// Options passed to the action's `setup`.
    #[serde(default)]
    pub kwargs: ActionOptions,
}

fn default_threads() -> usize {
    1
}

impl TestSpec {
    /// Spec running `threads` workers of `action` with no options.
    pub fn new(action: impl Into<String>, threads: usize) -> Self {
        Self {
            action: action.into(),
            threads,
            use_admin: false,
            use_isolated_tenants: false,
            kwargs: ActionOptions::new(),
        }
    }
}

/// Parse a JSON array of test specs.
pub fn parse_tests(json: &str) -> Result<Vec<TestSpec>> {
    Ok(serde_json::from_str(json)?)
}

/// Read and parse a tests file.
pub fn load_tests(path: &Path) -> Result<Vec<TestSpec>> {
    let content = std::fs::read_to_string(path)?;
    parse_tests(&content)
}

/// Reject specs that cannot run: no threads, empty or unknown action.
pub fn validate_tests(tests: &[TestSpec], registry: &ActionRegistry) -> Result<()> {
    for (index, test) in tests.iter().enumerate() {
        if test.action.trim().is_empty() {
            return Err(StressError::InvalidTest {
                index,
                reason: "action is empty".to_string(),
            });
        }
        if test.threads == 0 {
            return Err(StressError::InvalidTest {
                index,
                reason: "threads must be at least 1".to_string(),
            });
        }
        if !registry.contains(&test.action) {
            return Err(StressError::UnknownAction(test.action.clone()));
        }
    }
    Ok(())
}
