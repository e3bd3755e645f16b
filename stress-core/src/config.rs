//! Configuration loading for stress-run.
//!
//! Configuration is loaded from an optional TOML file. Every section and
//! every field has a default, so an empty file is a valid configuration.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for stress-run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Target system and log monitoring configuration.
    pub stress: StressSection,
    /// Credentials used by workers.
    pub identity: IdentityConfig,
    /// Provisioning and cleanup hooks.
    pub hooks: HooksConfig,
    /// Log output configuration.
    pub logging: LoggingConfig,
}

/// What to do when a worker fails to start after others are running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupPolicy {
    /// Terminate the workers already started and fail the run.
    #[default]
    Abort,
    /// Keep the partial fleet running and mark the run as errored.
    Continue,
}

/// Target system and log monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StressSection {
    /// Controller host used to enumerate compute nodes.
    pub target_controller: Option<String>,
    /// SSH user on target nodes. Remote features are off when unset.
    pub target_ssh_user: Option<String>,
    /// SSH private key. Remote features are off when unset.
    pub target_private_key_path: Option<PathBuf>,
    /// Log file glob scanned on every node. Monitoring is off when unset.
    pub target_logfiles: Option<String>,
    /// Seconds between log scans, also the poll interval (default: 60).
    pub log_check_interval_secs: u64,
    /// Upper bound for a single remote command in seconds (default: 30).
    pub ssh_timeout_secs: u64,
    /// Command listing compute services on the controller.
    pub node_list_command: String,
    /// Field holding the host name in a listing line (default: 1).
    pub node_host_field: usize,
    /// Field holding the service state in a listing line (default: 4).
    pub node_status_field: usize,
    /// Value of the state field for a healthy node (default: `:-)`).
    pub node_happy_marker: String,
    /// Substrings that mark a log line as an error.
    pub error_markers: Vec<String>,
    /// Startup failure policy (default: abort).
    pub on_startup_failure: StartupPolicy,
}

/// Credentials used by workers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Admin user name.
    pub admin_username: String,
    /// Admin password.
    pub admin_password: String,
    /// Admin tenant name.
    pub admin_tenant_name: String,
    /// Default user name.
    pub username: String,
    /// Default user password.
    pub password: String,
    /// Default tenant name.
    pub tenant_name: String,
}

/// Provisioning and cleanup hooks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// Shell command creating an isolated tenant and user.
    pub provision_command: Option<String>,
    /// Shell command run after a successful run.
    pub cleanup_command: Option<String>,
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Debug log file (default: `stress.debug.log`).
    pub debug_log: Option<PathBuf>,
}

// Default value functions
fn default_log_check_interval() -> u64 {
    60
}

fn default_ssh_timeout() -> u64 {
    30
}

fn default_node_list_command() -> String {
    "nova-manage service list | grep ^nova-compute".to_string()
}

fn default_node_happy_marker() -> String {
    ":-)".to_string()
}

fn default_error_markers() -> Vec<String> {
    vec!["ERROR".to_string(), "TRACE".to_string()]
}

fn default_debug_log() -> PathBuf {
    PathBuf::from("stress.debug.log")
}

impl Default for StressSection {
    fn default() -> Self {
        Self {
            target_controller: None,
            target_ssh_user: None,
            target_private_key_path: None,
            target_logfiles: None,
            log_check_interval_secs: default_log_check_interval(),
            ssh_timeout_secs: default_ssh_timeout(),
            node_list_command: default_node_list_command(),
            node_host_field: 1,
            node_status_field: 4,
            node_happy_marker: default_node_happy_marker(),
            error_markers: default_error_markers(),
            on_startup_failure: StartupPolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            debug_log: Some(default_debug_log()),
        }
    }
}

impl StressSection {
    /// Poll and log-scan interval.
    pub fn log_check_interval(&self) -> Duration {
        Duration::from_secs(self.log_check_interval_secs)
    }

    /// Bound on a single remote command.
    pub fn ssh_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh_timeout_secs)
    }
}

impl StressConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
