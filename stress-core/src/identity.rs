//! Identities that workers act as.
//!
//! A worker runs either as the admin, as the configured default user, or as
//! a freshly provisioned isolated tenant/user pair. Provisioning itself is
//! delegated to an [`IdentityProvisioner`]; this crate never destroys the
//! identities it asks for.

use crate::config::IdentityConfig;
use crate::hooks::{CommandHook, HookError};
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;

const PASSWORD_LEN: usize = 16;

/// Credentials handed to an action factory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
    /// Tenant (project) name.
    pub tenant_name: String,
    /// Whether these are the admin credentials.
    pub is_admin: bool,
}

impl Credentials {
    /// Admin credentials from configuration.
    pub fn admin(config: &IdentityConfig) -> Self {
        Self {
            username: config.admin_username.clone(),
            password: config.admin_password.clone(),
            tenant_name: config.admin_tenant_name.clone(),
            is_admin: true,
        }
    }

    /// Default (non-admin) credentials from configuration.
    pub fn user(config: &IdentityConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            tenant_name: config.tenant_name.clone(),
            is_admin: false,
        }
    }
}

/// A per-worker tenant/user pair with a unique suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolatedIdentity {
    /// Generated user name.
    pub username: String,
    /// Generated tenant name.
    pub tenant_name: String,
    /// Generated password.
    pub password: String,
}

impl IsolatedIdentity {
    /// Generate a new identity with random names and password.
    pub fn generate() -> Self {
        let password = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(PASSWORD_LEN)
            .map(char::from)
            .collect();

        Self {
            username: rand_name("stress_user"),
            tenant_name: rand_name("stress_tenant"),
            password,
        }
    }

    /// Credentials for acting as this identity.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
            tenant_name: self.tenant_name.clone(),
            is_admin: false,
        }
    }
}

fn rand_name(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().as_simple())
}

/// Creates isolated identities on the target system.
#[async_trait]
pub trait IdentityProvisioner: Send + Sync {
    /// Create the tenant and user for `identity`.
    async fn provision(&self, identity: &IsolatedIdentity) -> Result<(), HookError>;
}

/// Provisioner that runs `hooks.provision_command`.
///
/// The command sees `STRESS_USERNAME`, `STRESS_TENANT` and `STRESS_PASSWORD`.
#[derive(Debug, Clone)]
pub struct CommandProvisioner {
    hook: CommandHook,
}

impl CommandProvisioner {
    /// Create a provisioner around an optional shell command.
    pub fn new(command: Option<String>) -> Self {
        Self {
            hook: CommandHook::new("provision", command),
        }
    }
}

#[async_trait]
impl IdentityProvisioner for CommandProvisioner {
    async fn provision(&self, identity: &IsolatedIdentity) -> Result<(), HookError> {
        self.hook
            .run(&[
                ("STRESS_USERNAME", identity.username.as_str()),
                ("STRESS_TENANT", identity.tenant_name.as_str()),
                ("STRESS_PASSWORD", identity.password.as_str()),
            ])
            .await?;
        tracing::debug!(
            username = %identity.username,
            tenant = %identity.tenant_name,
            "provisioned isolated identity"
        );
        Ok(())
    }
}
