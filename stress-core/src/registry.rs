//! Static action registry.
//!
//! Maps an action name (the `action` field of a test spec) to a factory
//! producing a fresh [`StressAction`] per worker. Names are resolved when the
//! test list is validated, before any worker starts.

use crate::action::{ActionContext, StressAction};
use crate::actions::{CommandAction, EchoAction, SleepAction};
use crate::error::{Result, StressError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds one action instance for one worker.
pub type ActionFactory = Arc<dyn Fn(&ActionContext) -> Box<dyn StressAction> + Send + Sync>;

/// Name → factory mapping.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    factories: BTreeMap<String, ActionFactory>,
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}

impl ActionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in actions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("echo", |_| Box::new(EchoAction));
        registry.register("sleep", |_| Box::new(SleepAction::default()));
        registry.register("command", |_| Box::new(CommandAction::default()));
        registry
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ActionContext) -> Box<dyn StressAction> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build a new instance of `name`.
    pub fn create(&self, name: &str, ctx: &ActionContext) -> Result<Box<dyn StressAction>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| StressError::UnknownAction(name.to_string()))?;
        Ok(factory(ctx))
    }
}
