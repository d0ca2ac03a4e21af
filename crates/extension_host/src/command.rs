//! Command registry
//!
//! Commands are registered by modules during `load` and executed by id.
//! Registration overwrites on collision (with a warning); execution checks
//! the optional `when` guard before running the handler.

use crate::context::CapabilityContext;
use crate::error::{HostError, HostResult};
use crate::registry::KeyedStore;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, warn};

type CommandHandlerFn = dyn Fn(CapabilityContext) -> BoxFuture<'static, HostResult<()>> + Send + Sync;
type CommandGuardFn = dyn Fn(&CapabilityContext) -> bool + Send + Sync;

/// A command descriptor
#[derive(Clone)]
pub struct Command {
    pub id: String,
    pub title: String,
    pub category: Option<String>,
    pub keybinding: Option<String>,
    when: Option<Arc<CommandGuardFn>>,
    handler: Arc<CommandHandlerFn>,
}

impl Command {
    /// Create a command from an async handler
    pub fn new<F, Fut>(id: impl Into<String>, title: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CapabilityContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HostResult<()>> + Send + 'static,
    {
        Self {
            id: id.into(),
            title: title.into(),
            category: None,
            keybinding: None,
            when: None,
            handler: Arc::new(move |ctx| handler(ctx).boxed()),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_keybinding(mut self, keybinding: impl Into<String>) -> Self {
        self.keybinding = Some(keybinding.into());
        self
    }

    /// Only run the command while `guard` returns true
    pub fn with_when<G>(mut self, guard: G) -> Self
    where
        G: Fn(&CapabilityContext) -> bool + Send + Sync + 'static,
    {
        self.when = Some(Arc::new(guard));
        self
    }

    /// Evaluate the `when` guard; commands without one are always enabled
    pub fn is_enabled(&self, context: &CapabilityContext) -> bool {
        self.when.as_ref().map(|guard| guard(context)).unwrap_or(true)
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("category", &self.category)
            .field("keybinding", &self.keybinding)
            .field("has_when", &self.when.is_some())
            .finish()
    }
}

/// Result of [`CommandRegistry::execute`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The handler ran to completion
    Executed,
    /// The `when` guard returned false; the handler was not called
    Skipped,
}

/// Registry of commands keyed by id
pub struct CommandRegistry {
    commands: KeyedStore<Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: KeyedStore::new("Command"),
        }
    }

    /// Register a command, overwriting any command with the same id
    pub fn register(&self, command: Command) {
        let id = command.id.clone();
        self.commands.insert(&id, command);
    }

    /// Remove a command; absent ids are ignored
    pub fn unregister(&self, id: &str) {
        self.commands.remove(id);
    }

    pub fn get(&self, id: &str) -> Option<Arc<Command>> {
        self.commands.get(id)
    }

    pub fn has(&self, id: &str) -> bool {
        self.commands.contains(id)
    }

    /// All commands in registration order
    pub fn list(&self) -> Vec<Arc<Command>> {
        self.commands.values()
    }

    /// Commands in one category, in registration order
    pub fn list_by_category(&self, category: &str) -> Vec<Arc<Command>> {
        self.commands
            .values()
            .into_iter()
            .filter(|command| command.category.as_deref() == Some(category))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.len() == 0
    }

    /// Execute a command by id
    pub async fn execute(&self, id: &str, context: &CapabilityContext) -> HostResult<CommandOutcome> {
        let command = self
            .commands
            .get(id)
            .ok_or_else(|| HostError::CommandNotFound(id.to_string()))?;

        if !command.is_enabled(context) {
            warn!("Command '{}' is not enabled in the current context, skipping", id);
            return Ok(CommandOutcome::Skipped);
        }

        debug!("Executing command '{}'", id);
        match (command.handler)(context.clone()).await {
            Ok(()) => Ok(CommandOutcome::Executed),
            Err(e) => {
                error!("Command '{}' failed: {}", id, e);
                Err(e)
            }
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
