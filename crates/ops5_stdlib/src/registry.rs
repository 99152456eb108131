//! Registry of commands available to rule files.
//!
//! Each registry is an owned value: every loader and test builds its own.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ops5_engine::Command;

use crate::control::{BindCommand, HaltCommand};
use crate::memory::{MakeCommand, ModifyCommand, RemoveCommand};
use crate::output::WriteCommand;

// =============================================================================
// CommandRegistry
// =============================================================================

/// Maps command names to commands.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command under its own name, replacing any previous one.
    pub fn register(&mut self, command: Arc<dyn Command>) {
        self.commands.insert(command.name().to_string(), command);
    }

    /// Registers a command under a different name.
    pub fn register_as(&mut self, name: impl Into<String>, command: Arc<dyn Command>) {
        self.commands.insert(name.into(), command);
    }

    /// Looks up a command.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    /// Checks if a command is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// A registry with every built-in command; `write` goes to stdout.
#[must_use]
pub fn default_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry.register(Arc::new(RemoveCommand));
    registry.register(Arc::new(WriteCommand::stdout()));
    registry.register(Arc::new(BindCommand));
    registry.register(Arc::new(HaltCommand));
    registry.register(Arc::new(MakeCommand));
    registry.register(Arc::new(ModifyCommand));
    registry
}
