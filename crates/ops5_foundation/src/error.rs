//! Error types for the ops5 engine.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for engine operations.
#[derive(Debug, Error, Clone)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates an error for a fact type that was never literalized.
    #[must_use]
    pub fn schema(fact_type: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema {
            fact_type: fact_type.into(),
        })
    }

    /// Creates an error for a field that is not part of a fact type's schema.
    #[must_use]
    pub fn field(fact_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(ErrorKind::Field {
            fact_type: fact_type.into(),
            field: field.into(),
        })
    }

    /// Creates an error for a condition index outside the current match.
    #[must_use]
    pub fn index(index: usize, len: usize) -> Self {
        Self::new(ErrorKind::Index { index, len })
    }

    /// Creates an unbound variable error.
    #[must_use]
    pub fn unbound_variable(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnboundVariable(name.into()))
    }

    /// Wraps the failure of a single action.
    #[must_use]
    pub fn action_execution(
        rule: impl Into<String>,
        command: impl Into<String>,
        cause: &Error,
    ) -> Self {
        Self::new(ErrorKind::ActionExecution {
            rule: rule.into(),
            command: command.into(),
            message: cause.to_string(),
        })
    }

    /// Creates an error for malformed command arguments.
    #[must_use]
    pub fn arguments(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Arguments(message.into()))
    }

    /// Creates an error for a removal attempted off the engine loop thread.
    #[must_use]
    pub fn async_removal(index: usize) -> Self {
        Self::new(ErrorKind::AsyncRemoval { index })
    }

    /// Creates an error for work submitted after shutdown.
    #[must_use]
    pub fn shutdown() -> Self {
        Self::new(ErrorKind::Shutdown)
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Creates a rule-file loading error.
    #[must_use]
    pub fn load(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Load(message.into()))
    }

    /// Returns true if this is a schema error.
    #[must_use]
    pub fn is_schema(&self) -> bool {
        matches!(self.kind, ErrorKind::Schema { .. })
    }

    /// Returns true if this is a field error.
    #[must_use]
    pub fn is_field(&self) -> bool {
        matches!(self.kind, ErrorKind::Field { .. })
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fact creation referenced a type with no registered template.
    #[error("fact type {fact_type} not literalized")]
    Schema {
        /// The unregistered type.
        fact_type: String,
    },

    /// A field is not part of the type's schema.
    #[error("field {field} is not part of the schema for {fact_type}")]
    Field {
        /// The fact type being created or modified.
        fact_type: String,
        /// The offending field name.
        field: String,
    },

    /// Condition index outside the current match.
    #[error("condition index {index} out of range (match has {len} facts)")]
    Index {
        /// The index that was requested.
        index: usize,
        /// Number of facts in the match.
        len: usize,
    },

    /// Variable referenced without a binding.
    #[error("unbound variable: {0}")]
    UnboundVariable(String),

    /// An action's command failed during execution.
    #[error("action {command} in rule {rule} failed: {message}")]
    ActionExecution {
        /// The rule whose action failed.
        rule: String,
        /// The command name.
        command: String,
        /// Rendered cause.
        message: String,
    },

    /// A fact removal was attempted from an asynchronous action.
    #[error("cannot remove matched fact {index} outside the engine loop thread")]
    AsyncRemoval {
        /// The condition index that was requested.
        index: usize,
    },

    /// A command received arguments it cannot use.
    #[error("bad arguments: {0}")]
    Arguments(String),

    /// The rule file could not be loaded.
    #[error("load error: {0}")]
    Load(String),

    /// Work was submitted after the worker pool shut down.
    #[error("worker pool has been shut down")]
    Shutdown,

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Rule name or rule-file path.
    pub source: Option<String>,
    /// Stack of commands or statements leading to the error.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source location.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "at {source}")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
