//! Production rules: conditions plus the actions they fire.
//!
//! Actions reference a [`Command`] by value. Each command carries an
//! explicit [`ExecMode`] tag; the engine runs `Sync` commands inline on
//! the loop thread and hands `Async` commands to the action worker pool.

use std::fmt;
use std::sync::Arc;

use ops5_foundation::{Result, Value};

use crate::context::ActionContext;
use crate::pattern::{Condition, Pattern};

// =============================================================================
// Command
// =============================================================================

/// How the engine dispatches a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ExecMode {
    /// Runs inline on the loop thread before the next action.
    #[default]
    Sync,
    /// Runs on the action pool; the engine continues immediately.
    Async,
}

/// An action verb a rule can invoke.
///
/// Arguments arrive already resolved against the firing's bindings.
pub trait Command: Send + Sync {
    /// Name used in rule files and diagnostics.
    fn name(&self) -> &str;

    /// Dispatch mode. Defaults to [`ExecMode::Sync`].
    fn mode(&self) -> ExecMode {
        ExecMode::Sync
    }

    /// Executes the command for one firing.
    ///
    /// # Errors
    /// Any error is reported as an action failure; it does not stop the
    /// remaining actions of the firing.
    fn exec(&self, ctx: &ActionContext, args: &[Value]) -> Result<()>;
}

type CommandFn = dyn Fn(&ActionContext, &[Value]) -> Result<()> + Send + Sync;

/// A command backed by a closure.
pub struct FnCommand {
    name: String,
    mode: ExecMode,
    func: Box<CommandFn>,
}

impl FnCommand {
    /// Creates a synchronous closure command.
    pub fn sync<F>(name: impl Into<String>, func: F) -> Arc<dyn Command>
    where
        F: Fn(&ActionContext, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        Arc::new(Self {
            name: name.into(),
            mode: ExecMode::Sync,
            func: Box::new(func),
        })
    }

    /// Creates an asynchronous closure command.
    pub fn async_<F>(name: impl Into<String>, func: F) -> Arc<dyn Command>
    where
        F: Fn(&ActionContext, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        Arc::new(Self {
            name: name.into(),
            mode: ExecMode::Async,
            func: Box::new(func),
        })
    }
}

impl Command for FnCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> ExecMode {
        self.mode
    }

    fn exec(&self, ctx: &ActionContext, args: &[Value]) -> Result<()> {
        (self.func)(ctx, args)
    }
}

// =============================================================================
// Action
// =============================================================================

/// An action parameter, resolved at dispatch time.
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    /// Passed through unchanged.
    Literal(Value),
    /// Replaced by the variable's binding; unbound is an error.
    Variable(String),
}

impl Param {
    /// Creates a literal parameter.
    #[must_use]
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Creates a variable parameter.
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{v:?}"),
            Self::Variable(name) => write!(f, "{name}"),
        }
    }
}

/// A command invocation with its parameter list.
#[derive(Clone)]
pub struct Action {
    /// The command to run.
    pub command: Arc<dyn Command>,
    /// Parameters in order.
    pub params: Vec<Param>,
}

impl Action {
    /// Creates an action with no parameters.
    #[must_use]
    pub fn new(command: Arc<dyn Command>) -> Self {
        Self {
            command,
            params: Vec::new(),
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn arg(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Appends several parameters.
    #[must_use]
    pub fn args(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        self.params.extend(params);
        self
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.command.name())?;
        for param in &self.params {
            write!(f, " {param}")?;
        }
        write!(f, ")")
    }
}

// =============================================================================
// Rule
// =============================================================================

/// A named production: conditions (a conjunctive query) and actions.
///
/// Built once with [`Rule::when`] and [`Rule::then`], then shared immutably.
#[derive(Clone, Debug)]
pub struct Rule {
    name: Arc<str>,
    conditions: Vec<Condition>,
    actions: Vec<Action>,
}

impl Rule {
    /// Creates a rule with no conditions or actions.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Appends a condition.
    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Appends an action.
    #[must_use]
    pub fn then(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared rule name.
    #[must_use]
    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// Conditions in declaration order.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Actions in declaration order.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Count of variable-bound fields across all conditions.
    #[must_use]
    pub fn specificity(&self) -> usize {
        self.conditions.iter().map(Condition::specificity).sum()
    }

    /// Names of the variables the conditions bind, in first-seen order.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        let mut vars: Vec<&str> = Vec::new();
        for (_, pattern) in self.conditions.iter().flat_map(|c| c.tests.iter()) {
            if let Pattern::Variable(name) = pattern {
                if !vars.contains(&name.as_str()) {
                    vars.push(name);
                }
            }
        }
        vars
    }
}
