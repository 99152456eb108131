//! Commands that steer the firing or the engine rather than memory.

use ops5_engine::{ActionContext, Command, ExecMode};
use ops5_foundation::{Result, Value};
use tracing::debug;

use crate::args;

/// `bind $name value` binds a variable for the rest of the firing.
///
/// The loader passes the variable name as a literal string.
#[derive(Clone, Copy, Debug, Default)]
pub struct BindCommand;

impl Command for BindCommand {
    fn name(&self) -> &str {
        "bind"
    }

    fn exec(&self, ctx: &ActionContext, args: &[Value]) -> Result<()> {
        args::expect_arity(self.name(), args, 2)?;
        let var = args::name(self.name(), &args[0])?;
        ctx.set_var(var, args[1].clone());
        Ok(())
    }
}

/// `halt` stops the engine at the next cycle boundary.
#[derive(Clone, Copy, Debug, Default)]
pub struct HaltCommand;

impl Command for HaltCommand {
    fn name(&self) -> &str {
        "halt"
    }

    fn exec(&self, ctx: &ActionContext, args: &[Value]) -> Result<()> {
        args::expect_arity(self.name(), args, 0)?;
        debug!(rule = ctx.rule_name(), "halt requested");
        ctx.halt();
        Ok(())
    }
}

/// Runs the wrapped command on the action pool.
///
/// The engine moves on without waiting; the wrapped command sees the
/// bindings as they were at dispatch and cannot remove matched facts.
#[derive(Clone, Copy, Debug, Default)]
pub struct Async<C>(pub C);

impl<C: Command> Command for Async<C> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn mode(&self) -> ExecMode {
        ExecMode::Async
    }

    fn exec(&self, ctx: &ActionContext, args: &[Value]) -> Result<()> {
        self.0.exec(ctx, args)
    }
}
