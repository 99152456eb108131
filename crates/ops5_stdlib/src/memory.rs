//! Commands that change working memory.
//!
//! Condition indexes are zero-based: `0` is the fact matched by the rule's
//! first condition.

use ops5_engine::{ActionContext, Command};
use ops5_foundation::{Error, Result, Value};

use crate::args;

/// `remove idx...` removes the matched fact at each condition index.
#[derive(Clone, Copy, Debug, Default)]
pub struct RemoveCommand;

impl Command for RemoveCommand {
    fn name(&self) -> &str {
        "remove"
    }

    fn exec(&self, ctx: &ActionContext, args: &[Value]) -> Result<()> {
        if args.is_empty() {
            return Err(Error::arguments("remove needs at least one condition index"));
        }
        for arg in args {
            ctx.remove_matched(args::index(self.name(), arg)?)?;
        }
        Ok(())
    }
}

/// `make type field value ...` creates a fact from the type's template.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeCommand;

impl Command for MakeCommand {
    fn name(&self) -> &str {
        "make"
    }

    fn exec(&self, ctx: &ActionContext, args: &[Value]) -> Result<()> {
        let Some((fact_type, rest)) = args.split_first() else {
            return Err(Error::arguments("make needs a fact type"));
        };
        let fact_type = args::name(self.name(), fact_type)?;
        let values = args::field_pairs(self.name(), rest)?;
        ctx.create_fact(fact_type, &values)?;
        Ok(())
    }
}

/// `modify idx field value ...` overwrites fields of a matched fact.
#[derive(Clone, Copy, Debug, Default)]
pub struct ModifyCommand;

impl Command for ModifyCommand {
    fn name(&self) -> &str {
        "modify"
    }

    fn exec(&self, ctx: &ActionContext, args: &[Value]) -> Result<()> {
        let Some((index, rest)) = args.split_first() else {
            return Err(Error::arguments("modify needs a condition index"));
        };
        let index = args::index(self.name(), index)?;
        let values = args::field_pairs(self.name(), rest)?;
        ctx.modify_matched(index, &values)
    }
}
