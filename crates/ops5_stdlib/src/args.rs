//! Argument decoding shared by the built-in commands.

use ops5_foundation::{Error, Result, Value};

/// Fails unless exactly `n` arguments were passed.
pub(crate) fn expect_arity(command: &str, args: &[Value], n: usize) -> Result<()> {
    if args.len() == n {
        Ok(())
    } else {
        Err(Error::arguments(format!(
            "{command} takes {n} argument(s), got {}",
            args.len()
        )))
    }
}

/// Reads a condition index.
pub(crate) fn index(command: &str, value: &Value) -> Result<usize> {
    value
        .as_int()
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| Error::arguments(format!("{command}: expected a condition index, got {value}")))
}

/// Reads a string argument (a fact type, field, or variable name).
pub(crate) fn name<'a>(command: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| Error::arguments(format!("{command}: expected a name, got {value}")))
}

/// Reads `field value field value ...`.
pub(crate) fn field_pairs(command: &str, args: &[Value]) -> Result<Vec<(String, Value)>> {
    if args.len() % 2 != 0 {
        return Err(Error::arguments(format!(
            "{command}: field {} has no value",
            args[args.len() - 1]
        )));
    }
    args.chunks_exact(2)
        .map(|pair| Ok((name(command, &pair[0])?.to_string(), pair[1].clone())))
        .collect()
}
