//! Built-in action commands for the ops5 rule engine.
//!
//! This crate provides the command catalog rule files refer to by name:
//! - Memory: `remove`, `make`, `modify`
//! - Control: `bind`, `halt`, and the [`Async`] adapter
//! - Output: `write`
//!
//! [`default_registry`] returns a [`CommandRegistry`] with all of them.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod args;
pub mod control;
pub mod memory;
pub mod output;
pub mod registry;

pub use control::{Async, BindCommand, HaltCommand};
pub use memory::{MakeCommand, ModifyCommand, RemoveCommand};
pub use output::WriteCommand;
pub use registry::{CommandRegistry, default_registry};
