//! Matching, conflict resolution, and the engine loop for ops5.
//!
//! This crate provides:
//! - [`Rule`] - Named productions built from [`Condition`]s and [`Action`]s
//! - [`Matcher`] - Backtracking search for one distinct-fact match per rule
//! - [`ConflictResolver`] - Refractory selection among candidate matches
//! - [`Engine`] - The match-resolve-act cycle with sync and async actions
//! - [`WorkerPool`] / [`AsyncExecutor`] - Thread pools for matching and actions

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod context;
pub mod engine;
pub mod executor;
pub mod matcher;
pub mod pattern;
pub mod pool;
pub mod resolve;
pub mod rule;

pub use config::EngineConfig;
pub use context::{ActionContext, HaltHandle};
pub use engine::{ActionFailure, Engine, EngineState, RunOutcome, RunReport};
pub use executor::{AsyncExecutor, Ticket};
pub use matcher::{Match, Matcher};
pub use pattern::{Bindings, Condition, Pattern, VARIABLE_SIGIL, is_variable_name};
pub use pool::WorkerPool;
pub use resolve::ConflictResolver;
pub use rule::{Action, Command, ExecMode, FnCommand, Param, Rule};
