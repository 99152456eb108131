//! Rule-file loader and CLI support for the ops5 rule engine.
//!
//! This crate provides:
//! - [`load_file`] / [`load_str`] - Read a JSON rule file into an [`ops5_engine::Engine`]
//! - [`init_tracing`] - Log setup shared by the binary and tests

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod loader;
pub mod logging;

pub use loader::{LoadSummary, load_file, load_str, load_value};
pub use logging::init_tracing;
