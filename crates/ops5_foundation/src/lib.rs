//! Core values and error types for the ops5 rule engine.
//!
//! This crate provides:
//! - [`Value`] - The value type stored in fact fields and bound to variables
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod value;

pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use value::Value;
