//! Working memory for the ops5 rule engine.
//!
//! This crate provides:
//! - [`Fact`] - A typed record instance with identity
//! - [`Template`] - The literalized schema (field names and defaults) for a type
//! - [`FactStore`] - Type-indexed live facts plus the pending insertion queue
//! - [`MemoryHandle`] - Thread-safe handle for producers on other threads

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod fact;
pub mod store;
pub mod template;

pub use fact::{Fact, FactId, Fields};
pub use store::{FactStore, MemoryHandle, Snapshot};
pub use template::Template;
