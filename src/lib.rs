//! ops5 - Forward-chaining production rule engine
//!
//! This crate re-exports all layers of the ops5 system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 4: ops5_runtime    - JSON rule-file loader, CLI
//! Layer 3: ops5_stdlib     - Built-in commands (remove, write, bind, halt, make, modify)
//! Layer 2: ops5_engine     - Matcher, conflict resolution, match-resolve-act loop
//! Layer 1: ops5_memory     - Facts, templates, deferred fact store
//! Layer 0: ops5_foundation - Core types (Value, Error)
//! ```

pub use ops5_engine as engine;
pub use ops5_foundation as foundation;
pub use ops5_memory as memory;
pub use ops5_runtime as runtime;
pub use ops5_stdlib as stdlib;
