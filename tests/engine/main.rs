//! Integration tests for Layer 2: Engine
//!
//! Tests for matching, conflict resolution, the cycle, and async actions.

mod async_actions;
mod cycle;
mod matching;
