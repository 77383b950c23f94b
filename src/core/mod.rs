//! Deterministic, pure logic shared by the execution engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod aggregate;
pub mod invariants;
pub mod mutate;
pub mod subtasks;
pub mod traversal;
pub mod types;
