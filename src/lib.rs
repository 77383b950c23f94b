//! Act/Assess/Adapt task-tree execution engine.
//!
//! The engine drives a mutable tree of tasks through repeated cycles: an
//! executor acts on the first pending leaf, independent perspectives assess
//! the result in parallel, and a planner adapts the plan (complete, retry,
//! decompose, refine, reorder, escalate). Failures are bounded by per-node
//! attempt budgets with exponential backoff, and every recovery-relevant
//! moment is checkpointed. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (selection, aggregation,
//!   mutation, invariants). No I/O, fully testable in isolation.
//! - **[`engine`]** and the I/O modules ([`store`], [`audit`]): everything
//!   side-effecting, isolated behind traits to enable scripting in tests.

pub mod audit;
pub mod clock;
pub mod collab;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod observers;
pub mod phase;
pub mod recovery;
pub mod select;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tree;
