//! Stable exit codes for triad CLI commands.

/// Command succeeded or a pending task was selected.
pub const OK: i32 = 0;
/// Command failed due to invalid config/tree or other errors.
pub const INVALID: i32 = 1;
/// `triad select` found no pending task (tree resolved).
pub const COMPLETE: i32 = 2;
/// The tree resolved with escalated or failed subtrees.
pub const PARTIAL: i32 = 3;
