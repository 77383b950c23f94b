//! Capability interfaces for the external collaborators.
//!
//! The engine never talks to a reasoning backend directly; each phase goes
//! through one of these single-method traits with a typed request and an
//! explicit error channel. Any backing implementation (a hosted reasoning
//! service, a rule engine, a human-in-the-loop queue) can be substituted
//! without touching the engine. Tests use the scripted implementations in
//! `test_support`.

use crate::core::types::{Assessment, Decision, ExecutionResult, PerspectiveReport};
use crate::error::CollabError;
use crate::tree::NodeSpec;

/// Input to an Act invocation on one atomic task.
#[derive(Debug, Clone)]
pub struct ActRequest {
    pub task_id: String,
    pub description: String,
    /// Opaque reference to where the work happens (e.g. a workspace path).
    pub context_ref: String,
    /// Set when a Refine decision asked for this attempt to be reworked.
    pub needs_refinement: bool,
    pub refinement_notes: Option<String>,
}

/// Input to a single perspective's Assess invocation.
#[derive(Debug, Clone)]
pub struct AssessRequest {
    pub task_id: String,
    pub description: String,
    /// Absent when assessing a node that never ran Act (e.g. parent review).
    pub execution_result: Option<ExecutionResult>,
    /// Immutable snapshot of the full tree at assessment time.
    pub tree: NodeSpec,
}

/// Input to the Planner's Adapt invocation.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub task_id: String,
    pub description: String,
    pub assessment: Assessment,
    /// Immutable snapshot of the current tree.
    pub tree: NodeSpec,
    /// First-ever version of the tree, passed unchanged to every Adapt call
    /// so plan evolution can be checked against the original goal.
    pub original_intent: NodeSpec,
}

/// Performs the work of one atomic task.
pub trait Executor: Send + Sync {
    fn act(&self, request: &ActRequest) -> Result<ExecutionResult, CollabError>;
}

/// One independent assessment perspective.
pub trait Assessor: Send + Sync {
    fn assess(&self, request: &AssessRequest) -> Result<PerspectiveReport, CollabError>;
}

/// Decides how the plan adapts to an assessed execution.
pub trait Planner: Send + Sync {
    fn plan(&self, request: &PlanRequest) -> Result<Decision, CollabError>;
}
