//! Shared deterministic types for the engine core.
//!
//! These types define stable contracts between phases. They must not depend
//! on external state or I/O and must remain deterministic across runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three phases of one execution cycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Act,
    Assess,
    Adapt,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Act => "act",
            Phase::Assess => "assess",
            Phase::Adapt => "adapt",
        };
        f.write_str(label)
    }
}

/// Collaborator-declared outcome of an Act invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    Success,
    Failure,
    Partial,
}

/// Outcome of the Act phase for one atomic node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecStatus,
    /// Identifiers of artifacts touched (e.g. modified files).
    #[serde(default)]
    pub artifacts_changed: Vec<String>,
    pub summary: String,
    #[serde(default)]
    pub errors: Vec<String>,
    /// Opaque handle to where the changes were made.
    #[serde(default)]
    pub environment_reference: String,
}

impl ExecutionResult {
    /// Flatten errors/summary into one diagnostic line for failure records.
    pub fn failure_message(&self) -> String {
        if self.errors.is_empty() {
            self.summary.clone()
        } else {
            self.errors.join("; ")
        }
    }
}

/// Status declared by a single assessment perspective.
///
/// Aggregation priority: fail > warning > pass > unknown. `Unknown` also
/// covers perspectives that errored out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerspectiveStatus {
    Pass,
    Warning,
    Fail,
    Unknown,
}

/// One perspective's view of an execution result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveReport {
    /// Perspective name from engine configuration (e.g. "build").
    pub perspective: String,
    pub status: PerspectiveStatus,
    /// Absent means the perspective declined to score; excluded from the
    /// aggregate mean. Failed perspectives report `Some(0.0)`.
    pub confidence: Option<f64>,
    pub feasible: bool,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub observations: Vec<String>,
    /// Set when the perspective collaborator itself failed or timed out.
    #[serde(default)]
    pub error: Option<String>,
}

impl PerspectiveReport {
    /// Report standing in for a perspective whose collaborator failed.
    pub fn from_error(perspective: &str, message: &str) -> Self {
        Self {
            perspective: perspective.to_string(),
            status: PerspectiveStatus::Unknown,
            confidence: Some(0.0),
            feasible: false,
            blockers: Vec::new(),
            observations: Vec::new(),
            error: Some(message.to_string()),
        }
    }
}

/// Joined multi-perspective assessment. Carries every individual report so
/// no information is discarded before Adapt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub overall: PerspectiveStatus,
    /// Arithmetic mean of the present per-perspective confidences.
    pub confidence: f64,
    pub reports: Vec<PerspectiveReport>,
}

/// Kind of plan adaptation chosen by the Planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Complete,
    Retry,
    Decompose,
    Refine,
    Reorder,
    Escalate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionConfidence {
    Low,
    Medium,
    High,
}

/// Outcome of the Adapt phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub kind: DecisionKind,
    pub reasoning: String,
    pub confidence: DecisionConfidence,
    /// Structured-or-text payload; shape depends on `kind` (see the plan
    /// mutator).
    #[serde(default)]
    pub action_details: serde_json::Value,
}

impl Decision {
    /// Decision with an empty payload, for the common kinds.
    pub fn new(kind: DecisionKind, reasoning: &str) -> Self {
        Self {
            kind,
            reasoning: reasoning.to_string(),
            confidence: DecisionConfidence::Medium,
            action_details: serde_json::Value::Null,
        }
    }
}
