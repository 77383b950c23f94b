//! Engine-owned plan mutations driven by Adapt decisions.

use thiserror::Error;

use crate::core::subtasks::{parse_subtasks, subtask_max_attempts};
use crate::core::types::{Decision, DecisionKind};
use crate::tree::{NodeId, NodePolicy, NodeSpec, TaskStatus, TaskTree};

/// The mutation could not be applied; the node stays unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("decompose produced no subtasks for '{0}'")]
    EmptyDecomposition(String),
    #[error("decompose would duplicate id '{0}'")]
    DuplicateChildId(String),
    #[error("reorder requires at least 2 pending siblings around '{0}'")]
    NotEnoughSiblings(String),
    #[error("reorder payload for '{node}' is invalid: {reason}")]
    InvalidReorder { node: String, reason: String },
}

/// Defaults applied to nodes created by decomposition.
#[derive(Debug, Clone, Copy)]
pub struct DecomposeDefaults {
    /// `max_attempts` for new children unless the payload specifies one.
    pub max_attempts: u32,
}

impl Default for DecomposeDefaults {
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

/// What a successful mutation did to the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationSummary {
    pub kind: DecisionKind,
    pub status_after: TaskStatus,
    /// Ids of children created by a Decompose.
    pub children_added: Vec<String>,
    /// Retry with an exhausted attempt budget degrades to escalation.
    pub escalated_instead: bool,
}

/// Apply `decision` to the node at `id`.
///
/// Success means the tree edit was applied, not that the underlying task
/// succeeded. On error the tree is left unchanged.
pub fn apply_decision(
    tree: &mut TaskTree,
    id: NodeId,
    decision: &Decision,
    defaults: &DecomposeDefaults,
) -> Result<MutationSummary, MutationError> {
    match decision.kind {
        DecisionKind::Complete => {
            let node = tree.node_mut(id);
            node.status = TaskStatus::Completed;
            Ok(summary(decision.kind, TaskStatus::Completed))
        }
        DecisionKind::Retry => apply_retry(tree, id, decision),
        DecisionKind::Decompose => apply_decompose(tree, id, decision, defaults),
        DecisionKind::Refine => {
            let node = tree.node_mut(id);
            node.needs_refinement = true;
            node.refinement_notes = Some(payload_text(decision));
            node.status = TaskStatus::Pending;
            Ok(summary(decision.kind, TaskStatus::Pending))
        }
        DecisionKind::Reorder => apply_reorder(tree, id, decision),
        DecisionKind::Escalate => {
            escalate(tree, id, &decision.reasoning);
            Ok(summary(decision.kind, TaskStatus::Escalated))
        }
    }
}

fn apply_retry(
    tree: &mut TaskTree,
    id: NodeId,
    decision: &Decision,
) -> Result<MutationSummary, MutationError> {
    let node = tree.node_mut(id);
    if node.retry_count < node.policy.max_attempts {
        node.retry_count += 1;
        node.status = TaskStatus::Pending;
        return Ok(summary(DecisionKind::Retry, TaskStatus::Pending));
    }
    // Attempts exhausted: the retry becomes an escalation.
    escalate(tree, id, &decision.reasoning);
    Ok(MutationSummary {
        escalated_instead: true,
        ..summary(DecisionKind::Retry, TaskStatus::Escalated)
    })
}

fn apply_decompose(
    tree: &mut TaskTree,
    id: NodeId,
    decision: &Decision,
    defaults: &DecomposeDefaults,
) -> Result<MutationSummary, MutationError> {
    let node_id = tree.node(id).id.clone();
    let descriptions = parse_subtasks(&decision.action_details);
    if descriptions.is_empty() {
        return Err(MutationError::EmptyDecomposition(node_id));
    }

    let parent = tree.node(id);
    let child_policy = NodePolicy {
        max_attempts: subtask_max_attempts(&decision.action_details)
            .unwrap_or(defaults.max_attempts),
        max_depth: parent.policy.max_depth,
        timeout_seconds: parent.policy.timeout_seconds,
    };
    let failure_threshold = parent.failure_threshold;

    // Validate derived ids up front so a failed mutation leaves no partial edit.
    let child_ids: Vec<String> = (1..=descriptions.len())
        .map(|ordinal| format!("{node_id}.{ordinal}"))
        .collect();
    if let Some(taken) = child_ids.iter().find(|child| tree.lookup(child).is_some()) {
        return Err(MutationError::DuplicateChildId(taken.clone()));
    }

    let mut children_added = Vec::new();
    for (child_id, description) in child_ids.iter().zip(&descriptions) {
        let mut spec = NodeSpec::new(child_id, description);
        spec.policy = child_policy;
        spec.failure_threshold = failure_threshold;
        tree.add_child(id, spec)
            .map_err(|_| MutationError::DuplicateChildId(child_id.clone()))?;
        children_added.push(child_id.clone());
    }
    tree.node_mut(id).status = TaskStatus::Decomposed;

    Ok(MutationSummary {
        children_added,
        ..summary(DecisionKind::Decompose, TaskStatus::Decomposed)
    })
}

fn apply_reorder(
    tree: &mut TaskTree,
    id: NodeId,
    decision: &Decision,
) -> Result<MutationSummary, MutationError> {
    let node_id = tree.node(id).id.clone();
    let Some(parent) = tree.node(id).parent else {
        return Err(MutationError::NotEnoughSiblings(node_id));
    };
    let siblings = tree.node(parent).children.clone();
    let pending = siblings
        .iter()
        .filter(|&&sibling| tree.node(sibling).status == TaskStatus::Pending)
        .count();
    if pending < 2 {
        return Err(MutationError::NotEnoughSiblings(node_id));
    }

    let desired: Vec<String> = match decision.action_details.as_array() {
        Some(items) => items
            .iter()
            .filter_map(|value| value.as_str())
            .map(str::to_string)
            .collect(),
        None => {
            return Err(MutationError::InvalidReorder {
                node: node_id,
                reason: "payload must be a JSON array of sibling ids".to_string(),
            });
        }
    };
    if desired.len() != siblings.len() {
        return Err(MutationError::InvalidReorder {
            node: node_id,
            reason: format!(
                "payload lists {} ids but there are {} siblings",
                desired.len(),
                siblings.len()
            ),
        });
    }

    let mut order = Vec::with_capacity(siblings.len());
    for wanted in &desired {
        let found = siblings
            .iter()
            .copied()
            .find(|&sibling| tree.node(sibling).id == *wanted);
        match found {
            Some(sibling) if !order.contains(&sibling) => order.push(sibling),
            _ => {
                return Err(MutationError::InvalidReorder {
                    node: node_id,
                    reason: format!("'{wanted}' is not a sibling or repeats"),
                });
            }
        }
    }
    tree.reorder_children(parent, order);

    // The reordered node itself stays unresolved.
    let node = tree.node_mut(id);
    if node.status == TaskStatus::InProgress {
        node.status = TaskStatus::Pending;
    }
    Ok(summary(DecisionKind::Reorder, tree.node(id).status))
}

fn escalate(tree: &mut TaskTree, id: NodeId, reasoning: &str) {
    let node = tree.node_mut(id);
    node.status = TaskStatus::Escalated;
    node.escalation_reason = Some(reasoning.to_string());
}

fn payload_text(decision: &Decision) -> String {
    match &decision.action_details {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Null => decision.reasoning.clone(),
        other => other.to_string(),
    }
}

fn summary(kind: DecisionKind, status_after: TaskStatus) -> MutationSummary {
    MutationSummary {
        kind,
        status_after,
        children_added: Vec::new(),
        escalated_instead: false,
    }
}
