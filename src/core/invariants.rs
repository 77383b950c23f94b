//! Semantic invariants not expressible via JSON Schema.

use crate::tree::{NodeId, TaskStatus, TaskTree};

/// Check semantic tree invariants:
/// - `max_attempts >= 1` and `timeout_seconds > 0`
/// - `retry_count <= max_attempts`
/// - `failure_threshold` in [0, 1]
/// - node depth never exceeds any ancestor's `max_depth`
/// - at most one node `in_progress`
pub fn validate_invariants(tree: &TaskTree) -> Vec<String> {
    let mut errors = Vec::new();
    let mut in_progress = 0usize;
    validate_node(tree, tree.root(), 0, u32::MAX, &mut in_progress, &mut errors);
    if in_progress > 1 {
        errors.push(format!("{in_progress} nodes are in_progress (expected at most 1)"));
    }
    errors
}

fn validate_node(
    tree: &TaskTree,
    id: NodeId,
    depth: u32,
    inherited_max_depth: u32,
    in_progress: &mut usize,
    errors: &mut Vec<String>,
) {
    let node = tree.node(id);
    let path = tree.node_path(id);

    if node.policy.max_attempts == 0 {
        errors.push(format!("{path}: max_attempts must be >= 1"));
    }
    if node.policy.timeout_seconds == 0 {
        errors.push(format!("{path}: timeout_seconds must be > 0"));
    }
    if node.retry_count > node.policy.max_attempts {
        errors.push(format!(
            "{path}: retry_count {} exceeds max_attempts {}",
            node.retry_count, node.policy.max_attempts
        ));
    }
    if !(0.0..=1.0).contains(&node.failure_threshold) {
        errors.push(format!(
            "{path}: failure_threshold {} outside [0, 1]",
            node.failure_threshold
        ));
    }
    if depth > inherited_max_depth {
        errors.push(format!(
            "{path}: depth {depth} exceeds an ancestor's max_depth {inherited_max_depth}"
        ));
    }
    if node.status == TaskStatus::InProgress {
        *in_progress += 1;
    }
    if node.status == TaskStatus::Decomposed && node.is_atomic() {
        errors.push(format!("{path}: decomposed node has no children"));
    }

    let child_limit = inherited_max_depth.min(node.policy.max_depth.saturating_add(depth));
    for &child in &node.children {
        validate_node(tree, child, depth + 1, child_limit, in_progress, errors);
    }
}
