//! Deterministic selection logic for the task tree.

use crate::tree::{NodeId, TaskNode, TaskStatus, TaskTree};

/// Find the first pending leaf via depth-first traversal from the root.
///
/// A node qualifies if it has no children and `status == pending`; ties are
/// broken by document order. Returns `None` when the tree has no runnable
/// leaf (fully resolved, or everything left is non-pending).
pub fn find_next_pending(tree: &TaskTree) -> Option<NodeId> {
    find_next_pending_in(tree, tree.root())
}

/// Same search restricted to the subtree rooted at `subtree`.
pub fn find_next_pending_in(tree: &TaskTree, subtree: NodeId) -> Option<NodeId> {
    let node = tree.node(subtree);
    if node.is_atomic() {
        return (node.status == TaskStatus::Pending).then_some(subtree);
    }
    for &child in &node.children {
        if let Some(found) = find_next_pending_in(tree, child) {
            return Some(found);
        }
    }
    None
}

/// True if a node has used up its attempt budget without resolving.
pub fn is_exhausted(node: &TaskNode) -> bool {
    !node.status.is_terminal() && node.retry_count >= node.policy.max_attempts
}

/// Resolution of a subtree, derived from leaf statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Every leaf completed.
    Completed,
    /// At least one pending leaf remains.
    Pending,
    /// No pending leaves, but some failed or escalated.
    Failed,
}

/// Derive the resolution of the subtree rooted at `id`.
///
/// Parent and decomposed nodes resolve through their children; leaves
/// resolve through their own status.
pub fn subtree_resolution(tree: &TaskTree, id: NodeId) -> Resolution {
    let node = tree.node(id);
    if node.is_atomic() {
        return match node.status {
            TaskStatus::Completed => Resolution::Completed,
            TaskStatus::Pending | TaskStatus::InProgress => Resolution::Pending,
            TaskStatus::Failed | TaskStatus::Escalated | TaskStatus::Decomposed => {
                Resolution::Failed
            }
        };
    }
    let mut all_completed = true;
    for &child in &node.children {
        match subtree_resolution(tree, child) {
            Resolution::Pending => return Resolution::Pending,
            Resolution::Failed => all_completed = false,
            Resolution::Completed => {}
        }
    }
    if all_completed {
        Resolution::Completed
    } else {
        Resolution::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeSpec;

    fn tree_from(spec: NodeSpec) -> TaskTree {
        TaskTree::from_spec(&spec).expect("tree")
    }

    fn leaf(id: &str, status: TaskStatus) -> NodeSpec {
        let mut spec = NodeSpec::new(id, "goal");
        spec.status = status;
        spec
    }

    #[test]
    fn first_pending_leaf_in_document_order_wins() {
        let mut root = NodeSpec::new("root", "root");
        let mut branch = NodeSpec::new("a", "branch");
        branch.children.push(leaf("a.1", TaskStatus::Completed));
        branch.children.push(leaf("a.2", TaskStatus::Pending));
        root.children.push(branch);
        root.children.push(leaf("b", TaskStatus::Pending));
        let tree = tree_from(root);

        let selected = find_next_pending(&tree).expect("pending leaf");
        assert_eq!(tree.node(selected).id, "a.2");
    }

    #[test]
    fn selection_is_deterministic_for_fixed_statuses() {
        let mut root = NodeSpec::new("root", "root");
        root.children.push(leaf("a", TaskStatus::Escalated));
        root.children.push(leaf("b", TaskStatus::Pending));
        let tree = tree_from(root);

        let first = find_next_pending(&tree).expect("leaf");
        let second = find_next_pending(&tree).expect("leaf");
        assert_eq!(first, second);
        assert_eq!(tree.node(first).id, "b");
    }

    #[test]
    fn returns_none_when_no_pending_leaf() {
        let mut root = NodeSpec::new("root", "root");
        root.children.push(leaf("a", TaskStatus::Completed));
        root.children.push(leaf("b", TaskStatus::Escalated));
        let tree = tree_from(root);
        assert_eq!(find_next_pending(&tree), None);
    }

    #[test]
    fn exhausted_requires_budget_spent_and_unresolved() {
        let mut spec = NodeSpec::new("n", "goal");
        spec.retry_count = 3;
        spec.policy.max_attempts = 3;
        let tree = tree_from(spec);
        assert!(is_exhausted(tree.node(tree.root())));
    }

    #[test]
    fn subtree_resolution_derives_from_children() {
        let mut root = NodeSpec::new("root", "root");
        root.children.push(leaf("a", TaskStatus::Completed));
        root.children.push(leaf("b", TaskStatus::Escalated));
        let tree = tree_from(root);
        assert_eq!(
            subtree_resolution(&tree, tree.root()),
            Resolution::Failed
        );

        let mut root = NodeSpec::new("root", "root");
        root.children.push(leaf("a", TaskStatus::Completed));
        root.children.push(leaf("b", TaskStatus::Completed));
        let tree = tree_from(root);
        assert_eq!(
            subtree_resolution(&tree, tree.root()),
            Resolution::Completed
        );
    }
}
