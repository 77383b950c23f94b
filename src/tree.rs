//! Task tree model: an arena of nodes addressed by index, with a nested
//! serde form for files and snapshots.
//!
//! The arena keeps structural mutations (decompose, reorder) as index
//! updates rather than pointer rewiring, and makes read-only snapshots for
//! concurrent perspective evaluation cheap ([`TaskTree::to_spec`]).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Index of a node inside a [`TaskTree`] arena.
pub type NodeId = usize;

/// Lifecycle status of a task node.
///
/// Transitions are monotonic except for explicit retry (`failed`/cycle
/// failure back to `pending`), which only the engine performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Decomposed,
    Escalated,
}

impl TaskStatus {
    /// True when the node needs no further automatic work.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Escalated
        )
    }
}

/// Per-node execution policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodePolicy {
    /// Maximum attempts before escalation (>= 1).
    pub max_attempts: u32,
    /// Maximum depth allowed beneath this node (0 = no descendants).
    pub max_depth: u32,
    /// Wall-clock budget for each phase call, in seconds (> 0).
    pub timeout_seconds: u64,
}

impl Default for NodePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_depth: 5,
            timeout_seconds: 300,
        }
    }
}

/// A node in the arena. `children` holds arena indices in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    pub id: String,
    pub description: String,
    pub status: TaskStatus,
    pub policy: NodePolicy,
    /// Attempts so far; mutated only by the engine, never exceeds
    /// `policy.max_attempts`.
    pub retry_count: u32,
    /// Escalation sensitivity in [0, 1]: 0 escalates on the first failure,
    /// 1 never escalates, values between use the attempt budget.
    pub failure_threshold: f64,
    /// Set by a Refine decision and consumed by the next Act invocation.
    pub needs_refinement: bool,
    pub refinement_notes: Option<String>,
    pub escalation_reason: Option<String>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

impl TaskNode {
    /// A node is atomic iff it has no children.
    pub fn is_atomic(&self) -> bool {
        self.children.is_empty()
    }
}

fn default_failure_threshold() -> f64 {
    0.5
}

/// Nested, human-editable serde form of a task tree.
///
/// This is what lands in `tree.json`, checkpoints, and collaborator
/// snapshots. Only `id` and `description` are required on input; everything
/// else defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub policy: NodePolicy,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: f64,
    #[serde(default)]
    pub needs_refinement: bool,
    #[serde(default)]
    pub refinement_notes: Option<String>,
    #[serde(default)]
    pub escalation_reason: Option<String>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    /// Minimal pending spec with default policy.
    pub fn new(id: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            status: TaskStatus::Pending,
            policy: NodePolicy::default(),
            retry_count: 0,
            failure_threshold: default_failure_threshold(),
            needs_refinement: false,
            refinement_notes: None,
            escalation_reason: None,
            children: Vec::new(),
        }
    }
}

/// Default single-node tree written by `triad init`.
pub fn default_tree() -> NodeSpec {
    NodeSpec::new("root", "Top-level goal (edit me)")
}

/// Arena-backed task tree.
///
/// Nodes are never destroyed; completed/decomposed/escalated nodes stay in
/// the arena as the audit trail.
#[derive(Debug, Clone)]
pub struct TaskTree {
    nodes: Vec<TaskNode>,
    root: NodeId,
    index: HashMap<String, NodeId>,
}

impl TaskTree {
    /// Build an arena from the nested form. Fails on duplicate ids.
    pub fn from_spec(spec: &NodeSpec) -> Result<Self, String> {
        let mut tree = Self {
            nodes: Vec::new(),
            root: 0,
            index: HashMap::new(),
        };
        tree.root = tree.insert_spec(spec, None)?;
        Ok(tree)
    }

    fn insert_spec(&mut self, spec: &NodeSpec, parent: Option<NodeId>) -> Result<NodeId, String> {
        if self.index.contains_key(&spec.id) {
            return Err(format!("duplicate id '{}'", spec.id));
        }
        let id = self.nodes.len();
        self.nodes.push(TaskNode {
            id: spec.id.clone(),
            description: spec.description.clone(),
            status: spec.status,
            policy: spec.policy,
            retry_count: spec.retry_count,
            failure_threshold: spec.failure_threshold,
            needs_refinement: spec.needs_refinement,
            refinement_notes: spec.refinement_notes.clone(),
            escalation_reason: spec.escalation_reason.clone(),
            children: Vec::new(),
            parent,
        });
        self.index.insert(spec.id.clone(), id);
        for child_spec in &spec.children {
            let child = self.insert_spec(child_spec, Some(id))?;
            self.nodes[id].children.push(child);
        }
        Ok(id)
    }

    /// Render the arena back into the nested form (deep clone).
    pub fn to_spec(&self) -> NodeSpec {
        self.spec_of(self.root)
    }

    fn spec_of(&self, id: NodeId) -> NodeSpec {
        let node = &self.nodes[id];
        NodeSpec {
            id: node.id.clone(),
            description: node.description.clone(),
            status: node.status,
            policy: node.policy,
            retry_count: node.retry_count,
            failure_threshold: node.failure_threshold,
            needs_refinement: node.needs_refinement,
            refinement_notes: node.refinement_notes.clone(),
            escalation_reason: node.escalation_reason.clone(),
            children: node
                .children
                .iter()
                .map(|&child| self.spec_of(child))
                .collect(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &TaskNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TaskNode {
        &mut self.nodes[id]
    }

    /// Look up a node index by its string id.
    pub fn lookup(&self, id: &str) -> Option<NodeId> {
        self.index.get(id).copied()
    }

    /// All arena indices, in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        0..self.nodes.len()
    }

    /// Depth of `id` below the root (root = 0).
    pub fn depth(&self, id: NodeId) -> u32 {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// `/`-separated id path from the root to `id`.
    pub fn node_path(&self, id: NodeId) -> String {
        let mut parts = vec![self.nodes[id].id.clone()];
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            parts.push(self.nodes[parent].id.clone());
            current = parent;
        }
        parts.reverse();
        parts.join("/")
    }

    /// Append a new pending child under `parent`. Fails on duplicate id.
    pub fn add_child(&mut self, parent: NodeId, mut spec: NodeSpec) -> Result<NodeId, String> {
        spec.children.clear();
        let id = self.insert_spec(&spec, Some(parent))?;
        self.nodes[parent].children.push(id);
        Ok(id)
    }

    /// Replace the child order of `parent` with `order` (same set of ids).
    pub fn reorder_children(&mut self, parent: NodeId, order: Vec<NodeId>) {
        debug_assert_eq!(order.len(), self.nodes[parent].children.len());
        self.nodes[parent].children = order;
    }

    /// One-line-per-node summary used for audit details and tree dumps.
    pub fn summarize(&self, max_nodes: usize) -> String {
        let mut lines = Vec::new();
        self.summarize_inner(self.root, 0, max_nodes, &mut lines);
        lines.join("\n")
    }

    fn summarize_inner(&self, id: NodeId, depth: usize, max_nodes: usize, lines: &mut Vec<String>) {
        if lines.len() >= max_nodes {
            return;
        }
        let node = &self.nodes[id];
        let indent = "  ".repeat(depth);
        lines.push(format!(
            "{}- {} ({:?}, attempts={}/{})",
            indent,
            node.id,
            node.status,
            node.retry_count,
            node.policy.max_attempts
        ));
        for &child in &node.children {
            self.summarize_inner(child, depth + 1, max_nodes, lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_spec() -> NodeSpec {
        let mut root = NodeSpec::new("root", "root goal");
        let mut branch = NodeSpec::new("a", "branch");
        branch.children.push(NodeSpec::new("a.1", "first"));
        branch.children.push(NodeSpec::new("a.2", "second"));
        root.children.push(branch);
        root.children.push(NodeSpec::new("b", "sibling"));
        root
    }

    #[test]
    fn from_spec_round_trips_through_to_spec() {
        let spec = nested_spec();
        let tree = TaskTree::from_spec(&spec).expect("tree");
        assert_eq!(tree.to_spec(), spec);
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn from_spec_rejects_duplicate_ids() {
        let mut spec = NodeSpec::new("root", "root");
        spec.children.push(NodeSpec::new("root", "dup"));
        let err = TaskTree::from_spec(&spec).expect_err("duplicate");
        assert!(err.contains("duplicate id"));
    }

    #[test]
    fn depth_and_path_follow_parent_links() {
        let tree = TaskTree::from_spec(&nested_spec()).expect("tree");
        let leaf = tree.lookup("a.2").expect("a.2");
        assert_eq!(tree.depth(leaf), 2);
        assert_eq!(tree.node_path(leaf), "root/a/a.2");
        assert_eq!(tree.depth(tree.root()), 0);
    }

    #[test]
    fn add_child_links_parent_and_index() {
        let mut tree = TaskTree::from_spec(&NodeSpec::new("root", "root")).expect("tree");
        let root = tree.root();
        let child = tree
            .add_child(root, NodeSpec::new("root.1", "child"))
            .expect("add");
        assert_eq!(tree.node(child).parent, Some(root));
        assert_eq!(tree.node(root).children, vec![child]);
        assert_eq!(tree.lookup("root.1"), Some(child));
        assert!(!tree.node(root).is_atomic());
    }

    #[test]
    fn spec_parses_minimal_json_with_defaults() {
        let spec: NodeSpec =
            serde_json::from_str(r#"{"id": "t", "description": "goal"}"#).expect("parse");
        assert_eq!(spec.status, TaskStatus::Pending);
        assert_eq!(spec.policy.max_attempts, 3);
        assert_eq!(spec.failure_threshold, 0.5);
        assert!(spec.children.is_empty());
    }
}
