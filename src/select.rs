//! Selection helpers for `triad select`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::traversal::{find_next_pending, subtree_resolution, Resolution};
use crate::store::{FsStateStore, StateStore};
use crate::tree::TaskTree;

/// Structured selection outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Every leaf completed.
    Complete,
    /// No pending leaf, but some subtrees failed or escalated.
    Partial,
    /// Pending task selected.
    Open(SelectedTask),
}

/// Minimal selected task metadata for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedTask {
    pub id: String,
    pub path: String,
    pub retry_count: u32,
    pub max_attempts: u32,
}

/// Select the next pending task from an in-memory tree.
pub fn select_task(tree: &TaskTree) -> SelectOutcome {
    match find_next_pending(tree) {
        Some(id) => {
            let node = tree.node(id);
            SelectOutcome::Open(SelectedTask {
                id: node.id.clone(),
                path: tree.node_path(id),
                retry_count: node.retry_count,
                max_attempts: node.policy.max_attempts,
            })
        }
        None => match subtree_resolution(tree, tree.root()) {
            Resolution::Completed => SelectOutcome::Complete,
            Resolution::Pending | Resolution::Failed => SelectOutcome::Partial,
        },
    }
}

/// Load a run's tree from disk and select the next pending task.
pub fn select_from_root(root: &Path, run_id: &str) -> Result<SelectOutcome> {
    let store = FsStateStore::new(root);
    let spec = store.load(run_id).context("load tree for selection")?;
    let tree = TaskTree::from_spec(&spec)
        .map_err(|err| anyhow::anyhow!("invalid tree: {err}"))?;
    Ok(select_task(&tree))
}
