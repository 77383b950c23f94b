//! Run state persistence with schema + invariant validation.
//!
//! The filesystem store keeps each run under `.triad/runs/<run_id>/`:
//! `tree.json` is the current tree (schema-validated on load, written
//! atomically), `history.jsonl` is an append-only record of engine events.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::debug;

use crate::core::invariants::validate_invariants;
use crate::tree::{NodeSpec, TaskTree};

const TREE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/task_tree.schema.json"
));

/// Durable storage for run state.
pub trait StateStore: Send {
    /// Load the persisted tree for a run.
    fn load(&self, run_id: &str) -> Result<NodeSpec>;
    /// Persist the current tree for a run.
    fn save(&mut self, run_id: &str, tree: &NodeSpec) -> Result<()>;
    /// Append one event to the run's history.
    fn append_history(&mut self, run_id: &str, event: &Value) -> Result<()>;
}

/// Filesystem-backed store rooted at a project directory.
#[derive(Debug, Clone)]
pub struct FsStateStore {
    root: PathBuf,
}

impl FsStateStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(".triad").join("runs").join(run_id)
    }

    pub fn tree_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("tree.json")
    }

    pub fn history_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("history.jsonl")
    }
}

impl StateStore for FsStateStore {
    fn load(&self, run_id: &str) -> Result<NodeSpec> {
        let path = self.tree_path(run_id);
        debug!(path = %path.display(), "loading tree");
        load_tree(&path)
    }

    fn save(&mut self, run_id: &str, tree: &NodeSpec) -> Result<()> {
        let path = self.tree_path(run_id);
        debug!(path = %path.display(), "writing tree");
        write_tree(&path, tree)
    }

    fn append_history(&mut self, run_id: &str, event: &Value) -> Result<()> {
        let path = self.history_path(run_id);
        let parent = path
            .parent()
            .with_context(|| format!("history path missing parent {}", path.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open history {}", path.display()))?;
        let line = serde_json::to_string(event).context("serialize history event")?;
        writeln!(file, "{line}").with_context(|| format!("append history {}", path.display()))
    }
}

/// Load and validate a tree file (schema + invariants).
pub fn load_tree(path: &Path) -> Result<NodeSpec> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read tree {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse tree {}", path.display()))?;
    validate_schema(&value)?;
    let spec: NodeSpec = serde_json::from_value(value)
        .with_context(|| format!("deserialize tree {}", path.display()))?;
    let tree = TaskTree::from_spec(&spec).map_err(|err| anyhow!("tree structure: {err}"))?;
    let errors = validate_invariants(&tree);
    if !errors.is_empty() {
        return Err(anyhow!("tree invariants failed: {}", errors.join("; ")));
    }
    Ok(spec)
}

/// Atomically write a tree file (temp file + rename).
pub fn write_tree(path: &Path, tree: &NodeSpec) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(tree)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn validate_schema(tree: &Value) -> Result<()> {
    let schema_value: Value =
        serde_json::from_str(TREE_SCHEMA).context("parse embedded tree schema")?;
    let compiled =
        validator_for(&schema_value).map_err(|err| anyhow!("invalid schema: {err}"))?;
    if !compiled.is_valid(tree) {
        let messages = compiled
            .iter_errors(tree)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "tree schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("tree path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp tree {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace tree {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::default_tree;
    use serde_json::json;

    /// Writes a tree, loads it back through schema validation, and confirms
    /// the root survives.
    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut store = FsStateStore::new(temp.path());

        store.save("run-1", &default_tree()).expect("save");
        let loaded = store.load("run-1").expect("load");
        assert_eq!(loaded.id, "root");
    }

    #[test]
    fn load_rejects_schema_violations() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsStateStore::new(temp.path());
        let path = store.tree_path("run-1");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, r#"{"id": "root"}"#).expect("write");

        let err = store.load("run-1").expect_err("missing description");
        assert!(err.to_string().contains("schema validation failed"));
    }

    #[test]
    fn load_rejects_invariant_violations() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsStateStore::new(temp.path());
        let path = store.tree_path("run-1");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(
            &path,
            r#"{"id": "root", "description": "r", "retry_count": 9}"#,
        )
        .expect("write");

        let err = store.load("run-1").expect_err("retry_count over limit");
        assert!(err.to_string().contains("tree invariants failed"));
    }

    #[test]
    fn history_appends_one_json_line_per_event() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut store = FsStateStore::new(temp.path());

        store
            .append_history("run-1", &json!({"event": "start"}))
            .expect("append");
        store
            .append_history("run-1", &json!({"event": "stop"}))
            .expect("append");

        let contents = fs::read_to_string(store.history_path("run-1")).expect("read");
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("start"));
        assert!(lines[1].contains("stop"));
    }
}
