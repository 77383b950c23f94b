//! CLI tests for `triad select` and `triad validate`.
//!
//! Spawns the triad binary and verifies exit codes match expected values
//! for open, complete, and partially failed tree states.

use std::fs;
use std::process::Command;

use triad::exit_codes;
use triad::store::{FsStateStore, StateStore};
use triad::test_support::{leaf, spec_with_children};
use triad::tree::{default_tree, TaskStatus};

fn triad(dir: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_triad"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("run triad")
}

#[test]
fn select_open_prints_task_and_exits_ok() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut store = FsStateStore::new(temp.path());
    store.save("default", &default_tree()).expect("write tree");

    let output = triad(temp.path(), &["select"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("root "));
}

#[test]
fn select_complete_exits_with_complete_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut store = FsStateStore::new(temp.path());
    let tree = spec_with_children(
        "root",
        vec![
            leaf("a", TaskStatus::Completed),
            leaf("b", TaskStatus::Completed),
        ],
    );
    store.save("default", &tree).expect("write tree");

    let output = triad(temp.path(), &["select"]);
    assert_eq!(output.status.code(), Some(exit_codes::COMPLETE));
}

#[test]
fn select_escalated_tree_exits_with_partial_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut store = FsStateStore::new(temp.path());
    let tree = spec_with_children(
        "root",
        vec![
            leaf("a", TaskStatus::Completed),
            leaf("b", TaskStatus::Escalated),
        ],
    );
    store.save("default", &tree).expect("write tree");

    let output = triad(temp.path(), &["select"]);
    assert_eq!(output.status.code(), Some(exit_codes::PARTIAL));
}

#[test]
fn init_creates_config_and_tree() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = triad(temp.path(), &["init"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(temp.path().join(".triad/config.toml").is_file());
    assert!(temp.path().join(".triad/runs/default/tree.json").is_file());

    let output = triad(temp.path(), &["validate"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[test]
fn validate_rejects_a_corrupt_tree() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = FsStateStore::new(temp.path());
    let path = store.tree_path("default");
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(&path, r#"{"id": "root"}"#).expect("write");

    let output = triad(temp.path(), &["validate"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}
