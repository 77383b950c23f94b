//! Failure accounting, retry backoff, and checkpointing.
//!
//! Every recorded failure feeds two mechanisms: the per-task failure
//! tracker that drives the retry-or-escalate choice, and the in-memory
//! checkpoint log that snapshots the tree at recovery-relevant moments
//! so a run can be reconstructed after the fact.

use std::collections::{BTreeMap, HashMap};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::Phase;
use crate::tree::NodeSpec;

/// Ceiling for exponential backoff, in seconds.
pub const BACKOFF_CAP_SECONDS: u64 = 30;

/// Backoff before the `total`-th retry: 1s, 2s, 4s, ... capped at 30s.
///
/// `total` is the number of failures recorded so far (>= 1).
pub fn backoff_seconds(total: u32) -> u64 {
    let exponent = total.saturating_sub(1);
    match 1u64.checked_shl(exponent) {
        Some(value) => value.min(BACKOFF_CAP_SECONDS),
        None => BACKOFF_CAP_SECONDS,
    }
}

/// What to do about the latest failure of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    Retry { backoff: Duration },
    Escalate,
}

/// Retry while attempts remain, escalate once they are spent.
pub fn decide_recovery(total_failures: u32, max_attempts: u32) -> RecoveryAction {
    if total_failures >= max_attempts {
        RecoveryAction::Escalate
    } else {
        RecoveryAction::Retry {
            backoff: Duration::from_secs(backoff_seconds(total_failures)),
        }
    }
}

/// Failure counters for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCounts {
    pub total: u32,
    #[serde(default)]
    pub by_phase: BTreeMap<Phase, u32>,
}

/// Per-task failure history for one run.
#[derive(Debug, Default)]
pub struct FailureTracker {
    counts: HashMap<String, FailureCounts>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failure and return the task's updated total.
    pub fn record(&mut self, task_id: &str, phase: Phase) -> u32 {
        let counts = self.counts.entry(task_id.to_string()).or_default();
        counts.total += 1;
        *counts.by_phase.entry(phase).or_insert(0) += 1;
        debug!(task = task_id, %phase, total = counts.total, "failure recorded");
        counts.total
    }

    pub fn total_for(&self, task_id: &str) -> u32 {
        self.counts.get(task_id).map_or(0, |c| c.total)
    }

    /// Deterministic snapshot for checkpoints, keyed by task id.
    pub fn snapshot(&self) -> BTreeMap<String, FailureCounts> {
        self.counts
            .iter()
            .map(|(id, counts)| (id.clone(), counts.clone()))
            .collect()
    }
}

/// One named snapshot of the run state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// e.g. `before:root.2`, `failure:root.2:1`, `escalation:root.2`.
    pub name: String,
    /// Position in the log, starting at 0.
    pub seq: u64,
    pub timestamp_ms: u64,
    pub tree: NodeSpec,
    pub failure_counts: BTreeMap<String, FailureCounts>,
}

/// Append-only log of checkpoints for one run.
#[derive(Debug, Default)]
pub struct CheckpointLog {
    entries: Vec<Checkpoint>,
}

impl CheckpointLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        name: &str,
        tree: NodeSpec,
        failure_counts: BTreeMap<String, FailureCounts>,
    ) {
        let checkpoint = Checkpoint {
            name: name.to_string(),
            seq: self.entries.len() as u64,
            timestamp_ms: crate::clock::unix_millis(),
            tree,
            failure_counts,
        };
        debug!(name, seq = checkpoint.seq, "checkpoint appended");
        self.entries.push(checkpoint);
    }

    pub fn entries(&self) -> &[Checkpoint] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent checkpoint whose name starts with `prefix`.
    pub fn latest_with_prefix(&self, prefix: &str) -> Option<&Checkpoint> {
        self.entries.iter().rev().find(|c| c.name.starts_with(prefix))
    }
}

/// Seam over wall-clock sleeping so backoff is observable in tests.
pub trait Sleeper: Send {
    fn sleep(&mut self, duration: Duration);
}

/// Production sleeper backed by `std::thread::sleep`.
#[derive(Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_seconds(1), 1);
        assert_eq!(backoff_seconds(2), 2);
        assert_eq!(backoff_seconds(3), 4);
        assert_eq!(backoff_seconds(5), 16);
        assert_eq!(backoff_seconds(6), 30);
        assert_eq!(backoff_seconds(40), 30);
    }

    #[test]
    fn recovery_retries_until_attempts_are_spent() {
        assert_eq!(
            decide_recovery(1, 3),
            RecoveryAction::Retry {
                backoff: Duration::from_secs(1)
            }
        );
        assert_eq!(
            decide_recovery(2, 3),
            RecoveryAction::Retry {
                backoff: Duration::from_secs(2)
            }
        );
        assert_eq!(decide_recovery(3, 3), RecoveryAction::Escalate);
        assert_eq!(decide_recovery(7, 3), RecoveryAction::Escalate);
    }

    #[test]
    fn tracker_counts_per_task_and_per_phase() {
        let mut tracker = FailureTracker::new();
        assert_eq!(tracker.record("a", Phase::Act), 1);
        assert_eq!(tracker.record("a", Phase::Adapt), 2);
        assert_eq!(tracker.record("b", Phase::Act), 1);
        assert_eq!(tracker.total_for("a"), 2);
        assert_eq!(tracker.total_for("missing"), 0);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot["a"].by_phase[&Phase::Act], 1);
        assert_eq!(snapshot["a"].by_phase[&Phase::Adapt], 1);
    }

    #[test]
    fn checkpoint_log_is_append_only_and_searchable() {
        let mut log = CheckpointLog::new();
        let tree = NodeSpec::new("root", "root");
        log.append("before:root", tree.clone(), BTreeMap::new());
        log.append("failure:root:1", tree.clone(), BTreeMap::new());
        log.append("before:root", tree, BTreeMap::new());

        assert_eq!(log.len(), 3);
        assert_eq!(log.entries()[0].seq, 0);
        assert_eq!(log.entries()[2].seq, 2);
        assert_eq!(
            log.latest_with_prefix("failure:").map(|c| c.name.as_str()),
            Some("failure:root:1")
        );
        assert_eq!(log.latest_with_prefix("after:"), None);
    }
}
