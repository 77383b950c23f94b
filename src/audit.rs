//! Audit trail of engine events.
//!
//! Distinct from tracing: tracing is dev diagnostics on stderr, the audit
//! trail is a product artifact written for every run regardless of
//! `RUST_LOG`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One auditable engine event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp_ms: u64,
    /// Phase or engine stage the event belongs to (e.g. "act", "recovery").
    pub stage: String,
    pub task_id: String,
    pub details: Value,
}

impl AuditRecord {
    pub fn new(stage: &str, task_id: &str, details: Value) -> Self {
        Self {
            timestamp_ms: crate::clock::unix_millis(),
            stage: stage.to_string(),
            task_id: task_id.to_string(),
            details,
        }
    }
}

/// Destination for audit records.
pub trait AuditSink: Send {
    fn record(&mut self, record: &AuditRecord) -> Result<()>;
}

/// Appends records as JSON lines to `.triad/runs/<run_id>/audit.jsonl`.
#[derive(Debug)]
pub struct JsonlAuditSink {
    path: PathBuf,
}

impl JsonlAuditSink {
    pub fn new(root: &Path, run_id: &str) -> Self {
        Self {
            path: root
                .join(".triad")
                .join("runs")
                .join(run_id)
                .join("audit.jsonl"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&mut self, record: &AuditRecord) -> Result<()> {
        let parent = self
            .path
            .parent()
            .with_context(|| format!("audit path missing parent {}", self.path.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open audit log {}", self.path.display()))?;
        let line = serde_json::to_string(record).context("serialize audit record")?;
        writeln!(file, "{line}")
            .with_context(|| format!("append audit log {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_append_as_jsonl() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut sink = JsonlAuditSink::new(temp.path(), "run-1");

        sink.record(&AuditRecord::new("act", "root.1", json!({"status": "success"})))
            .expect("record");
        sink.record(&AuditRecord::new("recovery", "root.1", json!({"action": "retry"})))
            .expect("record");

        let contents = fs::read_to_string(sink.path()).expect("read");
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: AuditRecord = serde_json::from_str(lines[0]).expect("parse");
        assert_eq!(first.stage, "act");
        assert_eq!(first.task_id, "root.1");
    }
}
