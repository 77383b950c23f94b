//! Test-only helpers: tree builders, scripted collaborators, and in-memory
//! store/sink/sleeper implementations.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::audit::{AuditRecord, AuditSink};
use crate::collab::{ActRequest, AssessRequest, Assessor, Executor, PlanRequest, Planner};
use crate::core::types::{
    Decision, ExecStatus, ExecutionResult, PerspectiveReport, PerspectiveStatus,
};
use crate::error::CollabError;
use crate::recovery::Sleeper;
use crate::store::StateStore;
use crate::tree::{NodeSpec, TaskStatus};

/// Create a deterministic leaf spec with an explicit status.
pub fn leaf(id: &str, status: TaskStatus) -> NodeSpec {
    let mut spec = NodeSpec::new(id, &format!("{id} goal"));
    spec.status = status;
    spec
}

/// Create a spec with children using deterministic defaults.
pub fn spec_with_children(id: &str, children: Vec<NodeSpec>) -> NodeSpec {
    NodeSpec {
        children,
        ..NodeSpec::new(id, &format!("{id} goal"))
    }
}

/// Successful execution result with a fixed summary.
pub fn success_result(summary: &str) -> ExecutionResult {
    ExecutionResult {
        status: ExecStatus::Success,
        artifacts_changed: Vec::new(),
        summary: summary.to_string(),
        errors: Vec::new(),
        environment_reference: String::new(),
    }
}

/// Failed execution result with a single error line.
pub fn failure_result(error: &str) -> ExecutionResult {
    ExecutionResult {
        status: ExecStatus::Failure,
        artifacts_changed: Vec::new(),
        summary: "attempt failed".to_string(),
        errors: vec![error.to_string()],
        environment_reference: String::new(),
    }
}

/// Report with a fixed status and confidence.
pub fn report(perspective: &str, status: PerspectiveStatus, confidence: f64) -> PerspectiveReport {
    PerspectiveReport {
        perspective: perspective.to_string(),
        status,
        confidence: Some(confidence),
        feasible: status != PerspectiveStatus::Fail,
        blockers: Vec::new(),
        observations: Vec::new(),
        error: None,
    }
}

/// Executor that replays a script, then repeats a fallback response.
///
/// Records the task id of every call for assertion.
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Result<ExecutionResult, CollabError>>>,
    fallback: Result<ExecutionResult, CollabError>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(script: Vec<Result<ExecutionResult, CollabError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: Ok(success_result("fallback success")),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Executor that answers every call with the same response.
    pub fn always(response: Result<ExecutionResult, CollabError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: response,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Task ids of the calls made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl Executor for ScriptedExecutor {
    fn act(&self, request: &ActRequest) -> Result<ExecutionResult, CollabError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(request.task_id.clone());
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Assessor that always returns the same status and confidence.
pub struct StaticAssessor {
    pub status: PerspectiveStatus,
    pub confidence: f64,
}

impl Assessor for StaticAssessor {
    fn assess(&self, request: &AssessRequest) -> Result<PerspectiveReport, CollabError> {
        let _ = request;
        Ok(report("static", self.status, self.confidence))
    }
}

/// Planner that replays a script, then repeats a fallback decision.
pub struct ScriptedPlanner {
    script: Mutex<VecDeque<Result<Decision, CollabError>>>,
    fallback: Result<Decision, CollabError>,
    requests: Mutex<Vec<PlanRequest>>,
}

impl ScriptedPlanner {
    pub fn new(script: Vec<Result<Decision, CollabError>>, fallback: Decision) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: Ok(fallback),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Planner that answers every call with the same decision.
    pub fn always(decision: Decision) -> Self {
        Self::new(Vec::new(), decision)
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<PlanRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Planner for ScriptedPlanner {
    fn plan(&self, request: &PlanRequest) -> Result<Decision, CollabError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Sleeper that records requested durations instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the recorded durations.
    pub fn log(&self) -> Arc<Mutex<Vec<Duration>>> {
        Arc::clone(&self.slept)
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.slept.lock().expect("sleep lock").push(duration);
    }
}

/// In-memory store keyed by run id, inspectable after the session owns it.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    trees: std::collections::HashMap<String, NodeSpec>,
    history: Vec<Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(&self, run_id: &str) -> Option<NodeSpec> {
        self.inner.lock().expect("store lock").trees.get(run_id).cloned()
    }

    pub fn history(&self) -> Vec<Value> {
        self.inner.lock().expect("store lock").history.clone()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, run_id: &str) -> Result<NodeSpec> {
        self.inner
            .lock()
            .expect("store lock")
            .trees
            .get(run_id)
            .cloned()
            .ok_or_else(|| anyhow!("no tree stored for run '{run_id}'"))
    }

    fn save(&mut self, run_id: &str, tree: &NodeSpec) -> Result<()> {
        self.inner
            .lock()
            .expect("store lock")
            .trees
            .insert(run_id.to_string(), tree.clone());
        Ok(())
    }

    fn append_history(&mut self, _run_id: &str, event: &Value) -> Result<()> {
        self.inner.lock().expect("store lock").history.push(event.clone());
        Ok(())
    }
}

/// Audit sink that keeps records in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("records lock").clone()
    }
}

impl AuditSink for MemorySink {
    fn record(&mut self, record: &AuditRecord) -> Result<()> {
        self.records.lock().expect("records lock").push(record.clone());
        Ok(())
    }
}
