//! Recursive Act/Assess/Adapt execution over the task tree.
//!
//! A [`Session`] owns everything one run needs: the tree, the collaborator
//! handles, the checkpoint log, the failure tracker, and the persistence
//! seams. There is no global state; two sessions never share anything.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::audit::{AuditRecord, AuditSink};
use crate::collab::{ActRequest, AssessRequest, Executor, PlanRequest, Planner};
use crate::config::EngineConfig;
use crate::core::invariants::validate_invariants;
use crate::core::mutate::{apply_decision, DecomposeDefaults};
use crate::core::traversal::{find_next_pending, subtree_resolution, Resolution};
use crate::core::types::{ExecStatus, Phase};
use crate::error::EngineError;
use crate::observers::{gather_observations, Perspective};
use crate::phase::{run_phase, PhaseStatus};
use crate::recovery::{
    backoff_seconds, decide_recovery, CheckpointLog, FailureTracker, RecoveryAction, Sleeper,
};
use crate::store::StateStore;
use crate::tree::{NodeId, NodeSpec, TaskStatus, TaskTree};

/// Terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every leaf completed.
    Completed,
    /// The tree resolved but some subtrees failed or escalated.
    PartialFailure,
    /// The cycle budget ran out with pending work remaining.
    MaxIterationsExceeded,
}

/// Everything needed to construct a [`Session`].
pub struct SessionParams {
    pub run_id: String,
    pub tree: NodeSpec,
    pub executor: Arc<dyn Executor>,
    pub perspectives: Vec<Perspective>,
    pub planner: Arc<dyn Planner>,
    pub store: Box<dyn StateStore>,
    pub audit: Box<dyn AuditSink>,
    pub sleeper: Box<dyn Sleeper>,
    pub config: EngineConfig,
}

/// One run of the engine over one task tree.
pub struct Session {
    run_id: String,
    tree: TaskTree,
    /// First-ever tree snapshot, passed unchanged to every Adapt call.
    original_intent: NodeSpec,
    executor: Arc<dyn Executor>,
    perspectives: Vec<Perspective>,
    planner: Arc<dyn Planner>,
    store: Box<dyn StateStore>,
    audit: Box<dyn AuditSink>,
    sleeper: Box<dyn Sleeper>,
    config: EngineConfig,
    checkpoints: CheckpointLog,
    failures: FailureTracker,
    iterations: u32,
    budget_exhausted: bool,
}

impl Session {
    pub fn new(params: SessionParams) -> Result<Self> {
        params.config.validate()?;
        let tree = TaskTree::from_spec(&params.tree)
            .map_err(|err| anyhow!("invalid tree: {err}"))?;
        let errors = validate_invariants(&tree);
        if !errors.is_empty() {
            return Err(anyhow!("tree invariants failed: {}", errors.join("; ")));
        }
        Ok(Self {
            run_id: params.run_id,
            tree,
            original_intent: params.tree,
            executor: params.executor,
            perspectives: params.perspectives,
            planner: params.planner,
            store: params.store,
            audit: params.audit,
            sleeper: params.sleeper,
            config: params.config,
            checkpoints: CheckpointLog::new(),
            failures: FailureTracker::new(),
            iterations: 0,
            budget_exhausted: false,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn tree(&self) -> &TaskTree {
        &self.tree
    }

    pub fn checkpoints(&self) -> &CheckpointLog {
        &self.checkpoints
    }

    /// Execution cycles run so far.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Drive the tree until it resolves or the cycle budget runs out.
    #[instrument(skip(self), fields(run_id = %self.run_id))]
    pub fn run(&mut self) -> Result<RunOutcome> {
        self.store
            .append_history(&self.run_id, &json!({"event": "run_started"}))?;

        while !self.budget_exhausted && find_next_pending(&self.tree).is_some() {
            let root = self.tree.root();
            self.execute_task(root, 0)?;
            self.store.save(&self.run_id, &self.tree.to_spec())?;
        }
        self.store.save(&self.run_id, &self.tree.to_spec())?;

        let outcome = if self.budget_exhausted {
            RunOutcome::MaxIterationsExceeded
        } else {
            match subtree_resolution(&self.tree, self.tree.root()) {
                Resolution::Completed => RunOutcome::Completed,
                Resolution::Pending | Resolution::Failed => RunOutcome::PartialFailure,
            }
        };
        self.store.append_history(
            &self.run_id,
            &json!({"event": "run_finished", "outcome": outcome, "iterations": self.iterations}),
        )?;
        info!(?outcome, iterations = self.iterations, "run finished");
        Ok(outcome)
    }

    /// Execute the subtree rooted at `id`.
    ///
    /// Atomic pending nodes get one Act/Assess/Adapt cycle; parents run
    /// every unresolved child subtree in document order, so one failing
    /// child never stops its siblings. A node decomposed by its own cycle
    /// falls through to parent handling in the same invocation.
    fn execute_task(&mut self, id: NodeId, depth: u32) -> Result<()> {
        if self.budget_exhausted {
            return Ok(());
        }
        let task = self.tree.node(id).id.clone();
        self.checkpoint(&format!("before:{task}"))?;

        let policy = self.tree.node(id).policy;
        if depth > policy.max_depth {
            let err = EngineError::DepthLimit {
                task: task.clone(),
                depth,
                max_depth: policy.max_depth,
            };
            warn!(task = %task, "depth limit reached");
            let node = self.tree.node_mut(id);
            node.status = TaskStatus::Failed;
            node.escalation_reason = Some(err.to_string());
            self.audit.record(&AuditRecord::new(
                "engine",
                &task,
                json!({"error": err.to_string()}),
            ))?;
            self.checkpoint(&format!("after:{task}"))?;
            return Ok(());
        }

        if self.tree.node(id).is_atomic() && self.tree.node(id).status == TaskStatus::Pending {
            self.run_cycle(id)?;
        }

        if !self.tree.node(id).is_atomic() {
            let children = self.tree.node(id).children.clone();
            for &child in &children {
                if subtree_resolution(&self.tree, child) == Resolution::Pending {
                    self.execute_task(child, depth + 1)?;
                }
            }

            let mut any_pending = false;
            let mut all_completed = true;
            for &child in &children {
                match subtree_resolution(&self.tree, child) {
                    Resolution::Pending => any_pending = true,
                    Resolution::Failed => all_completed = false,
                    Resolution::Completed => {}
                }
            }
            if !any_pending {
                if all_completed {
                    self.tree.node_mut(id).status = TaskStatus::Completed;
                } else {
                    self.tree.node_mut(id).status = TaskStatus::Failed;
                    self.audit.record(&AuditRecord::new(
                        "resolution",
                        &task,
                        json!({"outcome": "partial_failure"}),
                    ))?;
                }
            }
        }

        self.checkpoint(&format!("after:{task}"))?;
        Ok(())
    }

    /// One Act/Assess/Adapt cycle on an atomic pending node.
    fn run_cycle(&mut self, id: NodeId) -> Result<()> {
        if self.iterations >= self.config.max_iterations {
            self.budget_exhausted = true;
            return Ok(());
        }
        self.iterations += 1;

        let (task, description, needs_refinement, refinement_notes) = {
            let node = self.tree.node(id);
            (
                node.id.clone(),
                node.description.clone(),
                node.needs_refinement,
                node.refinement_notes.clone(),
            )
        };
        let policy = self.tree.node(id).policy;
        let timeout = Duration::from_secs(policy.timeout_seconds);
        self.tree.node_mut(id).status = TaskStatus::InProgress;
        info!(task = %task, iteration = self.iterations, "cycle started");

        // Act
        let request = ActRequest {
            task_id: task.clone(),
            description: description.clone(),
            context_ref: self.run_id.clone(),
            needs_refinement,
            refinement_notes,
        };
        let executor = Arc::clone(&self.executor);
        let outcome = run_phase("act", timeout, move || executor.act(&request));
        let result = match outcome.status {
            PhaseStatus::Success(result) => result,
            PhaseStatus::Timeout => {
                let err = EngineError::Timeout {
                    task: task.clone(),
                    phase: Phase::Act,
                    seconds: policy.timeout_seconds,
                };
                return self.handle_failure(id, Phase::Act, &err.to_string());
            }
            PhaseStatus::Error(message) => {
                return self.handle_failure(id, Phase::Act, &message);
            }
        };
        self.audit.record(&AuditRecord::new(
            "act",
            &task,
            json!({
                "status": result.status,
                "summary": result.summary,
                "elapsed_ms": outcome.elapsed.as_millis() as u64,
            }),
        ))?;
        {
            // Refinement notes are consumed by exactly one Act.
            let node = self.tree.node_mut(id);
            node.needs_refinement = false;
            node.refinement_notes = None;
        }
        if result.status == ExecStatus::Failure {
            return self.handle_failure(id, Phase::Act, &result.failure_message());
        }

        // Assess: partial results proceed here so the perspectives can judge
        // what did land.
        let snapshot = self.tree.to_spec();
        let assess_request = AssessRequest {
            task_id: task.clone(),
            description: description.clone(),
            execution_result: Some(result),
            tree: snapshot.clone(),
        };
        let assessment = gather_observations(&self.perspectives, &assess_request, timeout);
        self.audit.record(&AuditRecord::new(
            "assess",
            &task,
            json!({
                "overall": assessment.overall,
                "confidence": assessment.confidence,
                "reports": assessment.reports.len(),
            }),
        ))?;

        // Adapt
        let plan_request = PlanRequest {
            task_id: task.clone(),
            description,
            assessment,
            tree: snapshot,
            original_intent: self.original_intent.clone(),
        };
        let planner = Arc::clone(&self.planner);
        let outcome = run_phase("adapt", timeout, move || planner.plan(&plan_request));
        let decision = match outcome.status {
            PhaseStatus::Success(decision) => decision,
            PhaseStatus::Timeout => {
                let err = EngineError::Timeout {
                    task: task.clone(),
                    phase: Phase::Adapt,
                    seconds: policy.timeout_seconds,
                };
                return self.handle_failure(id, Phase::Adapt, &err.to_string());
            }
            PhaseStatus::Error(message) => {
                return self.handle_failure(id, Phase::Adapt, &message);
            }
        };
        self.audit.record(&AuditRecord::new(
            "adapt",
            &task,
            json!({"kind": decision.kind, "reasoning": decision.reasoning}),
        ))?;

        let defaults = DecomposeDefaults {
            max_attempts: self.config.decompose_max_attempts,
        };
        match apply_decision(&mut self.tree, id, &decision, &defaults) {
            Ok(summary) => {
                debug!(task = %task, kind = ?summary.kind, status = ?summary.status_after, "decision applied");
                self.audit.record(&AuditRecord::new(
                    "mutation",
                    &task,
                    json!({
                        "kind": summary.kind,
                        "status_after": summary.status_after,
                        "children_added": summary.children_added,
                        "escalated_instead": summary.escalated_instead,
                    }),
                ))?;
                if summary.status_after == TaskStatus::Escalated {
                    self.checkpoint(&format!("escalation:{task}"))?;
                }
                Ok(())
            }
            Err(err) => {
                // The node stays unresolved; the failure handler decides
                // whether another Adapt gets a chance.
                self.tree.node_mut(id).status = TaskStatus::Pending;
                self.handle_failure(id, Phase::Adapt, &err.to_string())
            }
        }
    }

    /// Route one recorded failure into backoff retry or escalation.
    fn handle_failure(&mut self, id: NodeId, phase: Phase, message: &str) -> Result<()> {
        let task = self.tree.node(id).id.clone();
        warn!(task = %task, %phase, message, "phase failed");
        let total = self.failures.record(&task, phase);
        self.checkpoint(&format!("failure:{task}:{total}"))?;

        let (threshold, max_attempts) = {
            let node = self.tree.node(id);
            (node.failure_threshold, node.policy.max_attempts)
        };
        // Threshold extremes short-circuit the attempt budget: 0 escalates on
        // the first failure, 1 never escalates.
        let action = if threshold <= 0.0 {
            RecoveryAction::Escalate
        } else if threshold >= 1.0 {
            RecoveryAction::Retry {
                backoff: Duration::from_secs(backoff_seconds(total)),
            }
        } else {
            decide_recovery(total, max_attempts)
        };
        self.audit.record(&AuditRecord::new(
            "recovery",
            &task,
            json!({
                "phase": phase,
                "message": message,
                "failures": total,
                "action": match &action {
                    RecoveryAction::Retry { .. } => "retry",
                    RecoveryAction::Escalate => "escalate",
                },
            }),
        ))?;

        match action {
            RecoveryAction::Retry { backoff } => {
                info!(task = %task, backoff_secs = backoff.as_secs(), "retrying after backoff");
                self.sleeper.sleep(backoff);
                let node = self.tree.node_mut(id);
                if node.retry_count < node.policy.max_attempts {
                    node.retry_count += 1;
                }
                node.status = TaskStatus::Pending;
            }
            RecoveryAction::Escalate => {
                info!(task = %task, "escalating");
                let node = self.tree.node_mut(id);
                node.status = TaskStatus::Escalated;
                node.escalation_reason = Some(message.to_string());
                self.checkpoint(&format!("escalation:{task}"))?;
            }
        }
        Ok(())
    }

    fn checkpoint(&mut self, name: &str) -> Result<()> {
        let snapshot = self.tree.to_spec();
        self.checkpoints
            .append(name, snapshot, self.failures.snapshot());
        let seq = self.checkpoints.len() as u64 - 1;
        self.store.append_history(
            &self.run_id,
            &json!({"event": "checkpoint", "name": name, "seq": seq}),
        )
    }
}
