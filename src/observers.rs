//! Parallel multi-perspective assessment.
//!
//! Each configured perspective runs on its own thread against the same
//! immutable snapshot of the execution result and tree. A failing or
//! slow perspective never blocks the others past the shared deadline,
//! and never aborts the Assess phase: it degrades into an error report
//! that the aggregate scores as unknown with zero confidence.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::collab::{AssessRequest, Assessor};
use crate::core::aggregate::aggregate;
use crate::core::types::{Assessment, PerspectiveReport};
use crate::phase::{run_phase, PhaseStatus};

/// One configured assessment perspective.
#[derive(Clone)]
pub struct Perspective {
    pub name: String,
    pub assessor: Arc<dyn Assessor>,
}

impl Perspective {
    pub fn new(name: &str, assessor: Arc<dyn Assessor>) -> Self {
        Self {
            name: name.to_string(),
            assessor,
        }
    }
}

/// Run every perspective in parallel and aggregate the reports.
///
/// Reports come back in configuration order regardless of completion
/// order. The `perspective` field of each report is overwritten with the
/// configured name so a confused collaborator cannot misattribute its
/// verdict.
#[instrument(skip_all, fields(task = %request.task_id, perspectives = perspectives.len()))]
pub fn gather_observations(
    perspectives: &[Perspective],
    request: &AssessRequest,
    timeout: Duration,
) -> Assessment {
    let reports: Vec<PerspectiveReport> = thread::scope(|scope| {
        let handles: Vec<_> = perspectives
            .iter()
            .map(|perspective| {
                let name = perspective.name.clone();
                let assessor = Arc::clone(&perspective.assessor);
                let request = request.clone();
                scope.spawn(move || {
                    let outcome = run_phase(&format!("assess-{name}"), timeout, move || {
                        assessor.assess(&request)
                    });
                    match outcome.status {
                        PhaseStatus::Success(mut report) => {
                            report.perspective = name;
                            report
                        }
                        PhaseStatus::Timeout => PerspectiveReport::from_error(
                            &name,
                            &format!("timed out after {}s", timeout.as_secs()),
                        ),
                        PhaseStatus::Error(message) => {
                            PerspectiveReport::from_error(&name, &message)
                        }
                    }
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(report) => report,
                // run_phase already absorbs collaborator panics; this
                // covers a panic in the glue above.
                Err(_) => PerspectiveReport::from_error("unknown", "perspective thread panicked"),
            })
            .collect()
    });

    debug!(reports = reports.len(), "perspectives gathered");
    aggregate(reports)
}
