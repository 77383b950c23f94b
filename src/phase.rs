//! Timeout-bounded execution of a single phase call.
//!
//! This is the sole translation point between arbitrary collaborator
//! failures and the engine's typed failure model: panics, errors, and
//! deadline expiry all come back as a [`PhaseStatus`], never as a raw
//! propagated failure.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::CollabError;

/// Classified outcome of one phase call.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseStatus<T> {
    Success(T),
    /// The deadline expired. The collaborator may still complete side
    /// effects afterwards; the engine records this race, it never assumes
    /// the call was cancelled.
    Timeout,
    Error(String),
}

/// Phase result plus wall-clock accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOutcome<T> {
    pub status: PhaseStatus<T>,
    pub elapsed: Duration,
}

/// Run `f` on a worker thread and wait at most `timeout` for its result.
///
/// On timeout the worker is left to finish on its own (cancellation is
/// cooperative only at phase boundaries). A panicking collaborator is
/// reported as an error, not propagated.
pub fn run_phase<T, F>(label: &str, timeout: Duration, f: F) -> PhaseOutcome<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CollabError> + Send + 'static,
{
    let start = Instant::now();
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name(format!("phase-{label}"))
        .spawn(move || {
            let _ = tx.send(f());
        });
    if let Err(err) = spawned {
        return PhaseOutcome {
            status: PhaseStatus::Error(format!("failed to spawn phase worker: {err}")),
            elapsed: start.elapsed(),
        };
    }

    let status = match rx.recv_timeout(timeout) {
        Ok(Ok(value)) => {
            debug!(phase = label, "phase completed");
            PhaseStatus::Success(value)
        }
        Ok(Err(err)) => {
            warn!(phase = label, error = %err, "phase returned an error");
            PhaseStatus::Error(err.to_string())
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!(phase = label, timeout_secs = timeout.as_secs(), "phase timed out");
            PhaseStatus::Timeout
        }
        // Sender dropped without sending: the collaborator panicked.
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            warn!(phase = label, "phase worker panicked");
            PhaseStatus::Error("collaborator panicked".to_string())
        }
    };

    PhaseOutcome {
        status,
        elapsed: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_carries_the_value_and_elapsed_time() {
        let outcome = run_phase("test", Duration::from_secs(1), || Ok(41 + 1));
        assert_eq!(outcome.status, PhaseStatus::Success(42));
        assert!(outcome.elapsed <= Duration::from_secs(1));
    }

    #[test]
    fn collaborator_error_is_translated_not_propagated() {
        let outcome: PhaseOutcome<()> = run_phase("test", Duration::from_secs(1), || {
            Err(CollabError::Failed("backend unavailable".to_string()))
        });
        assert_eq!(
            outcome.status,
            PhaseStatus::Error("collaborator failed: backend unavailable".to_string())
        );
    }

    #[test]
    fn deadline_expiry_returns_timeout() {
        let outcome: PhaseOutcome<()> = run_phase("test", Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(200));
            Ok(())
        });
        assert_eq!(outcome.status, PhaseStatus::Timeout);
        assert!(outcome.elapsed >= Duration::from_millis(20));
    }

    #[test]
    fn panicking_collaborator_is_reported_as_error() {
        let outcome: PhaseOutcome<()> =
            run_phase("test", Duration::from_secs(1), || panic!("boom"));
        assert_eq!(
            outcome.status,
            PhaseStatus::Error("collaborator panicked".to_string())
        );
    }
}
