//! Typed failure taxonomy for the engine.
//!
//! Collaborator and timeout failures are recoverable (retry/backoff or
//! escalation); depth-limit failures are terminal for the affected subtree;
//! mutation failures leave the node unresolved for another Adapt pass.

use thiserror::Error;

use crate::core::mutate::MutationError;
use crate::core::types::Phase;

/// Failure reported by an external collaborator through its error channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollabError {
    #[error("collaborator failed: {0}")]
    Failed(String),
    #[error("malformed collaborator output: {0}")]
    Malformed(String),
}

/// Engine-level failure classification recorded in audit details.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("{phase} phase failed for '{task}': {message}")]
    Collaborator {
        task: String,
        phase: Phase,
        message: String,
    },
    #[error("{phase} phase for '{task}' timed out after {seconds}s")]
    Timeout {
        task: String,
        phase: Phase,
        seconds: u64,
    },
    #[error("'{task}' at depth {depth} exceeds max_depth {max_depth}")]
    DepthLimit {
        task: String,
        depth: u32,
        max_depth: u32,
    },
    #[error(transparent)]
    Mutation(#[from] MutationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_stable_messages() {
        let err = EngineError::Timeout {
            task: "t".to_string(),
            phase: Phase::Act,
            seconds: 30,
        };
        assert_eq!(err.to_string(), "act phase for 't' timed out after 30s");

        let err = EngineError::DepthLimit {
            task: "t".to_string(),
            depth: 3,
            max_depth: 2,
        };
        assert_eq!(err.to_string(), "'t' at depth 3 exceeds max_depth 2");
    }
}
