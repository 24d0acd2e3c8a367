//! Error taxonomy for the orchestrator.
//!
//! Five failure classes cover the whole public contract. Store, gate, and
//! controller errors surface synchronously to facade callers; body faults
//! are captured by the executor and turned into terminal task state instead
//! of propagating to the submitter.

use thiserror::Error;

use crate::human::ResponseKind;

/// Top-level error type for orchestrator operations.
#[derive(Debug, Error)]
pub enum QuarryError {
    /// An entity ID is unknown to the system.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (`task`, `human request`).
        entity: &'static str,
        /// The unknown ID.
        id: String,
    },

    /// A second human-in-loop request was opened while one is pending.
    #[error("task {task_id} already has an open human request")]
    Conflict {
        /// Task with the open request.
        task_id: String,
    },

    /// An operation is illegal in the task's current state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// What was attempted and why it is illegal.
        message: String,
    },

    /// A resolution kind is not permitted by the request, or its payload
    /// does not fit the kind.
    #[error("response kind '{kind}' not permitted: {message}")]
    InvalidResponseKind {
        /// The offending kind.
        kind: ResponseKind,
        /// Why it was rejected.
        message: String,
    },

    /// A task body raised an unhandled fault. Recorded on the task record,
    /// never returned from the original submit call.
    #[error("task body failed: {0}")]
    BodyFailure(String),
}

impl QuarryError {
    /// A task ID lookup failed.
    #[must_use]
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "task",
            id: id.into(),
        }
    }

    /// A human-request ID lookup failed.
    #[must_use]
    pub fn request_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "human request",
            id: id.into(),
        }
    }

    /// An illegal state transition.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Machine-readable error code for wire responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::InvalidResponseKind { .. } => "INVALID_RESPONSE_KIND",
            Self::BodyFailure(_) => "BODY_FAILURE",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_not_found_display() {
        let err = QuarryError::task_not_found("t-1");
        assert_eq!(err.to_string(), "task not found: t-1");
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn request_not_found_display() {
        let err = QuarryError::request_not_found("r-1");
        assert!(err.to_string().contains("human request"));
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn conflict_display() {
        let err = QuarryError::Conflict {
            task_id: "t-9".into(),
        };
        assert!(err.to_string().contains("t-9"));
        assert_eq!(err.code(), "CONFLICT");
    }

    #[test]
    fn invalid_state_display() {
        let err = QuarryError::invalid_state("resume after cancel");
        assert_eq!(err.to_string(), "invalid state: resume after cancel");
        assert_eq!(err.code(), "INVALID_STATE");
    }

    #[test]
    fn invalid_response_kind_display() {
        let err = QuarryError::InvalidResponseKind {
            kind: ResponseKind::Edit,
            message: "not in allowed set".into(),
        };
        assert!(err.to_string().contains("edit"));
        assert_eq!(err.code(), "INVALID_RESPONSE_KIND");
    }

    #[test]
    fn body_failure_code() {
        let err = QuarryError::BodyFailure("boom".into());
        assert_eq!(err.code(), "BODY_FAILURE");
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn is_std_error() {
        let err = QuarryError::task_not_found("t");
        let _: &dyn std::error::Error = &err;
    }
}
