//! Engine error types
//!
//! The taxonomy the orchestrator exposes. Transient conditions are retried
//! where they occur; only outcomes that affect the session (deny, failure,
//! expiry) surface to callers, everything else stays internal.

use thiserror::Error;

use crate::session::SessionState;
use veriflow_core::{AssuranceLevel, ChallengeId, SessionId};
use veriflow_provider::error::ProviderError;

/// Error that can occur while driving an authentication session.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed request; rejected before any state mutation.
    #[error("validation failed on '{field}': {message}")]
    Validation { field: String, message: String },

    /// No session exists under this id.
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: SessionId },

    /// The session has already reached a terminal state.
    #[error("session {session_id} is terminal ({state})")]
    SessionTerminal {
        session_id: SessionId,
        state: SessionState,
    },

    /// The supplied challenge id does not match the outstanding challenge.
    #[error("challenge {challenge_id} is not the outstanding challenge for session {session_id}")]
    ChallengeMismatch {
        session_id: SessionId,
        challenge_id: ChallengeId,
    },

    /// The response arrived after the challenge expired. Always rejected,
    /// regardless of payload validity; the session keeps its prior state.
    #[error("challenge {challenge_id} expired")]
    ChallengeExpired { challenge_id: ChallengeId },

    /// No registered provider can satisfy the resolved policy.
    #[error("no provider satisfies required assurance {required}")]
    PolicyUnsatisfiable { required: AssuranceLevel },

    /// The risk engine could not produce an assessment at all.
    ///
    /// Callers of the risk engine fail closed to the maximum risk band on
    /// this error; it never fails a session on its own.
    #[error("risk engine failure: {message}")]
    RiskEngineFailure { message: String },

    /// A write raced another mutation of the same session. Retried once by
    /// re-reading state; surfacing it means the retry also conflicted.
    #[error("concurrent modification of session {session_id}")]
    ConcurrencyConflict { session_id: SessionId },

    /// Provider invocation failure, classification preserved from the
    /// provider layer.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// An illegal state transition was attempted. Indicates an engine bug,
    /// never caller input.
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: SessionState, to: SessionState },

    /// Unexpected internal failure.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl EngineError {
    /// Whether the caller may retry the same call and expect progress.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::ConcurrencyConflict { .. } => true,
            EngineError::Provider(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Stable code for audit records and logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::Validation { .. } => "VALIDATION_ERROR",
            EngineError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            EngineError::SessionTerminal { .. } => "SESSION_TERMINAL",
            EngineError::ChallengeMismatch { .. } => "CHALLENGE_MISMATCH",
            EngineError::ChallengeExpired { .. } => "CHALLENGE_EXPIRED",
            EngineError::PolicyUnsatisfiable { .. } => "POLICY_UNSATISFIABLE",
            EngineError::RiskEngineFailure { .. } => "RISK_ENGINE_FAILURE",
            EngineError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            EngineError::Provider(_) => "PROVIDER_ERROR",
            EngineError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            EngineError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::Internal {
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_conflict_is_retryable() {
        let err = EngineError::ConcurrencyConflict {
            session_id: SessionId::new(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn transient_provider_errors_stay_retryable() {
        let err = EngineError::from(ProviderError::unavailable("down"));
        assert!(err.is_retryable());

        let err = EngineError::from(ProviderError::malformed("junk"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn validation_is_not_retryable() {
        let err = EngineError::validation("tenant_id", "required");
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn display_names_the_session() {
        let id = SessionId::new();
        let err = EngineError::SessionNotFound { session_id: id };
        assert!(err.to_string().contains(&id.to_string()));
    }
}
