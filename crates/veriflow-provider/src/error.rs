//! Provider error types
//!
//! Error definitions with transient/permanent classification. The engine
//! retries transient failures with backoff inside the current challenge
//! window; permanent failures end the attempt immediately.

use thiserror::Error;

use crate::ids::ProviderKey;
use veriflow_core::{ChallengeId, SessionId};

/// Error that can occur while invoking an authentication provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    // Availability errors (transient)
    /// The provider's backing service could not be reached.
    #[error("provider unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The provider did not answer within its deadline.
    #[error("provider timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    // Protocol errors (permanent)
    /// The challenge being answered has expired.
    #[error("challenge {challenge_id} expired")]
    ChallengeExpired { challenge_id: ChallengeId },

    /// The response payload is not something this provider can interpret.
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    /// No provider is registered under the requested key.
    #[error("provider not registered: {key}")]
    NotRegistered { key: ProviderKey },

    /// The provider refused to start a challenge for this context.
    #[error("challenge refused: {message}")]
    ChallengeRefused { message: String },

    /// Cancellation was requested for a session the provider does not know.
    #[error("no outstanding authentication for session {session_id}")]
    UnknownSession { session_id: SessionId },

    /// Unexpected internal provider failure.
    #[error("provider internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ProviderError {
    /// Whether the failure is transient and the invocation may be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable { .. } | ProviderError::Timeout { .. }
        )
    }

    /// Whether retrying cannot help.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Stable code for audit records and logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            ProviderError::Unavailable { .. } => "PROVIDER_UNAVAILABLE",
            ProviderError::Timeout { .. } => "PROVIDER_TIMEOUT",
            ProviderError::ChallengeExpired { .. } => "CHALLENGE_EXPIRED",
            ProviderError::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            ProviderError::NotRegistered { .. } => "PROVIDER_NOT_REGISTERED",
            ProviderError::ChallengeRefused { .. } => "CHALLENGE_REFUSED",
            ProviderError::UnknownSession { .. } => "UNKNOWN_SESSION",
            ProviderError::Internal { .. } => "PROVIDER_INTERNAL",
        }
    }

    // Convenience constructors

    /// Create an unavailability error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        ProviderError::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create an unavailability error with a source.
    pub fn unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ProviderError::Unavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a malformed-response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        ProviderError::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ProviderError::Internal {
            message: message.into(),
            source: None,
        }
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
