//! Challenges and validation results.
//!
//! A challenge is a single outstanding request to a provider. The engine
//! enforces one non-expired challenge per session; providers decide what
//! the challenge payload means.

use crate::ids::ProviderKey;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use veriflow_core::{ChallengeId, PrincipalId, SessionId};

/// One outstanding provider-issued authentication request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub challenge_id: ChallengeId,
    pub session_id: SessionId,
    pub provider: ProviderKey,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Provider-defined payload: a WebAuthn assertion request, an OTP hint,
    /// a push-notification handle. Opaque to the engine.
    pub payload: serde_json::Value,
}

impl Challenge {
    /// Issue a challenge valid for `ttl` from now.
    pub fn issue(
        session_id: SessionId,
        provider: ProviderKey,
        ttl: Duration,
        payload: serde_json::Value,
    ) -> Self {
        let issued_at = Utc::now();
        Self {
            challenge_id: ChallengeId::new(),
            session_id,
            provider,
            issued_at,
            expires_at: issued_at + ttl,
            payload,
        }
    }

    /// Whether the challenge had expired at `now`.
    ///
    /// Expired challenges are rejected by validation regardless of payload
    /// correctness.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// The caller's answer to an outstanding challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    /// Provider-defined response payload, opaque to the engine.
    pub payload: serde_json::Value,
}

impl ChallengeResponse {
    pub fn new(payload: serde_json::Value) -> Self {
        Self { payload }
    }
}

/// Outcome of a provider validating a challenge response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    /// Whether the response proved what the challenge asked for.
    pub success: bool,
    /// The principal identity the factor resolved, if it resolves one.
    /// First factors typically set this; step-up factors may not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<PrincipalId>,
    /// Human-readable detail for audit trails, never for callers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Validation {
    /// A successful validation that resolved `principal_id`.
    #[must_use]
    pub fn success(principal_id: Option<PrincipalId>) -> Self {
        Self {
            success: true,
            principal_id,
            detail: None,
        }
    }

    /// A failed validation with audit detail.
    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            principal_id: None,
            detail: Some(detail.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_sets_bounded_expiry() {
        let challenge = Challenge::issue(
            SessionId::new(),
            ProviderKey::new("password", 1),
            Duration::minutes(5),
            serde_json::json!({}),
        );
        assert_eq!(challenge.expires_at - challenge.issued_at, Duration::minutes(5));
        assert!(!challenge.is_expired(challenge.issued_at));
    }

    #[test]
    fn expiry_is_strict() {
        let challenge = Challenge::issue(
            SessionId::new(),
            ProviderKey::new("password", 1),
            Duration::seconds(30),
            serde_json::json!({}),
        );
        assert!(!challenge.is_expired(challenge.expires_at));
        assert!(challenge.is_expired(challenge.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn validation_constructors() {
        let ok = Validation::success(Some(PrincipalId::new()));
        assert!(ok.success);
        assert!(ok.principal_id.is_some());

        let bad = Validation::failure("wrong code");
        assert!(!bad.success);
        assert_eq!(bad.detail.as_deref(), Some("wrong code"));
    }
}
