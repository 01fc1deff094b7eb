//! Engine entry-point types.
//!
//! Requests are validated before any state is touched; decision payloads
//! are additive-only (`#[non_exhaustive]`) so callers built against older
//! versions keep working.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{EngineError, EngineResult};
use crate::policy::ResourceSensitivity;
use crate::session::{AuthenticationSession, FailureReason};
use veriflow_core::{AssuranceLevel, RequestId, SessionId, TenantId};
use veriflow_provider::challenge::Challenge;

/// An inbound authentication request from the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuthRequest {
    /// Correlation id assigned by the gateway; also the handle the
    /// context provider resolves signals by.
    pub request_id: RequestId,
    pub tenant_id: TenantId,
    /// The resource the principal is trying to reach.
    #[validate(length(min = 1, max = 512, message = "must be 1-512 characters"))]
    pub resource: String,
    /// Sensitivity classification of that resource.
    pub sensitivity: ResourceSensitivity,
    /// Optional login hint (e.g. a typed username). Forwarded to audit,
    /// never trusted for identity: the first factor resolves that.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 256, message = "must be 1-256 characters"))]
    pub principal_hint: Option<String>,
}

impl AuthRequest {
    /// Validate the request, mapping the first violation into the
    /// engine's validation error.
    pub fn validated(self) -> EngineResult<Self> {
        match Validate::validate(&self) {
            Ok(()) => Ok(self),
            Err(errors) => {
                let (field, message) = errors
                    .field_errors()
                    .into_iter()
                    .next()
                    .map(|(field, errs)| {
                        let message = errs
                            .first()
                            .and_then(|e| e.message.as_ref())
                            .map_or_else(|| "invalid value".to_string(), ToString::to_string);
                        (field.to_string(), message)
                    })
                    .unwrap_or_else(|| ("request".to_string(), "invalid request".to_string()));
                Err(EngineError::validation(field, message))
            }
        }
    }
}

/// Final decision of a submit step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
    StepUpRequired,
}

/// Result of `start_session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SessionStarted {
    pub session_id: SessionId,
    pub outcome: StartOutcome,
}

/// What the caller should do next after starting a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StartOutcome {
    /// Answer this challenge via `submit_response`.
    Challenge { challenge: Challenge },
    /// The session was denied outright.
    Denied { reason: FailureReason },
}

/// Result of `submit_response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ResponseOutcome {
    pub decision: Decision,
    /// Assurance achieved so far; `None` when no factor has validated.
    pub achieved_assurance: Option<AssuranceLevel>,
    /// Present when `decision` is `StepUpRequired`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_challenge: Option<Challenge>,
    /// Whether policy additionally demands manual approval.
    pub requires_approval: bool,
    /// Present when `decision` is `Deny`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
}

impl ResponseOutcome {
    pub(crate) fn allow(session: &AuthenticationSession) -> Self {
        Self {
            decision: Decision::Allow,
            achieved_assurance: session.achieved_assurance,
            next_challenge: None,
            requires_approval: session.requires_approval,
            failure_reason: None,
        }
    }

    pub(crate) fn deny(session: &AuthenticationSession, reason: FailureReason) -> Self {
        Self {
            decision: Decision::Deny,
            achieved_assurance: session.achieved_assurance,
            next_challenge: None,
            requires_approval: session.requires_approval,
            failure_reason: Some(reason),
        }
    }

    pub(crate) fn step_up(session: &AuthenticationSession, challenge: Challenge) -> Self {
        Self {
            decision: Decision::StepUpRequired,
            achieved_assurance: session.achieved_assurance,
            next_challenge: Some(challenge),
            requires_approval: session.requires_approval,
            failure_reason: None,
        }
    }
}
