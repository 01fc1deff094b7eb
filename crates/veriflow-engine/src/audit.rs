//! Audit events.
//!
//! Every decision-affecting occurrence is emitted to the [`AuditSink`]
//! collaborator with enough detail to reconstruct the decision path.
//! Recording is fire-and-forget: a failing sink is logged and ignored,
//! it never blocks or fails an authentication flow.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::policy::RiskBand;
use crate::session::FailureReason;
use crate::stepup::StepUpReason;
use veriflow_core::{AssuranceLevel, ChallengeId, SessionId, TenantId};
use veriflow_provider::ids::ProviderKey;

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    SessionStarted {
        session_id: SessionId,
        tenant_id: TenantId,
        at: DateTime<Utc>,
    },
    /// Context gathering failed; the session proceeded on partial data.
    ContextDegraded {
        session_id: SessionId,
        reason: String,
    },
    RiskAssessed {
        session_id: SessionId,
        score: f64,
        band: RiskBand,
        factor_count: usize,
    },
    /// The risk engine could not assess; the maximum band was assumed.
    RiskFailedClosed {
        session_id: SessionId,
        reason: String,
    },
    PolicyResolved {
        session_id: SessionId,
        required_assurance: AssuranceLevel,
        allowed_methods: usize,
        requires_approval: bool,
    },
    /// No provider satisfies the requirement; surfaced to the caller as
    /// DENY, recorded here with what was unmet.
    PolicyUnsatisfiable {
        session_id: SessionId,
        required_assurance: AssuranceLevel,
    },
    ChallengeIssued {
        session_id: SessionId,
        challenge_id: ChallengeId,
        provider: ProviderKey,
    },
    ChallengeValidated {
        session_id: SessionId,
        provider: ProviderKey,
        success: bool,
        achieved_assurance: Option<AssuranceLevel>,
    },
    /// A response arrived after its challenge expired and was rejected.
    ChallengeExpired {
        session_id: SessionId,
        challenge_id: ChallengeId,
    },
    StepUpRequired {
        session_id: SessionId,
        target_assurance: AssuranceLevel,
        reason: StepUpReason,
    },
    /// A stale write lost against a concurrent mutation.
    ConcurrencyConflict {
        session_id: SessionId,
    },
    SessionCompleted {
        session_id: SessionId,
        achieved_assurance: AssuranceLevel,
        steps: usize,
        requires_approval: bool,
    },
    SessionFailed {
        session_id: SessionId,
        reason: FailureReason,
    },
    SessionCancelled {
        session_id: SessionId,
    },
    SessionExpired {
        session_id: SessionId,
    },
}

impl AuditEvent {
    /// The session this event belongs to.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        match self {
            AuditEvent::SessionStarted { session_id, .. }
            | AuditEvent::ContextDegraded { session_id, .. }
            | AuditEvent::RiskAssessed { session_id, .. }
            | AuditEvent::RiskFailedClosed { session_id, .. }
            | AuditEvent::PolicyResolved { session_id, .. }
            | AuditEvent::PolicyUnsatisfiable { session_id, .. }
            | AuditEvent::ChallengeIssued { session_id, .. }
            | AuditEvent::ChallengeValidated { session_id, .. }
            | AuditEvent::ChallengeExpired { session_id, .. }
            | AuditEvent::StepUpRequired { session_id, .. }
            | AuditEvent::ConcurrencyConflict { session_id }
            | AuditEvent::SessionCompleted { session_id, .. }
            | AuditEvent::SessionFailed { session_id, .. }
            | AuditEvent::SessionCancelled { session_id }
            | AuditEvent::SessionExpired { session_id } => *session_id,
        }
    }
}

/// Failure to record an audit event.
#[derive(Debug, Error)]
#[error("audit sink failure: {0}")]
pub struct AuditError(pub String);

/// Collaborator receiving audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one event. Implementations should be quick; the engine does
    /// not await durability guarantees here.
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Sink that logs events through `tracing`.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let payload = serde_json::to_string(&event)
            .map_err(|e| AuditError(format!("event serialization failed: {e}")))?;
        info!(session_id = %event.session_id(), audit = %payload, "audit event");
        Ok(())
    }
}

/// Sink that collects events in memory, for tests and assertions.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in order.
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }

    /// Number of recorded events.
    pub async fn count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Drop all recorded events.
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events.write().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_sink_collects_in_order() {
        let sink = InMemoryAuditSink::new();
        let session_id = SessionId::new();

        sink.record(AuditEvent::SessionStarted {
            session_id,
            tenant_id: TenantId::new(),
            at: Utc::now(),
        })
        .await
        .unwrap();
        sink.record(AuditEvent::SessionCancelled { session_id })
            .await
            .unwrap();

        let events = sink.events().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], AuditEvent::SessionStarted { .. }));
        assert!(matches!(events[1], AuditEvent::SessionCancelled { .. }));
        assert_eq!(events[1].session_id(), session_id);
    }

    #[tokio::test]
    async fn tracing_sink_accepts_events() {
        let sink = TracingAuditSink;
        sink.record(AuditEvent::SessionExpired {
            session_id: SessionId::new(),
        })
        .await
        .unwrap();
    }

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = AuditEvent::PolicyUnsatisfiable {
            session_id: SessionId::new(),
            required_assurance: AssuranceLevel::L3,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"policy_unsatisfiable\""));
        assert!(json.contains("\"required_assurance\":3"));
    }
}
