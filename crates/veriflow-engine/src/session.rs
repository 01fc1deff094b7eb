//! Authentication sessions and their state machine.
//!
//! A session is one authentication attempt from start to finish. All
//! mutation goes through methods that enforce the transition graph, keep
//! achieved assurance monotone, and maintain the single-flight challenge
//! invariant. Terminal sessions reject every further transition.
//!
//! The `version` counter supports optimistic concurrency in the session
//! store: a write racing the expiry sweep loses cleanly instead of
//! resurrecting a dead session.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::policy::ResourceSensitivity;
use veriflow_core::{AssuranceLevel, PrincipalId, RequestId, SessionId, TenantId};
use veriflow_provider::challenge::Challenge;
use veriflow_provider::ids::{ProviderId, ProviderKey};
use veriflow_provider::types::ProviderCategory;

/// States of the session state machine.
///
/// ```text
/// Init -> ContextGather -> RiskEval -> PolicyResolve -> ChallengeIssued
///      -> ResponsePending -> ResponseValidated -> StepUpCheck
///      -> { ChallengeIssued | Complete }
///
/// any non-terminal state -> Failed | Cancelled | Expired
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Init,
    ContextGather,
    RiskEval,
    PolicyResolve,
    ChallengeIssued,
    ResponsePending,
    ResponseValidated,
    StepUpCheck,
    Complete,
    Failed,
    Cancelled,
    Expired,
}

impl SessionState {
    /// Whether the state admits no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Complete
                | SessionState::Failed
                | SessionState::Cancelled
                | SessionState::Expired
        )
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::{
            Cancelled, ChallengeIssued, Complete, ContextGather, Expired, Failed, Init,
            PolicyResolve, ResponsePending, ResponseValidated, RiskEval, StepUpCheck,
        };

        if self.is_terminal() {
            return false;
        }
        // Failure, cancellation, and expiry are first-class transitions
        // available from every non-terminal state.
        if matches!(next, Failed | Cancelled | Expired) {
            return true;
        }

        matches!(
            (self, next),
            (Init, ContextGather)
                | (ContextGather, RiskEval)
                | (RiskEval, PolicyResolve)
                | (PolicyResolve, ChallengeIssued)
                | (ChallengeIssued, ResponsePending)
                | (ResponsePending, ResponseValidated)
                | (ResponseValidated, StepUpCheck)
                | (StepUpCheck, ChallengeIssued)
                | (StepUpCheck, Complete)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Init => "init",
            SessionState::ContextGather => "context_gather",
            SessionState::RiskEval => "risk_eval",
            SessionState::PolicyResolve => "policy_resolve",
            SessionState::ChallengeIssued => "challenge_issued",
            SessionState::ResponsePending => "response_pending",
            SessionState::ResponseValidated => "response_validated",
            SessionState::StepUpCheck => "step_up_check",
            SessionState::Complete => "complete",
            SessionState::Failed => "failed",
            SessionState::Cancelled => "cancelled",
            SessionState::Expired => "expired",
        };
        write!(f, "{name}")
    }
}

/// Why a session reached `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Transient provider failures exhausted the retry bound.
    ProviderExhausted,
    /// No registered provider satisfies the resolved policy.
    PolicyUnsatisfiable,
    /// A provider definitively rejected the submitted factor.
    FactorRejected,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureReason::ProviderExhausted => "provider_exhausted",
            FailureReason::PolicyUnsatisfiable => "policy_unsatisfiable",
            FailureReason::FactorRejected => "factor_rejected",
        };
        write!(f, "{name}")
    }
}

/// One validated factor in the session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedStep {
    pub provider: ProviderKey,
    pub category: ProviderCategory,
    pub assurance: AssuranceLevel,
    pub validated_at: DateTime<Utc>,
}

/// One recorded risk assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSample {
    pub score: f64,
    pub computed_at: DateTime<Utc>,
}

/// One in-progress or completed authentication attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationSession {
    pub session_id: SessionId,
    pub tenant_id: TenantId,
    /// Correlates re-gathered context with the original request.
    pub request_id: RequestId,
    /// Unknown until the first factor resolves identity.
    pub principal_id: Option<PrincipalId>,
    pub state: SessionState,
    /// `None` before the first validated factor; never decreases after.
    pub achieved_assurance: Option<AssuranceLevel>,
    /// May rise when re-assessed risk raises the policy requirement.
    pub target_assurance: AssuranceLevel,
    /// Sensitivity of the resource the request targets; captured at start
    /// so re-assessments see the same resource.
    pub sensitivity: ResourceSensitivity,
    /// Set when the resolving policy demands manual approval.
    pub requires_approval: bool,
    pub steps_completed: Vec<CompletedStep>,
    pub risk_history: Vec<RiskSample>,
    /// The single outstanding challenge, if any.
    pub active_challenge: Option<Challenge>,
    /// Providers already used for a challenge in this session.
    pub attempted_providers: BTreeSet<ProviderId>,
    pub failure_reason: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Monotonic counter for optimistic concurrency; bumped by the store
    /// on every successful update.
    pub version: u64,
}

impl AuthenticationSession {
    /// Create a session in `Init` at version 0.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        request_id: RequestId,
        sensitivity: ResourceSensitivity,
        session_ttl: Duration,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            session_id: SessionId::new(),
            tenant_id,
            request_id,
            principal_id: None,
            state: SessionState::Init,
            achieved_assurance: None,
            target_assurance: AssuranceLevel::MIN,
            sensitivity,
            requires_approval: false,
            steps_completed: Vec::new(),
            risk_history: Vec::new(),
            active_challenge: None,
            attempted_providers: BTreeSet::new(),
            failure_reason: None,
            created_at,
            expires_at: created_at + session_ttl,
            version: 0,
        }
    }

    /// Move to `next`, enforcing the transition graph.
    pub fn transition(&mut self, next: SessionState) -> EngineResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(EngineError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Move to `Failed` with a recorded reason.
    pub fn fail(&mut self, reason: FailureReason) -> EngineResult<()> {
        self.transition(SessionState::Failed)?;
        self.failure_reason = Some(reason);
        Ok(())
    }

    /// Record a risk assessment sample.
    pub fn record_risk(&mut self, score: f64, computed_at: DateTime<Utc>) {
        self.risk_history.push(RiskSample { score, computed_at });
    }

    /// The most recent recorded risk score.
    #[must_use]
    pub fn latest_risk(&self) -> Option<f64> {
        self.risk_history.last().map(|sample| sample.score)
    }

    /// Increase between the two most recent samples, if both exist.
    /// Negative values mean risk went down.
    #[must_use]
    pub fn last_risk_increase(&self) -> Option<f64> {
        let n = self.risk_history.len();
        if n < 2 {
            return None;
        }
        Some(self.risk_history[n - 1].score - self.risk_history[n - 2].score)
    }

    /// Record a validated factor. Achieved assurance is the max of the
    /// previous value and the factor's level, so it never decreases.
    pub fn record_step(
        &mut self,
        provider: ProviderKey,
        category: ProviderCategory,
        assurance: AssuranceLevel,
        validated_at: DateTime<Utc>,
    ) {
        self.achieved_assurance = Some(match self.achieved_assurance {
            Some(current) => current.max(assurance),
            None => assurance,
        });
        self.attempted_providers.insert(provider.id.clone());
        self.steps_completed.push(CompletedStep {
            provider,
            category,
            assurance,
            validated_at,
        });
    }

    /// Mark a provider as attempted without recording a completed step.
    /// Done at challenge issuance so failed attempts are not re-selected.
    pub fn mark_attempted(&mut self, id: ProviderId) {
        self.attempted_providers.insert(id);
    }

    /// Install the outstanding challenge, enforcing single-flight: a
    /// still-live previous challenge must resolve before a new one is
    /// issued.
    pub fn set_challenge(&mut self, challenge: Challenge) -> EngineResult<()> {
        if let Some(existing) = &self.active_challenge {
            if !existing.is_expired(Utc::now()) {
                return Err(EngineError::internal(format!(
                    "challenge {} still outstanding for session {}",
                    existing.challenge_id, self.session_id
                )));
            }
        }
        self.active_challenge = Some(challenge);
        Ok(())
    }

    /// Clear the outstanding challenge after it resolved.
    pub fn clear_challenge(&mut self) {
        self.active_challenge = None;
    }

    /// Categories of factors already completed.
    #[must_use]
    pub fn used_categories(&self) -> BTreeSet<ProviderCategory> {
        self.steps_completed
            .iter()
            .map(|step| step.category)
            .collect()
    }

    /// Whether the session as a whole is past its deadline.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.state.is_terminal() && now > self.expires_at
    }

    /// Whether the achieved level meets `target`.
    #[must_use]
    pub fn meets(&self, target: AssuranceLevel) -> bool {
        self.achieved_assurance
            .map_or(false, |achieved| achieved >= target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> AuthenticationSession {
        AuthenticationSession::new(
            TenantId::new(),
            RequestId::new(),
            ResourceSensitivity::Internal,
            Duration::minutes(15),
        )
    }

    fn drive_to_response_pending(s: &mut AuthenticationSession) {
        s.transition(SessionState::ContextGather).unwrap();
        s.transition(SessionState::RiskEval).unwrap();
        s.transition(SessionState::PolicyResolve).unwrap();
        s.transition(SessionState::ChallengeIssued).unwrap();
        s.transition(SessionState::ResponsePending).unwrap();
    }

    mod transitions {
        use super::*;

        #[test]
        fn happy_path_is_legal() {
            let mut s = session();
            drive_to_response_pending(&mut s);
            s.transition(SessionState::ResponseValidated).unwrap();
            s.transition(SessionState::StepUpCheck).unwrap();
            s.transition(SessionState::Complete).unwrap();
            assert!(s.state.is_terminal());
        }

        #[test]
        fn step_up_loops_back_to_challenge() {
            let mut s = session();
            drive_to_response_pending(&mut s);
            s.transition(SessionState::ResponseValidated).unwrap();
            s.transition(SessionState::StepUpCheck).unwrap();
            s.transition(SessionState::ChallengeIssued).unwrap();
            s.transition(SessionState::ResponsePending).unwrap();
        }

        #[test]
        fn skipping_states_is_illegal() {
            let mut s = session();
            let err = s.transition(SessionState::ChallengeIssued).unwrap_err();
            assert_eq!(err.error_code(), "ILLEGAL_TRANSITION");
        }

        #[test]
        fn failure_cancel_expiry_reachable_from_any_non_terminal() {
            for target in [
                SessionState::Failed,
                SessionState::Cancelled,
                SessionState::Expired,
            ] {
                let mut s = session();
                drive_to_response_pending(&mut s);
                s.transition(target).unwrap();
            }
        }

        #[test]
        fn terminal_states_admit_nothing() {
            let mut s = session();
            s.transition(SessionState::Cancelled).unwrap();
            for target in [
                SessionState::ContextGather,
                SessionState::Complete,
                SessionState::Failed,
                SessionState::Expired,
                SessionState::Cancelled,
            ] {
                assert!(
                    s.transition(target).is_err(),
                    "cancelled -> {target} should be illegal"
                );
            }
        }

        #[test]
        fn fail_records_the_reason() {
            let mut s = session();
            s.fail(FailureReason::PolicyUnsatisfiable).unwrap();
            assert_eq!(s.state, SessionState::Failed);
            assert_eq!(s.failure_reason, Some(FailureReason::PolicyUnsatisfiable));
        }
    }

    mod assurance {
        use super::*;

        #[test]
        fn achieved_assurance_is_monotone() {
            let mut s = session();
            let now = Utc::now();

            s.record_step(
                ProviderKey::new("totp", 1),
                ProviderCategory::Possession,
                AssuranceLevel::L2,
                now,
            );
            assert_eq!(s.achieved_assurance, Some(AssuranceLevel::L2));

            // A weaker factor later never lowers the achieved level.
            s.record_step(
                ProviderKey::new("password", 1),
                ProviderCategory::Knowledge,
                AssuranceLevel::L1,
                now,
            );
            assert_eq!(s.achieved_assurance, Some(AssuranceLevel::L2));

            s.record_step(
                ProviderKey::new("webauthn", 1),
                ProviderCategory::Possession,
                AssuranceLevel::L4,
                now,
            );
            assert_eq!(s.achieved_assurance, Some(AssuranceLevel::L4));
        }

        #[test]
        fn meets_compares_against_target() {
            let mut s = session();
            assert!(!s.meets(AssuranceLevel::L1));
            s.record_step(
                ProviderKey::new("totp", 1),
                ProviderCategory::Possession,
                AssuranceLevel::L2,
                Utc::now(),
            );
            assert!(s.meets(AssuranceLevel::L2));
            assert!(!s.meets(AssuranceLevel::L3));
        }

        #[test]
        fn steps_track_attempted_providers_and_categories() {
            let mut s = session();
            s.record_step(
                ProviderKey::new("password", 1),
                ProviderCategory::Knowledge,
                AssuranceLevel::L1,
                Utc::now(),
            );
            s.mark_attempted(ProviderId::new("push"));

            assert!(s.attempted_providers.contains(&ProviderId::new("password")));
            assert!(s.attempted_providers.contains(&ProviderId::new("push")));
            assert!(s.used_categories().contains(&ProviderCategory::Knowledge));
            assert!(!s.used_categories().contains(&ProviderCategory::Possession));
        }
    }

    mod challenges {
        use super::*;

        fn challenge(session_id: SessionId, ttl_secs: i64) -> Challenge {
            Challenge::issue(
                session_id,
                ProviderKey::new("password", 1),
                Duration::seconds(ttl_secs),
                serde_json::json!({}),
            )
        }

        #[test]
        fn single_flight_rejects_second_live_challenge() {
            let mut s = session();
            s.set_challenge(challenge(s.session_id, 60)).unwrap();
            let err = s.set_challenge(challenge(s.session_id, 60)).unwrap_err();
            assert_eq!(err.error_code(), "INTERNAL_ERROR");
        }

        #[test]
        fn expired_challenge_may_be_replaced() {
            let mut s = session();
            s.set_challenge(challenge(s.session_id, -1)).unwrap();
            s.set_challenge(challenge(s.session_id, 60)).unwrap();
        }

        #[test]
        fn clearing_allows_reissue() {
            let mut s = session();
            s.set_challenge(challenge(s.session_id, 60)).unwrap();
            s.clear_challenge();
            s.set_challenge(challenge(s.session_id, 60)).unwrap();
        }
    }

    mod risk {
        use super::*;

        #[test]
        fn risk_history_tracks_increases() {
            let mut s = session();
            assert_eq!(s.last_risk_increase(), None);

            s.record_risk(0.3, Utc::now());
            assert_eq!(s.latest_risk(), Some(0.3));
            assert_eq!(s.last_risk_increase(), None);

            s.record_risk(0.7, Utc::now());
            let increase = s.last_risk_increase().unwrap();
            assert!((increase - 0.4).abs() < 1e-9);

            s.record_risk(0.5, Utc::now());
            assert!(s.last_risk_increase().unwrap() < 0.0);
        }
    }

    #[test]
    fn expiry_applies_only_to_live_sessions() {
        let mut s = session();
        s.expires_at = Utc::now() - Duration::seconds(1);
        assert!(s.is_expired(Utc::now()));

        s.transition(SessionState::Expired).unwrap();
        assert!(!s.is_expired(Utc::now()));
    }
}
