//! The authentication orchestrator.
//!
//! Owns the per-session state machine and composes the risk engine,
//! policy engine, step-up decision service, and provider registry. Every
//! collaborator is injected at construction; there are no process-wide
//! singletons, so tests run against fakes without any global setup.
//!
//! Mutations are written back through the session store's version check.
//! A write that races another mutation (typically the expiry sweep) is
//! retried once against re-read state; a second conflict surfaces to the
//! caller as retryable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audit::{AuditEvent, AuditSink};
use crate::config::EngineConfig;
use crate::context::ContextProvider;
use crate::error::{EngineError, EngineResult};
use crate::policy::{PolicyEngine, RiskBand};
use crate::request::{AuthRequest, ResponseOutcome, SessionStarted, StartOutcome};
use crate::risk::{RiskAssessment, RiskEngine};
use crate::session::{AuthenticationSession, FailureReason, SessionState};
use crate::stepup::{self, StepUpOutcome};
use crate::store::SessionStore;
use veriflow_core::{AuthContext, ChallengeId, SessionId};
use veriflow_provider::challenge::{Challenge, ChallengeResponse};
use veriflow_provider::descriptor::DescriptorFilter;
use veriflow_provider::error::ProviderError;
use veriflow_provider::registry::{ProviderRegistry, RegisteredProvider};
use veriflow_provider::resilience::RetryExecutor;

/// The orchestration engine.
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    policy: PolicyEngine,
    risk: RiskEngine,
    store: Arc<dyn SessionStore>,
    context_provider: Arc<dyn ContextProvider>,
    audit_sink: Arc<dyn AuditSink>,
    retry: RetryExecutor,
    config: EngineConfig,
}

impl Orchestrator {
    /// Assemble an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        policy: PolicyEngine,
        risk: RiskEngine,
        store: Arc<dyn SessionStore>,
        context_provider: Arc<dyn ContextProvider>,
        audit_sink: Arc<dyn AuditSink>,
        config: EngineConfig,
    ) -> Self {
        let retry = RetryExecutor::new(config.retry.clone());
        Self {
            registry,
            policy,
            risk,
            store,
            context_provider,
            audit_sink,
            retry,
            config,
        }
    }

    /// Begin an authentication session for one request.
    ///
    /// Returns the first challenge to answer, or an immediate denial when
    /// no provider can satisfy the resolved policy.
    pub async fn start_session(&self, request: AuthRequest) -> EngineResult<SessionStarted> {
        let request = request.validated()?;

        let mut session = AuthenticationSession::new(
            request.tenant_id,
            request.request_id,
            request.sensitivity,
            self.config.session_ttl,
        );
        let session_id = session.session_id;
        info!(
            session_id = %session_id,
            tenant_id = %request.tenant_id,
            resource = %request.resource,
            "authentication session started"
        );
        self.store.insert(session.clone()).await?;
        self.emit(AuditEvent::SessionStarted {
            session_id,
            tenant_id: request.tenant_id,
            at: session.created_at,
        })
        .await;

        session.transition(SessionState::ContextGather)?;
        let context = self.gather_context(&session).await;

        session.transition(SessionState::RiskEval)?;
        let assessment = self.assess_risk(&mut session, &context).await;

        session.transition(SessionState::PolicyResolve)?;
        let snapshot = self.registry.snapshot();
        let decision = self
            .policy
            .resolve(
                session.tenant_id,
                session.sensitivity,
                assessment.score,
                &snapshot,
            )
            .await;
        self.emit(AuditEvent::PolicyResolved {
            session_id,
            required_assurance: decision.required_assurance,
            allowed_methods: decision.allowed_methods.len(),
            requires_approval: decision.requires_approval,
        })
        .await;
        session.target_assurance = decision.required_assurance;
        session.requires_approval = decision.requires_approval;

        let candidates =
            snapshot.query(&DescriptorFilter::any().min_assurance(decision.required_assurance));
        let Some(entry) = stepup::select_initial(&decision, &candidates) else {
            self.emit(AuditEvent::PolicyUnsatisfiable {
                session_id,
                required_assurance: decision.required_assurance,
            })
            .await;
            let outcome = self
                .fail_session(session, FailureReason::PolicyUnsatisfiable)
                .await?;
            return Ok(SessionStarted {
                session_id,
                outcome,
            });
        };

        session.transition(SessionState::ChallengeIssued)?;
        session.mark_attempted(entry.descriptor.id.clone());
        match self.start_challenge(&session, entry, &context).await {
            Ok(challenge) => {
                self.emit(AuditEvent::ChallengeIssued {
                    session_id,
                    challenge_id: challenge.challenge_id,
                    provider: challenge.provider.clone(),
                })
                .await;
                session.set_challenge(challenge.clone())?;
                session.transition(SessionState::ResponsePending)?;
                let expected = session.version;
                self.store.update(session, expected).await?;
                Ok(SessionStarted {
                    session_id,
                    outcome: StartOutcome::Challenge { challenge },
                })
            }
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    provider = %entry.descriptor.key(),
                    error = %e,
                    "initial challenge could not be issued"
                );
                let outcome = self
                    .fail_session(session, FailureReason::ProviderExhausted)
                    .await?;
                Ok(SessionStarted {
                    session_id,
                    outcome,
                })
            }
        }
    }

    /// Submit the answer to an outstanding challenge.
    ///
    /// A write conflict (e.g. against the expiry sweep) is retried once
    /// against re-read state; the retry then observes whatever terminal
    /// state won the race.
    pub async fn submit_response(
        &self,
        session_id: SessionId,
        challenge_id: ChallengeId,
        response: ChallengeResponse,
    ) -> EngineResult<ResponseOutcome> {
        match self.try_submit(session_id, challenge_id, &response).await {
            Err(EngineError::ConcurrencyConflict { .. }) => {
                self.emit(AuditEvent::ConcurrencyConflict { session_id }).await;
                debug!(session_id = %session_id, "submit conflicted, retrying against fresh state");
                self.try_submit(session_id, challenge_id, &response).await
            }
            other => other,
        }
    }

    async fn try_submit(
        &self,
        session_id: SessionId,
        challenge_id: ChallengeId,
        response: &ChallengeResponse,
    ) -> EngineResult<ResponseOutcome> {
        let mut session = self.store.get(session_id).await?;
        if session.state.is_terminal() {
            return Err(EngineError::SessionTerminal {
                session_id,
                state: session.state,
            });
        }

        let challenge = match &session.active_challenge {
            Some(challenge) if challenge.challenge_id == challenge_id => challenge.clone(),
            _ => {
                return Err(EngineError::ChallengeMismatch {
                    session_id,
                    challenge_id,
                })
            }
        };

        let now = Utc::now();
        if challenge.is_expired(now) {
            self.emit(AuditEvent::ChallengeExpired {
                session_id,
                challenge_id,
            })
            .await;
            return Err(EngineError::ChallengeExpired { challenge_id });
        }

        // Tombstone-tolerant lookup: a provider unregistered mid-flight
        // must still be able to validate its outstanding challenge.
        let snapshot = self.registry.snapshot();
        let entry = snapshot
            .require(&challenge.provider)
            .map_err(EngineError::from)?;

        let context = self.gather_context(&session).await;
        let validation = {
            let plugin = Arc::clone(&entry.plugin);
            let result = self
                .retry
                .execute(|| {
                    let plugin = Arc::clone(&plugin);
                    let challenge = challenge.clone();
                    let response = response.clone();
                    let context = context.clone();
                    async move {
                        plugin
                            .validate_response(&challenge, &response, &context)
                            .await
                    }
                })
                .await;
            match result {
                Ok(validation) => validation,
                Err(e) if e.is_transient() => {
                    warn!(
                        session_id = %session_id,
                        provider = %challenge.provider,
                        error = %e,
                        "provider retries exhausted during validation"
                    );
                    return self
                        .fail_and_deny(session, FailureReason::ProviderExhausted)
                        .await;
                }
                Err(e) => return Err(map_validation_error(challenge_id, e)),
            }
        };

        if !validation.success {
            self.emit(AuditEvent::ChallengeValidated {
                session_id,
                provider: challenge.provider.clone(),
                success: false,
                achieved_assurance: session.achieved_assurance,
            })
            .await;
            session.clear_challenge();
            return self
                .fail_and_deny(session, FailureReason::FactorRejected)
                .await;
        }

        session.transition(SessionState::ResponseValidated)?;
        session.clear_challenge();
        if session.principal_id.is_none() {
            session.principal_id = validation.principal_id;
        }
        session.record_step(
            challenge.provider.clone(),
            entry.descriptor.category,
            entry.descriptor.assurance_level,
            now,
        );
        self.emit(AuditEvent::ChallengeValidated {
            session_id,
            provider: challenge.provider.clone(),
            success: true,
            achieved_assurance: session.achieved_assurance,
        })
        .await;

        // Re-evaluate: risk can have changed while the factor was being
        // answered, and rising risk may raise the target.
        session.transition(SessionState::StepUpCheck)?;
        let fresh_context = self.gather_context(&session).await;
        let assessment = self.assess_risk(&mut session, &fresh_context).await;
        let decision = self
            .policy
            .resolve(
                session.tenant_id,
                session.sensitivity,
                assessment.score,
                &snapshot,
            )
            .await;
        if decision.required_assurance > session.target_assurance {
            session.target_assurance = decision.required_assurance;
        }
        session.requires_approval |= decision.requires_approval;

        let candidates =
            snapshot.query(&DescriptorFilter::any().min_assurance(decision.required_assurance));
        match stepup::decide(
            &session,
            &decision,
            &assessment,
            &candidates,
            self.config.risk_step_up_delta,
        ) {
            StepUpOutcome::Complete => {
                session.transition(SessionState::Complete)?;
                let expected = session.version;
                let updated = self.store.update(session, expected).await?;
                self.emit(AuditEvent::SessionCompleted {
                    session_id,
                    achieved_assurance: updated
                        .achieved_assurance
                        .unwrap_or(veriflow_core::AssuranceLevel::MIN),
                    steps: updated.steps_completed.len(),
                    requires_approval: updated.requires_approval,
                })
                .await;
                info!(
                    session_id = %session_id,
                    achieved = ?updated.achieved_assurance,
                    steps = updated.steps_completed.len(),
                    "session completed"
                );
                Ok(ResponseOutcome::allow(&updated))
            }
            StepUpOutcome::Challenge { provider, reason } => {
                self.emit(AuditEvent::StepUpRequired {
                    session_id,
                    target_assurance: session.target_assurance,
                    reason,
                })
                .await;
                session.transition(SessionState::ChallengeIssued)?;
                let next_entry = snapshot.require(&provider).map_err(EngineError::from)?;
                session.mark_attempted(provider.id.clone());
                match self
                    .start_challenge(&session, next_entry, &fresh_context)
                    .await
                {
                    Ok(next_challenge) => {
                        self.emit(AuditEvent::ChallengeIssued {
                            session_id,
                            challenge_id: next_challenge.challenge_id,
                            provider: next_challenge.provider.clone(),
                        })
                        .await;
                        session.set_challenge(next_challenge.clone())?;
                        session.transition(SessionState::ResponsePending)?;
                        let expected = session.version;
                        let updated = self.store.update(session, expected).await?;
                        Ok(ResponseOutcome::step_up(&updated, next_challenge))
                    }
                    Err(e) => {
                        warn!(
                            session_id = %session_id,
                            provider = %provider,
                            error = %e,
                            "step-up challenge could not be issued"
                        );
                        self.fail_and_deny(session, FailureReason::ProviderExhausted)
                            .await
                    }
                }
            }
            StepUpOutcome::Unsatisfiable { required } => {
                self.emit(AuditEvent::PolicyUnsatisfiable {
                    session_id,
                    required_assurance: required,
                })
                .await;
                self.fail_and_deny(session, FailureReason::PolicyUnsatisfiable)
                    .await
            }
        }
    }

    /// Cancel a session in any non-terminal state, releasing the
    /// outstanding challenge with the provider first.
    pub async fn cancel_session(&self, session_id: SessionId) -> EngineResult<()> {
        let mut session = self.store.get(session_id).await?;
        if session.state.is_terminal() {
            return Err(EngineError::SessionTerminal {
                session_id,
                state: session.state,
            });
        }

        if let Some(challenge) = &session.active_challenge {
            let snapshot = self.registry.snapshot();
            match snapshot.get(&challenge.provider) {
                Some(entry) => {
                    // Best-effort release; a failing provider must not
                    // hold cancellation hostage.
                    if let Err(e) = entry.plugin.cancel_authentication(session_id).await {
                        warn!(
                            session_id = %session_id,
                            provider = %challenge.provider,
                            error = %e,
                            "challenge release failed during cancellation"
                        );
                    }
                }
                None => warn!(
                    session_id = %session_id,
                    provider = %challenge.provider,
                    "outstanding challenge references an unknown provider"
                ),
            }
        }

        session.clear_challenge();
        session.transition(SessionState::Cancelled)?;
        let expected = session.version;
        match self.store.update(session, expected).await {
            Ok(_) => {}
            Err(EngineError::ConcurrencyConflict { .. }) => {
                self.emit(AuditEvent::ConcurrencyConflict { session_id }).await;
                let mut again = self.store.get(session_id).await?;
                if again.state.is_terminal() {
                    return Err(EngineError::SessionTerminal {
                        session_id,
                        state: again.state,
                    });
                }
                again.clear_challenge();
                again.transition(SessionState::Cancelled)?;
                let expected = again.version;
                self.store.update(again, expected).await?;
            }
            Err(e) => return Err(e),
        }

        self.emit(AuditEvent::SessionCancelled { session_id }).await;
        info!(session_id = %session_id, "session cancelled");
        Ok(())
    }

    /// Expire overdue sessions. Races against in-flight responses are
    /// resolved by the store's version check: whichever write lands first
    /// wins, the loser re-reads.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> EngineResult<Vec<SessionId>> {
        let candidates = self.store.expired_candidates(now).await?;
        let mut expired = Vec::new();

        for session_id in candidates {
            let mut session = match self.store.get(session_id).await {
                Ok(session) => session,
                Err(EngineError::SessionNotFound { .. }) => continue,
                Err(e) => return Err(e),
            };
            if session.state.is_terminal() || !session.is_expired(now) {
                continue;
            }

            let expected = session.version;
            session.clear_challenge();
            session.transition(SessionState::Expired)?;
            match self.store.update(session, expected).await {
                Ok(_) => {
                    self.emit(AuditEvent::SessionExpired { session_id }).await;
                    expired.push(session_id);
                }
                Err(EngineError::ConcurrencyConflict { .. }) => {
                    // An in-flight response won; it will have re-checked
                    // the deadline itself.
                    debug!(session_id = %session_id, "expiry sweep lost a version race");
                }
                Err(e) => return Err(e),
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "expired sessions swept");
        }
        Ok(expired)
    }

    /// Spawn the background expiry sweep. Not part of the request path;
    /// abort the handle to stop it.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(orchestrator.config.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = orchestrator.sweep_expired(Utc::now()).await {
                    warn!(error = %e, "expiry sweep failed");
                }
            }
        })
    }

    // Internal helpers

    /// Record an audit event, never failing the flow over a sink error.
    async fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.audit_sink.record(event).await {
            warn!(error = %e, "audit sink failure ignored");
        }
    }

    /// Gather context, degrading to an empty context on failure.
    async fn gather_context(&self, session: &AuthenticationSession) -> AuthContext {
        match self.context_provider.context(session.request_id).await {
            Ok(context) => context,
            Err(e) => {
                warn!(
                    session_id = %session.session_id,
                    error = %e,
                    "context gathering failed, proceeding with empty context"
                );
                self.emit(AuditEvent::ContextDegraded {
                    session_id: session.session_id,
                    reason: e.to_string(),
                })
                .await;
                AuthContext::empty(session.request_id)
            }
        }
    }

    /// Assess risk, failing closed to the maximum band when the engine
    /// cannot assess at all, and record the sample on the session.
    async fn assess_risk(
        &self,
        session: &mut AuthenticationSession,
        context: &AuthContext,
    ) -> RiskAssessment {
        let assessment = match self.risk.assess(context, session.sensitivity) {
            Ok(assessment) => assessment,
            Err(e) => {
                error!(
                    session_id = %session.session_id,
                    error = %e,
                    "risk engine failed, assuming maximum risk"
                );
                self.emit(AuditEvent::RiskFailedClosed {
                    session_id: session.session_id,
                    reason: e.to_string(),
                })
                .await;
                RiskAssessment::fail_closed()
            }
        };
        session.record_risk(assessment.score, assessment.computed_at);
        self.emit(AuditEvent::RiskAssessed {
            session_id: session.session_id,
            score: assessment.score,
            band: RiskBand::from_score(assessment.score),
            factor_count: assessment.factor_breakdown.len(),
        })
        .await;
        assessment
    }

    /// Invoke a provider's `start_authentication` with retry and bound the
    /// returned challenge's expiry to the configured window.
    async fn start_challenge(
        &self,
        session: &AuthenticationSession,
        entry: &RegisteredProvider,
        context: &AuthContext,
    ) -> EngineResult<Challenge> {
        let plugin = Arc::clone(&entry.plugin);
        let session_id = session.session_id;
        let mut challenge = self
            .retry
            .execute(|| {
                let plugin = Arc::clone(&plugin);
                let context = context.clone();
                async move { plugin.start_authentication(session_id, &context).await }
            })
            .await?;

        let cap = Utc::now() + self.config.challenge_ttl;
        if challenge.expires_at > cap {
            challenge.expires_at = cap;
        }
        Ok(challenge)
    }

    /// Fail the session and write it back; used on the start path where
    /// the caller builds the outcome itself.
    async fn fail_session(
        &self,
        mut session: AuthenticationSession,
        reason: FailureReason,
    ) -> EngineResult<StartOutcome> {
        let session_id = session.session_id;
        session.clear_challenge();
        session.fail(reason)?;
        self.emit(AuditEvent::SessionFailed { session_id, reason }).await;
        let expected = session.version;
        self.store.update(session, expected).await?;
        Ok(StartOutcome::Denied { reason })
    }

    /// Fail the session, write it back, and produce the DENY outcome.
    async fn fail_and_deny(
        &self,
        mut session: AuthenticationSession,
        reason: FailureReason,
    ) -> EngineResult<ResponseOutcome> {
        let session_id = session.session_id;
        session.clear_challenge();
        session.fail(reason)?;
        self.emit(AuditEvent::SessionFailed { session_id, reason }).await;
        let expected = session.version;
        let updated = self.store.update(session, expected).await?;
        Ok(ResponseOutcome::deny(&updated, reason))
    }
}

/// Map a permanent provider error during validation into the engine
/// taxonomy: malformed payloads are validation errors, provider-side
/// expiry checks map to the engine's own expiry error.
fn map_validation_error(challenge_id: ChallengeId, err: ProviderError) -> EngineError {
    match err {
        ProviderError::ChallengeExpired { .. } => EngineError::ChallengeExpired { challenge_id },
        ProviderError::MalformedResponse { message } => EngineError::validation("response", message),
        other => EngineError::Provider(other),
    }
}
