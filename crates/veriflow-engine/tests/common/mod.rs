//! Shared fixtures for orchestrator integration tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use veriflow_engine::prelude::*;
use veriflow_provider::async_trait;
use veriflow_core::{PrincipalId, ThreatIntelSignals};

/// A provider whose behavior is scripted per test: transient failures,
/// rejections, and challenge lifetimes are all configurable.
pub struct ScriptedProvider {
    descriptor: ProviderDescriptor,
    challenge_ttl: chrono::Duration,
    accept: AtomicBool,
    start_transient_failures: AtomicU32,
    validate_transient_failures: AtomicU32,
    principal: PrincipalId,
    cancelled: Mutex<Vec<SessionId>>,
}

impl ScriptedProvider {
    pub fn new(
        id: &str,
        version: u32,
        level: AssuranceLevel,
        category: ProviderCategory,
    ) -> Self {
        let descriptor = ProviderDescriptor::new(id, version, category, level).with_capabilities(
            ProviderCapabilities {
                supports_step_up: true,
                requires_interaction: true,
                ..ProviderCapabilities::default()
            },
        );
        Self {
            descriptor,
            challenge_ttl: chrono::Duration::minutes(1),
            accept: AtomicBool::new(true),
            start_transient_failures: AtomicU32::new(0),
            validate_transient_failures: AtomicU32::new(0),
            principal: PrincipalId::new(),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    /// Issue challenges that are already expired.
    pub fn with_expired_challenges(mut self) -> Self {
        self.challenge_ttl = chrono::Duration::seconds(-1);
        self
    }

    /// Reject every submitted response.
    pub fn rejecting(self) -> Self {
        self.accept.store(false, Ordering::SeqCst);
        self
    }

    /// Fail `start_authentication` transiently `n` times before working.
    pub fn with_start_failures(self, n: u32) -> Self {
        self.start_transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Fail `validate_response` transiently `n` times before working.
    pub fn with_validate_failures(self, n: u32) -> Self {
        self.validate_transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Sessions whose authentication this provider was asked to cancel.
    pub fn cancelled_sessions(&self) -> Vec<SessionId> {
        self.cancelled.lock().expect("cancel lock poisoned").clone()
    }
}

#[async_trait]
impl AuthProvider for ScriptedProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn start_authentication(
        &self,
        session_id: SessionId,
        _context: &AuthContext,
    ) -> ProviderResult<Challenge> {
        if self
            .start_transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ProviderError::unavailable("scripted start failure"));
        }
        Ok(Challenge::issue(
            session_id,
            self.descriptor.key(),
            self.challenge_ttl,
            serde_json::json!({ "provider": self.descriptor.id.as_str() }),
        ))
    }

    async fn validate_response(
        &self,
        _challenge: &Challenge,
        _response: &ChallengeResponse,
        _context: &AuthContext,
    ) -> ProviderResult<Validation> {
        if self
            .validate_transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ProviderError::unavailable("scripted validate failure"));
        }
        if self.accept.load(Ordering::SeqCst) {
            Ok(Validation::success(Some(self.principal)))
        } else {
            Ok(Validation::failure("scripted rejection"))
        }
    }

    async fn cancel_authentication(&self, session_id: SessionId) -> ProviderResult<()> {
        self.cancelled
            .lock()
            .expect("cancel lock poisoned")
            .push(session_id);
        Ok(())
    }
}

/// Everything a test needs to drive the orchestrator and inspect state.
pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub registry: Arc<ProviderRegistry>,
    pub store: Arc<InMemorySessionStore>,
    pub audit: Arc<InMemoryAuditSink>,
    pub context: Arc<StaticContextProvider>,
    pub policy_store: Arc<InMemoryPolicyStore>,
}

pub fn harness(providers: Vec<Arc<ScriptedProvider>>) -> Harness {
    harness_with_config(providers, fast_config())
}

pub fn harness_with_config(providers: Vec<Arc<ScriptedProvider>>, config: EngineConfig) -> Harness {
    init_tracing();
    let registry = Arc::new(ProviderRegistry::new());
    for provider in providers {
        registry.register(provider);
    }
    let policy_store = Arc::new(InMemoryPolicyStore::new());
    let store = Arc::new(InMemorySessionStore::new());
    let audit = Arc::new(InMemoryAuditSink::new());
    let context = Arc::new(StaticContextProvider::new(AuthContext::empty(
        RequestId::new(),
    )));

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&registry),
        PolicyEngine::new(policy_store.clone() as Arc<dyn PolicyStore>),
        RiskEngine::new(),
        store.clone() as Arc<dyn SessionStore>,
        context.clone() as Arc<dyn ContextProvider>,
        audit.clone() as Arc<dyn AuditSink>,
        config,
    ));

    Harness {
        orchestrator,
        registry,
        store,
        audit,
        context,
        policy_store,
    }
}

/// Install a tracing subscriber once so `RUST_LOG` works in tests.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Engine config with near-instant retries so transient-failure tests
/// don't sleep through real backoff windows.
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.retry = RetryConfig {
        max_retries: 2,
        initial_delay: std::time::Duration::from_millis(1),
        max_delay: std::time::Duration::from_millis(2),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

pub fn request(sensitivity: ResourceSensitivity) -> AuthRequest {
    AuthRequest {
        request_id: RequestId::new(),
        tenant_id: TenantId::new(),
        resource: "payments/transfer".to_string(),
        sensitivity,
        principal_hint: Some("jdoe".to_string()),
    }
}

/// Context whose only signal is a threat-intel indicator. With default
/// weights and a Public resource the aggregate score is `0.75 * indicator`,
/// which gives tests a single knob over the risk band.
pub fn threat_context(indicator: f64) -> AuthContext {
    let mut context = AuthContext::empty(RequestId::new());
    context.threat_intel = Some(ThreatIntelSignals {
        indicator_match: indicator,
    });
    context
}

/// Pull the challenge out of a start outcome, panicking on denial.
pub fn expect_challenge(started: &SessionStarted) -> Challenge {
    match &started.outcome {
        StartOutcome::Challenge { challenge } => challenge.clone(),
        StartOutcome::Denied { reason } => panic!("expected a challenge, got denial: {reason}"),
    }
}

pub fn answer() -> ChallengeResponse {
    ChallengeResponse::new(serde_json::json!({ "proof": "scripted" }))
}
