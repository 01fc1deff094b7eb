//! # Authentication Orchestration Engine
//!
//! Drives a principal through one or more challenge/response steps,
//! continuously re-evaluates risk, and issues a final allow/deny/step-up
//! decision carrying the achieved assurance level.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   start_session    ┌────────────────┐      ┌──────────────┐
//! │ Gateway  │───────────────────►│  Orchestrator  │─────►│ ContextProv. │
//! │ (caller) │◄──── challenge ────│ (state machine)│      └──────────────┘
//! └──────────┘                    └───────┬────────┘
//!       │ submit_response                 │
//!       ▼                                 ▼
//! ┌──────────────┐   validate    ┌─────────────────┐     ┌──────────────┐
//! │   Provider   │◄──────────────│  Risk Engine    │     │ Policy Store │
//! │   Registry   │               │  Policy Engine  │────►│  (external)  │
//! └──────────────┘               │  Step-Up Logic  │     └──────────────┘
//!                                └───────┬─────────┘
//!                                        ▼
//!                                 ┌──────────────┐
//!                                 │  Audit Sink  │  (fire and forget)
//!                                 └──────────────┘
//! ```
//!
//! ## Features
//!
//! - **Explicit state machine**: sessions move only along the defined
//!   transition graph; cancel and expiry are first-class transitions.
//! - **Monotonic assurance**: a validated factor can only raise the
//!   achieved level.
//! - **Continuous risk**: risk is re-assessed after every validated step;
//!   a significant increase forces a step-up even when the original
//!   target was already met.
//! - **Optimistic concurrency**: session writes carry the version they
//!   read; the expiry sweep and in-flight responses race safely.
//! - **Dependency injection**: every collaborator is a trait object
//!   passed at construction, with in-memory implementations included.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use veriflow_engine::prelude::*;
//!
//! let registry = Arc::new(ProviderRegistry::new());
//! registry.register(password_provider);
//!
//! let orchestrator = Arc::new(Orchestrator::new(
//!     registry,
//!     PolicyEngine::new(Arc::new(InMemoryPolicyStore::new())),
//!     RiskEngine::new(),
//!     Arc::new(InMemorySessionStore::new()),
//!     Arc::new(context_provider),
//!     Arc::new(TracingAuditSink),
//!     EngineConfig::default(),
//! ));
//! let sweeper = orchestrator.spawn_sweeper();
//!
//! let started = orchestrator.start_session(request).await?;
//! ```

pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod policy;
pub mod request;
pub mod risk;
pub mod session;
pub mod stepup;
pub mod store;

/// Prelude module for convenient imports.
///
/// ```
/// use veriflow_engine::prelude::*;
/// ```
pub mod prelude {
    pub use crate::audit::{AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
    pub use crate::config::{EngineConfig, EngineConfigBuilder};
    pub use crate::context::{ContextError, ContextProvider, StaticContextProvider};
    pub use crate::error::{EngineError, EngineResult};
    pub use crate::orchestrator::Orchestrator;
    pub use crate::policy::{
        InMemoryPolicyStore, PolicyDecision, PolicyEngine, PolicyStore, ResourceSensitivity,
        RiskBand, TenantPolicy,
    };
    pub use crate::request::{
        AuthRequest, Decision, ResponseOutcome, SessionStarted, StartOutcome,
    };
    pub use crate::risk::{FactorWeights, RiskAssessment, RiskEngine, RiskFactorKind};
    pub use crate::session::{
        AuthenticationSession, CompletedStep, FailureReason, RiskSample, SessionState,
    };
    pub use crate::stepup::{StepUpOutcome, StepUpReason};
    pub use crate::store::{InMemorySessionStore, SessionStore};

    // Provider-side types callers interact with directly.
    pub use veriflow_core::{
        AssuranceLevel, AuthContext, ChallengeId, PrincipalId, RequestId, SessionId, TenantId,
    };
    pub use veriflow_provider::prelude::*;
}

pub use error::{EngineError, EngineResult};
pub use orchestrator::Orchestrator;
