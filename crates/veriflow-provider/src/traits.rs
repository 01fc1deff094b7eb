//! Provider capability traits
//!
//! The single integration surface a pluggable authentication method must
//! implement. Concrete verification (password hashing, WebAuthn assertion
//! checks, biometric matching) lives behind this trait; the engine only
//! sees challenges, responses, and validation outcomes.

use async_trait::async_trait;

use crate::challenge::{Challenge, ChallengeResponse, Validation};
use crate::descriptor::ProviderDescriptor;
use crate::error::ProviderResult;
use veriflow_core::{AssuranceLevel, AuthContext, SessionId};

/// A pluggable authentication method.
///
/// Implementations must be cheap to share (`Arc<dyn AuthProvider>`); the
/// registry hands the same instance to every session.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Static capability metadata for this provider.
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Begin an authentication attempt, returning a challenge with a
    /// bounded expiry for the caller to answer.
    async fn start_authentication(
        &self,
        session_id: SessionId,
        context: &AuthContext,
    ) -> ProviderResult<Challenge>;

    /// Validate the caller's answer to an outstanding challenge.
    ///
    /// Implementations must not apply their own expiry grace: the engine
    /// rejects expired challenges before this is called.
    async fn validate_response(
        &self,
        challenge: &Challenge,
        response: &ChallengeResponse,
        context: &AuthContext,
    ) -> ProviderResult<Validation>;

    /// Release any outstanding challenge state for a cancelled session.
    ///
    /// Called before the session is marked cancelled; implementations
    /// should treat an unknown session as success.
    async fn cancel_authentication(&self, session_id: SessionId) -> ProviderResult<()>;

    /// The assurance level completing this provider awards.
    fn assurance_level(&self) -> AssuranceLevel {
        self.descriptor().assurance_level
    }

    /// Whether this provider can be used to raise assurance mid-session
    /// from `current` toward `target`.
    ///
    /// The default requires the step-up capability flag and that the
    /// provider would actually raise the achieved level; implementations
    /// may refuse specific transitions (e.g. a push factor that needs an
    /// enrolled device).
    fn supports_step_up(&self, current: Option<AssuranceLevel>, _target: AssuranceLevel) -> bool {
        let descriptor = self.descriptor();
        descriptor.capabilities.supports_step_up
            && current.map_or(true, |level| descriptor.assurance_level > level)
    }
}
