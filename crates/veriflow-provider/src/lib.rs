//! # Provider Framework
//!
//! Core abstractions for plugging authentication methods into the veriflow
//! engine.
//!
//! A provider is one authentication method: a password verifier, a TOTP
//! checker, a WebAuthn ceremony, a federation hand-off. Providers expose
//! static capability metadata through a [`ProviderDescriptor`] and are
//! driven through the [`AuthProvider`] trait; the engine never sees the
//! mechanics of a method, only challenges and validation outcomes.
//!
//! ## Example
//!
//! ```ignore
//! use veriflow_provider::prelude::*;
//!
//! // Register providers at startup
//! let registry = ProviderRegistry::new();
//! registry.register(password_provider);
//! registry.register(webauthn_provider);
//!
//! // Selection works on immutable snapshots
//! let snapshot = registry.snapshot();
//! let candidates = snapshot.query(
//!     &DescriptorFilter::any().min_assurance(AssuranceLevel::L2),
//! );
//! ```
//!
//! ## Crate Organization
//!
//! - [`ids`] - Provider identifiers (`ProviderId`, `ProviderKey`)
//! - [`types`] - Categories and capability flags
//! - [`descriptor`] - Descriptor metadata and query filters
//! - [`challenge`] - Challenge, response, and validation types
//! - [`error`] - Error types with transient/permanent classification
//! - [`traits`] - The [`AuthProvider`] capability trait
//! - [`registry`] - Copy-on-write provider catalog
//! - [`resilience`] - Retry with exponential backoff

pub mod challenge;
pub mod descriptor;
pub mod error;
pub mod ids;
pub mod registry;
pub mod resilience;
pub mod traits;
pub mod types;

/// Prelude module for convenient imports.
///
/// ```
/// use veriflow_provider::prelude::*;
/// ```
pub mod prelude {
    pub use crate::challenge::{Challenge, ChallengeResponse, Validation};
    pub use crate::descriptor::{DescriptorFilter, ProviderDescriptor};
    pub use crate::error::{ProviderError, ProviderResult};
    pub use crate::ids::{ProviderId, ProviderKey};
    pub use crate::registry::{
        CatalogSnapshot, ProviderRegistry, RegisteredProvider, RegistrationOutcome,
    };
    pub use crate::resilience::{RetryConfig, RetryExecutor};
    pub use crate::traits::AuthProvider;
    pub use crate::types::{ProviderCapabilities, ProviderCategory};
}

// Re-export async_trait for provider implementors
pub use async_trait::async_trait;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use veriflow_core::AssuranceLevel;

    #[test]
    fn prelude_imports_are_usable() {
        let _registry = ProviderRegistry::new();
        let _filter = DescriptorFilter::any().min_assurance(AssuranceLevel::L2);
        let _caps = ProviderCapabilities::interactive();
        let _key = ProviderKey::new("password", 1);
    }
}
