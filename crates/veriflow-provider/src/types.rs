//! Provider category and capability types.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The authentication-method family a provider belongs to.
///
/// Categories drive the step-up selector's defense-in-depth preference:
/// a second factor from a different category is worth more than a second
/// factor of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCategory {
    /// Something the principal knows (password, PIN, security questions).
    Knowledge,
    /// Something the principal has (OTP device, security key, push app).
    Possession,
    /// Something the principal is (fingerprint, face, voice).
    Biometric,
    /// A trusted external identity assertion (SAML, OIDC).
    Federation,
    /// Ambient signals evaluated without interaction (device posture, network).
    Contextual,
}

impl Display for ProviderCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Knowledge => "knowledge",
            Self::Possession => "possession",
            Self::Biometric => "biometric",
            Self::Federation => "federation",
            Self::Contextual => "contextual",
        };
        write!(f, "{name}")
    }
}

/// Static capability flags a provider advertises at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    /// The method involves no shared secret the principal must recall.
    pub passwordless: bool,
    /// The method binds the response to the origin (unphishable).
    pub phishing_resistant: bool,
    /// The provider can be invoked mid-session to raise assurance.
    pub supports_step_up: bool,
    /// Completing a challenge requires the principal to act.
    pub requires_interaction: bool,
}

impl ProviderCapabilities {
    /// Capability set typical for an interactive first factor.
    #[must_use]
    pub fn interactive() -> Self {
        Self {
            requires_interaction: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_string(&ProviderCategory::Possession).unwrap();
        assert_eq!(json, "\"possession\"");
    }

    #[test]
    fn category_display() {
        assert_eq!(ProviderCategory::Biometric.to_string(), "biometric");
        assert_eq!(ProviderCategory::Federation.to_string(), "federation");
    }

    #[test]
    fn default_capabilities_are_all_off() {
        let caps = ProviderCapabilities::default();
        assert!(!caps.passwordless);
        assert!(!caps.phishing_resistant);
        assert!(!caps.supports_step_up);
        assert!(!caps.requires_interaction);
    }
}
