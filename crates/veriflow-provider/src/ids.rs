//! Provider identifiers
//!
//! Providers are keyed by a human-assigned string id plus a monotonically
//! increasing registration version, not by UUID: the id is what tenants
//! reference in allow/deny lists and what gives query results a stable
//! order.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identifier of an authentication provider, e.g. `"password"` or
/// `"webauthn-platform"`.
///
/// Ordered lexicographically; the registry relies on this ordering for
/// deterministic tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Create a provider id from any string-ish value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The unique registration key of a provider: `(id, version)`.
///
/// Registering a new version of an existing id supersedes latest-by-id
/// lookup without erasing the older version from history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderKey {
    pub id: ProviderId,
    pub version: u32,
}

impl ProviderKey {
    /// Build a key from an id and version.
    pub fn new(id: impl Into<ProviderId>, version: u32) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

impl Display for ProviderKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@v{}", self.id, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_ids_order_lexicographically() {
        assert!(ProviderId::new("otp") < ProviderId::new("password"));
        assert!(ProviderId::new("password") < ProviderId::new("webauthn"));
    }

    #[test]
    fn key_display_includes_version() {
        let key = ProviderKey::new("password", 2);
        assert_eq!(key.to_string(), "password@v2");
    }

    #[test]
    fn keys_with_different_versions_differ() {
        assert_ne!(ProviderKey::new("otp", 1), ProviderKey::new("otp", 2));
        assert_eq!(ProviderKey::new("otp", 1), ProviderKey::new("otp", 1));
    }
}
