//! Provider descriptors and query filters.

use crate::ids::{ProviderId, ProviderKey};
use crate::types::{ProviderCapabilities, ProviderCategory};
use serde::{Deserialize, Serialize};
use veriflow_core::AssuranceLevel;

/// Static metadata a provider registers with the catalog.
///
/// Descriptors are immutable once registered; publishing changed metadata
/// means registering a new version under the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub version: u32,
    pub category: ProviderCategory,
    pub assurance_level: AssuranceLevel,
    pub capabilities: ProviderCapabilities,
}

impl ProviderDescriptor {
    /// Build a descriptor with default (all-off) capabilities.
    pub fn new(
        id: impl Into<ProviderId>,
        version: u32,
        category: ProviderCategory,
        assurance_level: AssuranceLevel,
    ) -> Self {
        Self {
            id: id.into(),
            version,
            category,
            assurance_level,
            capabilities: ProviderCapabilities::default(),
        }
    }

    /// Attach capability flags.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: ProviderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// The unique registration key of this descriptor.
    #[must_use]
    pub fn key(&self) -> ProviderKey {
        ProviderKey {
            id: self.id.clone(),
            version: self.version,
        }
    }
}

/// Predicate set for querying the registry.
///
/// All present predicates must hold. The zero-value filter matches every
/// live descriptor.
#[derive(Debug, Clone, Default)]
pub struct DescriptorFilter {
    /// Match only this category.
    pub category: Option<ProviderCategory>,
    /// Match only descriptors at or above this level.
    pub min_assurance: Option<AssuranceLevel>,
    /// Require the passwordless capability.
    pub passwordless: Option<bool>,
    /// Require the phishing-resistant capability.
    pub phishing_resistant: Option<bool>,
    /// Require step-up support.
    pub supports_step_up: Option<bool>,
}

impl DescriptorFilter {
    /// Filter matching every live descriptor.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict to descriptors at or above `level`.
    #[must_use]
    pub fn min_assurance(mut self, level: AssuranceLevel) -> Self {
        self.min_assurance = Some(level);
        self
    }

    /// Restrict to one category.
    #[must_use]
    pub fn category(mut self, category: ProviderCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Require step-up support.
    #[must_use]
    pub fn supports_step_up(mut self) -> Self {
        self.supports_step_up = Some(true);
        self
    }

    /// Whether `descriptor` satisfies every present predicate.
    #[must_use]
    pub fn matches(&self, descriptor: &ProviderDescriptor) -> bool {
        if let Some(category) = self.category {
            if descriptor.category != category {
                return false;
            }
        }
        if let Some(min) = self.min_assurance {
            if descriptor.assurance_level < min {
                return false;
            }
        }
        if let Some(wanted) = self.passwordless {
            if descriptor.capabilities.passwordless != wanted {
                return false;
            }
        }
        if let Some(wanted) = self.phishing_resistant {
            if descriptor.capabilities.phishing_resistant != wanted {
                return false;
            }
        }
        if let Some(wanted) = self.supports_step_up {
            if descriptor.capabilities.supports_step_up != wanted {
                return false;
            }
        }
        true
    }
}
