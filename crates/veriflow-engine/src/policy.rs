//! Policy resolution.
//!
//! Maps (tenant, resource sensitivity, risk score) to the minimum
//! assurance a session must reach and the providers allowed to get it
//! there. Tenant policy comes from the [`PolicyStore`] collaborator; a
//! missing or unreadable policy falls back to a conservative default,
//! never to "allow everything".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

use veriflow_core::{AssuranceLevel, TenantId};
use veriflow_provider::descriptor::DescriptorFilter;
use veriflow_provider::ids::ProviderId;
use veriflow_provider::registry::CatalogSnapshot;

/// Risk band boundaries. A score in `[lower, upper)` belongs to the band;
/// the final band is closed above.
const BAND_UPPER_BOUNDS: [(f64, RiskBand); 5] = [
    (0.2, RiskBand::Minimal),
    (0.4, RiskBand::Low),
    (0.6, RiskBand::Medium),
    (0.8, RiskBand::High),
    (1.0, RiskBand::Critical),
];

/// Discrete risk classification derived from the continuous score.
///
/// These thresholds are operational defaults, not regulatory constants;
/// they live in one place so a deployment can revisit them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskBand {
    /// Classify a score. Out-of-range inputs are clamped first.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        let score = score.clamp(0.0, 1.0);
        for (upper, band) in BAND_UPPER_BOUNDS {
            if score < upper {
                return band;
            }
        }
        RiskBand::Critical
    }

    /// The minimum assurance level this band demands.
    #[must_use]
    pub fn min_assurance(self) -> AssuranceLevel {
        match self {
            RiskBand::Minimal | RiskBand::Low => AssuranceLevel::L1,
            RiskBand::Medium => AssuranceLevel::L2,
            RiskBand::High => AssuranceLevel::L3,
            RiskBand::Critical => AssuranceLevel::L4,
        }
    }
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RiskBand::Minimal => "minimal",
            RiskBand::Low => "low",
            RiskBand::Medium => "medium",
            RiskBand::High => "high",
            RiskBand::Critical => "critical",
        };
        write!(f, "{name}")
    }
}

/// Sensitivity classification of the resource being accessed.
///
/// Sensitivity can only raise the required assurance, never lower it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceSensitivity {
    Public,
    Internal,
    Confidential,
    Restricted,
}

impl ResourceSensitivity {
    /// The minimum assurance level this sensitivity demands.
    #[must_use]
    pub fn min_assurance(self) -> AssuranceLevel {
        match self {
            ResourceSensitivity::Public | ResourceSensitivity::Internal => AssuranceLevel::L1,
            ResourceSensitivity::Confidential => AssuranceLevel::L3,
            ResourceSensitivity::Restricted => AssuranceLevel::L4,
        }
    }

    /// Normalized risk contribution of accessing a resource of this
    /// sensitivity, used as the risk engine's sensitivity-echo factor.
    #[must_use]
    pub fn risk_echo(self) -> f64 {
        match self {
            ResourceSensitivity::Public => 0.0,
            ResourceSensitivity::Internal => 0.25,
            ResourceSensitivity::Confidential => 0.5,
            ResourceSensitivity::Restricted => 0.75,
        }
    }
}

/// Per-tenant policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantPolicy {
    /// Provider ids this tenant refuses regardless of assurance.
    pub denied_methods: Vec<ProviderId>,
    /// Risk score above which a step-up is forced even when the assurance
    /// target is nominally met.
    pub step_up_threshold: f64,
    /// Whether a CRITICAL-band session additionally needs manual approval.
    pub critical_requires_approval: bool,
    /// Optional floor on required assurance, applied after band and
    /// sensitivity requirements.
    pub assurance_floor: Option<AssuranceLevel>,
}

impl Default for TenantPolicy {
    /// The conservative global default: nothing denied, step-up forced in
    /// the HIGH band and above, approval required at CRITICAL.
    fn default() -> Self {
        Self {
            denied_methods: Vec::new(),
            step_up_threshold: 0.6,
            critical_requires_approval: true,
            assurance_floor: None,
        }
    }
}

/// Resolved policy for one (tenant, sensitivity, risk) combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub required_assurance: AssuranceLevel,
    /// Providers eligible to satisfy the requirement, in registry query
    /// order. Empty means the requirement is unsatisfiable; the
    /// orchestrator turns that into DENY rather than an engine fault.
    pub allowed_methods: Vec<ProviderId>,
    /// Tenant-denied providers that would otherwise have qualified.
    pub denied_methods: Vec<ProviderId>,
    pub step_up_threshold: f64,
    pub requires_approval: bool,
    pub band: RiskBand,
}

/// Failure to read tenant policy from the collaborator.
#[derive(Debug, Error)]
#[error("policy store failure: {0}")]
pub struct PolicyStoreError(pub String);

/// Collaborator serving per-tenant policy.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// The tenant's policy, or `None` when the tenant has none configured.
    async fn tenant_policy(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<TenantPolicy>, PolicyStoreError>;
}

/// In-memory implementation of [`PolicyStore`].
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    policies: RwLock<HashMap<TenantId, TenantPolicy>>,
}

impl InMemoryPolicyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tenant's policy.
    pub fn upsert(&self, tenant_id: TenantId, policy: TenantPolicy) {
        self.policies
            .write()
            .expect("policy lock poisoned")
            .insert(tenant_id, policy);
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn tenant_policy(
        &self,
        tenant_id: TenantId,
    ) -> Result<Option<TenantPolicy>, PolicyStoreError> {
        Ok(self
            .policies
            .read()
            .expect("policy lock poisoned")
            .get(&tenant_id)
            .cloned())
    }
}

/// The policy engine.
pub struct PolicyEngine {
    store: Arc<dyn PolicyStore>,
    default_policy: TenantPolicy,
}

impl PolicyEngine {
    /// Create an engine reading tenant policy from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            store,
            default_policy: TenantPolicy::default(),
        }
    }

    /// Override the fallback policy used when a tenant has none.
    #[must_use]
    pub fn with_default_policy(mut self, policy: TenantPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Resolve the policy decision for one evaluation point.
    ///
    /// Never fails: an unreadable tenant policy degrades to the
    /// conservative default (fail-safe, not fail-open), and an empty
    /// provider catalog simply yields an empty allow-list.
    pub async fn resolve(
        &self,
        tenant_id: TenantId,
        sensitivity: ResourceSensitivity,
        risk_score: f64,
        catalog: &CatalogSnapshot,
    ) -> PolicyDecision {
        let policy = match self.store.tenant_policy(tenant_id).await {
            Ok(Some(policy)) => policy,
            Ok(None) => {
                debug!(tenant_id = %tenant_id, "no tenant policy, using default");
                self.default_policy.clone()
            }
            Err(e) => {
                warn!(
                    tenant_id = %tenant_id,
                    error = %e,
                    "policy store unavailable, falling back to default policy"
                );
                self.default_policy.clone()
            }
        };

        let band = RiskBand::from_score(risk_score);

        // Sensitivity and the tenant floor can only raise the requirement.
        let mut required = band.min_assurance().max(sensitivity.min_assurance());
        if let Some(floor) = policy.assurance_floor {
            required = required.max(floor);
        }

        let requires_approval = band == RiskBand::Critical && policy.critical_requires_approval;

        let mut allowed_methods = Vec::new();
        let mut denied_methods = Vec::new();
        let filter = DescriptorFilter::any().min_assurance(required);
        for entry in catalog.query(&filter) {
            if policy.denied_methods.contains(&entry.descriptor.id) {
                denied_methods.push(entry.descriptor.id.clone());
            } else {
                allowed_methods.push(entry.descriptor.id.clone());
            }
        }

        PolicyDecision {
            required_assurance: required,
            allowed_methods,
            denied_methods,
            step_up_threshold: policy.step_up_threshold,
            requires_approval,
            band,
        }
    }
}
