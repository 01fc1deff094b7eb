//! Risk assessment.
//!
//! Computes a normalized risk score from weighted contextual factors.
//! Each factor is clamped to `[0.0, 1.0]` before aggregation, and factors
//! whose signals are unavailable are excluded from both the numerator and
//! the denominator: partial context narrows the evidence base instead of
//! being mistaken for good (or bad) news.
//!
//! Callable repeatedly within one session; re-assessment after each
//! validated step is what lets rising risk force a step-up mid-flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::policy::ResourceSensitivity;
use veriflow_core::AuthContext;

/// The factors that can contribute to a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactorKind {
    DeviceTrust,
    Location,
    NetworkReputation,
    BehavioralDeviation,
    TemporalPattern,
    ResourceSensitivity,
    AccountHistory,
    ThreatIntel,
}

impl std::fmt::Display for RiskFactorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RiskFactorKind::DeviceTrust => "device_trust",
            RiskFactorKind::Location => "location",
            RiskFactorKind::NetworkReputation => "network_reputation",
            RiskFactorKind::BehavioralDeviation => "behavioral_deviation",
            RiskFactorKind::TemporalPattern => "temporal_pattern",
            RiskFactorKind::ResourceSensitivity => "resource_sensitivity",
            RiskFactorKind::AccountHistory => "account_history",
            RiskFactorKind::ThreatIntel => "threat_intel",
        };
        write!(f, "{name}")
    }
}

/// Relative weight of each factor in the aggregate score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub device_trust: f64,
    pub location: f64,
    pub network_reputation: f64,
    pub behavioral_deviation: f64,
    pub temporal_pattern: f64,
    pub resource_sensitivity: f64,
    pub account_history: f64,
    pub threat_intel: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            device_trust: 2.0,
            location: 1.5,
            network_reputation: 2.0,
            behavioral_deviation: 1.0,
            temporal_pattern: 0.5,
            resource_sensitivity: 1.0,
            account_history: 1.5,
            threat_intel: 3.0,
        }
    }
}

impl FactorWeights {
    /// Weight of one factor.
    #[must_use]
    pub fn weight(&self, kind: RiskFactorKind) -> f64 {
        match kind {
            RiskFactorKind::DeviceTrust => self.device_trust,
            RiskFactorKind::Location => self.location,
            RiskFactorKind::NetworkReputation => self.network_reputation,
            RiskFactorKind::BehavioralDeviation => self.behavioral_deviation,
            RiskFactorKind::TemporalPattern => self.temporal_pattern,
            RiskFactorKind::ResourceSensitivity => self.resource_sensitivity,
            RiskFactorKind::AccountHistory => self.account_history,
            RiskFactorKind::ThreatIntel => self.threat_intel,
        }
    }

    /// Whether every weight is usable (finite, non-negative).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        ALL_FACTORS
            .iter()
            .all(|kind| self.weight(*kind).is_finite() && self.weight(*kind) >= 0.0)
    }
}

const ALL_FACTORS: [RiskFactorKind; 8] = [
    RiskFactorKind::DeviceTrust,
    RiskFactorKind::Location,
    RiskFactorKind::NetworkReputation,
    RiskFactorKind::BehavioralDeviation,
    RiskFactorKind::TemporalPattern,
    RiskFactorKind::ResourceSensitivity,
    RiskFactorKind::AccountHistory,
    RiskFactorKind::ThreatIntel,
];

/// Number of recent failures that saturates the history factor.
const HISTORY_FAILURE_SATURATION: f64 = 10.0;

/// Output of one risk assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Aggregate score in `[0.0, 1.0]`.
    pub score: f64,
    /// Clamped per-factor scores for the factors that were available.
    pub factor_breakdown: BTreeMap<RiskFactorKind, f64>,
    pub computed_at: DateTime<Utc>,
}

impl RiskAssessment {
    /// The fail-closed assessment: maximum risk, no factor evidence.
    ///
    /// Used when the risk engine cannot assess at all; the policy engine
    /// then lands in the CRITICAL band, never in the minimum one.
    #[must_use]
    pub fn fail_closed() -> Self {
        Self {
            score: 1.0,
            factor_breakdown: BTreeMap::new(),
            computed_at: Utc::now(),
        }
    }
}

/// The risk engine.
#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    weights: FactorWeights,
}

impl RiskEngine {
    /// Engine with default weights.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with custom weights. Invalid weights (negative, NaN) are
    /// rejected here rather than producing garbage scores later.
    pub fn with_weights(weights: FactorWeights) -> EngineResult<Self> {
        if !weights.is_valid() {
            return Err(EngineError::RiskEngineFailure {
                message: "factor weights must be finite and non-negative".to_string(),
            });
        }
        Ok(Self { weights })
    }

    /// Assess risk for one request.
    ///
    /// Errors only when no factor carries weight, which would make the
    /// weighted average undefined; callers fail closed on that.
    pub fn assess(
        &self,
        context: &AuthContext,
        sensitivity: ResourceSensitivity,
    ) -> EngineResult<RiskAssessment> {
        let mut breakdown = BTreeMap::new();
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for kind in ALL_FACTORS {
            let Some(raw) = factor_score(kind, context, sensitivity) else {
                continue;
            };
            let clamped = raw.clamp(0.0, 1.0);
            let weight = self.weights.weight(kind);
            if weight > 0.0 {
                weighted_sum += clamped * weight;
                total_weight += weight;
            }
            breakdown.insert(kind, clamped);
        }

        if total_weight <= 0.0 {
            return Err(EngineError::RiskEngineFailure {
                message: "no weighted factor available for assessment".to_string(),
            });
        }

        let score = (weighted_sum / total_weight).clamp(0.0, 1.0);
        debug!(
            score,
            factors = breakdown.len(),
            "risk assessment computed"
        );

        Ok(RiskAssessment {
            score,
            factor_breakdown: breakdown,
            computed_at: Utc::now(),
        })
    }
}

/// Raw (pre-clamp) score of one factor, or `None` when its signals are
/// unavailable.
fn factor_score(
    kind: RiskFactorKind,
    context: &AuthContext,
    sensitivity: ResourceSensitivity,
) -> Option<f64> {
    match kind {
        RiskFactorKind::DeviceTrust => context.device.as_ref().map(|d| {
            let mut score = 1.0 - d.trust_score;
            if d.first_seen {
                score += 0.2;
            }
            if !d.managed {
                score += 0.1;
            }
            score
        }),
        RiskFactorKind::Location => context.location.as_ref().map(|l| {
            if l.impossible_travel {
                1.0
            } else {
                l.unfamiliarity
            }
        }),
        RiskFactorKind::NetworkReputation => context.network.as_ref().map(|n| {
            let mut score = n.reputation;
            if n.anonymizing_proxy {
                score += 0.2;
            }
            score
        }),
        RiskFactorKind::BehavioralDeviation => context.behavior.as_ref().map(|b| b.deviation),
        RiskFactorKind::TemporalPattern => context.temporal.as_ref().map(|t| t.deviation),
        // The sensitivity echo is derived from the request, not the
        // context, so it is always available.
        RiskFactorKind::ResourceSensitivity => Some(sensitivity.risk_echo()),
        RiskFactorKind::AccountHistory => context.history.as_ref().map(|h| {
            let mut score = f64::from(h.recent_failures) / HISTORY_FAILURE_SATURATION;
            if h.dormant {
                score += 0.3;
            }
            score
        }),
        RiskFactorKind::ThreatIntel => context.threat_intel.as_ref().map(|t| t.indicator_match),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veriflow_core::{
        BehavioralSignals, DeviceSignals, HistorySignals, LocationSignals, NetworkSignals,
        RequestId, ThreatIntelSignals,
    };

    fn full_context() -> AuthContext {
        let mut ctx = AuthContext::empty(RequestId::new());
        ctx.device = Some(DeviceSignals {
            trust_score: 0.8,
            managed: true,
            first_seen: false,
            fingerprint: None,
        });
        ctx.network = Some(NetworkSignals {
            reputation: 0.1,
            anonymizing_proxy: false,
            ip_address: Some("203.0.113.7".to_string()),
        });
        ctx.location = Some(LocationSignals {
            unfamiliarity: 0.2,
            impossible_travel: false,
            country: Some("DE".to_string()),
        });
        ctx.behavior = Some(BehavioralSignals { deviation: 0.3 });
        ctx.history = Some(HistorySignals {
            recent_failures: 1,
            dormant: false,
        });
        ctx.threat_intel = Some(ThreatIntelSignals {
            indicator_match: 0.0,
        });
        ctx
    }

    #[test]
    fn score_stays_within_bounds() {
        let engine = RiskEngine::new();
        for sensitivity in [
            ResourceSensitivity::Public,
            ResourceSensitivity::Internal,
            ResourceSensitivity::Confidential,
            ResourceSensitivity::Restricted,
        ] {
            let assessment = engine.assess(&full_context(), sensitivity).unwrap();
            assert!(
                (0.0..=1.0).contains(&assessment.score),
                "score {} out of bounds",
                assessment.score
            );
        }
    }

    #[test]
    fn score_is_weighted_average_of_available_factors() {
        let engine = RiskEngine::new();
        let weights = FactorWeights::default();

        let mut ctx = AuthContext::empty(RequestId::new());
        ctx.threat_intel = Some(ThreatIntelSignals {
            indicator_match: 1.0,
        });

        let assessment = engine.assess(&ctx, ResourceSensitivity::Public).unwrap();
        // Only threat intel (1.0) and the sensitivity echo (0.0) are present.
        let expected = (1.0 * weights.threat_intel + 0.0 * weights.resource_sensitivity)
            / (weights.threat_intel + weights.resource_sensitivity);
        assert!((assessment.score - expected).abs() < 1e-9);
    }

    #[test]
    fn excluding_a_factor_changes_the_denominator() {
        let engine = RiskEngine::new();
        let weights = FactorWeights::default();

        // Hostile network, nothing else known.
        let mut narrow = AuthContext::empty(RequestId::new());
        narrow.network = Some(NetworkSignals {
            reputation: 1.0,
            anonymizing_proxy: false,
            ip_address: None,
        });
        let narrow_score = engine
            .assess(&narrow, ResourceSensitivity::Public)
            .unwrap()
            .score;

        // Same network plus a perfectly clean threat-intel signal.
        let mut wide = narrow.clone();
        wide.threat_intel = Some(ThreatIntelSignals {
            indicator_match: 0.0,
        });
        let wide_score = engine
            .assess(&wide, ResourceSensitivity::Public)
            .unwrap()
            .score;

        // Were the missing factor treated as zero instead of excluded, the
        // narrow score would already equal the wide one.
        let narrow_expected = weights.network_reputation
            / (weights.network_reputation + weights.resource_sensitivity);
        let wide_expected = weights.network_reputation
            / (weights.network_reputation + weights.resource_sensitivity + weights.threat_intel);
        assert!((narrow_score - narrow_expected).abs() < 1e-9);
        assert!((wide_score - wide_expected).abs() < 1e-9);
        assert!(narrow_score > wide_score);
    }

    #[test]
    fn factor_scores_are_clamped_before_aggregation() {
        let engine = RiskEngine::new();

        // A source pushing past the normalized range must not drag the
        // aggregate outside [0, 1].
        let mut ctx = AuthContext::empty(RequestId::new());
        ctx.device = Some(DeviceSignals {
            trust_score: -2.0, // 1 - (-2) = 3 before clamping
            managed: false,
            first_seen: true,
            fingerprint: None,
        });
        let assessment = engine.assess(&ctx, ResourceSensitivity::Public).unwrap();
        assert_eq!(
            assessment.factor_breakdown[&RiskFactorKind::DeviceTrust],
            1.0
        );
        assert!(assessment.score <= 1.0);
    }

    #[test]
    fn impossible_travel_maxes_the_location_factor() {
        let engine = RiskEngine::new();
        let mut ctx = AuthContext::empty(RequestId::new());
        ctx.location = Some(LocationSignals {
            unfamiliarity: 0.0,
            impossible_travel: true,
            country: None,
        });
        let assessment = engine.assess(&ctx, ResourceSensitivity::Public).unwrap();
        assert_eq!(assessment.factor_breakdown[&RiskFactorKind::Location], 1.0);
    }

    #[test]
    fn empty_context_still_assesses_on_the_sensitivity_echo() {
        let engine = RiskEngine::new();
        let ctx = AuthContext::empty(RequestId::new());

        let assessment = engine
            .assess(&ctx, ResourceSensitivity::Restricted)
            .unwrap();
        assert_eq!(assessment.factor_breakdown.len(), 1);
        assert!((assessment.score - ResourceSensitivity::Restricted.risk_echo()).abs() < 1e-9);
    }

    #[test]
    fn zero_weights_fail_rather_than_divide_by_zero() {
        let weights = FactorWeights {
            device_trust: 0.0,
            location: 0.0,
            network_reputation: 0.0,
            behavioral_deviation: 0.0,
            temporal_pattern: 0.0,
            resource_sensitivity: 0.0,
            account_history: 0.0,
            threat_intel: 0.0,
        };
        let engine = RiskEngine::with_weights(weights).unwrap();
        let err = engine
            .assess(&full_context(), ResourceSensitivity::Public)
            .unwrap_err();
        assert_eq!(err.error_code(), "RISK_ENGINE_FAILURE");
    }

    #[test]
    fn invalid_weights_are_rejected_at_construction() {
        let weights = FactorWeights {
            threat_intel: -1.0,
            ..FactorWeights::default()
        };
        assert!(RiskEngine::with_weights(weights).is_err());
    }

    #[test]
    fn fail_closed_assessment_is_maximum_risk() {
        let assessment = RiskAssessment::fail_closed();
        assert_eq!(assessment.score, 1.0);
        assert!(assessment.factor_breakdown.is_empty());
    }
}
