//! Authentication Context
//!
//! Typed contextual signals collected at authentication time, grouped by
//! source. Every group is optional: context providers may only be able to
//! supply a subset of signals for a given request, and the risk engine
//! degrades gracefully over whatever is present.
//!
//! Scores carried here are pre-normalized by their source to `[0.0, 1.0]`
//! where `0.0` is the benign end. The risk engine clamps them again before
//! aggregation, so a misbehaving source cannot push a factor out of range.

use crate::ids::RequestId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signals describing the device the request originates from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSignals {
    /// How much the platform trusts this device (1.0 = fully trusted).
    pub trust_score: f64,
    /// Whether the device is enrolled in management.
    pub managed: bool,
    /// Whether this device has never been seen for the principal.
    pub first_seen: bool,
    /// Opaque device fingerprint, if one was computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// Signals describing the source network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSignals {
    /// Reputation of the source address (0.0 = clean, 1.0 = hostile).
    pub reputation: f64,
    /// Whether the address belongs to a known anonymizing proxy or VPN exit.
    pub anonymizing_proxy: bool,
    /// Source address in textual form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

/// Signals describing the request's geographic origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSignals {
    /// How unfamiliar this location is for the principal (0.0 = home base).
    pub unfamiliarity: f64,
    /// Whether reaching this location from the last seen one is physically
    /// implausible in the elapsed time.
    pub impossible_travel: bool,
    /// ISO country code, if resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Behavioral biometrics deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralSignals {
    /// Deviation from the principal's learned interaction profile.
    pub deviation: f64,
}

/// Deviation from the principal's typical access times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalSignals {
    /// 0.0 = well inside typical hours, 1.0 = far outside them.
    pub deviation: f64,
}

/// Recent account history signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySignals {
    /// Failed authentication attempts in the recent window.
    pub recent_failures: u32,
    /// Whether the account has been dormant long enough to be suspicious.
    pub dormant: bool,
}

/// Threat intelligence match signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatIntelSignals {
    /// Strength of the strongest matching indicator (1.0 = confirmed hostile).
    pub indicator_match: f64,
}

/// The full typed context for one authentication request.
///
/// Produced by the `ContextProvider` collaborator; may be partial. An
/// entirely empty context is legal and simply leaves the risk engine with
/// fewer factors to aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Correlates the context with the inbound request.
    pub request_id: RequestId,
    /// When the signals were observed.
    pub observed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceSignals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkSignals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationSignals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior: Option<BehavioralSignals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal: Option<TemporalSignals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<HistorySignals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_intel: Option<ThreatIntelSignals>,
}

impl AuthContext {
    /// An empty context carrying no signals.
    ///
    /// Used when the context provider is unavailable; the session proceeds
    /// with graceful degradation instead of failing.
    #[must_use]
    pub fn empty(request_id: RequestId) -> Self {
        Self {
            request_id,
            observed_at: Utc::now(),
            device: None,
            network: None,
            location: None,
            behavior: None,
            temporal: None,
            history: None,
            threat_intel: None,
        }
    }

    /// Number of signal groups actually present.
    #[must_use]
    pub fn available_signal_groups(&self) -> usize {
        [
            self.device.is_some(),
            self.network.is_some(),
            self.location.is_some(),
            self.behavior.is_some(),
            self.temporal.is_some(),
            self.history.is_some(),
            self.threat_intel.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    /// True when no signal group is present at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.available_signal_groups() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_has_no_groups() {
        let ctx = AuthContext::empty(RequestId::new());
        assert!(ctx.is_empty());
        assert_eq!(ctx.available_signal_groups(), 0);
    }

    #[test]
    fn counts_present_groups() {
        let mut ctx = AuthContext::empty(RequestId::new());
        ctx.device = Some(DeviceSignals {
            trust_score: 0.9,
            managed: true,
            first_seen: false,
            fingerprint: None,
        });
        ctx.threat_intel = Some(ThreatIntelSignals {
            indicator_match: 0.0,
        });
        assert_eq!(ctx.available_signal_groups(), 2);
        assert!(!ctx.is_empty());
    }

    #[test]
    fn absent_groups_are_omitted_from_json() {
        let ctx = AuthContext::empty(RequestId::new());
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(!json.contains("device"));
        assert!(!json.contains("threat_intel"));
        assert!(json.contains("request_id"));
    }
}
