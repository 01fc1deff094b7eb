//! Step-up decisions.
//!
//! [`decide`] is a pure function of the session, the resolved policy, the
//! latest risk assessment, and a pre-queried candidate list. No hidden
//! state, no I/O: the orchestrator's hardest branch stays unit-testable
//! in isolation.

use serde::{Deserialize, Serialize};

use crate::policy::PolicyDecision;
use crate::risk::RiskAssessment;
use crate::session::AuthenticationSession;
use veriflow_core::AssuranceLevel;
use veriflow_provider::ids::ProviderKey;
use veriflow_provider::registry::RegisteredProvider;

/// Why a step-up was required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepUpReason {
    /// Achieved assurance is below the target.
    AssuranceShortfall,
    /// Risk rose beyond the configured delta since the last assessment.
    RiskIncreased,
    /// The absolute risk score exceeds the policy's step-up threshold.
    RiskAboveThreshold,
}

impl std::fmt::Display for StepUpReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StepUpReason::AssuranceShortfall => "assurance_shortfall",
            StepUpReason::RiskIncreased => "risk_increased",
            StepUpReason::RiskAboveThreshold => "risk_above_threshold",
        };
        write!(f, "{name}")
    }
}

/// Outcome of a step-up decision.
#[derive(Debug, Clone, PartialEq)]
pub enum StepUpOutcome {
    /// The session may complete.
    Complete,
    /// One more challenge is required, from the named provider.
    Challenge {
        provider: ProviderKey,
        reason: StepUpReason,
    },
    /// The requirement cannot be satisfied with the remaining providers.
    Unsatisfiable { required: AssuranceLevel },
}

/// Pick the provider for a session's first challenge: the
/// highest-assurance allowed candidate, ties broken by ascending id.
///
/// `candidates` must already be in registry query order (descending
/// assurance, ascending id), which makes this the first allowed entry.
#[must_use]
pub fn select_initial<'a>(
    policy: &PolicyDecision,
    candidates: &[&'a RegisteredProvider],
) -> Option<&'a RegisteredProvider> {
    candidates
        .iter()
        .find(|entry| policy.allowed_methods.contains(&entry.descriptor.id))
        .copied()
}

/// Decide whether a session that just validated a step may complete or
/// must step up, and through which provider.
///
/// `risk_step_up_delta` is the configured score increase that forces a
/// re-entry even when the assurance target is already met.
#[must_use]
pub fn decide(
    session: &AuthenticationSession,
    policy: &PolicyDecision,
    assessment: &RiskAssessment,
    candidates: &[&RegisteredProvider],
    risk_step_up_delta: f64,
) -> StepUpOutcome {
    let target = session.target_assurance.max(policy.required_assurance);
    let target_met = session.meets(target);
    let delta_triggered = session
        .last_risk_increase()
        .map_or(false, |increase| increase > risk_step_up_delta);
    let threshold_forced = assessment.score > policy.step_up_threshold;

    if target_met && !delta_triggered && !threshold_forced {
        return StepUpOutcome::Complete;
    }

    let reason = if !target_met {
        StepUpReason::AssuranceShortfall
    } else if delta_triggered {
        StepUpReason::RiskIncreased
    } else {
        StepUpReason::RiskAboveThreshold
    };

    match select_next(session, policy, candidates, target) {
        Some(entry) => StepUpOutcome::Challenge {
            provider: entry.descriptor.key(),
            reason,
        },
        // No provider left that could raise assurance. A met target still
        // completes: the forced step-up is defense-in-depth, not a reason
        // to deny an already-sufficient session. An unmet target cannot
        // complete and the requirement is unsatisfiable.
        None if target_met => StepUpOutcome::Complete,
        None => StepUpOutcome::Unsatisfiable { required: target },
    }
}

/// Select the next step-up provider: allowed by policy, not yet attempted,
/// willing to step up from the current level, preferring a category the
/// session has not used yet (defense-in-depth), then highest assurance,
/// then ascending id.
fn select_next<'a>(
    session: &AuthenticationSession,
    policy: &PolicyDecision,
    candidates: &[&'a RegisteredProvider],
    target: AssuranceLevel,
) -> Option<&'a RegisteredProvider> {
    let used_categories = session.used_categories();

    let eligible: Vec<&RegisteredProvider> = candidates
        .iter()
        .filter(|entry| policy.allowed_methods.contains(&entry.descriptor.id))
        .filter(|entry| !session.attempted_providers.contains(&entry.descriptor.id))
        .filter(|entry| {
            entry
                .plugin
                .supports_step_up(session.achieved_assurance, target)
        })
        .copied()
        .collect();

    eligible
        .iter()
        .find(|entry| !used_categories.contains(&entry.descriptor.category))
        .or_else(|| eligible.first())
        .copied()
}
