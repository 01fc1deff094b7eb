//! veriflow Core Library
//!
//! Shared types for the veriflow authentication orchestration engine.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (`TenantId`, `SessionId`, `PrincipalId`, ...)
//! - [`assurance`] - The ordinal assurance level achieved by authentication factors
//! - [`context`] - Typed contextual signals gathered at authentication time
//!
//! # Example
//!
//! ```
//! use veriflow_core::{AssuranceLevel, SessionId, TenantId};
//!
//! let session_id = SessionId::new();
//! let tenant_id = TenantId::new();
//!
//! assert!(AssuranceLevel::L3 > AssuranceLevel::L1);
//! ```

pub mod assurance;
pub mod context;
pub mod ids;

pub use assurance::AssuranceLevel;
pub use context::{
    AuthContext, BehavioralSignals, DeviceSignals, HistorySignals, LocationSignals,
    NetworkSignals, TemporalSignals, ThreatIntelSignals,
};
pub use ids::{ChallengeId, ParseIdError, PrincipalId, RequestId, SessionId, TenantId};
