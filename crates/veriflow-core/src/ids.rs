//! Strongly Typed Identifiers
//!
//! Newtype wrappers around UUIDs for the identifiers the engine passes
//! between components. The newtype pattern prevents accidental misuse of
//! different ID types at compile time.
//!
//! # Example
//!
//! ```
//! use veriflow_core::{SessionId, TenantId};
//!
//! let tenant = TenantId::new();
//! let session = SessionId::new();
//!
//! fn requires_session(id: SessionId) -> String {
//!     id.to_string()
//! }
//!
//! let rendered = requires_session(session);
//! // requires_session(tenant); // does not compile
//! # let _ = rendered;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for ID parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The underlying UUID parse error message.
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to define a strongly-typed ID type.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns a reference to the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        message: e.to_string(),
                    })
            }
        }
    };
}

define_id!(
    /// Identifier of the tenant an authentication session belongs to.
    TenantId
);

define_id!(
    /// Identifier of one authentication session (one attempt, start to finish).
    SessionId
);

define_id!(
    /// Identifier of the principal being authenticated.
    ///
    /// Unknown until the first factor resolves identity, which is why
    /// sessions carry an `Option<PrincipalId>`.
    PrincipalId
);

define_id!(
    /// Identifier of a single outstanding challenge issued to a provider.
    ChallengeId
);

define_id!(
    /// Correlation identifier for the inbound gateway request.
    RequestId
);
