//! Assurance Levels
//!
//! The ordinal strength of identity proof achieved by an authentication
//! factor, from L1 (low) to L4 (very high). Levels are totally ordered so
//! policy requirements can be compared with plain `>=`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Ordinal assurance level (1 = low ... 4 = very high).
///
/// Serialized as its numeric value so decision payloads stay stable for
/// callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AssuranceLevel {
    /// Single weak factor, e.g. a password alone.
    L1 = 1,
    /// A stronger single factor or a basic second factor.
    L2 = 2,
    /// Multi-factor with a possession or biometric element.
    L3 = 3,
    /// Phishing-resistant, hardware-backed proof.
    L4 = 4,
}

impl AssuranceLevel {
    /// The lowest defined level.
    pub const MIN: AssuranceLevel = AssuranceLevel::L1;
    /// The highest defined level.
    pub const MAX: AssuranceLevel = AssuranceLevel::L4;

    /// Numeric value of the level.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a numeric level. Returns `None` outside 1..=4.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::L1),
            2 => Some(Self::L2),
            3 => Some(Self::L3),
            4 => Some(Self::L4),
            _ => None,
        }
    }

    /// The next level up, saturating at [`AssuranceLevel::MAX`].
    #[must_use]
    pub fn next_up(self) -> Self {
        Self::from_u8(self.as_u8() + 1).unwrap_or(Self::MAX)
    }
}

impl Display for AssuranceLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.as_u8())
    }
}

impl From<AssuranceLevel> for u8 {
    fn from(level: AssuranceLevel) -> u8 {
        level.as_u8()
    }
}

impl TryFrom<u8> for AssuranceLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or_else(|| format!("assurance level out of range: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_totally_ordered() {
        assert!(AssuranceLevel::L1 < AssuranceLevel::L2);
        assert!(AssuranceLevel::L2 < AssuranceLevel::L3);
        assert!(AssuranceLevel::L3 < AssuranceLevel::L4);
        assert_eq!(
            AssuranceLevel::L2.max(AssuranceLevel::L3),
            AssuranceLevel::L3
        );
    }

    #[test]
    fn numeric_round_trip() {
        for value in 1..=4u8 {
            let level = AssuranceLevel::from_u8(value).unwrap();
            assert_eq!(level.as_u8(), value);
        }
        assert_eq!(AssuranceLevel::from_u8(0), None);
        assert_eq!(AssuranceLevel::from_u8(5), None);
    }

    #[test]
    fn next_up_saturates() {
        assert_eq!(AssuranceLevel::L1.next_up(), AssuranceLevel::L2);
        assert_eq!(AssuranceLevel::L4.next_up(), AssuranceLevel::L4);
    }

    #[test]
    fn serde_uses_numeric_form() {
        let json = serde_json::to_string(&AssuranceLevel::L3).unwrap();
        assert_eq!(json, "3");
        let back: AssuranceLevel = serde_json::from_str("4").unwrap();
        assert_eq!(back, AssuranceLevel::L4);
        assert!(serde_json::from_str::<AssuranceLevel>("9").is_err());
    }

    #[test]
    fn display_format() {
        assert_eq!(AssuranceLevel::L2.to_string(), "L2");
    }
}
