//! Typed identifiers.
//!
//! Every persisted entity is keyed by a positive integer. The integer form is
//! part of the scope wire format (`DeployGroup-42`), so ids stay numeric
//! instead of opaque strings.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Creates an id from a raw value, rejecting zero.
            #[must_use]
            pub const fn new(raw: u64) -> Option<Self> {
                match NonZeroU64::new(raw) {
                    Some(id) => Some(Self(id)),
                    None => None,
                }
            }

            /// Returns the raw integer value.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_raw_id(s)
                    .map(Self)
                    .ok_or_else(|| DomainError::InvalidIdentifier(s.to_string()))
            }
        }
    };
}

/// Accepts only plain decimal digits; signs, whitespace and zero are rejected.
fn parse_raw_id(s: &str) -> Option<NonZeroU64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

define_id!(
    /// Identifier of a stage.
    StageId
);
define_id!(
    /// Identifier of an environment (e.g. "production").
    EnvironmentId
);
define_id!(
    /// Identifier of a deploy group.
    DeployGroupId
);
define_id!(
    /// Identifier of a variable group.
    VariableGroupId
);
define_id!(
    /// Identifier of a persisted environment variable record.
    VariableId
);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id: StageId = "42".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_reject_invalid_ids() {
        for raw in ["", "0", "-1", "+3", " 4", "4a", "1.5", "99999999999999999999999"] {
            assert!(raw.parse::<DeployGroupId>().is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_new_rejects_zero() {
        assert!(VariableId::new(0).is_none());
        assert_eq!(VariableId::new(7).map(VariableId::get), Some(7));
    }

    #[test]
    fn test_serde_transparent() {
        let id = EnvironmentId::new(5).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "5");
        let back: EnvironmentId = serde_json::from_str("5").unwrap();
        assert_eq!(back, id);
    }
}
