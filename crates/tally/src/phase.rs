// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of a voting session. Transitions are one-directional:
/// `Setup → Open → Closed → TalliesPublic`; no phase is ever revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Setup,
    Open,
    Closed,
    TalliesPublic,
}

impl Phase {
    /// Decodes the contract's phase discriminant.
    pub fn from_code(code: u8) -> Option<Phase> {
        match code {
            0 => Some(Phase::Setup),
            1 => Some(Phase::Open),
            2 => Some(Phase::Closed),
            3 => Some(Phase::TalliesPublic),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Setup => "setup",
            Phase::Open => "open",
            Phase::Closed => "closed",
            Phase::TalliesPublic => "tallies-public",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip_and_unknown_codes_are_rejected() {
        assert_eq!(Phase::from_code(0), Some(Phase::Setup));
        assert_eq!(Phase::from_code(3), Some(Phase::TalliesPublic));
        assert_eq!(Phase::from_code(4), None);
    }

    #[test]
    fn ordering_matches_the_lifecycle() {
        assert!(Phase::Setup < Phase::Open);
        assert!(Phase::Open < Phase::Closed);
        assert!(Phase::Closed < Phase::TalliesPublic);
    }
}
