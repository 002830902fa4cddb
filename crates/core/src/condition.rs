//! Condition (arm) identifiers.
//!
//! A condition is stored as a signed integer with three regimes:
//!
//! - positive `n` -- the participant is assigned to arm `n` (1-based ordinal)
//! - `0` -- the participant is explicitly unconditioned
//! - negative `-n` -- the participant was assigned to arm `n` and the
//!   assignment was later released (a superseded attempt); released
//!   conditions are excluded from arm counts but keep the original arm
//!   recoverable as `-raw`

use std::fmt;

use serde::{Deserialize, Serialize};

/// An arm assignment value.
///
/// `Condition` is deliberately a thin wrapper over the stored integer so
/// that storage backends can persist it as a plain column. All
/// interpretation (assigned / unconditioned / released) goes through the
/// methods here rather than raw comparisons at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Condition(i32);

impl Condition {
    /// The explicit "no condition" value.
    pub const NONE: Condition = Condition(0);

    /// An assignment to the given 1-based arm ordinal.
    ///
    /// `arm(0)` is `NONE`; there is no arm zero.
    pub fn arm(ordinal: u16) -> Condition {
        Condition(i32::from(ordinal))
    }

    /// Reconstruct from a stored integer (positive, zero, or negative).
    pub fn from_raw(raw: i32) -> Condition {
        Condition(raw)
    }

    /// The stored integer value.
    pub fn raw(self) -> i32 {
        self.0
    }

    /// The assigned arm ordinal, if this is a live (positive) assignment.
    ///
    /// Unconditioned and released values return `None`; callers that need
    /// the union sequence for either treat `None` uniformly.
    pub fn arm_index(self) -> Option<u16> {
        u16::try_from(self.0).ok().filter(|&n| n > 0)
    }

    /// True when a positive arm assignment is in effect.
    pub fn is_assigned(self) -> bool {
        self.0 > 0
    }

    /// True when a previous assignment has been released.
    pub fn is_released(self) -> bool {
        self.0 < 0
    }

    /// The released form of this condition.
    ///
    /// A positive assignment flips to its negation; `NONE` and already
    /// released values are returned unchanged (0 means "unconditioned",
    /// not "assigned-then-released", and is never negated).
    pub fn released(self) -> Condition {
        if self.0 > 0 {
            Condition(-self.0)
        } else {
            self
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_index_only_for_positive() {
        assert_eq!(Condition::arm(3).arm_index(), Some(3));
        assert_eq!(Condition::NONE.arm_index(), None);
        assert_eq!(Condition::from_raw(-2).arm_index(), None);
    }

    #[test]
    fn release_negates_positive_only() {
        assert_eq!(Condition::arm(2).released(), Condition::from_raw(-2));
        assert_eq!(Condition::NONE.released(), Condition::NONE);
        assert_eq!(Condition::from_raw(-4).released(), Condition::from_raw(-4));
    }

    #[test]
    fn released_is_not_assigned() {
        let released = Condition::arm(5).released();
        assert!(released.is_released());
        assert!(!released.is_assigned());
    }
}
