//! KeyDev lifecycle statuses
//!
//! The declaration order is the total order used to classify a requested
//! change as forward or backward. It is not the legal edge set.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a KeyDev
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyDevStatus {
    /// Created by a requester, mockup not yet provided
    Draft,
    /// Mockup repository provided
    MockupDone,
    /// Refused by tech validation or by open questions
    Rejected,
    /// Accepted by tech validation
    Approved,
    /// Admitted into a month by business validation
    FrontValidated,
    /// Owned by a developer
    InProgress,
    /// Released
    Done,
    /// Audited (terminal)
    Checked,
}

/// Direction of a requested status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Later in the total order
    Forward,
    /// Earlier in the total order
    Backward,
    /// Same status
    Stay,
}

impl KeyDevStatus {
    /// All statuses in total order
    pub const ALL: [KeyDevStatus; 8] = [
        KeyDevStatus::Draft,
        KeyDevStatus::MockupDone,
        KeyDevStatus::Rejected,
        KeyDevStatus::Approved,
        KeyDevStatus::FrontValidated,
        KeyDevStatus::InProgress,
        KeyDevStatus::Done,
        KeyDevStatus::Checked,
    ];

    /// Statuses that occupy an admission slot in the month budget
    pub const ADMITTED: [KeyDevStatus; 3] = [
        KeyDevStatus::FrontValidated,
        KeyDevStatus::InProgress,
        KeyDevStatus::Done,
    ];

    /// Position in the total order
    #[inline]
    #[must_use]
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Whether no outgoing edges exist
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, KeyDevStatus::Checked)
    }

    /// Whether this status counts against the admission budget
    #[inline]
    #[must_use]
    pub fn is_admitted(self) -> bool {
        Self::ADMITTED.contains(&self)
    }

    /// Classify a move from `self` to `to`
    #[must_use]
    pub fn direction_to(self, to: KeyDevStatus) -> Direction {
        match self.rank().cmp(&to.rank()) {
            std::cmp::Ordering::Less => Direction::Forward,
            std::cmp::Ordering::Greater => Direction::Backward,
            std::cmp::Ordering::Equal => Direction::Stay,
        }
    }

    /// Stable name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            KeyDevStatus::Draft => "Draft",
            KeyDevStatus::MockupDone => "MockupDone",
            KeyDevStatus::Rejected => "Rejected",
            KeyDevStatus::Approved => "Approved",
            KeyDevStatus::FrontValidated => "FrontValidated",
            KeyDevStatus::InProgress => "InProgress",
            KeyDevStatus::Done => "Done",
            KeyDevStatus::Checked => "Checked",
        }
    }
}

impl Default for KeyDevStatus {
    fn default() -> Self {
        KeyDevStatus::Draft
    }
}

impl fmt::Display for KeyDevStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyDevStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_order_matches_declaration() {
        for pair in KeyDevStatus::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].direction_to(pair[1]), Direction::Forward);
            assert_eq!(pair[1].direction_to(pair[0]), Direction::Backward);
        }
    }

    #[test]
    fn rejected_sits_before_approved() {
        assert_eq!(
            KeyDevStatus::Rejected.direction_to(KeyDevStatus::Draft),
            Direction::Backward
        );
        assert_eq!(
            KeyDevStatus::InProgress.direction_to(KeyDevStatus::Approved),
            Direction::Backward
        );
    }

    #[test]
    fn admitted_statuses() {
        assert!(KeyDevStatus::FrontValidated.is_admitted());
        assert!(KeyDevStatus::Done.is_admitted());
        assert!(!KeyDevStatus::Approved.is_admitted());
        assert!(!KeyDevStatus::Checked.is_admitted());
    }

    #[test]
    fn parse_roundtrip_names() {
        for status in KeyDevStatus::ALL {
            assert_eq!(status.as_str().parse::<KeyDevStatus>().unwrap(), status);
        }
        assert!("Shipped".parse::<KeyDevStatus>().is_err());
    }
}
