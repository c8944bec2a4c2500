//! Transition requests and the legal edge set
//!
//! A requested `(from, to)` pair resolves to at most one [`Edge`]. Anything
//! that does not resolve is an invalid transition.

use keydev_model::{KeyDevId, KeyDevStatus, MonthRef, Timestamp, Weight};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A request to move a KeyDev to another status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub key_dev_id: KeyDevId,
    pub target: KeyDevStatus,
    pub rejection_reason: Option<String>,
    pub month_ref: Option<MonthRef>,
    pub validated_mockup_commit: Option<String>,
    pub weight: Option<Weight>,
    pub repo_url: Option<String>,
    pub release_commit: Option<String>,
}

impl TransitionRequest {
    /// Request with no payload fields
    #[must_use]
    pub fn new(key_dev_id: KeyDevId, target: KeyDevStatus) -> Self {
        Self {
            key_dev_id,
            target,
            rejection_reason: None,
            month_ref: None,
            validated_mockup_commit: None,
            weight: None,
            repo_url: None,
            release_commit: None,
        }
    }

    #[must_use]
    pub fn with_rejection_reason(mut self, reason: impl Into<String>) -> Self {
        self.rejection_reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn with_month_ref(mut self, month_ref: MonthRef) -> Self {
        self.month_ref = Some(month_ref);
        self
    }

    #[must_use]
    pub fn with_validated_mockup_commit(mut self, commit: impl Into<String>) -> Self {
        self.validated_mockup_commit = Some(commit.into());
        self
    }

    #[must_use]
    pub fn with_weight(mut self, weight: Weight) -> Self {
        self.weight = Some(weight);
        self
    }

    #[must_use]
    pub fn with_repo_url(mut self, repo_url: impl Into<String>) -> Self {
        self.repo_url = Some(repo_url.into());
        self
    }

    #[must_use]
    pub fn with_release_commit(mut self, commit: impl Into<String>) -> Self {
        self.release_commit = Some(commit.into());
        self
    }
}

/// Legal edges of the lifecycle graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    /// Draft → MockupDone
    SubmitMockup,
    /// MockupDone → Approved
    Approve,
    /// MockupDone → Rejected
    Reject,
    /// Approved → FrontValidated (capacity-gated)
    ValidateFront,
    /// FrontValidated → InProgress
    StartDevelopment,
    /// InProgress → Done
    Release,
    /// Done → Checked
    Check,
    /// Rejected → Draft
    Reopen,
    /// Administrative move to an earlier status
    Rewind,
}

impl Edge {
    /// Resolve the edge for a requested move
    #[must_use]
    pub fn resolve(from: KeyDevStatus, to: KeyDevStatus) -> Option<Edge> {
        use KeyDevStatus as S;
        match (from, to) {
            (S::Draft, S::MockupDone) => Some(Edge::SubmitMockup),
            (S::MockupDone, S::Approved) => Some(Edge::Approve),
            (S::MockupDone, S::Rejected) => Some(Edge::Reject),
            (S::Approved, S::FrontValidated) => Some(Edge::ValidateFront),
            (S::FrontValidated, S::InProgress) => Some(Edge::StartDevelopment),
            (S::InProgress, S::Done) => Some(Edge::Release),
            (S::Done, S::Checked) => Some(Edge::Check),
            (S::Rejected, S::Draft) => Some(Edge::Reopen),
            (from, to) if is_rewind(from, to) => Some(Edge::Rewind),
            _ => None,
        }
    }

    /// Whether an administrator skips this edge's role check
    #[inline]
    #[must_use]
    pub fn admin_bypass(self) -> bool {
        !matches!(self, Edge::Check)
    }

    /// Stable name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Edge::SubmitMockup => "submit_mockup",
            Edge::Approve => "approve",
            Edge::Reject => "reject",
            Edge::ValidateFront => "validate_front",
            Edge::StartDevelopment => "start_development",
            Edge::Release => "release",
            Edge::Check => "check",
            Edge::Reopen => "reopen",
            Edge::Rewind => "rewind",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_rewind(from: KeyDevStatus, to: KeyDevStatus) -> bool {
    !from.is_terminal()
        && from != KeyDevStatus::Rejected
        && to != KeyDevStatus::Rejected
        && to < from
}

/// Targets reachable from `from` through the lifecycle table, rewinds excluded
#[must_use]
pub fn allowed_transitions(from: KeyDevStatus) -> Vec<KeyDevStatus> {
    KeyDevStatus::ALL
        .into_iter()
        .filter(|to| matches!(Edge::resolve(from, *to), Some(edge) if edge != Edge::Rewind))
        .collect()
}

/// Earlier statuses an administrator may rewind `from` to
#[must_use]
pub fn rewind_targets(from: KeyDevStatus) -> Vec<KeyDevStatus> {
    KeyDevStatus::ALL
        .into_iter()
        .filter(|to| is_rewind(from, *to))
        .collect()
}

/// Record of an applied transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionReceipt {
    pub key_dev_id: KeyDevId,
    pub from: KeyDevStatus,
    pub to: KeyDevStatus,
    pub edge: Edge,
    pub at: Timestamp,
}
