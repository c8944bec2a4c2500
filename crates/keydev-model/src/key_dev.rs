//! The KeyDev aggregate

use crate::ids::{DeptId, HumanId, KeyDevId, TeamId, UserId};
use crate::status::KeyDevStatus;
use crate::values::{MonthRef, Weight};
use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// A work item moving through the approval pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDev {
    /// System id
    pub id: KeyDevId,
    /// Sequential human id (`KD-###`)
    pub human_id: HumanId,
    /// Short title
    pub title: String,
    /// Longer description
    pub description: Option<String>,

    /// Owning department (immutable)
    pub dept_id: DeptId,
    /// Owning team (immutable)
    pub team_id: TeamId,

    /// Creator
    pub requester_id: UserId,
    /// Tech validator who approved
    pub tech_validator_id: Option<UserId>,
    /// Business validator who admitted the item into a month
    pub business_validator_id: Option<UserId>,
    /// Developer who took the item
    pub owner_id: Option<UserId>,
    /// User who rejected the item
    pub rejected_by_id: Option<UserId>,

    /// Lifecycle status
    pub status: KeyDevStatus,
    /// Delivery month, absent for drafts
    pub month_ref: Option<MonthRef>,
    /// Reason given on rejection
    pub rejection_reason: Option<String>,
    /// Mockup commit accepted at business validation
    pub validated_mockup_commit: Option<String>,
    /// Mockup repository
    pub mockup_repo_url: Option<String>,
    /// Delivery repository
    pub repo_url: Option<String>,
    /// Released commit
    pub release_commit: Option<String>,
    /// Development size
    pub weight: Option<Weight>,
    /// Free-form priority, orthogonal to the lifecycle
    pub priority: Option<String>,

    pub approved_at: Option<Timestamp>,
    pub tech_validated_at: Option<Timestamp>,
    pub business_validated_at: Option<Timestamp>,
    pub front_validated_at: Option<Timestamp>,
    pub released_at: Option<Timestamp>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Soft-deletion marker
    pub deleted_at: Option<Timestamp>,
}

impl KeyDev {
    /// Create a draft from a creation request
    #[must_use]
    pub fn draft(
        human_id: HumanId,
        requester_id: UserId,
        request: NewKeyDev,
        now: Timestamp,
    ) -> Self {
        Self {
            id: KeyDevId::new(),
            human_id,
            title: request.title,
            description: request.description,
            dept_id: request.dept_id,
            team_id: request.team_id,
            requester_id,
            tech_validator_id: None,
            business_validator_id: None,
            owner_id: None,
            rejected_by_id: None,
            status: KeyDevStatus::Draft,
            month_ref: None,
            rejection_reason: None,
            validated_mockup_commit: None,
            mockup_repo_url: None,
            repo_url: None,
            release_commit: None,
            weight: None,
            priority: request.priority,
            approved_at: None,
            tech_validated_at: None,
            business_validated_at: None,
            front_validated_at: None,
            released_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Whether the record has been soft-deleted
    #[inline]
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether `user` is the assigned owner
    #[must_use]
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.owner_id.as_ref() == Some(user)
    }

    /// Whether `user` created this KeyDev
    #[must_use]
    pub fn is_requested_by(&self, user: &UserId) -> bool {
        &self.requester_id == user
    }

    /// Clear rejection bookkeeping
    pub fn clear_rejection(&mut self) {
        self.rejection_reason = None;
        self.rejected_by_id = None;
    }
}

/// Creation request for a KeyDev
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewKeyDev {
    pub title: String,
    pub description: Option<String>,
    pub dept_id: DeptId,
    pub team_id: TeamId,
    pub priority: Option<String>,
}

impl NewKeyDev {
    /// Create a request with the mandatory fields
    #[must_use]
    pub fn new(title: impl Into<String>, dept_id: impl Into<DeptId>, team_id: impl Into<TeamId>) -> Self {
        Self {
            title: title.into(),
            description: None,
            dept_id: dept_id.into(),
            team_id: team_id.into(),
            priority: None,
        }
    }

    /// With description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// With priority
    #[must_use]
    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }
}
