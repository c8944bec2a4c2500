//! Monthly capacity records

use crate::ids::{DeptId, TeamId};
use crate::values::MonthRef;
use serde::{Deserialize, Serialize};

/// Key of a budget allocation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationKey {
    pub month_ref: MonthRef,
    pub dept_id: DeptId,
    pub team_id: TeamId,
}

impl AllocationKey {
    #[must_use]
    pub fn new(month_ref: MonthRef, dept_id: DeptId, team_id: TeamId) -> Self {
        Self {
            month_ref,
            dept_id,
            team_id,
        }
    }
}

/// Number of KeyDevs a department/team pair may admit into a month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAllocation {
    pub month_ref: MonthRef,
    pub dept_id: DeptId,
    pub team_id: TeamId,
    pub max_alloc: u32,
}

impl BudgetAllocation {
    #[must_use]
    pub fn new(
        month_ref: MonthRef,
        dept_id: impl Into<DeptId>,
        team_id: impl Into<TeamId>,
        max_alloc: u32,
    ) -> Self {
        Self {
            month_ref,
            dept_id: dept_id.into(),
            team_id: team_id.into(),
            max_alloc,
        }
    }

    /// Lookup key
    #[must_use]
    pub fn key(&self) -> AllocationKey {
        AllocationKey::new(
            self.month_ref.clone(),
            self.dept_id.clone(),
            self.team_id.clone(),
        )
    }
}

/// Month-wide reporting ceiling, optionally per team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthBudget {
    pub month_ref: MonthRef,
    pub team_id: Option<TeamId>,
    pub total_key_dev: u32,
}

impl MonthBudget {
    #[must_use]
    pub fn new(month_ref: MonthRef, total_key_dev: u32) -> Self {
        Self {
            month_ref,
            team_id: None,
            total_key_dev,
        }
    }

    /// Scope to one team
    #[must_use]
    pub fn for_team(mut self, team_id: impl Into<TeamId>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }
}
