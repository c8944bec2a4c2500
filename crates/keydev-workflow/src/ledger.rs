//! Budget allocation ledger
//!
//! Read side of the monthly capacity budget. The admission gate counts each
//! admitted KeyDev as one slot whatever its weight; [`SlotUsage`] reports
//! that count next to the weight-summed utilization without reconciling
//! the two.

use crate::error::WorkflowError;
use keydev_model::{AllocationKey, BudgetAllocation, KeyDev, KeyDevId};
use keydev_store::StoreTx;
use serde::Serialize;

/// Capacity ledger over budget allocations
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetAllocationLedger;

/// Result of a passed capacity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Allocation ceiling
    pub max_alloc: u32,
    /// KeyDevs admitted before this one
    pub admitted: usize,
}

/// Admission and utilization figures for one allocation triple
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotUsage {
    pub key: AllocationKey,
    /// Allocation ceiling, absent when no allocation exists
    pub max_alloc: Option<u32>,
    /// Admitted KeyDevs, one slot each
    pub admissions: usize,
    /// Sum of the admitted KeyDevs' weights
    pub weighted: f64,
    /// Month-wide reporting ceiling (team-scoped if present, else global)
    pub month_total: Option<u32>,
}

impl BudgetAllocationLedger {
    /// Create ledger
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Allocation for a triple; `None` means zero capacity
    ///
    /// # Errors
    /// Propagates store failures
    pub fn allocation(
        &self,
        tx: &dyn StoreTx,
        key: &AllocationKey,
    ) -> Result<Option<BudgetAllocation>, WorkflowError> {
        Ok(tx.allocation(key)?)
    }

    /// Non-deleted KeyDevs of the triple in an admitted status
    fn admitted(
        &self,
        tx: &dyn StoreTx,
        key: &AllocationKey,
        exclude: Option<KeyDevId>,
    ) -> Result<Vec<KeyDev>, WorkflowError> {
        Ok(tx
            .key_devs_by_dept_month(&key.dept_id, &key.month_ref)?
            .into_iter()
            .filter(|kd| {
                !kd.is_deleted()
                    && kd.team_id == key.team_id
                    && kd.status.is_admitted()
                    && Some(kd.id) != exclude
            })
            .collect())
    }

    /// Number of admitted KeyDevs in the triple, optionally excluding one
    ///
    /// # Errors
    /// Propagates store failures
    pub fn admitted_count(
        &self,
        tx: &dyn StoreTx,
        key: &AllocationKey,
        exclude: Option<KeyDevId>,
    ) -> Result<usize, WorkflowError> {
        Ok(self.admitted(tx, key, exclude)?.len())
    }

    /// Admit `candidate` into the triple or fail with `CapacityExhausted`
    ///
    /// # Errors
    /// `CapacityExhausted` when no allocation exists, the allocation is zero
    /// or every slot is taken
    pub fn check_capacity(
        &self,
        tx: &dyn StoreTx,
        key: &AllocationKey,
        candidate: KeyDevId,
    ) -> Result<Admission, WorkflowError> {
        let max_alloc = self.allocation(tx, key)?.map_or(0, |a| a.max_alloc);
        let exhausted = |admitted| WorkflowError::CapacityExhausted {
            month_ref: key.month_ref.clone(),
            dept_id: key.dept_id.clone(),
            team_id: key.team_id.clone(),
            max_alloc,
            admitted,
        };

        if max_alloc == 0 {
            return Err(exhausted(0));
        }

        let admitted = self.admitted_count(tx, key, Some(candidate))?;
        if admitted >= max_alloc as usize {
            return Err(exhausted(admitted));
        }

        tracing::debug!(
            month = %key.month_ref,
            dept = %key.dept_id,
            team = %key.team_id,
            admitted,
            max_alloc,
            "capacity available"
        );
        Ok(Admission {
            max_alloc,
            admitted,
        })
    }

    /// Admission count and weighted utilization of a triple
    ///
    /// # Errors
    /// Propagates store failures
    pub fn slot_usage(
        &self,
        tx: &dyn StoreTx,
        key: &AllocationKey,
    ) -> Result<SlotUsage, WorkflowError> {
        let admitted = self.admitted(tx, key, None)?;
        let weighted: f64 = admitted
            .iter()
            .filter_map(|kd| kd.weight)
            .map(|w| w.value())
            .sum();
        let month_total = match tx.month_budget(&key.month_ref, Some(&key.team_id))? {
            Some(budget) => Some(budget.total_key_dev),
            None => tx
                .month_budget(&key.month_ref, None)?
                .map(|budget| budget.total_key_dev),
        };

        Ok(SlotUsage {
            key: key.clone(),
            max_alloc: self.allocation(tx, key)?.map(|a| a.max_alloc),
            admissions: admitted.len(),
            weighted,
            month_total,
        })
    }
}
