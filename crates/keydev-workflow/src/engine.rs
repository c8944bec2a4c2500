//! Status transition engine
//!
//! A transition runs in three steps:
//! - resolve the requested `(from, to)` pair to an [`Edge`]
//! - run the edge's role guard and data preconditions, producing the field writes
//! - apply the side effects and replace the record
//!
//! Guards only read. The record is written once, after every check passed,
//! so a failed request leaves the KeyDev exactly as it was.

use crate::error::WorkflowError;
use crate::ledger::BudgetAllocationLedger;
use crate::policy;
use crate::transition::{Edge, TransitionReceipt, TransitionRequest};
use keydev_model::{
    AllocationKey, Caller, Direction, KeyDev, KeyDevId, KeyDevStatus, MonthRef, Role, Timestamp,
    UserId, Weight,
};
use keydev_store::StoreTx;

/// Field writes produced by a passed guard
#[derive(Debug, Default)]
struct SideEffects {
    month_ref: Option<MonthRef>,
    validated_mockup_commit: Option<String>,
    weight: Option<Weight>,
    repo_url: Option<String>,
    release_commit: Option<String>,
    rejection_reason: Option<String>,
    rejected_by_id: Option<UserId>,
    tech_validator_id: Option<UserId>,
    business_validator_id: Option<UserId>,
    owner_id: Option<UserId>,
    approved_at: Option<Timestamp>,
    tech_validated_at: Option<Timestamp>,
    business_validated_at: Option<Timestamp>,
    front_validated_at: Option<Timestamp>,
    released_at: Option<Timestamp>,
    clear_rejection: bool,
}

impl SideEffects {
    fn apply(self, kd: &mut KeyDev) {
        if self.clear_rejection {
            kd.clear_rejection();
        }

        macro_rules! assign {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field {
                    kd.$field = Some(value);
                })*
            };
        }

        assign!(
            month_ref,
            validated_mockup_commit,
            weight,
            repo_url,
            release_commit,
            rejection_reason,
            rejected_by_id,
            tech_validator_id,
            business_validator_id,
            owner_id,
            approved_at,
            tech_validated_at,
            business_validated_at,
            front_validated_at,
            released_at,
        );
    }
}

/// Inputs shared by every guard
struct GuardContext<'a> {
    tx: &'a dyn StoreTx,
    record: &'a KeyDev,
    caller: &'a Caller,
    request: &'a TransitionRequest,
    now: Timestamp,
}

impl GuardContext<'_> {
    fn month_ref(&self) -> Option<MonthRef> {
        self.request
            .month_ref
            .clone()
            .or_else(|| self.record.month_ref.clone())
    }

    fn weight(&self) -> Option<Weight> {
        self.request.weight.or(self.record.weight)
    }
}

/// Trimmed, non-empty value
fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Supplied value, falling back to the stored one
fn supplied_or_stored(supplied: Option<&String>, stored: Option<&String>) -> Option<String> {
    non_blank(supplied.map(String::as_str)).or_else(|| non_blank(stored.map(String::as_str)))
}

/// Load a KeyDev that has not been soft-deleted
///
/// # Errors
/// `NotFound` when the record is missing or soft-deleted
pub(crate) fn load_active(tx: &dyn StoreTx, id: KeyDevId) -> Result<KeyDev, WorkflowError> {
    match tx.key_dev(id)? {
        Some(kd) if !kd.is_deleted() => Ok(kd),
        _ => Err(WorkflowError::not_found("key dev", id)),
    }
}

/// Data an entered status must carry
fn check_entry_data(target: KeyDevStatus, kd: &KeyDev) -> Result<(), WorkflowError> {
    let present = |value: &Option<String>| non_blank(value.as_deref()).is_some();
    match target {
        KeyDevStatus::Approved if kd.weight.is_none() => Err(WorkflowError::MissingField("weight")),
        KeyDevStatus::FrontValidated if kd.month_ref.is_none() => {
            Err(WorkflowError::MissingField("monthRef"))
        }
        KeyDevStatus::FrontValidated if !present(&kd.validated_mockup_commit) => {
            Err(WorkflowError::MissingField("validatedMockupCommit"))
        }
        KeyDevStatus::Done if !present(&kd.repo_url) => Err(WorkflowError::MissingField("repoUrl")),
        KeyDevStatus::Done if !present(&kd.release_commit) => {
            Err(WorkflowError::MissingField("releaseCommit"))
        }
        _ => Ok(()),
    }
}

/// Role guard of an edge
fn check_role(edge: Edge, record: &KeyDev, caller: &Caller) -> Result<(), WorkflowError> {
    if edge.admin_bypass() && policy::is_admin(&caller.roles) {
        return Ok(());
    }
    let action = edge.as_str();
    match edge {
        Edge::SubmitMockup => Ok(()),
        Edge::Approve | Edge::Reject | Edge::StartDevelopment => {
            policy::require_role(caller, Role::TechValidator, action)
        }
        Edge::ValidateFront => policy::require_role(caller, Role::BusinessValidator, action),
        Edge::Release => {
            if record.is_owned_by(&caller.user_id) {
                Ok(())
            } else {
                Err(WorkflowError::unauthorized(format!(
                    "{action} is restricted to the owner of {}",
                    record.human_id
                )))
            }
        }
        Edge::Check | Edge::Rewind => policy::require_admin(caller, action),
        Edge::Reopen => policy::require_requester_or_admin(caller, record, action),
    }
}

fn submit_mockup(ctx: &GuardContext<'_>) -> Result<SideEffects, WorkflowError> {
    non_blank(ctx.record.mockup_repo_url.as_deref())
        .ok_or(WorkflowError::MissingField("mockupRepoUrl"))?;
    Ok(SideEffects::default())
}

fn approve(ctx: &GuardContext<'_>) -> Result<SideEffects, WorkflowError> {
    let weight = ctx.weight().ok_or(WorkflowError::MissingField("weight"))?;
    Ok(SideEffects {
        weight: Some(weight),
        tech_validator_id: Some(ctx.caller.user_id.clone()),
        approved_at: Some(ctx.now),
        tech_validated_at: Some(ctx.now),
        clear_rejection: true,
        ..SideEffects::default()
    })
}

fn reject(ctx: &GuardContext<'_>) -> Result<SideEffects, WorkflowError> {
    let reason = non_blank(ctx.request.rejection_reason.as_deref())
        .ok_or(WorkflowError::MissingField("rejectionReason"))?;
    Ok(SideEffects {
        rejection_reason: Some(reason),
        rejected_by_id: Some(ctx.caller.user_id.clone()),
        ..SideEffects::default()
    })
}

fn validate_front(
    ctx: &GuardContext<'_>,
    ledger: &BudgetAllocationLedger,
) -> Result<SideEffects, WorkflowError> {
    let record = ctx.record;
    if !ctx.caller.in_dept(&record.dept_id) {
        return Err(WorkflowError::unauthorized(format!(
            "front validation of {} requires membership of department {}",
            record.human_id, record.dept_id
        )));
    }
    let month_ref = ctx.month_ref().ok_or(WorkflowError::MissingField("monthRef"))?;
    let commit = supplied_or_stored(
        ctx.request.validated_mockup_commit.as_ref(),
        record.validated_mockup_commit.as_ref(),
    )
    .ok_or(WorkflowError::MissingField("validatedMockupCommit"))?;

    if record.status.direction_to(ctx.request.target) == Direction::Forward {
        let key = AllocationKey::new(
            month_ref.clone(),
            record.dept_id.clone(),
            record.team_id.clone(),
        );
        ledger.check_capacity(ctx.tx, &key, record.id)?;
    }

    Ok(SideEffects {
        month_ref: Some(month_ref),
        validated_mockup_commit: Some(commit),
        business_validator_id: Some(ctx.caller.user_id.clone()),
        business_validated_at: Some(ctx.now),
        front_validated_at: Some(ctx.now),
        ..SideEffects::default()
    })
}

fn start_development(ctx: &GuardContext<'_>) -> SideEffects {
    SideEffects {
        owner_id: Some(ctx.caller.user_id.clone()),
        ..SideEffects::default()
    }
}

fn release(ctx: &GuardContext<'_>) -> Result<SideEffects, WorkflowError> {
    let repo_url = supplied_or_stored(ctx.request.repo_url.as_ref(), ctx.record.repo_url.as_ref())
        .ok_or(WorkflowError::MissingField("repoUrl"))?;
    let release_commit = supplied_or_stored(
        ctx.request.release_commit.as_ref(),
        ctx.record.release_commit.as_ref(),
    )
    .ok_or(WorkflowError::MissingField("releaseCommit"))?;
    Ok(SideEffects {
        repo_url: Some(repo_url),
        release_commit: Some(release_commit),
        released_at: Some(ctx.now),
        ..SideEffects::default()
    })
}

fn reopen() -> SideEffects {
    SideEffects {
        clear_rejection: true,
        ..SideEffects::default()
    }
}

/// Overrides only; milestones and stored fields carry over
fn rewind(ctx: &GuardContext<'_>) -> Result<SideEffects, WorkflowError> {
    let request = ctx.request;
    let overrides = || SideEffects {
        month_ref: request.month_ref.clone(),
        validated_mockup_commit: non_blank(request.validated_mockup_commit.as_deref()),
        weight: request.weight,
        repo_url: non_blank(request.repo_url.as_deref()),
        release_commit: non_blank(request.release_commit.as_deref()),
        ..SideEffects::default()
    };

    let mut candidate = ctx.record.clone();
    overrides().apply(&mut candidate);
    check_entry_data(request.target, &candidate)?;
    Ok(overrides())
}

/// Applies legal status changes to KeyDev records
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusTransitionEngine {
    ledger: BudgetAllocationLedger,
}

impl StatusTransitionEngine {
    /// Create engine
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            ledger: BudgetAllocationLedger::new(),
        }
    }

    /// Ledger consulted by the capacity gate
    #[inline]
    #[must_use]
    pub fn ledger(&self) -> &BudgetAllocationLedger {
        &self.ledger
    }

    /// Apply `request` on behalf of `caller`
    ///
    /// # Errors
    /// - `NotFound` for missing or soft-deleted KeyDevs
    /// - `InvalidTransition` when no edge connects the two statuses
    /// - `Unauthorized`, `MissingField` or `CapacityExhausted` from the edge guard
    pub fn transition(
        &self,
        tx: &mut dyn StoreTx,
        caller: &Caller,
        request: &TransitionRequest,
        now: Timestamp,
    ) -> Result<TransitionReceipt, WorkflowError> {
        let record = load_active(&*tx, request.key_dev_id)?;
        let from = record.status;
        let to = request.target;

        let (edge, effects) = match self.plan(&*tx, &record, caller, request, now) {
            Ok(planned) => planned,
            Err(err) => {
                tracing::warn!(
                    key_dev = %record.human_id,
                    %from,
                    %to,
                    caller = %caller.user_id,
                    reason = %err,
                    "transition rejected"
                );
                metrics::counter!(
                    "keydev_transition_rejections_total",
                    "kind" => err.kind().as_str()
                )
                .increment(1);
                return Err(err);
            }
        };

        let mut updated = record;
        effects.apply(&mut updated);
        updated.status = to;
        updated.updated_at = now;
        let receipt = TransitionReceipt {
            key_dev_id: updated.id,
            from,
            to,
            edge,
            at: now,
        };
        let human_id = updated.human_id;
        tx.replace_key_dev(updated)?;

        tracing::info!(
            key_dev = %human_id,
            %from,
            %to,
            %edge,
            caller = %caller.user_id,
            "transition applied"
        );
        metrics::counter!("keydev_transitions_total", "edge" => edge.as_str()).increment(1);
        Ok(receipt)
    }

    fn plan(
        &self,
        tx: &dyn StoreTx,
        record: &KeyDev,
        caller: &Caller,
        request: &TransitionRequest,
        now: Timestamp,
    ) -> Result<(Edge, SideEffects), WorkflowError> {
        let edge = Edge::resolve(record.status, request.target).ok_or(
            WorkflowError::InvalidTransition {
                from: record.status,
                to: request.target,
            },
        )?;
        check_role(edge, record, caller)?;

        let ctx = GuardContext {
            tx,
            record,
            caller,
            request,
            now,
        };
        let effects = match edge {
            Edge::SubmitMockup => submit_mockup(&ctx)?,
            Edge::Approve => approve(&ctx)?,
            Edge::Reject => reject(&ctx)?,
            Edge::ValidateFront => validate_front(&ctx, &self.ledger)?,
            Edge::StartDevelopment => start_development(&ctx),
            Edge::Release => release(&ctx)?,
            Edge::Check => SideEffects::default(),
            Edge::Reopen => reopen(),
            Edge::Rewind => rewind(&ctx)?,
        };
        Ok((edge, effects))
    }

    /// Push the status derived by the question gate
    ///
    /// Returns `false` when the KeyDev already holds `target` or is terminal.
    ///
    /// # Errors
    /// - `InvariantViolation` for targets other than `Approved` and `Rejected`
    /// - `NotFound` for missing or soft-deleted KeyDevs
    pub fn set_derived_status(
        &self,
        tx: &mut dyn StoreTx,
        key_dev_id: KeyDevId,
        target: KeyDevStatus,
        now: Timestamp,
    ) -> Result<bool, WorkflowError> {
        if !matches!(target, KeyDevStatus::Approved | KeyDevStatus::Rejected) {
            return Err(WorkflowError::InvariantViolation(format!(
                "derived status must be Approved or Rejected, got {target}"
            )));
        }

        let mut record = load_active(&*tx, key_dev_id)?;
        if record.status.is_terminal() {
            tracing::debug!(key_dev = %record.human_id, status = %record.status, "terminal status kept");
            return Ok(false);
        }
        if record.status == target {
            tracing::debug!(key_dev = %record.human_id, status = %target, "derived status unchanged");
            return Ok(false);
        }

        let from = record.status;
        record.status = target;
        if target == KeyDevStatus::Approved {
            record.clear_rejection();
        }
        record.updated_at = now;
        let human_id = record.human_id;
        tx.replace_key_dev(record)?;

        tracing::info!(key_dev = %human_id, %from, to = %target, "derived status applied");
        metrics::counter!("keydev_transitions_total", "edge" => "derived").increment(1);
        Ok(true)
    }
}
