//! Service facade
//!
//! Every operation authenticates the caller, runs as one unit of work on the
//! document store and, for mutations that produce notifications, schedules
//! them only after the unit committed.

use crate::clock::{Clock, SystemClock};
use crate::engine::{load_active, StatusTransitionEngine};
use crate::error::WorkflowError;
use crate::ledger::SlotUsage;
use crate::notify::NotificationQueue;
use crate::policy;
use crate::questions::{GateOutcome, QuestionValidationGate};
use crate::transition::{TransitionReceipt, TransitionRequest};
use keydev_model::{
    AllocationKey, Answer, AnswerId, BudgetAllocation, Caller, DeptId, HumanId, KeyDev, KeyDevId,
    KeyDevStatus, LabelAssignment, LabelId, MonthBudget, MonthRef, NewKeyDev, Question,
    QuestionId, QuestionTemplate, RecipientRole, Role, TeamId, Timestamp, Weight,
};
use keydev_store::{DocumentStore, StoreTx};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Edits allowed while a KeyDev is in `Draft`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    /// Setting this submits the mockup in the same unit
    pub mockup_repo_url: Option<String>,
}

impl DraftUpdate {
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    #[must_use]
    pub fn with_mockup_repo_url(mut self, url: impl Into<String>) -> Self {
        self.mockup_repo_url = Some(url.into());
        self
    }
}

/// Listing criteria; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDevFilter {
    pub status: Option<KeyDevStatus>,
    pub month_ref: Option<MonthRef>,
    pub dept_id: Option<DeptId>,
    pub team_id: Option<TeamId>,
}

impl KeyDevFilter {
    #[must_use]
    pub fn with_status(mut self, status: KeyDevStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_month_ref(mut self, month_ref: MonthRef) -> Self {
        self.month_ref = Some(month_ref);
        self
    }

    #[must_use]
    pub fn with_dept(mut self, dept_id: impl Into<DeptId>) -> Self {
        self.dept_id = Some(dept_id.into());
        self
    }

    #[must_use]
    pub fn with_team(mut self, team_id: impl Into<TeamId>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    /// Whether `kd` passes every set criterion
    #[must_use]
    pub fn matches(&self, kd: &KeyDev) -> bool {
        !kd.is_deleted()
            && self.status.map_or(true, |s| kd.status == s)
            && self
                .month_ref
                .as_ref()
                .map_or(true, |m| kd.month_ref.as_ref() == Some(m))
            && self.dept_id.as_ref().map_or(true, |d| &kd.dept_id == d)
            && self.team_id.as_ref().map_or(true, |t| &kd.team_id == t)
    }

    /// Narrowest index query for the set criteria
    fn candidates(&self, tx: &dyn StoreTx) -> Result<Vec<KeyDev>, WorkflowError> {
        let rows = match (&self.dept_id, &self.month_ref, self.status, &self.team_id) {
            (Some(dept), Some(month), _, _) => tx.key_devs_by_dept_month(dept, month)?,
            (_, Some(month), _, _) => tx.key_devs_by_month(month)?,
            (_, _, Some(status), _) => tx.key_devs_by_status(status)?,
            (_, _, _, Some(team)) => tx.key_devs_by_team(team)?,
            _ => tx.all_key_devs()?,
        };
        Ok(rows)
    }
}

/// Entry point for every KeyDev operation
pub struct KeyDevService<S: DocumentStore> {
    store: Arc<S>,
    engine: StatusTransitionEngine,
    gate: QuestionValidationGate,
    notifications: NotificationQueue,
    clock: Arc<dyn Clock>,
}

impl<S: DocumentStore> std::fmt::Debug for KeyDevService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDevService")
            .field("notifications", &self.notifications)
            .finish_non_exhaustive()
    }
}

impl<S: DocumentStore> KeyDevService<S> {
    /// Create service over `store`
    #[must_use]
    pub fn new(store: Arc<S>, notifications: NotificationQueue) -> Self {
        let engine = StatusTransitionEngine::new();
        Self {
            store,
            engine,
            gate: QuestionValidationGate::new(engine),
            notifications,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run a mutation and schedule its notifications after commit
    fn commit<T, F>(&self, f: F) -> Result<T, WorkflowError>
    where
        F: FnOnce(&mut dyn StoreTx, Timestamp) -> Result<GateOutcome<T>, WorkflowError>,
    {
        let now = self.clock.now();
        let outcome = self.store.transaction(|tx| f(tx, now))?;
        if !outcome.notifications.is_empty() {
            self.notifications.schedule_all(outcome.notifications);
        }
        Ok(outcome.value)
    }

    fn mutate<T, F>(&self, f: F) -> Result<T, WorkflowError>
    where
        F: FnOnce(&mut dyn StoreTx, Timestamp) -> Result<T, WorkflowError>,
    {
        let now = self.clock.now();
        self.store.transaction(|tx| f(tx, now))
    }

    // ---- KeyDev lifecycle ----

    /// Create a `Draft` KeyDev owned by the caller as requester
    ///
    /// # Errors
    /// `Unauthorized` without the Requester role, `MissingField("title")` for
    /// a blank title
    pub fn create_key_dev(
        &self,
        caller: Option<&Caller>,
        new: NewKeyDev,
    ) -> Result<KeyDev, WorkflowError> {
        let caller = policy::authenticate(caller)?;
        policy::require_role(caller, Role::Requester, "create key dev")?;
        if new.title.trim().is_empty() {
            return Err(WorkflowError::MissingField("title"));
        }

        self.mutate(|tx, now| {
            let human_id = HumanId::next_after(tx.highest_human_id()?);
            let key_dev = KeyDev::draft(human_id, caller.user_id.clone(), new, now);
            tx.insert_key_dev(key_dev.clone())?;
            tracing::info!(
                key_dev = %key_dev.human_id,
                requester = %caller.user_id,
                dept = %key_dev.dept_id,
                team = %key_dev.team_id,
                "key dev created"
            );
            Ok(key_dev)
        })
    }

    /// Edit a `Draft` KeyDev; a record holding a mockup URL is also submitted
    ///
    /// # Errors
    /// - `Unauthorized` unless the caller is the requester or an administrator
    /// - `InvalidTransition` when the KeyDev has left `Draft`
    pub fn update_draft(
        &self,
        caller: Option<&Caller>,
        key_dev_id: KeyDevId,
        update: DraftUpdate,
    ) -> Result<KeyDev, WorkflowError> {
        let caller = policy::authenticate(caller)?;
        let engine = self.engine;
        self.mutate(|tx, now| {
            let mut key_dev = load_active(&*tx, key_dev_id)?;
            policy::require_requester_or_admin(caller, &key_dev, "update draft")?;
            if key_dev.status != KeyDevStatus::Draft {
                return Err(WorkflowError::InvalidTransition {
                    from: key_dev.status,
                    to: KeyDevStatus::Draft,
                });
            }

            if let Some(title) = update.title {
                if title.trim().is_empty() {
                    return Err(WorkflowError::MissingField("title"));
                }
                key_dev.title = title;
            }
            if let Some(description) = update.description {
                key_dev.description = Some(description);
            }
            if let Some(priority) = update.priority {
                key_dev.priority = Some(priority);
            }
            if let Some(url) = update.mockup_repo_url.filter(|url| !url.trim().is_empty()) {
                key_dev.mockup_repo_url = Some(url);
            }
            let submit = key_dev
                .mockup_repo_url
                .as_deref()
                .is_some_and(|url| !url.trim().is_empty());
            key_dev.updated_at = now;
            tx.replace_key_dev(key_dev)?;

            if submit {
                let request = TransitionRequest::new(key_dev_id, KeyDevStatus::MockupDone);
                engine.transition(tx, caller, &request, now)?;
            }
            load_active(&*tx, key_dev_id)
        })
    }

    /// Apply a status transition
    ///
    /// # Errors
    /// See [`StatusTransitionEngine::transition`]
    pub fn transition(
        &self,
        caller: Option<&Caller>,
        request: &TransitionRequest,
    ) -> Result<TransitionReceipt, WorkflowError> {
        let caller = policy::authenticate(caller)?;
        let engine = self.engine;
        self.mutate(|tx, now| engine.transition(tx, caller, request, now))
    }

    /// Soft-delete a KeyDev
    ///
    /// # Errors
    /// `Unauthorized` unless the caller is the requester or an administrator
    pub fn soft_delete(
        &self,
        caller: Option<&Caller>,
        key_dev_id: KeyDevId,
    ) -> Result<(), WorkflowError> {
        let caller = policy::authenticate(caller)?;
        self.mutate(|tx, now| {
            let mut key_dev = load_active(&*tx, key_dev_id)?;
            policy::require_requester_or_admin(caller, &key_dev, "delete key dev")?;
            key_dev.deleted_at = Some(now);
            key_dev.updated_at = now;
            let human_id = key_dev.human_id;
            tx.replace_key_dev(key_dev)?;
            tracing::info!(key_dev = %human_id, caller = %caller.user_id, "key dev deleted");
            Ok(())
        })
    }

    /// Fetch a live KeyDev
    ///
    /// # Errors
    /// `NotFound` for missing or soft-deleted records
    pub fn get_key_dev(
        &self,
        caller: Option<&Caller>,
        key_dev_id: KeyDevId,
    ) -> Result<KeyDev, WorkflowError> {
        policy::authenticate(caller)?;
        self.store.read(|tx| load_active(tx, key_dev_id))
    }

    /// Live KeyDevs matching `filter`, ordered by human id
    ///
    /// # Errors
    /// Propagates store failures
    pub fn list_key_devs(
        &self,
        caller: Option<&Caller>,
        filter: &KeyDevFilter,
    ) -> Result<Vec<KeyDev>, WorkflowError> {
        policy::authenticate(caller)?;
        let mut rows: Vec<KeyDev> = self.store.read(|tx| filter.candidates(tx))?;
        rows.retain(|kd| filter.matches(kd));
        rows.sort_by_key(|kd| kd.human_id);
        Ok(rows)
    }

    // ---- Question gate ----

    /// Seed questions from the active templates
    ///
    /// # Errors
    /// See [`QuestionValidationGate::start_question_phase`]
    pub fn start_question_phase(
        &self,
        caller: Option<&Caller>,
        key_dev_id: KeyDevId,
        weight: Option<Weight>,
    ) -> Result<Vec<Question>, WorkflowError> {
        let caller = policy::authenticate(caller)?;
        let gate = self.gate;
        self.commit(|tx, now| gate.start_question_phase(tx, caller, key_dev_id, weight, now))
    }

    /// Append a manual question
    ///
    /// # Errors
    /// See [`QuestionValidationGate::create_question`]
    pub fn create_question(
        &self,
        caller: Option<&Caller>,
        key_dev_id: KeyDevId,
        text: &str,
    ) -> Result<Question, WorkflowError> {
        let caller = policy::authenticate(caller)?;
        let gate = self.gate;
        self.commit(|tx, now| gate.create_question(tx, caller, key_dev_id, text, now))
    }

    /// Validate an answer
    ///
    /// # Errors
    /// See [`QuestionValidationGate::validate_answer`]
    pub fn validate_answer(
        &self,
        caller: Option<&Caller>,
        question_id: QuestionId,
        answer_id: AnswerId,
    ) -> Result<Question, WorkflowError> {
        let caller = policy::authenticate(caller)?;
        let gate = self.gate;
        self.commit(|tx, now| gate.validate_answer(tx, caller, question_id, answer_id, now))
    }

    /// Soft-delete a question
    ///
    /// # Errors
    /// See [`QuestionValidationGate::delete_question`]
    pub fn delete_question(
        &self,
        caller: Option<&Caller>,
        question_id: QuestionId,
    ) -> Result<(), WorkflowError> {
        let caller = policy::authenticate(caller)?;
        let gate = self.gate;
        self.commit(|tx, now| gate.delete_question(tx, caller, question_id, now))
    }

    /// Answer a question
    ///
    /// # Errors
    /// See [`QuestionValidationGate::create_answer`]
    pub fn create_answer(
        &self,
        caller: Option<&Caller>,
        question_id: QuestionId,
        body: &str,
        recipient_role: RecipientRole,
    ) -> Result<Answer, WorkflowError> {
        let caller = policy::authenticate(caller)?;
        let gate = self.gate;
        self.commit(|tx, now| {
            gate.create_answer(tx, caller, question_id, body, recipient_role, now)
        })
    }

    /// Edit an answer
    ///
    /// # Errors
    /// See [`QuestionValidationGate::update_answer`]
    pub fn update_answer(
        &self,
        caller: Option<&Caller>,
        answer_id: AnswerId,
        body: &str,
    ) -> Result<Answer, WorkflowError> {
        let caller = policy::authenticate(caller)?;
        let gate = self.gate;
        self.commit(|tx, now| gate.update_answer(tx, caller, answer_id, body, now))
    }

    /// Live questions of a live KeyDev
    ///
    /// # Errors
    /// `NotFound` for missing or soft-deleted KeyDevs
    pub fn questions(
        &self,
        caller: Option<&Caller>,
        key_dev_id: KeyDevId,
    ) -> Result<Vec<Question>, WorkflowError> {
        policy::authenticate(caller)?;
        self.store.read(|tx| {
            load_active(tx, key_dev_id)?;
            self.gate.list_questions(tx, key_dev_id)
        })
    }

    /// Answers of a live question
    ///
    /// # Errors
    /// `NotFound` for missing or deleted questions
    pub fn answers(
        &self,
        caller: Option<&Caller>,
        question_id: QuestionId,
    ) -> Result<Vec<Answer>, WorkflowError> {
        policy::authenticate(caller)?;
        self.store.read(|tx| self.gate.list_answers(tx, question_id))
    }

    /// Label a question
    ///
    /// # Errors
    /// See [`QuestionValidationGate::assign_label`]
    pub fn assign_label(
        &self,
        caller: Option<&Caller>,
        question_id: QuestionId,
        label_id: LabelId,
    ) -> Result<LabelAssignment, WorkflowError> {
        let caller = policy::authenticate(caller)?;
        let gate = self.gate;
        self.mutate(|tx, _| gate.assign_label(tx, caller, question_id, label_id))
    }

    // ---- Administration ----

    /// Create or replace a monthly allocation
    ///
    /// # Errors
    /// `Unauthorized` for non-administrators
    pub fn set_budget_allocation(
        &self,
        caller: Option<&Caller>,
        allocation: BudgetAllocation,
    ) -> Result<(), WorkflowError> {
        let caller = policy::authenticate(caller)?;
        policy::require_admin(caller, "set budget allocation")?;
        let key = allocation.key();
        let max_alloc = allocation.max_alloc;
        self.mutate(|tx, _| Ok(tx.upsert_allocation(allocation)?))?;
        tracing::info!(
            month = %key.month_ref,
            dept = %key.dept_id,
            team = %key.team_id,
            max_alloc,
            "budget allocation set"
        );
        Ok(())
    }

    /// Create or replace a month budget
    ///
    /// # Errors
    /// `Unauthorized` for non-administrators
    pub fn set_month_budget(
        &self,
        caller: Option<&Caller>,
        budget: MonthBudget,
    ) -> Result<(), WorkflowError> {
        let caller = policy::authenticate(caller)?;
        policy::require_admin(caller, "set month budget")?;
        self.mutate(|tx, _| Ok(tx.upsert_month_budget(budget)?))
    }

    /// Register a question template
    ///
    /// # Errors
    /// `Unauthorized` for non-administrators, `MissingField("text")` for blank text
    pub fn add_question_template(
        &self,
        caller: Option<&Caller>,
        template: QuestionTemplate,
    ) -> Result<QuestionTemplate, WorkflowError> {
        let caller = policy::authenticate(caller)?;
        policy::require_admin(caller, "add question template")?;
        if template.text.trim().is_empty() {
            return Err(WorkflowError::MissingField("text"));
        }
        self.mutate(|tx, _| {
            tx.insert_template(template.clone())?;
            Ok(template)
        })
    }

    /// Admission and utilization of an allocation triple
    ///
    /// # Errors
    /// Propagates store failures
    pub fn slot_usage(
        &self,
        caller: Option<&Caller>,
        key: &AllocationKey,
    ) -> Result<SlotUsage, WorkflowError> {
        policy::authenticate(caller)?;
        let ledger = *self.engine.ledger();
        self.store.read(|tx| ledger.slot_usage(tx, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keydev_model::RoleSet;
    use keydev_store::MemoryStore;

    fn service() -> KeyDevService<MemoryStore> {
        KeyDevService::new(Arc::new(MemoryStore::new()), NotificationQueue::disabled())
    }

    fn requester() -> Caller {
        Caller::new("u1", RoleSet::of([Role::Requester]))
    }

    #[test]
    fn anonymous_calls_are_unauthenticated() {
        let svc = service();
        let err = svc
            .create_key_dev(None, NewKeyDev::new("t", "D", "T"))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthenticated));
        let err = svc.list_key_devs(None, &KeyDevFilter::default()).unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthenticated));
    }

    #[test]
    fn human_ids_are_sequential() {
        let svc = service();
        let caller = requester();
        let a = svc.create_key_dev(Some(&caller), NewKeyDev::new("a", "D", "T")).unwrap();
        let b = svc.create_key_dev(Some(&caller), NewKeyDev::new("b", "D", "T")).unwrap();
        assert_eq!(a.human_id.to_string(), "KD-001");
        assert_eq!(b.human_id.to_string(), "KD-002");
    }

    #[test]
    fn create_requires_requester_role_and_title() {
        let svc = service();
        let tv = Caller::new("tv", RoleSet::of([Role::TechValidator]));
        let err = svc.create_key_dev(Some(&tv), NewKeyDev::new("a", "D", "T")).unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthorized(_)));

        let err = svc
            .create_key_dev(Some(&requester()), NewKeyDev::new("  ", "D", "T"))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::MissingField("title")));
    }

    #[test]
    fn filter_excludes_deleted_and_other_teams() {
        let svc = service();
        let caller = requester();
        let keep = svc.create_key_dev(Some(&caller), NewKeyDev::new("a", "D", "T")).unwrap();
        let gone = svc.create_key_dev(Some(&caller), NewKeyDev::new("b", "D", "T")).unwrap();
        svc.create_key_dev(Some(&caller), NewKeyDev::new("c", "D", "OTHER")).unwrap();
        svc.soft_delete(Some(&caller), gone.id).unwrap();

        let rows = svc
            .list_key_devs(Some(&caller), &KeyDevFilter::default().with_team("T"))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, keep.id);

        let err = svc.get_key_dev(Some(&caller), gone.id).unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { .. }));
    }

    #[test]
    fn admin_surface_is_admin_only() {
        let svc = service();
        let month: MonthRef = "2026-07".parse().unwrap();
        let err = svc
            .set_budget_allocation(Some(&requester()), BudgetAllocation::new(month, "D", "T", 2))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Unauthorized(_)));
    }
}
