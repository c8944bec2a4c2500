//! Question validation gate
//!
//! Tracks the questions raised against a KeyDev and derives its status from
//! them: once at least one live question exists, the KeyDev is `Approved`
//! when every live question has a validated answer and `Rejected` otherwise.
//! Every mutation that can change that answer ends with a recompute.

use crate::engine::{load_active, StatusTransitionEngine};
use crate::error::WorkflowError;
use crate::notify::{NotificationEvent, NotificationTask};
use crate::policy;
use keydev_model::{
    Answer, AnswerId, Caller, KeyDev, KeyDevId, KeyDevStatus, LabelAssignment, LabelId, Question,
    QuestionId, QuestionSource, RecipientRole, Timestamp, UserId, Weight,
};
use keydev_store::StoreTx;

/// Result of a gate mutation
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome<T> {
    /// Operation result
    pub value: T,
    /// Notifications to schedule once the unit commits
    pub notifications: Vec<NotificationTask>,
    /// Status pushed by the recompute, if it changed
    pub derived: Option<KeyDevStatus>,
}

impl<T> GateOutcome<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            notifications: Vec::new(),
            derived: None,
        }
    }

    fn notify(mut self, task: Option<NotificationTask>) -> Self {
        self.notifications.extend(task);
        self
    }

    fn derived(mut self, derived: Option<KeyDevStatus>) -> Self {
        self.derived = derived;
        self
    }
}

/// Derived status of a set of live questions
///
/// `None` when there are no questions.
#[must_use]
pub fn derive_status(questions: &[Question]) -> Option<KeyDevStatus> {
    if questions.is_empty() {
        return None;
    }
    if questions.iter().all(Question::is_validated) {
        Some(KeyDevStatus::Approved)
    } else {
        Some(KeyDevStatus::Rejected)
    }
}

/// Resolve the user a recipient role points at
#[must_use]
pub fn resolve_recipient(key_dev: &KeyDev, role: &RecipientRole) -> Option<UserId> {
    match role {
        RecipientRole::Owner => key_dev.owner_id.clone(),
        RecipientRole::Requester => Some(key_dev.requester_id.clone()),
        RecipientRole::User(user) => Some(user.clone()),
    }
}

fn load_question(tx: &dyn StoreTx, id: QuestionId) -> Result<Question, WorkflowError> {
    match tx.question(id)? {
        Some(q) if !q.is_deleted() => Ok(q),
        _ => Err(WorkflowError::not_found("question", id)),
    }
}

fn load_answer(tx: &dyn StoreTx, id: AnswerId) -> Result<Answer, WorkflowError> {
    tx.answer(id)?
        .ok_or_else(|| WorkflowError::not_found("answer", id))
}

fn answer_notification(
    event: NotificationEvent,
    key_dev: &KeyDev,
    answer: &Answer,
) -> Option<NotificationTask> {
    match resolve_recipient(key_dev, &answer.recipient_role) {
        Some(recipient) => Some(NotificationTask::new(event, answer.id, key_dev.id, recipient)),
        None => {
            tracing::warn!(
                key_dev = %key_dev.human_id,
                answer = %answer.id,
                "notification recipient unresolved, skipping"
            );
            None
        }
    }
}

/// Question lifecycle and status derivation
#[derive(Debug, Clone, Copy, Default)]
pub struct QuestionValidationGate {
    engine: StatusTransitionEngine,
}

impl QuestionValidationGate {
    /// Create gate pushing derived statuses through `engine`
    #[inline]
    #[must_use]
    pub fn new(engine: StatusTransitionEngine) -> Self {
        Self { engine }
    }

    /// Live questions of a KeyDev in order
    ///
    /// # Errors
    /// Propagates store failures
    pub fn list_questions(
        &self,
        tx: &dyn StoreTx,
        key_dev_id: KeyDevId,
    ) -> Result<Vec<Question>, WorkflowError> {
        Ok(tx
            .questions_by_key_dev(key_dev_id)?
            .into_iter()
            .filter(|q| !q.is_deleted())
            .collect())
    }

    /// Answers of a live question
    ///
    /// # Errors
    /// `NotFound` for missing or deleted questions
    pub fn list_answers(
        &self,
        tx: &dyn StoreTx,
        question_id: QuestionId,
    ) -> Result<Vec<Answer>, WorkflowError> {
        load_question(tx, question_id)?;
        Ok(tx.answers_by_question(question_id)?)
    }

    /// Re-derive and push the KeyDev's status
    ///
    /// Returns the pushed status when it changed.
    ///
    /// # Errors
    /// Propagates engine and store failures
    pub fn recompute(
        &self,
        tx: &mut dyn StoreTx,
        key_dev_id: KeyDevId,
        now: Timestamp,
    ) -> Result<Option<KeyDevStatus>, WorkflowError> {
        let questions = self.list_questions(&*tx, key_dev_id)?;
        let Some(target) = derive_status(&questions) else {
            tracing::debug!(key_dev = %key_dev_id, "no live questions, status untouched");
            return Ok(None);
        };
        let changed = self.engine.set_derived_status(tx, key_dev_id, target, now)?;
        Ok(changed.then_some(target))
    }

    /// Seed the question set from the active templates
    ///
    /// A KeyDev that already has live questions keeps them unchanged.
    ///
    /// # Errors
    /// - `Unauthorized` unless the caller owns the KeyDev or is an administrator
    /// - `MissingField("ownerId")` before an owner is assigned
    /// - `NotFound` when no active template exists
    pub fn start_question_phase(
        &self,
        tx: &mut dyn StoreTx,
        caller: &Caller,
        key_dev_id: KeyDevId,
        weight: Option<Weight>,
        now: Timestamp,
    ) -> Result<GateOutcome<Vec<Question>>, WorkflowError> {
        let mut key_dev = load_active(&*tx, key_dev_id)?;
        policy::require_owner_or_admin(caller, &key_dev, "start question phase")?;
        if key_dev.owner_id.is_none() {
            return Err(WorkflowError::MissingField("ownerId"));
        }

        let existing = self.list_questions(&*tx, key_dev_id)?;
        if !existing.is_empty() {
            tracing::debug!(
                key_dev = %key_dev.human_id,
                questions = existing.len(),
                "question phase already started"
            );
            return Ok(GateOutcome::new(existing));
        }

        let templates = tx.active_templates()?;
        if templates.is_empty() {
            return Err(WorkflowError::not_found("question template", "active"));
        }

        if let Some(weight) = weight {
            key_dev.weight = Some(weight);
            key_dev.updated_at = now;
            tx.replace_key_dev(key_dev.clone())?;
        }

        let mut created = Vec::with_capacity(templates.len());
        for template in templates {
            let question = Question::new(
                key_dev_id,
                template.text,
                QuestionSource::Template,
                template.order,
                now,
            );
            tx.insert_question(question.clone())?;
            created.push(question);
        }
        tracing::info!(
            key_dev = %key_dev.human_id,
            questions = created.len(),
            "question phase started"
        );

        let derived = self.recompute(tx, key_dev_id, now)?;
        Ok(GateOutcome::new(created).derived(derived))
    }

    /// Append a manual question
    ///
    /// # Errors
    /// - `NotFound` for missing or soft-deleted KeyDevs
    /// - `MissingField("text")` for blank text
    pub fn create_question(
        &self,
        tx: &mut dyn StoreTx,
        caller: &Caller,
        key_dev_id: KeyDevId,
        text: &str,
        now: Timestamp,
    ) -> Result<GateOutcome<Question>, WorkflowError> {
        let key_dev = load_active(&*tx, key_dev_id)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(WorkflowError::MissingField("text"));
        }

        let order = tx
            .questions_by_key_dev(key_dev_id)?
            .iter()
            .map(|q| q.order)
            .max()
            .map_or(1, |highest| highest + 1);
        let question = Question::new(key_dev_id, text, QuestionSource::Manual, order, now);
        tx.insert_question(question.clone())?;
        tracing::info!(key_dev = %key_dev.human_id, question = %question.id, order, "question created");

        let notification = key_dev
            .owner_id
            .as_ref()
            .filter(|owner| **owner != caller.user_id)
            .map(|owner| {
                NotificationTask::new(
                    NotificationEvent::QuestionCreated,
                    question.id,
                    key_dev_id,
                    owner.clone(),
                )
            });

        let derived = self.recompute(tx, key_dev_id, now)?;
        Ok(GateOutcome::new(question)
            .notify(notification)
            .derived(derived))
    }

    /// Mark `answer_id` as the validated answer of `question_id`
    ///
    /// # Errors
    /// - `Unauthorized` unless the caller owns the KeyDev or is an administrator
    /// - `InvariantViolation` when the answer belongs to another question
    pub fn validate_answer(
        &self,
        tx: &mut dyn StoreTx,
        caller: &Caller,
        question_id: QuestionId,
        answer_id: AnswerId,
        now: Timestamp,
    ) -> Result<GateOutcome<Question>, WorkflowError> {
        let mut question = load_question(&*tx, question_id)?;
        let key_dev = load_active(&*tx, question.key_dev_id)?;
        policy::require_owner_or_admin(caller, &key_dev, "validate answer")?;

        let answer = load_answer(&*tx, answer_id)?;
        if answer.question_id != question.id {
            return Err(WorkflowError::InvariantViolation(format!(
                "answer {answer_id} belongs to question {}, not {question_id}",
                answer.question_id
            )));
        }

        question.validated_answer_id = Some(answer_id);
        tx.replace_question(question.clone())?;
        tracing::info!(key_dev = %key_dev.human_id, question = %question_id, answer = %answer_id, "answer validated");

        let derived = self.recompute(tx, key_dev.id, now)?;
        Ok(GateOutcome::new(question).derived(derived))
    }

    /// Soft-delete a question, hard-deleting its answers and label links
    ///
    /// # Errors
    /// `Unauthorized` unless the caller owns the KeyDev or is an administrator
    pub fn delete_question(
        &self,
        tx: &mut dyn StoreTx,
        caller: &Caller,
        question_id: QuestionId,
        now: Timestamp,
    ) -> Result<GateOutcome<()>, WorkflowError> {
        let mut question = load_question(&*tx, question_id)?;
        let key_dev = load_active(&*tx, question.key_dev_id)?;
        policy::require_owner_or_admin(caller, &key_dev, "delete question")?;

        let answers = tx.answers_by_question(question_id)?;
        for answer in &answers {
            tx.delete_answer(answer.id)?;
        }
        let links = tx.label_links_by_question(question_id)?;
        for link in &links {
            tx.delete_label_link(link)?;
        }
        question.deleted_at = Some(now);
        tx.replace_question(question)?;
        tracing::info!(
            key_dev = %key_dev.human_id,
            question = %question_id,
            answers = answers.len(),
            labels = links.len(),
            "question deleted"
        );

        let derived = self.recompute(tx, key_dev.id, now)?;
        Ok(GateOutcome::new(()).derived(derived))
    }

    /// Answer a live question
    ///
    /// # Errors
    /// - `NotFound` for missing questions or KeyDevs
    /// - `MissingField("body")` for a blank body
    pub fn create_answer(
        &self,
        tx: &mut dyn StoreTx,
        caller: &Caller,
        question_id: QuestionId,
        body: &str,
        recipient_role: RecipientRole,
        now: Timestamp,
    ) -> Result<GateOutcome<Answer>, WorkflowError> {
        let question = load_question(&*tx, question_id)?;
        let key_dev = load_active(&*tx, question.key_dev_id)?;
        if body.trim().is_empty() {
            return Err(WorkflowError::MissingField("body"));
        }

        let answer = Answer::new(
            question_id,
            body,
            caller.user_id.clone(),
            recipient_role,
            now,
        );
        tx.insert_answer(answer.clone())?;
        tracing::info!(key_dev = %key_dev.human_id, question = %question_id, answer = %answer.id, "answer created");

        let notification = answer_notification(NotificationEvent::AnswerCreated, &key_dev, &answer);
        Ok(GateOutcome::new(answer).notify(notification))
    }

    /// Edit an answer's body
    ///
    /// # Errors
    /// - `Unauthorized` unless the caller sent the answer or is an administrator
    /// - `InvariantViolation` when the answer is its question's validated answer
    pub fn update_answer(
        &self,
        tx: &mut dyn StoreTx,
        caller: &Caller,
        answer_id: AnswerId,
        body: &str,
        now: Timestamp,
    ) -> Result<GateOutcome<Answer>, WorkflowError> {
        let mut answer = load_answer(&*tx, answer_id)?;
        let question = load_question(&*tx, answer.question_id)?;
        let key_dev = load_active(&*tx, question.key_dev_id)?;

        if answer.sender_id != caller.user_id && !policy::is_admin(&caller.roles) {
            return Err(WorkflowError::unauthorized(format!(
                "answer {answer_id} may only be edited by its sender"
            )));
        }
        if question.validated_answer_id == Some(answer_id) {
            return Err(WorkflowError::InvariantViolation(format!(
                "answer {answer_id} is the validated answer of question {} and cannot be edited",
                question.id
            )));
        }
        if body.trim().is_empty() {
            return Err(WorkflowError::MissingField("body"));
        }

        answer.body = body.to_owned();
        answer.edited_at = Some(now);
        tx.replace_answer(answer.clone())?;
        tracing::info!(key_dev = %key_dev.human_id, answer = %answer_id, "answer updated");

        let notification = answer_notification(NotificationEvent::AnswerUpdated, &key_dev, &answer);
        Ok(GateOutcome::new(answer).notify(notification))
    }

    /// Link a label to a live question
    ///
    /// # Errors
    /// `Unauthorized` unless the caller owns the KeyDev or is an administrator
    pub fn assign_label(
        &self,
        tx: &mut dyn StoreTx,
        caller: &Caller,
        question_id: QuestionId,
        label_id: LabelId,
    ) -> Result<LabelAssignment, WorkflowError> {
        let question = load_question(&*tx, question_id)?;
        let key_dev = load_active(&*tx, question.key_dev_id)?;
        policy::require_owner_or_admin(caller, &key_dev, "assign label")?;

        let link = LabelAssignment {
            question_id,
            label_id,
        };
        tx.insert_label_link(link)?;
        Ok(link)
    }
}
