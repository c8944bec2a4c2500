//! Question/answer entities of the validation sub-workflow

use crate::ids::{AnswerId, KeyDevId, LabelId, QuestionId, TemplateId, UserId};
use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Where a question came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionSource {
    /// Copied from an active template when the question phase started
    Template,
    /// Added by a user afterwards
    Manual,
}

/// A question attached to a KeyDev
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub key_dev_id: KeyDevId,
    pub text: String,
    pub source: QuestionSource,
    /// Position within the KeyDev's question list
    pub order: u32,
    /// Answer accepted by the owner
    pub validated_answer_id: Option<AnswerId>,
    pub created_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Question {
    /// Create a question
    #[must_use]
    pub fn new(
        key_dev_id: KeyDevId,
        text: impl Into<String>,
        source: QuestionSource,
        order: u32,
        now: Timestamp,
    ) -> Self {
        Self {
            id: QuestionId::new(),
            key_dev_id,
            text: text.into(),
            source,
            order,
            validated_answer_id: None,
            created_at: now,
            deleted_at: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    #[inline]
    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.validated_answer_id.is_some()
    }
}

/// Intended reader of an answer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "userId")]
pub enum RecipientRole {
    /// The KeyDev's owner
    Owner,
    /// The KeyDev's requester
    Requester,
    /// A specific user
    User(UserId),
}

/// An answer to a question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: AnswerId,
    pub question_id: QuestionId,
    pub body: String,
    pub sender_id: UserId,
    pub recipient_role: RecipientRole,
    pub ts: Timestamp,
    pub edited_at: Option<Timestamp>,
}

impl Answer {
    /// Create an answer
    #[must_use]
    pub fn new(
        question_id: QuestionId,
        body: impl Into<String>,
        sender_id: UserId,
        recipient_role: RecipientRole,
        now: Timestamp,
    ) -> Self {
        Self {
            id: AnswerId::new(),
            question_id,
            body: body.into(),
            sender_id,
            recipient_role,
            ts: now,
            edited_at: None,
        }
    }
}

/// Template copied into every KeyDev when its question phase starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTemplate {
    pub id: TemplateId,
    pub text: String,
    pub order: u32,
    pub active: bool,
}

impl QuestionTemplate {
    /// Create an active template
    #[must_use]
    pub fn new(text: impl Into<String>, order: u32) -> Self {
        Self {
            id: TemplateId::new(),
            text: text.into(),
            order,
            active: true,
        }
    }

    /// Mark inactive
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Link between a question and a label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelAssignment {
    pub question_id: QuestionId,
    pub label_id: LabelId,
}
