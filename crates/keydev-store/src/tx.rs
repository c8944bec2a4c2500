//! Store contract
//!
//! [`StoreTx`] is object safe so the workflow core can run against any
//! backend. [`DocumentStore`] opens units of work and guarantees that a unit
//! either publishes all of its writes or none of them.

use crate::error::{StoreError, StoreResult};
use keydev_model::{
    AllocationKey, Answer, AnswerId, BudgetAllocation, DeptId, HumanId, KeyDev, KeyDevId,
    KeyDevStatus, LabelAssignment, MonthBudget, MonthRef, Question, QuestionId,
    QuestionTemplate, TeamId,
};

/// Operations available inside a unit of work
///
/// Queries return soft-deleted records too; filtering is the caller's
/// concern.
pub trait StoreTx {
    // -- KeyDevs ------------------------------------------------------------

    /// Fetch a KeyDev by id
    fn key_dev(&self, id: KeyDevId) -> StoreResult<Option<KeyDev>>;

    /// Insert a new KeyDev
    ///
    /// # Errors
    /// `StoreError::Duplicate` if the id or human id is taken
    fn insert_key_dev(&mut self, key_dev: KeyDev) -> StoreResult<()>;

    /// Replace a stored KeyDev with a full record
    ///
    /// # Errors
    /// `StoreError::Missing` if the id is unknown
    fn replace_key_dev(&mut self, key_dev: KeyDev) -> StoreResult<()>;

    /// Highest human id ever assigned, deleted records included
    fn highest_human_id(&self) -> StoreResult<Option<HumanId>>;

    /// All KeyDevs
    fn all_key_devs(&self) -> StoreResult<Vec<KeyDev>>;

    /// KeyDevs currently in `status`
    fn key_devs_by_status(&self, status: KeyDevStatus) -> StoreResult<Vec<KeyDev>>;

    /// KeyDevs planned for `month`
    fn key_devs_by_month(&self, month: &MonthRef) -> StoreResult<Vec<KeyDev>>;

    /// KeyDevs of `dept` planned for `month`
    fn key_devs_by_dept_month(&self, dept: &DeptId, month: &MonthRef)
        -> StoreResult<Vec<KeyDev>>;

    /// KeyDevs of `team`
    fn key_devs_by_team(&self, team: &TeamId) -> StoreResult<Vec<KeyDev>>;

    // -- Budgets ------------------------------------------------------------

    /// Allocation for a (month, dept, team) triple
    fn allocation(&self, key: &AllocationKey) -> StoreResult<Option<BudgetAllocation>>;

    /// Insert or overwrite an allocation
    fn upsert_allocation(&mut self, allocation: BudgetAllocation) -> StoreResult<()>;

    /// Month budget, optionally scoped to a team
    fn month_budget(&self, month: &MonthRef, team: Option<&TeamId>)
        -> StoreResult<Option<MonthBudget>>;

    /// Insert or overwrite a month budget
    fn upsert_month_budget(&mut self, budget: MonthBudget) -> StoreResult<()>;

    // -- Questions ----------------------------------------------------------

    /// Fetch a question by id
    fn question(&self, id: QuestionId) -> StoreResult<Option<Question>>;

    /// Insert a new question
    fn insert_question(&mut self, question: Question) -> StoreResult<()>;

    /// Replace a stored question
    fn replace_question(&mut self, question: Question) -> StoreResult<()>;

    /// Questions of a KeyDev ordered by `order`
    fn questions_by_key_dev(&self, key_dev: KeyDevId) -> StoreResult<Vec<Question>>;

    // -- Answers ------------------------------------------------------------

    /// Fetch an answer by id
    fn answer(&self, id: AnswerId) -> StoreResult<Option<Answer>>;

    /// Insert a new answer
    fn insert_answer(&mut self, answer: Answer) -> StoreResult<()>;

    /// Replace a stored answer
    fn replace_answer(&mut self, answer: Answer) -> StoreResult<()>;

    /// Hard-delete an answer
    fn delete_answer(&mut self, id: AnswerId) -> StoreResult<()>;

    /// Answers of a question in creation order
    fn answers_by_question(&self, question: QuestionId) -> StoreResult<Vec<Answer>>;

    // -- Templates and label links -----------------------------------------

    /// Insert a question template
    fn insert_template(&mut self, template: QuestionTemplate) -> StoreResult<()>;

    /// Active templates ordered by `order`
    fn active_templates(&self) -> StoreResult<Vec<QuestionTemplate>>;

    /// Link a label to a question (idempotent)
    fn insert_label_link(&mut self, link: LabelAssignment) -> StoreResult<()>;

    /// Remove a label link
    fn delete_label_link(&mut self, link: &LabelAssignment) -> StoreResult<()>;

    /// Label links of a question
    fn label_links_by_question(&self, question: QuestionId) -> StoreResult<Vec<LabelAssignment>>;
}

/// Document store able to run serializable units of work
pub trait DocumentStore: Send + Sync {
    /// Run `f` as one atomic, serializable unit
    ///
    /// Writes made through the transaction become visible only if `f`
    /// returns `Ok`. Concurrent units observe either none or all of them.
    fn transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<R, E>,
        E: From<StoreError>;

    /// Run `f` against a consistent read-only view
    fn read<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&dyn StoreTx) -> Result<R, E>,
        E: From<StoreError>;
}
