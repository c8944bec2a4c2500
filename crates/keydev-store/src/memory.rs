//! In-memory document store
//!
//! Tables are persistent maps (`im`), so opening a unit of work clones them
//! in O(1). The unit mutates its private copy and the copy replaces the
//! published tables only when the unit succeeds. A single mutex serializes
//! units, which gives the serializable isolation the workflow relies on for
//! its capacity check.

use crate::error::{StoreError, StoreResult};
use crate::tx::{DocumentStore, StoreTx};
use im::{OrdMap, OrdSet};
use keydev_model::{
    AllocationKey, Answer, AnswerId, BudgetAllocation, DeptId, HumanId, KeyDev, KeyDevId,
    KeyDevStatus, LabelAssignment, MonthBudget, MonthRef, Question, QuestionId,
    QuestionTemplate, TeamId, TemplateId,
};
use parking_lot::Mutex;
use std::fmt;

type MonthBudgetKey = (MonthRef, Option<TeamId>);

/// Published state of the store
#[derive(Debug, Clone, Default)]
struct Tables {
    key_devs: OrdMap<KeyDevId, KeyDev>,
    human_ids: OrdMap<HumanId, KeyDevId>,
    by_dept_month: OrdMap<(DeptId, MonthRef), OrdSet<KeyDevId>>,
    allocations: OrdMap<AllocationKey, BudgetAllocation>,
    month_budgets: OrdMap<MonthBudgetKey, MonthBudget>,
    questions: OrdMap<QuestionId, Question>,
    questions_by_key_dev: OrdMap<KeyDevId, OrdSet<QuestionId>>,
    answers: OrdMap<AnswerId, Answer>,
    answers_by_question: OrdMap<QuestionId, OrdSet<AnswerId>>,
    templates: OrdMap<TemplateId, QuestionTemplate>,
    label_links: OrdSet<LabelAssignment>,
}

fn index_add<K, V>(index: &mut OrdMap<K, OrdSet<V>>, key: K, value: V)
where
    K: Ord + Clone,
    V: Ord + Clone,
{
    let mut set = index.get(&key).cloned().unwrap_or_default();
    set.insert(value);
    index.insert(key, set);
}

fn index_remove<K, V>(index: &mut OrdMap<K, OrdSet<V>>, key: &K, value: &V)
where
    K: Ord + Clone,
    V: Ord + Clone,
{
    if let Some(set) = index.get(key) {
        let mut set = set.clone();
        set.remove(value);
        if set.is_empty() {
            index.remove(key);
        } else {
            index.insert(key.clone(), set);
        }
    }
}

impl Tables {
    fn dept_month_key(key_dev: &KeyDev) -> Option<(DeptId, MonthRef)> {
        key_dev
            .month_ref
            .as_ref()
            .map(|month| (key_dev.dept_id.clone(), month.clone()))
    }

    fn collect_key_devs(&self, predicate: impl Fn(&KeyDev) -> bool) -> Vec<KeyDev> {
        self.key_devs
            .values()
            .filter(|kd| predicate(kd))
            .cloned()
            .collect()
    }
}

impl StoreTx for Tables {
    fn key_dev(&self, id: KeyDevId) -> StoreResult<Option<KeyDev>> {
        Ok(self.key_devs.get(&id).cloned())
    }

    fn insert_key_dev(&mut self, key_dev: KeyDev) -> StoreResult<()> {
        if self.key_devs.contains_key(&key_dev.id) {
            return Err(StoreError::duplicate("key dev", key_dev.id));
        }
        if self.human_ids.contains_key(&key_dev.human_id) {
            return Err(StoreError::duplicate("human id", key_dev.human_id));
        }
        if let Some(key) = Self::dept_month_key(&key_dev) {
            index_add(&mut self.by_dept_month, key, key_dev.id);
        }
        self.human_ids.insert(key_dev.human_id, key_dev.id);
        self.key_devs.insert(key_dev.id, key_dev);
        Ok(())
    }

    fn replace_key_dev(&mut self, key_dev: KeyDev) -> StoreResult<()> {
        let previous = self
            .key_devs
            .get(&key_dev.id)
            .cloned()
            .ok_or_else(|| StoreError::missing("key dev", key_dev.id))?;

        let old_key = Self::dept_month_key(&previous);
        let new_key = Self::dept_month_key(&key_dev);
        if old_key != new_key {
            if let Some(key) = old_key {
                index_remove(&mut self.by_dept_month, &key, &key_dev.id);
            }
            if let Some(key) = new_key {
                index_add(&mut self.by_dept_month, key, key_dev.id);
            }
        }
        self.key_devs.insert(key_dev.id, key_dev);
        Ok(())
    }

    fn highest_human_id(&self) -> StoreResult<Option<HumanId>> {
        Ok(self.human_ids.get_max().map(|(human_id, _)| *human_id))
    }

    fn all_key_devs(&self) -> StoreResult<Vec<KeyDev>> {
        Ok(self.key_devs.values().cloned().collect())
    }

    fn key_devs_by_status(&self, status: KeyDevStatus) -> StoreResult<Vec<KeyDev>> {
        Ok(self.collect_key_devs(|kd| kd.status == status))
    }

    fn key_devs_by_month(&self, month: &MonthRef) -> StoreResult<Vec<KeyDev>> {
        Ok(self.collect_key_devs(|kd| kd.month_ref.as_ref() == Some(month)))
    }

    fn key_devs_by_dept_month(
        &self,
        dept: &DeptId,
        month: &MonthRef,
    ) -> StoreResult<Vec<KeyDev>> {
        let key = (dept.clone(), month.clone());
        Ok(self
            .by_dept_month
            .get(&key)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.key_devs.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn key_devs_by_team(&self, team: &TeamId) -> StoreResult<Vec<KeyDev>> {
        Ok(self.collect_key_devs(|kd| &kd.team_id == team))
    }

    fn allocation(&self, key: &AllocationKey) -> StoreResult<Option<BudgetAllocation>> {
        Ok(self.allocations.get(key).cloned())
    }

    fn upsert_allocation(&mut self, allocation: BudgetAllocation) -> StoreResult<()> {
        self.allocations.insert(allocation.key(), allocation);
        Ok(())
    }

    fn month_budget(
        &self,
        month: &MonthRef,
        team: Option<&TeamId>,
    ) -> StoreResult<Option<MonthBudget>> {
        let key = (month.clone(), team.cloned());
        Ok(self.month_budgets.get(&key).cloned())
    }

    fn upsert_month_budget(&mut self, budget: MonthBudget) -> StoreResult<()> {
        let key = (budget.month_ref.clone(), budget.team_id.clone());
        self.month_budgets.insert(key, budget);
        Ok(())
    }

    fn question(&self, id: QuestionId) -> StoreResult<Option<Question>> {
        Ok(self.questions.get(&id).cloned())
    }

    fn insert_question(&mut self, question: Question) -> StoreResult<()> {
        if self.questions.contains_key(&question.id) {
            return Err(StoreError::duplicate("question", question.id));
        }
        index_add(&mut self.questions_by_key_dev, question.key_dev_id, question.id);
        self.questions.insert(question.id, question);
        Ok(())
    }

    fn replace_question(&mut self, question: Question) -> StoreResult<()> {
        if !self.questions.contains_key(&question.id) {
            return Err(StoreError::missing("question", question.id));
        }
        self.questions.insert(question.id, question);
        Ok(())
    }

    fn questions_by_key_dev(&self, key_dev: KeyDevId) -> StoreResult<Vec<Question>> {
        let mut questions: Vec<Question> = self
            .questions_by_key_dev
            .get(&key_dev)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.questions.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        questions.sort_by_key(|q| (q.order, q.id));
        Ok(questions)
    }

    fn answer(&self, id: AnswerId) -> StoreResult<Option<Answer>> {
        Ok(self.answers.get(&id).cloned())
    }

    fn insert_answer(&mut self, answer: Answer) -> StoreResult<()> {
        if self.answers.contains_key(&answer.id) {
            return Err(StoreError::duplicate("answer", answer.id));
        }
        index_add(&mut self.answers_by_question, answer.question_id, answer.id);
        self.answers.insert(answer.id, answer);
        Ok(())
    }

    fn replace_answer(&mut self, answer: Answer) -> StoreResult<()> {
        if !self.answers.contains_key(&answer.id) {
            return Err(StoreError::missing("answer", answer.id));
        }
        self.answers.insert(answer.id, answer);
        Ok(())
    }

    fn delete_answer(&mut self, id: AnswerId) -> StoreResult<()> {
        let answer = self
            .answers
            .remove(&id)
            .ok_or_else(|| StoreError::missing("answer", id))?;
        index_remove(&mut self.answers_by_question, &answer.question_id, &id);
        Ok(())
    }

    fn answers_by_question(&self, question: QuestionId) -> StoreResult<Vec<Answer>> {
        // ULIDs sort by creation time.
        Ok(self
            .answers_by_question
            .get(&question)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.answers.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn insert_template(&mut self, template: QuestionTemplate) -> StoreResult<()> {
        if self.templates.contains_key(&template.id) {
            return Err(StoreError::duplicate("template", template.id));
        }
        self.templates.insert(template.id, template);
        Ok(())
    }

    fn active_templates(&self) -> StoreResult<Vec<QuestionTemplate>> {
        let mut templates: Vec<QuestionTemplate> = self
            .templates
            .values()
            .filter(|t| t.active)
            .cloned()
            .collect();
        templates.sort_by_key(|t| (t.order, t.id));
        Ok(templates)
    }

    fn insert_label_link(&mut self, link: LabelAssignment) -> StoreResult<()> {
        self.label_links.insert(link);
        Ok(())
    }

    fn delete_label_link(&mut self, link: &LabelAssignment) -> StoreResult<()> {
        self.label_links
            .remove(link)
            .map(|_| ())
            .ok_or_else(|| StoreError::missing("label link", link.label_id))
    }

    fn label_links_by_question(
        &self,
        question: QuestionId,
    ) -> StoreResult<Vec<LabelAssignment>> {
        Ok(self
            .label_links
            .iter()
            .filter(|link| link.question_id == question)
            .copied()
            .collect())
    }
}

/// In-memory store with serializable units of work
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.lock();
        f.debug_struct("MemoryStore")
            .field("key_devs", &tables.key_devs.len())
            .field("questions", &tables.questions.len())
            .field("answers", &tables.answers.len())
            .finish()
    }
}

impl DocumentStore for MemoryStore {
    fn transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut published = self.tables.lock();
        let mut working = published.clone();
        match f(&mut working) {
            Ok(out) => {
                *published = working;
                Ok(out)
            }
            Err(err) => {
                tracing::trace!("unit of work aborted, staged writes discarded");
                Err(err)
            }
        }
    }

    fn read<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&dyn StoreTx) -> Result<R, E>,
        E: From<StoreError>,
    {
        let snapshot = self.tables.lock().clone();
        f(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use keydev_model::{NewKeyDev, QuestionSource, RecipientRole, UserId};
    use pretty_assertions::assert_eq;

    fn draft(seq: u32) -> KeyDev {
        KeyDev::draft(
            HumanId::from_seq(seq),
            UserId::from("u1"),
            NewKeyDev::new(format!("kd {seq}"), "D", "T"),
            Utc::now(),
        )
    }

    fn month(s: &str) -> MonthRef {
        s.parse().unwrap()
    }

    #[test]
    fn insert_and_fetch_key_dev() {
        let store = MemoryStore::new();
        let kd = draft(1);
        let id = kd.id;

        store
            .transaction(|tx| tx.insert_key_dev(kd.clone()))
            .unwrap();

        let fetched = store.read(|tx| tx.key_dev(id)).unwrap();
        assert_eq!(fetched, Some(kd));
    }

    #[test]
    fn duplicate_human_id_rejected() {
        let store = MemoryStore::new();
        store.transaction(|tx| tx.insert_key_dev(draft(1))).unwrap();

        let err = store
            .transaction(|tx| tx.insert_key_dev(draft(1)))
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { entity: "human id", .. }));
    }

    #[test]
    fn failed_unit_publishes_nothing() {
        let store = MemoryStore::new();
        let result: Result<(), StoreError> = store.transaction(|tx| {
            tx.insert_key_dev(draft(1))?;
            tx.insert_key_dev(draft(2))?;
            Err(StoreError::Unavailable("boom".into()))
        });
        assert!(result.is_err());

        let all = store.read(|tx| tx.all_key_devs()).unwrap();
        assert!(all.is_empty());
        assert_eq!(store.read(|tx| tx.highest_human_id()).unwrap(), None);
    }

    #[test]
    fn highest_human_id_tracks_max() {
        let store = MemoryStore::new();
        store
            .transaction(|tx| {
                tx.insert_key_dev(draft(3))?;
                tx.insert_key_dev(draft(11))?;
                tx.insert_key_dev(draft(7))
            })
            .unwrap();
        assert_eq!(
            store.read(|tx| tx.highest_human_id()).unwrap(),
            Some(HumanId::from_seq(11))
        );
    }

    #[test]
    fn dept_month_index_follows_replacements() {
        let store = MemoryStore::new();
        let mut kd = draft(1);
        store.transaction(|tx| tx.insert_key_dev(kd.clone())).unwrap();

        let d = DeptId::from("D");
        let jan = month("2026-01");
        let feb = month("2026-02");
        assert!(store.read(|tx| tx.key_devs_by_dept_month(&d, &jan)).unwrap().is_empty());

        kd.month_ref = Some(jan.clone());
        store.transaction(|tx| tx.replace_key_dev(kd.clone())).unwrap();
        assert_eq!(store.read(|tx| tx.key_devs_by_dept_month(&d, &jan)).unwrap().len(), 1);

        kd.month_ref = Some(feb.clone());
        store.transaction(|tx| tx.replace_key_dev(kd.clone())).unwrap();
        assert!(store.read(|tx| tx.key_devs_by_dept_month(&d, &jan)).unwrap().is_empty());
        assert_eq!(store.read(|tx| tx.key_devs_by_dept_month(&d, &feb)).unwrap().len(), 1);
        assert_eq!(store.read(|tx| tx.key_devs_by_month(&feb)).unwrap().len(), 1);
    }

    #[test]
    fn replace_unknown_key_dev_fails() {
        let store = MemoryStore::new();
        let err = store
            .transaction(|tx| tx.replace_key_dev(draft(1)))
            .unwrap_err();
        assert!(matches!(err, StoreError::Missing { .. }));
    }

    #[test]
    fn questions_sorted_by_order() {
        let store = MemoryStore::new();
        let kd = KeyDevId::new();
        let now = Utc::now();
        store
            .transaction(|tx| {
                tx.insert_question(Question::new(kd, "second", QuestionSource::Manual, 2, now))?;
                tx.insert_question(Question::new(kd, "first", QuestionSource::Template, 1, now))
            })
            .unwrap();

        let texts: Vec<String> = store
            .read(|tx| tx.questions_by_key_dev(kd))
            .unwrap()
            .into_iter()
            .map(|q| q.text)
            .collect();
        assert_eq!(texts, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn answer_delete_updates_index() {
        let store = MemoryStore::new();
        let question = QuestionId::new();
        let answer = Answer::new(question, "yes", UserId::from("u1"), RecipientRole::Owner, Utc::now());
        let answer_id = answer.id;

        store.transaction(|tx| tx.insert_answer(answer)).unwrap();
        assert_eq!(store.read(|tx| tx.answers_by_question(question)).unwrap().len(), 1);

        store.transaction(|tx| tx.delete_answer(answer_id)).unwrap();
        assert!(store.read(|tx| tx.answers_by_question(question)).unwrap().is_empty());
        assert!(store.read(|tx| tx.answer(answer_id)).unwrap().is_none());
    }

    #[test]
    fn inactive_templates_hidden() {
        let store = MemoryStore::new();
        store
            .transaction(|tx| {
                tx.insert_template(QuestionTemplate::new("b", 2))?;
                tx.insert_template(QuestionTemplate::new("a", 1))?;
                tx.insert_template(QuestionTemplate::new("old", 0).inactive())
            })
            .unwrap();

        let texts: Vec<String> = store
            .read(|tx| tx.active_templates())
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn allocation_upsert_overwrites() {
        let store = MemoryStore::new();
        let alloc = BudgetAllocation::new(month("2026-01"), "D", "T", 2);
        let key = alloc.key();
        store.transaction(|tx| tx.upsert_allocation(alloc)).unwrap();
        store
            .transaction(|tx| tx.upsert_allocation(BudgetAllocation::new(month("2026-01"), "D", "T", 5)))
            .unwrap();

        let stored = store.read(|tx| tx.allocation(&key)).unwrap().unwrap();
        assert_eq!(stored.max_alloc, 5);
    }
}
