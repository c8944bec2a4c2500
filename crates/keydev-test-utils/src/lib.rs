//! Testing utilities for the KeyDev workspace
//!
//! Shared fixtures: callers for every role, a manual clock, a recording
//! notification sink and a seeded in-memory service.

#![allow(missing_docs)]

use chrono::{Duration, TimeZone, Utc};
use keydev_model::{
    BudgetAllocation, Caller, KeyDev, KeyDevId, KeyDevStatus, MonthRef, NewKeyDev,
    QuestionTemplate, Role, RoleSet, Timestamp, Weight,
};
use keydev_store::MemoryStore;
use keydev_workflow::{
    Clock, DraftUpdate, KeyDevService, NotificationError, NotificationQueue, NotificationSink,
    NotificationTask, TransitionRequest, WorkflowError,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const DEPT: &str = "D";
pub const TEAM: &str = "T";

pub fn caller(id: &str, roles: &[Role]) -> Caller {
    Caller::new(id, RoleSet::new(roles.iter().copied()).unwrap())
}

pub fn requester() -> Caller {
    caller("u1", &[Role::Requester]).with_dept(DEPT)
}

pub fn tech_validator() -> Caller {
    caller("tv1", &[Role::TechValidator]).with_dept(DEPT)
}

pub fn business_validator() -> Caller {
    caller("bv1", &[Role::BusinessValidator]).with_dept(DEPT)
}

pub fn admin() -> Caller {
    caller("admin", &[Role::Admin]).with_dept(DEPT)
}

pub fn month() -> MonthRef {
    "2026-03".parse().unwrap()
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

/// Sink that keeps every delivered task
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<NotificationTask>>,
}

impl RecordingSink {
    pub fn tasks(&self) -> Vec<NotificationTask> {
        self.delivered.lock().clone()
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, task: &NotificationTask) -> Result<(), NotificationError> {
        self.delivered.lock().push(task.clone());
        Ok(())
    }
}

/// Service over a fresh store with its notification receiver and clock
pub struct Fixture {
    pub service: KeyDevService<MemoryStore>,
    pub notifications: mpsc::Receiver<NotificationTask>,
    pub clock: Arc<ManualClock>,
}

impl Fixture {
    /// Empty store, queue of 64
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::default());
        let (queue, notifications) = NotificationQueue::bounded(64);
        let service = KeyDevService::new(Arc::new(MemoryStore::new()), queue)
            .with_clock(clock.clone());
        Self {
            service,
            notifications,
            clock,
        }
    }

    /// Allocation of `max_alloc` for `month()/DEPT/TEAM` plus two templates
    pub fn seeded(max_alloc: u32) -> Self {
        let fixture = Self::new();
        let admin = admin();
        fixture
            .service
            .set_budget_allocation(
                Some(&admin),
                BudgetAllocation::new(month(), DEPT, TEAM, max_alloc),
            )
            .unwrap();
        for (order, text) in ["Scope agreed?", "Data owner known?"].into_iter().enumerate() {
            fixture
                .service
                .add_question_template(Some(&admin), QuestionTemplate::new(text, order as u32))
                .unwrap();
        }
        fixture
    }

    pub fn create(&self, title: &str) -> KeyDev {
        self.service
            .create_key_dev(Some(&requester()), NewKeyDev::new(title, DEPT, TEAM))
            .unwrap()
    }

    /// Drive a KeyDev forward along the happy path up to `target`
    ///
    /// Stops at the first failing step and returns its error.
    pub fn drive_to(&self, id: KeyDevId, target: KeyDevStatus) -> Result<KeyDev, WorkflowError> {
        let svc = &self.service;
        let steps = [
            (
                KeyDevStatus::MockupDone,
                requester(),
                TransitionRequest::new(id, KeyDevStatus::MockupDone),
            ),
            (
                KeyDevStatus::Approved,
                tech_validator(),
                TransitionRequest::new(id, KeyDevStatus::Approved).with_weight(Weight::Half),
            ),
            (
                KeyDevStatus::FrontValidated,
                business_validator(),
                TransitionRequest::new(id, KeyDevStatus::FrontValidated)
                    .with_month_ref(month())
                    .with_validated_mockup_commit("4f2a9c1"),
            ),
            (
                KeyDevStatus::InProgress,
                tech_validator(),
                TransitionRequest::new(id, KeyDevStatus::InProgress),
            ),
            (
                KeyDevStatus::Done,
                tech_validator(),
                TransitionRequest::new(id, KeyDevStatus::Done)
                    .with_repo_url("https://git.example/app")
                    .with_release_commit("9e1d0b7"),
            ),
            (
                KeyDevStatus::Checked,
                admin(),
                TransitionRequest::new(id, KeyDevStatus::Checked),
            ),
        ];

        let record = svc.get_key_dev(Some(&admin()), id)?;
        if record.status == KeyDevStatus::Draft
            && target > KeyDevStatus::Draft
            && record.mockup_repo_url.is_none()
        {
            svc.update_draft(
                Some(&requester()),
                id,
                DraftUpdate::default().with_mockup_repo_url("https://git.example/mockup"),
            )?;
        }

        for (status, who, request) in steps {
            if status > target {
                break;
            }
            let current = svc.get_key_dev(Some(&who), id)?.status;
            if current >= status {
                continue;
            }
            svc.transition(Some(&who), &request)?;
        }
        svc.get_key_dev(Some(&admin()), id)
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}
