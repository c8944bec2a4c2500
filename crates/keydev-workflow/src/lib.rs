//! KeyDev workflow core
//!
//! The business rules of a KeyDev's lifecycle:
//! - a status transition engine with per-edge role and data guards
//! - a monthly capacity ledger gating admission into development
//! - a question gate deriving `Approved`/`Rejected` from validated answers
//! - an authorization policy over caller role sets
//!
//! [`KeyDevService`] ties them to a [`keydev_store::DocumentStore`] and a
//! notification queue.
//!
//! # Example
//!
//! ```rust
//! use keydev_workflow::prelude::*;
//! use std::sync::Arc;
//!
//! let service = KeyDevService::new(Arc::new(MemoryStore::new()), NotificationQueue::disabled());
//! let requester = Caller::new("u1", RoleSet::of([Role::Requester]));
//!
//! let kd = service
//!     .create_key_dev(Some(&requester), NewKeyDev::new("CSV export", "D", "T"))
//!     .unwrap();
//! let kd = service
//!     .update_draft(
//!         Some(&requester),
//!         kd.id,
//!         DraftUpdate::default().with_mockup_repo_url("https://x"),
//!     )
//!     .unwrap();
//! assert_eq!(kd.status, KeyDevStatus::MockupDone);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod policy;
pub mod questions;
pub mod service;
pub mod telemetry;
pub mod transition;

pub use clock::{Clock, SystemClock};
pub use config::{ConfigError, LogFormat, WorkflowConfig};
pub use engine::StatusTransitionEngine;
pub use error::{ErrorKind, WorkflowError};
pub use ledger::{Admission, BudgetAllocationLedger, SlotUsage};
pub use notify::{
    NotificationError, NotificationEvent, NotificationQueue, NotificationSink, NotificationTask,
    NotificationWorker, TracingSink,
};
pub use questions::{derive_status, resolve_recipient, GateOutcome, QuestionValidationGate};
pub use service::{DraftUpdate, KeyDevFilter, KeyDevService};
pub use telemetry::TelemetryError;
pub use transition::{
    allowed_transitions, rewind_targets, Edge, TransitionReceipt, TransitionRequest,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the workflow
    pub use crate::{
        DraftUpdate, KeyDevFilter, KeyDevService, NotificationQueue, TransitionRequest,
        WorkflowError,
    };
    pub use keydev_model::{
        AllocationKey, BudgetAllocation, Caller, KeyDevStatus, MonthRef, NewKeyDev,
        QuestionTemplate, RecipientRole, Role, RoleSet, Weight,
    };
    pub use keydev_store::MemoryStore;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
