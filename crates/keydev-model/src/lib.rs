//! KeyDev Model - domain types for the KeyDev approval pipeline
//!
//! Defines the vocabulary shared by the store and the workflow engine:
//! - Identifiers (system ULIDs, human `KD-###` ids, user/department/team keys)
//! - The eight-state [`KeyDevStatus`] lifecycle and its total order
//! - Caller roles and the [`RoleSet`] capability set
//! - Validated value types ([`Weight`], [`MonthRef`])
//! - Entities: [`KeyDev`], [`Question`], [`Answer`], budgets and templates
//!
//! # Example
//!
//! ```rust
//! use keydev_model::{KeyDevStatus, MonthRef, Role, RoleSet, Weight};
//! use std::str::FromStr;
//!
//! let roles = RoleSet::of([Role::TechValidator]);
//! assert!(roles.has_role(Role::TechValidator));
//! assert!(!roles.is_admin());
//!
//! let month = MonthRef::from_str("2026-03").unwrap();
//! assert_eq!(month.as_str(), "2026-03");
//!
//! assert_eq!(Weight::try_from(0.5).unwrap(), Weight::Half);
//! assert!(KeyDevStatus::Draft < KeyDevStatus::Checked);
//! ```

#![warn(unreachable_pub)]

pub mod budget;
pub mod error;
pub mod ids;
pub mod key_dev;
pub mod question;
pub mod role;
pub mod status;
pub mod values;

pub use budget::{AllocationKey, BudgetAllocation, MonthBudget};
pub use error::ModelError;
pub use ids::{AnswerId, DeptId, HumanId, KeyDevId, LabelId, QuestionId, TeamId, TemplateId, UserId};
pub use key_dev::{KeyDev, NewKeyDev};
pub use question::{
    Answer, LabelAssignment, Question, QuestionSource, QuestionTemplate, RecipientRole,
};
pub use role::{Caller, Role, RoleSet};
pub use status::{Direction, KeyDevStatus};
pub use values::{MonthRef, Weight};

/// Timestamp type used across all entities
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
