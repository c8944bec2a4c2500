//! Error types for the workflow core
//!
//! Every rejected mutation surfaces as one [`WorkflowError`] carrying a
//! human-readable reason. Nothing is written when an error is returned.

use keydev_model::{DeptId, KeyDevStatus, MonthRef, TeamId};
use keydev_store::StoreError;

/// Main workflow error type
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Entity missing or soft-deleted
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// No caller identity supplied
    #[error("authentication required")]
    Unauthenticated,

    /// Role, ownership or department guard failed
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Edge not legal from the current status
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: KeyDevStatus,
        /// Requested status
        to: KeyDevStatus,
    },

    /// A precondition field is absent or blank
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Budget gate refused the admission
    #[error(
        "capacity exhausted for {month_ref}/{dept_id}/{team_id}: {admitted} admitted, allocation {max_alloc}"
    )]
    CapacityExhausted {
        /// Month of the allocation
        month_ref: MonthRef,
        /// Department of the allocation
        dept_id: DeptId,
        /// Team of the allocation
        team_id: TeamId,
        /// Allocation ceiling (0 when no allocation exists)
        max_alloc: u32,
        /// KeyDevs already admitted
        admitted: usize,
    },

    /// Cross-entity consistency rule broken
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Persistence collaborator failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Classification of [`WorkflowError`] for callers and metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Unauthenticated,
    Unauthorized,
    InvalidTransition,
    MissingField,
    CapacityExhausted,
    InvariantViolation,
    Store,
}

impl ErrorKind {
    /// Stable label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::MissingField => "missing_field",
            ErrorKind::CapacityExhausted => "capacity_exhausted",
            ErrorKind::InvariantViolation => "invariant_violation",
            ErrorKind::Store => "store",
        }
    }
}

impl WorkflowError {
    /// Error kind
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::MissingField(_) => ErrorKind::MissingField,
            Self::CapacityExhausted { .. } => ErrorKind::CapacityExhausted,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::Store(_) => ErrorKind::Store,
        }
    }

    /// Check if the caller can fix the request and retry
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }

    /// Check if re-running the same request may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_retryable())
    }

    /// Not-found error for an entity id
    #[inline]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Unauthorized error with a reason
    #[inline]
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }
}
