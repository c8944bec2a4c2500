//! Authorization policy
//!
//! Pure predicates over a caller's role set plus the ownership guards built
//! on them. Guards return `Unauthorized` with the attempted action in the
//! message; none of them touch the store.

use crate::error::WorkflowError;
use keydev_model::{Caller, KeyDev, Role, RoleSet};

/// Whether `roles` contains `role`
#[inline]
#[must_use]
pub fn has_role(roles: &RoleSet, role: Role) -> bool {
    roles.has_role(role)
}

/// Whether `roles` contains `Admin`
#[inline]
#[must_use]
pub fn is_admin(roles: &RoleSet) -> bool {
    roles.is_admin()
}

/// Whether `roles` contains any of `candidates`
#[inline]
#[must_use]
pub fn has_any_role(roles: &RoleSet, candidates: &[Role]) -> bool {
    roles.has_any_role(candidates)
}

/// Resolve the caller or fail with `Unauthenticated`
///
/// # Errors
/// `WorkflowError::Unauthenticated` when no identity was supplied
pub fn authenticate(caller: Option<&Caller>) -> Result<&Caller, WorkflowError> {
    caller.ok_or(WorkflowError::Unauthenticated)
}

/// Require `role`; administrators pass
///
/// # Errors
/// `WorkflowError::Unauthorized` when the caller lacks the role
pub fn require_role(caller: &Caller, role: Role, action: &str) -> Result<(), WorkflowError> {
    require_any_role(caller, &[role], action)
}

/// Require any of `candidates`; administrators pass
///
/// # Errors
/// `WorkflowError::Unauthorized` when the caller holds none of them
pub fn require_any_role(
    caller: &Caller,
    candidates: &[Role],
    action: &str,
) -> Result<(), WorkflowError> {
    if is_admin(&caller.roles) || has_any_role(&caller.roles, candidates) {
        return Ok(());
    }
    let needed: Vec<&str> = candidates.iter().map(|r| r.as_str()).collect();
    Err(WorkflowError::unauthorized(format!(
        "{action} requires one of [{}], {} holds none",
        needed.join(", "),
        caller.user_id
    )))
}

/// Require the `Admin` role
///
/// # Errors
/// `WorkflowError::Unauthorized` for non-administrators
pub fn require_admin(caller: &Caller, action: &str) -> Result<(), WorkflowError> {
    if is_admin(&caller.roles) {
        Ok(())
    } else {
        Err(WorkflowError::unauthorized(format!(
            "{action} is restricted to administrators"
        )))
    }
}

/// Require the KeyDev's owner or an administrator
///
/// # Errors
/// `WorkflowError::Unauthorized` for anyone else
pub fn require_owner_or_admin(
    caller: &Caller,
    key_dev: &KeyDev,
    action: &str,
) -> Result<(), WorkflowError> {
    if is_admin(&caller.roles) || key_dev.is_owned_by(&caller.user_id) {
        Ok(())
    } else {
        Err(WorkflowError::unauthorized(format!(
            "{action} is restricted to the owner of {}",
            key_dev.human_id
        )))
    }
}

/// Require the KeyDev's requester or an administrator
///
/// # Errors
/// `WorkflowError::Unauthorized` for anyone else
pub fn require_requester_or_admin(
    caller: &Caller,
    key_dev: &KeyDev,
    action: &str,
) -> Result<(), WorkflowError> {
    if is_admin(&caller.roles) || key_dev.is_requested_by(&caller.user_id) {
        Ok(())
    } else {
        Err(WorkflowError::unauthorized(format!(
            "{action} is restricted to the requester of {}",
            key_dev.human_id
        )))
    }
}
