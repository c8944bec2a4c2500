//! Caller roles and identity
//!
//! A [`RoleSet`] is a non-empty capability set. The named predicates here are
//! the only way guards inspect roles.

use crate::error::ModelError;
use crate::ids::{DeptId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Pipeline role
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Creates KeyDevs
    Requester,
    /// Validates the business side for a department
    BusinessValidator,
    /// Validates the technical side and develops
    TechValidator,
    /// Administrator
    Admin,
}

impl Role {
    /// Stable name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Requester => "Requester",
            Role::BusinessValidator => "BusinessValidator",
            Role::TechValidator => "TechValidator",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Role::Requester,
            Role::BusinessValidator,
            Role::TechValidator,
            Role::Admin,
        ]
        .into_iter()
        .find(|role| role.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| ModelError::UnknownRole(s.to_string()))
    }
}

/// Set of roles held by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Role>", into = "Vec<Role>")]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    /// Build a role set, rejecting the empty set
    ///
    /// # Errors
    /// Returns `ModelError::EmptyRoleSet` when `roles` yields nothing
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Result<Self, ModelError> {
        let set: BTreeSet<Role> = roles.into_iter().collect();
        if set.is_empty() {
            return Err(ModelError::EmptyRoleSet);
        }
        Ok(Self(set))
    }

    /// Build a role set from a fixed, non-empty list
    ///
    /// An empty array falls back to `Requester`.
    #[must_use]
    pub fn of<const N: usize>(roles: [Role; N]) -> Self {
        Self::new(roles).unwrap_or_else(|_| Self(BTreeSet::from([Role::Requester])))
    }

    /// Whether the set contains `role`
    #[inline]
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// Whether the set contains `Admin`
    #[inline]
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Whether the set contains any of `candidates`
    #[must_use]
    pub fn has_any_role(&self, candidates: &[Role]) -> bool {
        candidates.iter().any(|role| self.has_role(*role))
    }

    /// Iterate held roles in order
    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }
}

impl TryFrom<Vec<Role>> for RoleSet {
    type Error = ModelError;

    fn try_from(value: Vec<Role>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoleSet> for Vec<Role> {
    fn from(value: RoleSet) -> Self {
        value.0.into_iter().collect()
    }
}

/// Identity of the user issuing a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    /// User id
    pub user_id: UserId,
    /// Held roles
    pub roles: RoleSet,
    /// Department affiliation, if any
    pub dept_id: Option<DeptId>,
}

impl Caller {
    /// Create a caller without department affiliation
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, roles: RoleSet) -> Self {
        Self {
            user_id: user_id.into(),
            roles,
            dept_id: None,
        }
    }

    /// With department affiliation
    #[must_use]
    pub fn with_dept(mut self, dept_id: impl Into<DeptId>) -> Self {
        self.dept_id = Some(dept_id.into());
        self
    }

    /// Whether the caller belongs to `dept`
    #[must_use]
    pub fn in_dept(&self, dept: &DeptId) -> bool {
        self.dept_id.as_ref() == Some(dept)
    }
}
