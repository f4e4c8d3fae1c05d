//! Roles and the role-level comparator
//!
//! Roles form a total order `guest < user < moderator < admin`. Coarse checks
//! ("at least a moderator") go through [`meets_level`]; fine-grained checks go
//! through the permission evaluator.

use crate::context::ContextState;
use crate::errors::AuthzError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Actor role, ordered by privilege
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Guest,
    User,
    Moderator,
    Admin,
}

impl Role {
    /// All roles, lowest level first
    pub const ALL: [Role; 4] = [Role::Guest, Role::User, Role::Moderator, Role::Admin];

    /// Numeric level used by [`meets_level`]
    pub fn level(self) -> u8 {
        match self {
            Role::Guest => 0,
            Role::User => 1,
            Role::Moderator => 2,
            Role::Admin => 3,
        }
    }

    /// Admin skips fine-grained permission checks entirely.
    ///
    /// Explicit policy rule, consulted by the evaluator before the grant set.
    /// See [`crate::rbac::evaluator::ADMIN_BYPASSES_PERMISSIONS`].
    pub fn bypasses_permission_checks(self) -> bool {
        self == Role::Admin
    }

    /// Roles that may act on resources owned by someone else
    pub fn overrides_ownership(self) -> bool {
        matches!(self, Role::Admin | Role::Moderator)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "guest" => Ok(Role::Guest),
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(AuthzError::InvalidRole(other.to_string())),
        }
    }
}

/// Check whether the loaded actor's role is at or above `min_level`.
///
/// Returns false for any state that is not a loaded context.
pub fn meets_level(state: &ContextState, min_level: u8) -> bool {
    match state.ready() {
        Some(ctx) => ctx.role().level() >= min_level,
        None => false,
    }
}

/// [`meets_level`] expressed with a role instead of a raw level
pub fn meets_role(state: &ContextState, min_role: Role) -> bool {
    meets_level(state, min_role.level())
}
