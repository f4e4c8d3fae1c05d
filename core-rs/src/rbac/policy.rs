//! Role → permission table
//!
//! Backends that store roles but not per-actor grants (the in-memory fixture
//! backend, or a deployment without a `role_permissions` table) resolve an
//! actor's grants from this table. The defaults mirror the EatPal product
//! surface; a policy file may replace any row.

use crate::errors::{AuthzError, Result};
use crate::rbac::permission::{sanitize_grants, Permission};
use crate::rbac::Role;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Well-known permission tokens
pub mod permissions {
    pub const FOOD_VIEW_OWN: &str = "food.view_own";
    pub const FOOD_CREATE: &str = "food.create";
    pub const FOOD_EDIT_OWN: &str = "food.edit_own";
    pub const FOOD_DELETE_OWN: &str = "food.delete_own";
    pub const FOOD_DELETE_ANY: &str = "food.delete_any";
    pub const KID_VIEW_OWN: &str = "kid.view_own";
    pub const KID_MANAGE_OWN: &str = "kid.manage_own";
    pub const PLAN_VIEW_OWN: &str = "plan.view_own";
    pub const PLAN_EDIT_OWN: &str = "plan.edit_own";
    pub const GROCERY_VIEW_OWN: &str = "grocery.view_own";
    pub const GROCERY_EDIT_OWN: &str = "grocery.edit_own";
    pub const COACH_USE: &str = "coach.use";
    pub const RECIPE_VIEW_PUBLIC: &str = "recipe.view_public";
    pub const CONTENT_MODERATE: &str = "content.moderate";
    pub const USER_VIEW_ANY: &str = "user.view_any";
    pub const USER_MANAGE: &str = "user.manage";
    pub const ADMIN_DASHBOARD: &str = "admin.dashboard";
    pub const SEO_MANAGE: &str = "seo.manage";
}

/// Grants per role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RolePermissionTable {
    rows: BTreeMap<Role, BTreeSet<String>>,
}

impl RolePermissionTable {
    /// Empty table (every role resolves to no grants)
    pub fn empty() -> Self {
        RolePermissionTable { rows: BTreeMap::new() }
    }

    /// Replace the grants for one role, validating every token
    pub fn with_role<I, S>(mut self, role: Role, grants: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (valid, rejected) = sanitize_grants(grants);
        if !rejected.is_empty() {
            return Err(AuthzError::InvalidPermission(format!(
                "role {} has malformed grants: {}",
                role,
                rejected.join(", ")
            )));
        }
        self.rows.insert(role, valid);
        Ok(self)
    }

    /// Grants for `role` (empty when the role has no row)
    pub fn grants_for(&self, role: Role) -> BTreeSet<String> {
        self.rows.get(&role).cloned().unwrap_or_default()
    }

    /// Overlay `other` on this table; rows in `other` win
    pub fn merged_with(mut self, other: &RolePermissionTable) -> Self {
        for (role, grants) in &other.rows {
            self.rows.insert(*role, grants.clone());
        }
        self
    }

    /// Check every stored token against the permission grammar
    pub fn validate(&self) -> Result<()> {
        for (role, grants) in &self.rows {
            for grant in grants {
                Permission::parse(grant).map_err(|_| {
                    AuthzError::InvalidPermission(format!("role {} has malformed grant '{}'", role, grant))
                })?;
            }
        }
        Ok(())
    }
}

impl Default for RolePermissionTable {
    fn default() -> Self {
        use permissions::*;

        let user: BTreeSet<String> = [
            FOOD_VIEW_OWN,
            FOOD_CREATE,
            FOOD_EDIT_OWN,
            FOOD_DELETE_OWN,
            KID_VIEW_OWN,
            KID_MANAGE_OWN,
            PLAN_VIEW_OWN,
            PLAN_EDIT_OWN,
            GROCERY_VIEW_OWN,
            GROCERY_EDIT_OWN,
            COACH_USE,
            RECIPE_VIEW_PUBLIC,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut moderator = user.clone();
        moderator.extend([CONTENT_MODERATE, USER_VIEW_ANY, FOOD_DELETE_ANY].iter().map(|s| s.to_string()));

        let mut rows = BTreeMap::new();
        rows.insert(Role::Guest, [RECIPE_VIEW_PUBLIC.to_string()].into_iter().collect());
        rows.insert(Role::User, user);
        rows.insert(Role::Moderator, moderator);
        rows.insert(Role::Admin, [super::permission::WILDCARD.to_string()].into_iter().collect());

        RolePermissionTable { rows }
    }
}
