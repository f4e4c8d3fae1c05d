//! Permission tokens
//!
//! A permission is a namespaced capability `resource.action`, e.g.
//! `food.view_own`. Grants may also carry a trailing wildcard (`food.*`), or
//! be the bare `*`, in which case they cover every permission under that
//! prefix.

use crate::errors::{AuthzError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

static PERMISSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9_]*(\.[a-z][a-z0-9_]*)*\.([a-z][a-z0-9_]*|\*)$")
        .expect("permission pattern is a valid regex")
});

/// Grant that covers every permission
pub const WILDCARD: &str = "*";

/// Validated `resource.action` token
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission(String);

impl Permission {
    /// Parse and validate a permission token
    ///
    /// # Example
    /// ```
    /// use eatpal_authz::rbac::Permission;
    ///
    /// let perm = Permission::parse("food.view_own").unwrap();
    /// assert_eq!(perm.resource(), "food");
    /// assert_eq!(perm.action(), "view_own");
    /// assert!(Permission::parse("food").is_err());
    /// ```
    pub fn parse(token: &str) -> Result<Self> {
        if token == WILDCARD || PERMISSION_PATTERN.is_match(token) {
            Ok(Permission(token.to_string()))
        } else {
            Err(AuthzError::InvalidPermission(format!(
                "'{}' is not of the form resource.action",
                token
            )))
        }
    }

    /// Everything before the last dot (empty for the bare wildcard)
    pub fn resource(&self) -> &str {
        self.0.rsplit_once('.').map(|(r, _)| r).unwrap_or("")
    }

    /// Segment after the last dot
    pub fn action(&self) -> &str {
        self.0.rsplit_once('.').map(|(_, a)| a).unwrap_or(&self.0)
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD || self.0.ends_with(".*")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this grant covers `permission`
    pub fn covers(&self, permission: &str) -> bool {
        grant_matches(&self.0, permission)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Permission {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self> {
        Permission::parse(&value)
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.0
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Match a single grant against a required permission
///
/// `food.*` matches `food.view_own` and `food.photos.upload` but not `food`
/// itself or `foods.view_own`.
pub fn grant_matches(grant: &str, permission: &str) -> bool {
    if grant == permission || grant == WILDCARD {
        return true;
    }

    match grant.strip_suffix('*') {
        Some(prefix) if prefix.ends_with('.') => {
            permission.len() > prefix.len() && permission.starts_with(prefix)
        }
        _ => false,
    }
}

/// Whether any grant in the set covers `permission`
pub fn is_granted(grants: &BTreeSet<String>, permission: &str) -> bool {
    grants.contains(permission) || grants.iter().any(|g| grant_matches(g, permission))
}

/// Drop malformed grants, returning the valid set and the rejected tokens
pub fn sanitize_grants<I, S>(grants: I) -> (BTreeSet<String>, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut valid = BTreeSet::new();
    let mut rejected = Vec::new();
    for grant in grants {
        let grant = grant.as_ref().trim();
        match Permission::parse(grant) {
            Ok(p) => {
                valid.insert(p.0);
            }
            Err(_) => rejected.push(grant.to_string()),
        }
    }
    (valid, rejected)
}
