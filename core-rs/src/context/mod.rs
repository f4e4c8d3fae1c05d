//! Security context
//!
//! A [`SecurityContext`] is the immutable snapshot of one actor's identity,
//! role and grants, resolved once per session by the
//! [`SecurityContextProvider`]. Consumers hold it through [`ContextState`],
//! which also models the loading and unauthenticated phases.

pub mod provider;

pub use provider::SecurityContextProvider;

use crate::rbac::permission::is_granted;
use crate::rbac::Role;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Loaded actor snapshot. Never mutated after construction; a refresh builds
/// a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityContext {
    identity: String,
    role: Role,
    permissions: BTreeSet<String>,
    loaded_at: DateTime<Utc>,
}

impl SecurityContext {
    pub fn new(identity: impl Into<String>, role: Role, permissions: BTreeSet<String>) -> Self {
        SecurityContext {
            identity: identity.into(),
            role,
            permissions,
            loaded_at: Utc::now(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Grant lookup only; does not apply the admin bypass
    pub fn has_permission(&self, permission: &str) -> bool {
        is_granted(&self.permissions, permission)
    }
}

/// Why there is no loaded context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UnauthenticatedCause {
    /// The backend reports no signed-in actor
    NoSession,
    /// The backend could not be reached or returned an error
    FetchFailed { cause: String },
}

/// What a consumer sees when it asks for the context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextState {
    Loading,
    Ready(Arc<SecurityContext>),
    Unauthenticated(UnauthenticatedCause),
}

impl ContextState {
    /// Wrap a freshly resolved snapshot
    pub fn loaded(ctx: SecurityContext) -> Self {
        ContextState::Ready(Arc::new(ctx))
    }

    pub fn ready(&self) -> Option<&SecurityContext> {
        match self {
            ContextState::Ready(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ContextState::Loading)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, ContextState::Ready(_))
    }

    /// True when the last fetch failed, as opposed to there being no session
    pub fn fetch_failed(&self) -> bool {
        matches!(
            self,
            ContextState::Unauthenticated(UnauthenticatedCause::FetchFailed { .. })
        )
    }
}
