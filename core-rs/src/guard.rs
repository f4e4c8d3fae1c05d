//! Route/render guards
//!
//! A guard wraps protected content with one requirement and turns the current
//! [`ContextState`] into a rendering decision:
//!
//! | state / outcome                 | guard state       | rendered as                    |
//! |---------------------------------|-------------------|--------------------------------|
//! | context loading                 | `Loading`         | loading indicator, no redirect |
//! | requirement met                 | `Authorized`      | wrapped content                |
//! | `AuthenticationRequired`        | `Unauthenticated` | redirect to sign-in            |
//! | `PermissionDenied` / `OwnershipDenied` | `Denied`   | in-place access denied         |
//!
//! `Loading` moves to exactly one terminal state; it is re-entered only when
//! the provider is invalidated.

use crate::context::ContextState;
use crate::errors::{AuthzError, Result};
use crate::rbac::evaluator::{check, CheckReason, SecurityCheckResult};
use crate::rbac::{meets_role, OwnershipDescriptor, Role};
use reqwest::Url;
use serde::Serialize;
use tokio::sync::watch;

/// Default sign-in route
pub const DEFAULT_SIGN_IN_PATH: &str = "/auth";

/// What the wrapped content needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardRequirement {
    Authenticated,
    Permission(String),
    RoleLevel(Role),
    PermissionAndOwnership {
        permission: String,
        resource: OwnershipDescriptor,
    },
}

/// Guard decision for one state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardState {
    Loading,
    Authorized,
    Unauthenticated {
        /// Sign-in route carrying the intended destination
        redirect: String,
        /// The session lookup failed rather than finding no session
        retry_available: bool,
    },
    Denied {
        reason: CheckReason,
    },
}

impl GuardState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GuardState::Loading)
    }
}

/// Output of [`Guard::render`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<T> {
    Content(T),
    LoadingIndicator,
    Redirect { to: String, retry_available: bool },
    AccessDenied { reason: CheckReason, message: String },
}

#[derive(Debug, Clone)]
pub struct Guard {
    requirement: GuardRequirement,
    sign_in_path: String,
}

impl Guard {
    pub fn new(requirement: GuardRequirement) -> Self {
        Guard {
            requirement,
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_string(),
        }
    }

    pub fn authenticated() -> Self {
        Guard::new(GuardRequirement::Authenticated)
    }

    pub fn permission(permission: impl Into<String>) -> Self {
        Guard::new(GuardRequirement::Permission(permission.into()))
    }

    pub fn role_level(role: Role) -> Self {
        Guard::new(GuardRequirement::RoleLevel(role))
    }

    pub fn permission_and_ownership(permission: impl Into<String>, resource: OwnershipDescriptor) -> Self {
        Guard::new(GuardRequirement::PermissionAndOwnership {
            permission: permission.into(),
            resource,
        })
    }

    pub fn with_sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.sign_in_path = path.into();
        self
    }

    pub fn requirement(&self) -> &GuardRequirement {
        &self.requirement
    }

    /// Evaluate the requirement against `state`
    ///
    /// `destination` is the route the user tried to reach; it is preserved in
    /// the sign-in redirect.
    pub fn evaluate(&self, state: &ContextState, destination: &str) -> GuardState {
        if state.is_loading() {
            return GuardState::Loading;
        }

        let result = self.check_requirement(state);
        if result.allowed() {
            return GuardState::Authorized;
        }

        match result.reason() {
            CheckReason::AuthenticationRequired => GuardState::Unauthenticated {
                redirect: self.sign_in_redirect(destination),
                retry_available: state.fetch_failed(),
            },
            reason => GuardState::Denied { reason },
        }
    }

    /// Evaluate and build the rendering. `content` runs only when authorized.
    pub fn render<T, F>(&self, state: &ContextState, destination: &str, content: F) -> Rendered<T>
    where
        F: FnOnce() -> T,
    {
        match self.evaluate(state, destination) {
            GuardState::Loading => Rendered::LoadingIndicator,
            GuardState::Authorized => Rendered::Content(content()),
            GuardState::Unauthenticated {
                redirect,
                retry_available,
            } => Rendered::Redirect {
                to: redirect,
                retry_available,
            },
            GuardState::Denied { reason } => Rendered::AccessDenied {
                reason,
                message: denial_message(reason).to_string(),
            },
        }
    }

    /// Wait on a provider subscription until the state leaves `Loading`, then
    /// evaluate
    pub async fn wait_for_decision(
        &self,
        rx: &mut watch::Receiver<ContextState>,
        destination: &str,
    ) -> Result<GuardState> {
        let state = rx
            .wait_for(|s| !s.is_loading())
            .await
            .map_err(|_| AuthzError::Backend("security context provider dropped".to_string()))?
            .clone();
        Ok(self.evaluate(&state, destination))
    }

    fn check_requirement(&self, state: &ContextState) -> SecurityCheckResult {
        if !state.is_authenticated() {
            return SecurityCheckResult::deny(CheckReason::AuthenticationRequired);
        }

        match &self.requirement {
            GuardRequirement::Authenticated => SecurityCheckResult::allow(),
            GuardRequirement::Permission(permission) => check(state, permission, None),
            GuardRequirement::RoleLevel(role) => {
                if meets_role(state, *role) {
                    SecurityCheckResult::allow()
                } else {
                    SecurityCheckResult::deny(CheckReason::PermissionDenied)
                }
            }
            GuardRequirement::PermissionAndOwnership { permission, resource } => {
                check(state, permission, Some(resource))
            }
        }
    }

    fn sign_in_redirect(&self, destination: &str) -> String {
        // Relative route: resolve against a placeholder origin to reuse URL encoding
        let base = match Url::parse("http://localhost/").and_then(|b| b.join(&self.sign_in_path)) {
            Ok(url) => url,
            Err(_) => return self.sign_in_path.clone(),
        };
        let mut url = base;
        url.query_pairs_mut().append_pair("redirect", destination);
        match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        }
    }
}

/// User-facing copy for an in-place denial
pub fn denial_message(reason: CheckReason) -> &'static str {
    match reason {
        CheckReason::PermissionDenied => "You don't have permission to view this page.",
        CheckReason::OwnershipDenied => "This item belongs to another family.",
        CheckReason::AuthenticationRequired => "Please sign in to continue.",
        CheckReason::None => "",
    }
}
