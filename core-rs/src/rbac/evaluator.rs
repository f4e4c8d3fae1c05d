//! Permission evaluator
//!
//! Layered check over a loaded security context. Each layer is a strictly
//! narrower gate, evaluated in order, and the first failing layer names the
//! reason:
//!
//! 1. authentication: the context must be loaded
//! 2. permission: the actor holds a covering grant, or is admin
//! 3. ownership: when a descriptor is supplied, the actor owns it or holds a
//!    role that overrides ownership
//!
//! Evaluation is synchronous, allocation-light and side-effect free. Audit
//! recording of denials lives in [`PermissionEvaluator`], not in [`check`].

use crate::audit::SecurityAuditLog;
use crate::context::ContextState;
use crate::errors::{AuthzError, Result};
use crate::rbac::ownership::{ownership_satisfied, OwnershipDescriptor};
use crate::rbac::permission::is_granted;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Named policy rule: an admin actor satisfies every permission check
/// regardless of its grant set.
pub const ADMIN_BYPASSES_PERMISSIONS: bool = true;

/// Why a check came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckReason {
    None,
    AuthenticationRequired,
    PermissionDenied,
    OwnershipDenied,
}

impl fmt::Display for CheckReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckReason::None => "None",
            CheckReason::AuthenticationRequired => "AuthenticationRequired",
            CheckReason::PermissionDenied => "PermissionDenied",
            CheckReason::OwnershipDenied => "OwnershipDenied",
        };
        f.write_str(s)
    }
}

/// Outcome of one evaluation
///
/// Only constructible through [`SecurityCheckResult::allow`] and
/// [`SecurityCheckResult::deny`], so an allowed result always has reason `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SecurityCheckResult {
    allowed: bool,
    reason: CheckReason,
}

impl SecurityCheckResult {
    pub fn allow() -> Self {
        SecurityCheckResult {
            allowed: true,
            reason: CheckReason::None,
        }
    }

    /// Deny with `reason`. Passing `CheckReason::None` is coerced to
    /// `PermissionDenied` so a denial always names a failing layer.
    pub fn deny(reason: CheckReason) -> Self {
        let reason = match reason {
            CheckReason::None => CheckReason::PermissionDenied,
            other => other,
        };
        SecurityCheckResult { allowed: false, reason }
    }

    pub fn allowed(&self) -> bool {
        self.allowed
    }

    pub fn reason(&self) -> CheckReason {
        self.reason
    }

    /// Convert into a `Result`, carrying the permission for error reporting
    pub fn into_result(self, permission: &str) -> Result<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(AuthzError::Denied {
                reason: self.reason,
                permission: permission.to_string(),
            })
        }
    }
}

/// Evaluate `permission` (and optional ownership) against a context state.
///
/// A state that is still `Loading` fails closed with `AuthenticationRequired`;
/// guards handle the loading case before calling in.
pub fn check(
    state: &ContextState,
    permission: &str,
    resource: Option<&OwnershipDescriptor>,
) -> SecurityCheckResult {
    let ctx = match state.ready() {
        Some(ctx) => ctx,
        None => return SecurityCheckResult::deny(CheckReason::AuthenticationRequired),
    };

    let admin_bypass = ADMIN_BYPASSES_PERMISSIONS && ctx.role().bypasses_permission_checks();
    if !admin_bypass && !is_granted(ctx.permissions(), permission) {
        return SecurityCheckResult::deny(CheckReason::PermissionDenied);
    }

    if let Some(resource) = resource {
        if !ownership_satisfied(ctx, resource) {
            return SecurityCheckResult::deny(CheckReason::OwnershipDenied);
        }
    }

    SecurityCheckResult::allow()
}

/// [`check`] plus structured logging and optional audit of denials
#[derive(Clone, Default)]
pub struct PermissionEvaluator {
    audit: Option<Arc<SecurityAuditLog>>,
}

impl PermissionEvaluator {
    pub fn new() -> Self {
        PermissionEvaluator { audit: None }
    }

    /// Record every denial to `audit`
    pub fn with_audit(mut self, audit: Arc<SecurityAuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn check(
        &self,
        state: &ContextState,
        permission: &str,
        resource: Option<&OwnershipDescriptor>,
    ) -> SecurityCheckResult {
        let result = check(state, permission, resource);
        let actor = state.ready().map(|c| c.identity().to_string());

        if result.allowed() {
            tracing::debug!(actor = ?actor, permission, "authorization allowed");
        } else {
            tracing::info!(
                actor = ?actor,
                permission,
                owner = ?resource.map(|r| r.owner_id.as_str()),
                reason = %result.reason(),
                "authorization denied"
            );
            if let Some(audit) = &self.audit {
                if let Err(e) = audit.record_denial(actor.as_deref(), permission, resource, result.reason()) {
                    tracing::warn!(error = %e, "failed to write security audit entry");
                }
            }
        }

        result
    }

    /// Like [`PermissionEvaluator::check`] but returns `Err(AuthzError::Denied)`
    /// on denial
    pub fn require(
        &self,
        state: &ContextState,
        permission: &str,
        resource: Option<&OwnershipDescriptor>,
    ) -> Result<()> {
        self.check(state, permission, resource).into_result(permission)
    }
}
