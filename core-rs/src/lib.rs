//! # EatPal Authz - Authorization Core
//!
//! Client-side defense-in-depth authorization for the EatPal app (meal
//! planning and food tracking for families with picky eaters). The crate
//! resolves the current actor once per session and answers authorization
//! questions synchronously against that cached snapshot.
//!
//! ## Core Principle
//!
//! **Read-only rules over a cached snapshot**: the backend is asked once for
//! identity, role and grants; every check after that is pure evaluation with
//! no network I/O.
//!
//! ## Key Features
//!
//! - Layered evaluation: authentication, then permission, then ownership
//! - Explicit admin bypass and moderator ownership override rules
//! - Ordered role levels (`guest < user < moderator < admin`)
//! - Route/render guards with loading, redirect and in-place denial states
//! - Distinct `NoSession` / `FetchFailed` unauthenticated causes
//! - JSONL security audit log and CSRF tokens
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────┐   one fetch   ┌──────────────────────────┐
//!   │  AuthBackend  │ ◄──────────── │ SecurityContextProvider  │
//!   │ static | http │               │  Loading → Ready | Unauth │
//!   └───────────────┘               └────────────┬─────────────┘
//!                                                │ ContextState (Arc snapshot)
//!                         ┌──────────────────────┼──────────────────────┐
//!                         ▼                      ▼                      ▼
//!                   rbac::check            rbac::meets_level        guard::Guard
//! ```

pub mod audit;
pub mod backend;
pub mod config;
pub mod context;
pub mod csrf;
pub mod errors;
pub mod guard;
pub mod rbac;

pub use audit::{AuditEntry, SecurityAuditLog};
pub use backend::{ActorRecord, AuthBackend, HttpBackend, StaticBackend};
pub use config::AuthzConfig;
pub use context::{ContextState, SecurityContext, SecurityContextProvider, UnauthenticatedCause};
pub use csrf::CsrfTokenStore;
pub use errors::AuthzError;
pub use guard::{Guard, GuardRequirement, GuardState, Rendered};
pub use rbac::{
    check, meets_level, meets_role, CheckReason, Owned, OwnershipDescriptor, Permission, PermissionEvaluator, Role,
    RolePermissionTable, SecurityCheckResult,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default policy file name looked up by the CLI
pub const DEFAULT_POLICY_FILE: &str = "authz.yaml";
