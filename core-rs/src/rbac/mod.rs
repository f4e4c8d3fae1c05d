//! RBAC (Role-Based Access Control) module
//!
//! Provides the layered permission evaluator, the role-level comparator,
//! ownership checks and the role → permission table.

pub mod evaluator;
pub mod ownership;
pub mod permission;
pub mod policy;
pub mod role;

pub use evaluator::{check, CheckReason, PermissionEvaluator, SecurityCheckResult, ADMIN_BYPASSES_PERMISSIONS};
pub use ownership::{is_owner, Owned, OwnershipDescriptor};
pub use permission::{grant_matches, is_granted, Permission};
pub use policy::{permissions, RolePermissionTable};
pub use role::{meets_level, meets_role, Role};
