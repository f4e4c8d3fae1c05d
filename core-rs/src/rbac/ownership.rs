//! Ownership checks for family-scoped records

use crate::context::SecurityContext;
use serde::{Deserialize, Serialize};

/// Minimal resource shape carrying the owning actor's identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnershipDescriptor {
    pub owner_id: String,
}

impl OwnershipDescriptor {
    pub fn new(owner_id: impl Into<String>) -> Self {
        OwnershipDescriptor {
            owner_id: owner_id.into(),
        }
    }

    /// Build a descriptor from any record that knows its owner
    pub fn of<T: Owned + ?Sized>(resource: &T) -> Self {
        OwnershipDescriptor::new(resource.owner_id())
    }
}

/// Implemented by records (foods, kids, meal plans, grocery lists) that belong
/// to a single actor
pub trait Owned {
    fn owner_id(&self) -> &str;
}

impl Owned for OwnershipDescriptor {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Compare the resource owner against the context's identity.
///
/// Pure identity comparison; role overrides are applied by the evaluator.
pub fn is_owner(ctx: &SecurityContext, resource: &OwnershipDescriptor) -> bool {
    resource.owner_id == ctx.identity()
}

/// True when ownership does not block the actor: owner, or a role that
/// overrides ownership
pub fn ownership_satisfied(ctx: &SecurityContext, resource: &OwnershipDescriptor) -> bool {
    is_owner(ctx, resource) || ctx.role().overrides_ownership()
}
