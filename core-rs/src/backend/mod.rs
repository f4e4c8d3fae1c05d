//! Authentication/authorization backend contract
//!
//! The security context provider talks to the hosted backend only through
//! [`AuthBackend`]. Implementations include:
//! - [`StaticBackend`] (in-memory fixture, policy files and tests)
//! - [`HttpBackend`] (REST auth + table endpoints)

pub mod http;
pub mod memory;

pub use http::HttpBackend;
pub use memory::{ActorRecord, StaticBackend};

use crate::errors::Result;
use crate::rbac::Role;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Backend collaborator that supplies the facts a security context is built
/// from
///
/// # Contract
///
/// - `current_actor` returns `Ok(None)` when there is no signed-in session;
///   `Err` is reserved for transport or backend failures
/// - `role_for` and `permissions_for` are only called with an identity
///   returned by `current_actor` in the same load
/// - grants returned by `permissions_for` are permission tokens
///   (`resource.action`, optionally wildcarded); malformed tokens are dropped
///   by the provider
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Identity of the signed-in actor, if any
    async fn current_actor(&self) -> Result<Option<String>>;

    /// Role assigned to `actor`
    async fn role_for(&self, actor: &str) -> Result<Role>;

    /// Permission grants for `actor`, who holds `role`
    async fn permissions_for(&self, actor: &str, role: Role) -> Result<BTreeSet<String>>;

    /// End the backend session. Backends without server-side sessions keep the
    /// default no-op.
    async fn sign_out(&self) -> Result<()> {
        Ok(())
    }

    /// Short label for logs
    fn name(&self) -> &str;
}
