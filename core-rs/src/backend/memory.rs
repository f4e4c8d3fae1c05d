//! In-memory backend
//!
//! Serves actors from a fixed table. Used by policy files with
//! `backend.kind: static`, by the CLI, and throughout the tests.

use crate::backend::AuthBackend;
use crate::errors::{AuthzError, Result};
use crate::rbac::{Role, RolePermissionTable};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

/// One fixture actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorRecord {
    pub id: String,
    pub role: Role,
    /// Grants on top of the role's row in the permission table
    #[serde(default)]
    pub grants: Vec<String>,
}

impl ActorRecord {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        ActorRecord {
            id: id.into(),
            role,
            grants: Vec::new(),
        }
    }

    pub fn with_grants<I, S>(mut self, grants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grants = grants.into_iter().map(Into::into).collect();
        self
    }
}

/// Fixture-backed [`AuthBackend`]
pub struct StaticBackend {
    actors: HashMap<String, ActorRecord>,
    table: RolePermissionTable,
    session: RwLock<Option<String>>,
}

impl StaticBackend {
    /// Backend with the default permission table and no session
    pub fn new() -> Self {
        StaticBackend {
            actors: HashMap::new(),
            table: RolePermissionTable::default(),
            session: RwLock::new(None),
        }
    }

    pub fn with_table(mut self, table: RolePermissionTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_actor(mut self, actor: ActorRecord) -> Self {
        self.actors.insert(actor.id.clone(), actor);
        self
    }

    /// Start with `actor` signed in
    pub fn signed_in_as(self, actor: impl Into<String>) -> Self {
        self.sign_in(actor);
        self
    }

    /// Replace the current session. The actor does not need to exist; an
    /// unknown actor surfaces as a backend error on the next load.
    pub fn sign_in(&self, actor: impl Into<String>) {
        let mut session = self.session.write().unwrap_or_else(|e| e.into_inner());
        *session = Some(actor.into());
    }

    fn actor(&self, id: &str) -> Result<&ActorRecord> {
        self.actors
            .get(id)
            .ok_or_else(|| AuthzError::Backend(format!("Unknown actor: {}", id)))
    }
}

impl Default for StaticBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthBackend for StaticBackend {
    async fn current_actor(&self) -> Result<Option<String>> {
        let session = self.session.read().unwrap_or_else(|e| e.into_inner());
        Ok(session.clone())
    }

    async fn role_for(&self, actor: &str) -> Result<Role> {
        Ok(self.actor(actor)?.role)
    }

    async fn permissions_for(&self, actor: &str, role: Role) -> Result<BTreeSet<String>> {
        let record = self.actor(actor)?;
        let mut grants = self.table.grants_for(role);
        grants.extend(record.grants.iter().cloned());
        Ok(grants)
    }

    async fn sign_out(&self) -> Result<()> {
        let mut session = self.session.write().unwrap_or_else(|e| e.into_inner());
        *session = None;
        Ok(())
    }

    fn name(&self) -> &str {
        "static"
    }
}
