//! HttpBackend for the hosted auth/database service
//!
//! Resolves the security context over REST:
//! - `GET  {base}/auth/v1/user` - signed-in actor (401/403 means no session)
//! - `GET  {base}/rest/v1/user_roles?user_id=eq.{id}&select=role`
//! - `GET  {base}/rest/v1/role_permissions?role=eq.{role}&select=permission`
//! - `POST {base}/auth/v1/logout`
//!
//! Every request carries the project `apikey` header and, when present, the
//! session's bearer token.

use crate::backend::AuthBackend;
use crate::errors::{AuthzError, Result};
use crate::rbac::{Role, RolePermissionTable};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeSet;

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    role: String,
}

#[derive(Debug, Deserialize)]
struct PermissionRow {
    permission: String,
}

/// REST-backed [`AuthBackend`]
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    fallback: RolePermissionTable,
}

impl HttpBackend {
    /// Create new HttpBackend
    ///
    /// # Example
    ///
    /// ```
    /// use eatpal_authz::backend::HttpBackend;
    ///
    /// let backend = HttpBackend::new("https://project.example.co", "anon-key")
    ///     .with_access_token("session-jwt");
    /// ```
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        HttpBackend {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: None,
            fallback: RolePermissionTable::default(),
        }
    }

    /// Attach the signed-in session's access token
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Table used when the backend has no `role_permissions` rows for a role
    pub fn with_fallback_table(mut self, table: RolePermissionTable) -> Self {
        self.fallback = table;
        self
    }

    /// Build full URL for `path` with query parameters
    ///
    /// # Example
    ///
    /// ```
    /// use eatpal_authz::backend::HttpBackend;
    ///
    /// let backend = HttpBackend::new("http://localhost:54321", "key");
    /// let url = backend.build_url("rest/v1/user_roles", &[("user_id", "eq.abc")]).unwrap();
    /// assert_eq!(url.as_str(), "http://localhost:54321/rest/v1/user_roles?user_id=eq.abc");
    /// ```
    pub fn build_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let full = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let parsed = if params.is_empty() {
            Url::parse(&full)
        } else {
            Url::parse_with_params(&full, params)
        };
        parsed.map_err(|e| AuthzError::Config(format!("Invalid backend URL '{}': {}", full, e)))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url).header("apikey", &self.api_key);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.request(reqwest::Method::GET, url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthzError::Backend(format!("GET {} returned {}", url.path(), status)));
        }
        Ok(response.json::<T>().await?)
    }
}

/// Highest role among the rows; unknown role names are ignored
fn highest_role(rows: &[RoleRow]) -> Option<Role> {
    rows.iter()
        .filter_map(|row| match row.role.parse::<Role>() {
            Ok(role) => Some(role),
            Err(_) => {
                tracing::warn!(role = %row.role, "ignoring unknown role from backend");
                None
            }
        })
        .max()
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn current_actor(&self) -> Result<Option<String>> {
        if self.access_token.is_none() {
            return Ok(None);
        }

        let url = self.build_url("auth/v1/user", &[])?;
        let response = self.request(reqwest::Method::GET, url).send().await?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => {
                let user: UserResponse = response.json().await?;
                Ok(Some(user.id))
            }
            status => Err(AuthzError::Backend(format!("GET /auth/v1/user returned {}", status))),
        }
    }

    async fn role_for(&self, actor: &str) -> Result<Role> {
        let filter = format!("eq.{}", actor);
        let url = self.build_url("rest/v1/user_roles", &[("user_id", filter.as_str()), ("select", "role")])?;
        let rows: Vec<RoleRow> = self.get_json(url).await?;

        // Signed-in actors without a role row are regular users
        Ok(highest_role(&rows).unwrap_or(Role::User))
    }

    async fn permissions_for(&self, _actor: &str, role: Role) -> Result<BTreeSet<String>> {
        let filter = format!("eq.{}", role);
        let url = self.build_url(
            "rest/v1/role_permissions",
            &[("role", filter.as_str()), ("select", "permission")],
        )?;
        let rows: Vec<PermissionRow> = self.get_json(url).await?;

        if rows.is_empty() {
            return Ok(self.fallback.grants_for(role));
        }
        Ok(rows.into_iter().map(|r| r.permission).collect())
    }

    async fn sign_out(&self) -> Result<()> {
        if self.access_token.is_none() {
            return Ok(());
        }
        let url = self.build_url("auth/v1/logout", &[])?;
        let response = self.request(reqwest::Method::POST, url).send().await?;
        if !response.status().is_success() {
            return Err(AuthzError::Backend(format!(
                "POST /auth/v1/logout returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}
