/**
 * config.rs
 * Parser for authorization policy files (YAML format)
 *
 * Format:
 * ```yaml
 * apiVersion: eatpal/v1
 * kind: AuthzPolicy
 * metadata:
 *   name: eatpal-web
 * spec:
 *   signInPath: /auth
 *   roles:                 # optional, overlays the default table
 *     guest: [recipe.view_public]
 *   backend:
 *     kind: static         # or: http
 *     session: parent-1
 *     actors:
 *       - id: parent-1
 *         role: user
 *   audit:
 *     path: .eatpal/audit.jsonl
 *   csrf:
 *     ttlSeconds: 3600
 * ```
 */

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audit::SecurityAuditLog;
use crate::backend::{ActorRecord, AuthBackend, HttpBackend, StaticBackend};
use crate::context::SecurityContextProvider;
use crate::csrf::{CsrfTokenStore, DEFAULT_TTL_SECS};
use crate::errors::{AuthzError, Result};
use crate::guard::DEFAULT_SIGN_IN_PATH;
use crate::rbac::{PermissionEvaluator, RolePermissionTable};

pub const API_VERSION: &str = "eatpal/v1";
pub const KIND: &str = "AuthzPolicy";

/// Environment variable consulted for the HTTP backend's session token
pub const DEFAULT_ACCESS_TOKEN_ENV: &str = "EATPAL_ACCESS_TOKEN";

/// Policy file structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthzConfig {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: Spec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub name: String,
}

/// Backend selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Static {
        /// Actor signed in at startup
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<String>,
        #[serde(default)]
        actors: Vec<ActorRecord>,
    },
    #[serde(rename_all = "camelCase")]
    Http {
        url: String,
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        access_token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        access_token_env: Option<String>,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Static {
            session: None,
            actors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditConfig {
    pub path: PathBuf,
    #[serde(default, rename = "maxBytes", skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CsrfConfig {
    pub ttl_seconds: i64,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        CsrfConfig {
            ttl_seconds: DEFAULT_TTL_SECS,
        }
    }
}

/// Policy body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,
    /// Rows replacing the default role table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<RolePermissionTable>,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditConfig>,
    #[serde(default)]
    pub csrf: CsrfConfig,
}

fn default_sign_in_path() -> String {
    DEFAULT_SIGN_IN_PATH.to_string()
}

impl AuthzConfig {
    /// Load a policy file
    ///
    /// # Example
    /// ```no_run
    /// use eatpal_authz::config::AuthzConfig;
    ///
    /// let config = AuthzConfig::load("authz.yaml").unwrap();
    /// assert_eq!(config.kind, "AuthzPolicy");
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(AuthzError::FileNotFound(path.to_string_lossy().to_string()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| AuthzError::Config(format!("Failed to read policy file: {}", e)))?;

        let config: AuthzConfig = serde_yaml::from_str(&content)
            .map_err(|e| AuthzError::Config(format!("Invalid policy YAML: {}", e)))?;

        config.validate()?;
        tracing::debug!(path = %path.display(), name = %config.metadata.name, "loaded authorization policy");

        Ok(config)
    }

    /// Validate policy structure
    ///
    /// Ensures:
    /// - apiVersion is "eatpal/v1" and kind is "AuthzPolicy"
    /// - metadata.name is non-empty
    /// - signInPath is an absolute route
    /// - every role grant is a well-formed permission
    /// - static sessions name a declared actor; http backends have a url and key
    /// - the CSRF TTL is positive
    pub fn validate(&self) -> Result<()> {
        if self.api_version != API_VERSION {
            return Err(AuthzError::Validation(format!(
                "Invalid apiVersion: expected '{}', got '{}'",
                API_VERSION, self.api_version
            )));
        }

        if self.kind != KIND {
            return Err(AuthzError::Validation(format!(
                "Invalid kind: expected '{}', got '{}'",
                KIND, self.kind
            )));
        }

        if self.metadata.name.is_empty() {
            return Err(AuthzError::Validation("metadata.name cannot be empty".to_string()));
        }

        if !self.spec.sign_in_path.starts_with('/') {
            return Err(AuthzError::Validation(format!(
                "spec.signInPath must start with '/', got '{}'",
                self.spec.sign_in_path
            )));
        }

        if let Some(roles) = &self.spec.roles {
            roles.validate()?;
        }

        match &self.spec.backend {
            BackendConfig::Static { session, actors } => {
                for actor in actors {
                    if actor.id.is_empty() {
                        return Err(AuthzError::Validation("backend actor id cannot be empty".to_string()));
                    }
                    let (_, rejected) = crate::rbac::permission::sanitize_grants(&actor.grants);
                    if !rejected.is_empty() {
                        return Err(AuthzError::InvalidPermission(format!(
                            "actor {} has malformed grants: {}",
                            actor.id,
                            rejected.join(", ")
                        )));
                    }
                }
                if let Some(session) = session {
                    if !actors.iter().any(|a| &a.id == session) {
                        return Err(AuthzError::Validation(format!(
                            "backend session '{}' is not a declared actor",
                            session
                        )));
                    }
                }
            }
            BackendConfig::Http { url, api_key, .. } => {
                if url.is_empty() || api_key.is_empty() {
                    return Err(AuthzError::Validation(
                        "http backend requires url and apiKey".to_string(),
                    ));
                }
            }
        }

        if self.spec.csrf.ttl_seconds <= 0 {
            return Err(AuthzError::Validation("spec.csrf.ttlSeconds must be positive".to_string()));
        }

        Ok(())
    }

    /// Save policy to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path.as_ref(), yaml)?;
        Ok(())
    }

    /// Minimal valid policy with the default table and an empty static backend
    pub fn new(name: impl Into<String>) -> Self {
        AuthzConfig {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: Metadata { name: name.into() },
            spec: Spec {
                sign_in_path: default_sign_in_path(),
                roles: None,
                backend: BackendConfig::default(),
                audit: None,
                csrf: CsrfConfig::default(),
            },
        }
    }

    /// Default table with this policy's rows applied on top
    pub fn role_table(&self) -> RolePermissionTable {
        match &self.spec.roles {
            Some(overlay) => RolePermissionTable::default().merged_with(overlay),
            None => RolePermissionTable::default(),
        }
    }

    /// Build the configured backend, reading the access token from the
    /// process environment when the policy names a variable
    pub fn build_backend(&self) -> Result<Arc<dyn AuthBackend>> {
        self.build_backend_with_env(|key| std::env::var(key).ok())
    }

    /// [`AuthzConfig::build_backend`] with an explicit environment lookup
    pub fn build_backend_with_env<F>(&self, env: F) -> Result<Arc<dyn AuthBackend>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let table = self.role_table();
        match &self.spec.backend {
            BackendConfig::Static { session, actors } => {
                let mut backend = StaticBackend::new().with_table(table);
                for actor in actors {
                    backend = backend.with_actor(actor.clone());
                }
                if let Some(session) = session {
                    backend = backend.signed_in_as(session.clone());
                }
                Ok(Arc::new(backend))
            }
            BackendConfig::Http {
                url,
                api_key,
                access_token,
                access_token_env,
            } => {
                let env_key = access_token_env.as_deref().unwrap_or(DEFAULT_ACCESS_TOKEN_ENV);
                let token = access_token.clone().or_else(|| env(env_key));

                let mut backend = HttpBackend::new(url.clone(), api_key.clone()).with_fallback_table(table);
                if let Some(token) = token {
                    backend = backend.with_access_token(token);
                }
                Ok(Arc::new(backend))
            }
        }
    }

    /// Audit log when configured, resolved relative to `base_dir`
    pub fn audit_log(&self, base_dir: &Path) -> Option<SecurityAuditLog> {
        self.spec.audit.as_ref().map(|audit| {
            let path = if audit.path.is_absolute() {
                audit.path.clone()
            } else {
                base_dir.join(&audit.path)
            };
            let log = SecurityAuditLog::new(path);
            match audit.max_bytes {
                Some(bytes) => log.with_max_size(bytes),
                None => log,
            }
        })
    }

    /// Evaluator wired to this policy's audit log
    pub fn evaluator(&self, base_dir: &Path) -> PermissionEvaluator {
        match self.audit_log(base_dir) {
            Some(log) => PermissionEvaluator::new().with_audit(Arc::new(log)),
            None => PermissionEvaluator::new(),
        }
    }

    /// Provider over the configured backend, recording sign-outs to the
    /// policy's audit log when one is set
    pub fn provider(&self, base_dir: &Path) -> Result<SecurityContextProvider> {
        let provider = SecurityContextProvider::new(self.build_backend()?);
        Ok(match self.audit_log(base_dir) {
            Some(log) => provider.with_audit(Arc::new(log)),
            None => provider,
        })
    }

    /// CSRF store using `spec.csrf.ttlSeconds`
    pub fn csrf_store(&self) -> CsrfTokenStore {
        CsrfTokenStore::new(chrono::Duration::seconds(self.spec.csrf.ttl_seconds))
    }
}
