//! Security audit log
//!
//! Append-only JSONL record of authorization denials and other security
//! events such as sign-outs. Sensitive fields in event data are redacted
//! before they reach disk.
//!
//! # Example
//!
//! ```rust
//! use eatpal_authz::audit::SecurityAuditLog;
//! use eatpal_authz::rbac::CheckReason;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let log = SecurityAuditLog::new(dir.path().join("audit.jsonl"));
//! log.record_denial(Some("parent-1"), "food.delete_any", None, CheckReason::PermissionDenied).unwrap();
//! assert_eq!(log.read_entries().unwrap().len(), 1);
//! ```

use crate::errors::{AuthzError, Result};
use crate::rbac::{CheckReason, OwnershipDescriptor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// Event name used for evaluator denials
pub const DENIAL_EVENT: &str = "authz.denied";

/// Event name used when a provider ends its backend session
pub const SIGN_OUT_EVENT: &str = "auth.sign_out";

const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "token",
    "access_token",
    "refresh_token",
    "csrf_token",
    "secret",
    "api_key",
    "apikey",
];

/// One audit line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<CheckReason>,
    pub data: JsonValue,
    pub redacted: bool,
}

pub struct SecurityAuditLog {
    log_path: PathBuf,
    max_log_size: u64, // bytes
    write_lock: Mutex<()>,
}

impl SecurityAuditLog {
    pub fn new(log_path: PathBuf) -> Self {
        SecurityAuditLog {
            log_path,
            max_log_size: 5_000_000, // 5MB default
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_log_size = bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Record an evaluator denial
    pub fn record_denial(
        &self,
        actor: Option<&str>,
        permission: &str,
        resource: Option<&OwnershipDescriptor>,
        reason: CheckReason,
    ) -> Result<()> {
        let data = json!({
            "permission": permission,
            "owner_id": resource.map(|r| r.owner_id.as_str()),
        });
        self.write_entry(AuditEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event: DENIAL_EVENT.to_string(),
            actor: actor.map(|s| s.to_string()),
            reason: Some(reason),
            data,
            redacted: false,
        })
    }

    /// Record an arbitrary security event, redacting sensitive fields
    pub fn record_event(&self, event: &str, actor: Option<&str>, data: JsonValue) -> Result<()> {
        let (data, redacted) = redact(data);
        self.write_entry(AuditEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event: event.to_string(),
            actor: actor.map(|s| s.to_string()),
            reason: None,
            data,
            redacted,
        })
    }

    /// All entries in the current log file, oldest first
    pub fn read_entries(&self) -> Result<Vec<AuditEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.log_path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(AuthzError::from))
            .collect()
    }

    /// Rotate log file if it exceeds max size
    fn rotate_if_needed(&self) -> Result<bool> {
        if !self.log_path.exists() {
            return Ok(false);
        }

        let metadata = fs::metadata(&self.log_path)?;
        if metadata.len() <= self.max_log_size {
            return Ok(false);
        }

        let timestamp = Utc::now().format("%Y%m%d-%H%M%S%.3f");
        let rotated_path = self.log_path.with_extension(format!("jsonl.{}", timestamp));
        fs::rename(&self.log_path, &rotated_path)?;
        tracing::info!(path = %rotated_path.display(), "rotated security audit log");

        Ok(true)
    }

    fn write_entry(&self, entry: AuditEntry) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(parent) = self.log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        self.rotate_if_needed()?;

        let json = serde_json::to_string(&entry)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}

/// Replace sensitive top-level fields with `[REDACTED]`
fn redact(mut data: JsonValue) -> (JsonValue, bool) {
    let mut redacted = false;
    if let Some(obj) = data.as_object_mut() {
        for field in SENSITIVE_FIELDS {
            if let Some(value) = obj.get_mut(*field) {
                *value = JsonValue::String("[REDACTED]".to_string());
                redacted = true;
            }
        }
    }
    (data, redacted)
}
