//! Error types for the EatPal authorization core
//!
//! Denials (authentication required, permission denied, ownership denied) are
//! ordinary outcomes and travel as [`crate::rbac::SecurityCheckResult`] data.
//! `AuthzError` covers genuine failures: backend I/O, bad configuration,
//! malformed input, and callers that explicitly ask for a denial to be raised.

use crate::rbac::CheckReason;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthzError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid permission: {0}")]
    InvalidPermission(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Access denied: {reason} ({permission})")]
    Denied { reason: CheckReason, permission: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSRF error: {0}")]
    Csrf(String),
}

pub type Result<T> = std::result::Result<T, AuthzError>;
