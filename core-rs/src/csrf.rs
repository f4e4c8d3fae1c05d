//! CSRF tokens for state-changing form posts
//!
//! One token per session: 32 random bytes, hex encoded, with an issue time.
//! Validation compares in constant time and rejects expired tokens.

use crate::errors::{AuthzError, Result};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use subtle::ConstantTimeEq;

/// Random bytes per token
pub const TOKEN_BYTES: usize = 32;

/// Default token lifetime in seconds
pub const DEFAULT_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone)]
struct IssuedToken {
    value: String,
    issued_at: DateTime<Utc>,
}

/// Per-session CSRF token holder
#[derive(Debug, Clone)]
pub struct CsrfTokenStore {
    ttl: Duration,
    current: Option<IssuedToken>,
}

impl CsrfTokenStore {
    pub fn new(ttl: Duration) -> Self {
        CsrfTokenStore { ttl, current: None }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current token, issuing a new one if none exists or it has expired
    pub fn token(&mut self) -> &str {
        self.token_at(Utc::now())
    }

    /// Replace the current token unconditionally (after sign-in, or after a
    /// successful state-changing request)
    pub fn rotate(&mut self) -> &str {
        self.rotate_at(Utc::now())
    }

    /// Check a submitted token against the current one
    pub fn validate(&self, candidate: &str) -> Result<()> {
        self.validate_at(candidate, Utc::now())
    }

    /// Forget the token (sign-out)
    pub fn clear(&mut self) {
        self.current = None;
    }

    fn token_at(&mut self, now: DateTime<Utc>) -> &str {
        let expired = match &self.current {
            Some(token) => now - token.issued_at >= self.ttl,
            None => true,
        };
        if expired {
            self.rotate_at(now);
        }
        self.current.as_ref().map(|t| t.value.as_str()).unwrap_or("")
    }

    fn rotate_at(&mut self, now: DateTime<Utc>) -> &str {
        self.current = Some(IssuedToken {
            value: generate_token(),
            issued_at: now,
        });
        self.current.as_ref().map(|t| t.value.as_str()).unwrap_or("")
    }

    fn validate_at(&self, candidate: &str, now: DateTime<Utc>) -> Result<()> {
        let current = self
            .current
            .as_ref()
            .ok_or_else(|| AuthzError::Csrf("no token issued for this session".to_string()))?;

        if !constant_time_eq(candidate.as_bytes(), current.value.as_bytes()) {
            return Err(AuthzError::Csrf("token mismatch".to_string()));
        }
        if now - current.issued_at >= self.ttl {
            return Err(AuthzError::Csrf("token expired".to_string()));
        }
        Ok(())
    }
}

impl Default for CsrfTokenStore {
    fn default() -> Self {
        CsrfTokenStore::new(Duration::seconds(DEFAULT_TTL_SECS))
    }
}

/// Fresh hex token from the OS-seeded thread RNG
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Length-checked constant-time comparison
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}
