//! Security Context Provider
//!
//! Resolves the current actor once per session and hands out the cached
//! snapshot. The provider is an owned value passed down to whoever needs it
//! (typically behind an `Arc`); there is no process-wide instance.
//!
//! Lifecycle:
//!
//! ```text
//!   new() ──► Loading ──load()──► Ready | Unauthenticated(NoSession | FetchFailed)
//!                ▲                               │
//!                └────── invalidate() ◄──────────┘   (returns a fresh provider)
//! ```
//!
//! A failed fetch is terminal for the provider; a new sign-in goes through
//! [`SecurityContextProvider::invalidate`].

use crate::audit::{SecurityAuditLog, SIGN_OUT_EVENT};
use crate::backend::AuthBackend;
use crate::context::{ContextState, SecurityContext, UnauthenticatedCause};
use crate::errors::Result;
use crate::rbac::permission::sanitize_grants;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, OnceCell};
use uuid::Uuid;

pub struct SecurityContextProvider {
    backend: Arc<dyn AuthBackend>,
    session_id: Uuid,
    generation: u64,
    live_generation: Arc<AtomicU64>,
    cell: OnceCell<ContextState>,
    state_tx: Arc<watch::Sender<ContextState>>,
    audit: Option<Arc<SecurityAuditLog>>,
}

impl SecurityContextProvider {
    /// Create a provider in the `Loading` state. Nothing is fetched until
    /// [`SecurityContextProvider::load`] is awaited.
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        let (state_tx, _) = watch::channel(ContextState::Loading);
        SecurityContextProvider {
            backend,
            session_id: Uuid::new_v4(),
            generation: 0,
            live_generation: Arc::new(AtomicU64::new(0)),
            cell: OnceCell::new(),
            state_tx: Arc::new(state_tx),
            audit: None,
        }
    }

    /// Record sign-outs to `audit`. Carried over to invalidated providers.
    pub fn with_audit(mut self, audit: Arc<SecurityAuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Identifier of this provider's session, for logs and audit entries
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Current state without waiting. `Loading` until a `load` completes.
    pub fn get_context(&self) -> ContextState {
        self.cell.get().cloned().unwrap_or(ContextState::Loading)
    }

    /// Resolve the context, fetching from the backend at most once.
    ///
    /// Concurrent callers share one fetch. If every caller drops the returned
    /// future before the fetch resolves, the result is discarded and the state
    /// stays `Loading`.
    pub async fn load(&self) -> ContextState {
        let state = self.cell.get_or_init(|| self.fetch()).await.clone();
        self.publish(&state);
        state
    }

    /// Watch state transitions. Receivers survive [`invalidate`](Self::invalidate)
    /// and observe the fresh provider's states.
    pub fn subscribe(&self) -> watch::Receiver<ContextState> {
        self.state_tx.subscribe()
    }

    /// Drop the cached context and return a fresh provider for the same
    /// backend. This provider keeps its snapshot; any fetch still in flight on
    /// it no longer publishes to subscribers.
    pub fn invalidate(&self) -> SecurityContextProvider {
        let generation = self.live_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state_tx.send_replace(ContextState::Loading);

        let fresh = SecurityContextProvider {
            backend: Arc::clone(&self.backend),
            session_id: Uuid::new_v4(),
            generation,
            live_generation: Arc::clone(&self.live_generation),
            cell: OnceCell::new(),
            state_tx: Arc::clone(&self.state_tx),
            audit: self.audit.clone(),
        };
        tracing::debug!(
            old_session = %self.session_id,
            new_session = %fresh.session_id,
            "security context invalidated"
        );
        fresh
    }

    /// End the backend session and return a fresh provider
    pub async fn sign_out(&self) -> Result<SecurityContextProvider> {
        let actor = self.get_context().ready().map(|c| c.identity().to_string());
        self.backend.sign_out().await?;
        tracing::info!(session = %self.session_id, actor = ?actor, "signed out");
        if let Some(audit) = &self.audit {
            let data = serde_json::json!({
                "session": self.session_id.to_string(),
                "backend": self.backend.name(),
            });
            if let Err(e) = audit.record_event(SIGN_OUT_EVENT, actor.as_deref(), data) {
                tracing::warn!(error = %e, "failed to write security audit entry");
            }
        }
        Ok(self.invalidate())
    }

    fn is_live(&self) -> bool {
        self.live_generation.load(Ordering::SeqCst) == self.generation
    }

    /// Liveness is checked under the watch lock that `invalidate` also takes,
    /// so a stale provider cannot overwrite the `Loading` it sent.
    fn publish(&self, state: &ContextState) {
        let mut stale = false;
        self.state_tx.send_if_modified(|current| {
            if !self.is_live() {
                stale = true;
                return false;
            }
            if current == state {
                false
            } else {
                *current = state.clone();
                true
            }
        });
        if stale {
            tracing::debug!(session = %self.session_id, "discarding context from invalidated session");
        }
    }

    async fn fetch(&self) -> ContextState {
        let backend = self.backend.name();

        let actor = match self.backend.current_actor().await {
            Ok(Some(actor)) if actor.is_empty() => {
                return self.fetch_failed("backend returned an empty actor id".to_string());
            }
            Ok(Some(actor)) => actor,
            Ok(None) => {
                tracing::info!(session = %self.session_id, backend, "no signed-in session");
                return ContextState::Unauthenticated(UnauthenticatedCause::NoSession);
            }
            Err(e) => return self.fetch_failed(e.to_string()),
        };

        match self.resolve(&actor).await {
            Ok(ctx) => {
                tracing::info!(
                    session = %self.session_id,
                    backend,
                    actor = %ctx.identity(),
                    role = %ctx.role(),
                    grants = ctx.permissions().len(),
                    "security context loaded"
                );
                ContextState::loaded(ctx)
            }
            Err(e) => self.fetch_failed(e.to_string()),
        }
    }

    async fn resolve(&self, actor: &str) -> Result<SecurityContext> {
        let role = self.backend.role_for(actor).await?;
        let raw = self.backend.permissions_for(actor, role).await?;

        let (grants, rejected) = sanitize_grants(&raw);
        if !rejected.is_empty() {
            tracing::warn!(actor, rejected = ?rejected, "dropping malformed permission grants");
        }
        Ok(SecurityContext::new(actor, role, grants))
    }

    fn fetch_failed(&self, cause: String) -> ContextState {
        tracing::warn!(
            session = %self.session_id,
            backend = self.backend.name(),
            cause = %cause,
            "security context fetch failed"
        );
        ContextState::Unauthenticated(UnauthenticatedCause::FetchFailed { cause })
    }
}
