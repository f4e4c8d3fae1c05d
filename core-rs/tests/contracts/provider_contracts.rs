// Provider Lifecycle Contract Tests
//
// These tests verify INVARIANTS that MUST NEVER BREAK regardless of implementation.
//
// **Problem**: Checks start hitting the network, or a failed fetch looks like "signed out"
// **Solution**: Count backend calls and pin the unauthenticated causes

use async_trait::async_trait;
use eatpal_authz::errors::{AuthzError, Result};
use eatpal_authz::{check, AuthBackend, ContextState, Role, SecurityContextProvider, UnauthenticatedCause};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CountingBackend {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingBackend {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
            fail,
        })
    }
}

#[async_trait]
impl AuthBackend for CountingBackend {
    async fn current_actor(&self) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AuthzError::Backend("503 Service Unavailable".to_string()));
        }
        Ok(Some("parent-1".to_string()))
    }

    async fn role_for(&self, _actor: &str) -> Result<Role> {
        Ok(Role::User)
    }

    async fn permissions_for(&self, _actor: &str, _role: Role) -> Result<BTreeSet<String>> {
        Ok(["food.view_own".to_string()].into_iter().collect())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// WHY: The backend is asked once per provider
/// REASON: Checks are synchronous evaluations over a cached snapshot
/// BREAKS: Render latency and backend load if every check fetches
/// SACRIFICES: If this fails, authorization has become a network call
#[tokio::test]
async fn context_is_fetched_once() {
    let backend = CountingBackend::new(false);
    let provider = SecurityContextProvider::new(backend.clone());

    for _ in 0..5 {
        let state = provider.load().await;
        assert!(check(&state, "food.view_own", None).allowed());
        assert!(check(&provider.get_context(), "food.view_own", None).allowed());
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
}

/// WHY: A failed fetch is distinct from having no session
/// REASON: The UI offers a retry for outages instead of a plain sign-in prompt
/// BREAKS: Users bounced to sign-in during a backend outage
#[tokio::test]
async fn fetch_failure_is_not_no_session() {
    let provider = SecurityContextProvider::new(CountingBackend::new(true));
    let state = provider.load().await;

    assert!(state.fetch_failed());
    assert!(matches!(
        state,
        ContextState::Unauthenticated(UnauthenticatedCause::FetchFailed { .. })
    ));
    assert_ne!(state, ContextState::Unauthenticated(UnauthenticatedCause::NoSession));
}

/// WHY: A failed provider is not retried implicitly
/// REASON: Re-fetching goes through invalidate(), which yields a fresh provider
/// BREAKS: Retry storms against a failing backend
#[tokio::test]
async fn failed_provider_stays_failed_until_invalidated() {
    let backend = CountingBackend::new(true);
    let provider = SecurityContextProvider::new(backend.clone());

    provider.load().await;
    provider.load().await;
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    let fresh = provider.invalidate();
    assert!(fresh.get_context().is_loading());
    fresh.load().await;
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
}
