//! Integration tests for route guards driven by a live provider
//!
//! Tests guard behaviour across the provider lifecycle:
//! - Loading before the first fetch
//! - Redirects for missing or failed sessions
//! - In-place denials for under-privileged actors
//! - Re-entering Loading only through invalidation

use async_trait::async_trait;
use eatpal_authz::backend::{ActorRecord, AuthBackend, StaticBackend};
use eatpal_authz::errors::{AuthzError, Result};
use eatpal_authz::{CheckReason, Guard, GuardState, OwnershipDescriptor, Rendered, Role, SecurityContextProvider};
use std::collections::BTreeSet;
use std::sync::Arc;

struct UnreachableBackend;

#[async_trait]
impl AuthBackend for UnreachableBackend {
    async fn current_actor(&self) -> Result<Option<String>> {
        Err(AuthzError::Backend("connection refused".to_string()))
    }

    async fn role_for(&self, _actor: &str) -> Result<Role> {
        unreachable!("no actor is ever resolved")
    }

    async fn permissions_for(&self, _actor: &str, _role: Role) -> Result<BTreeSet<String>> {
        unreachable!("no actor is ever resolved")
    }

    fn name(&self) -> &str {
        "unreachable"
    }
}

fn family_backend() -> Arc<StaticBackend> {
    Arc::new(
        StaticBackend::new()
            .with_actor(ActorRecord::new("parent-1", Role::User))
            .with_actor(ActorRecord::new("mod-1", Role::Moderator))
            .signed_in_as("parent-1"),
    )
}

#[tokio::test]
async fn test_guard_before_and_after_load() {
    let provider = SecurityContextProvider::new(family_backend());
    let guard = Guard::permission("food.view_own");

    assert_eq!(guard.evaluate(&provider.get_context(), "/foods"), GuardState::Loading);

    provider.load().await;
    assert_eq!(guard.evaluate(&provider.get_context(), "/foods"), GuardState::Authorized);
}

#[tokio::test]
async fn test_moderator_route_denies_user_in_place() {
    let provider = SecurityContextProvider::new(family_backend());
    let state = provider.load().await;

    let guard = Guard::role_level(Role::Moderator);
    let rendered: Rendered<&str> = guard.render(&state, "/admin/moderation", || "queue");
    match rendered {
        Rendered::AccessDenied { reason, .. } => assert_eq!(reason, CheckReason::PermissionDenied),
        other => panic!("Expected in-place denial, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ownership_guard() {
    let provider = SecurityContextProvider::new(family_backend());
    let state = provider.load().await;

    let mine = Guard::permission_and_ownership("kid.manage_own", OwnershipDescriptor::new("parent-1"));
    let theirs = Guard::permission_and_ownership("kid.manage_own", OwnershipDescriptor::new("parent-9"));

    assert_eq!(mine.evaluate(&state, "/kids/1"), GuardState::Authorized);
    assert_eq!(
        theirs.evaluate(&state, "/kids/9"),
        GuardState::Denied {
            reason: CheckReason::OwnershipDenied
        }
    );
}

#[tokio::test]
async fn test_no_session_redirects_to_sign_in() {
    let provider = SecurityContextProvider::new(Arc::new(StaticBackend::new()));
    let state = provider.load().await;

    let decision = Guard::authenticated().evaluate(&state, "/dashboard");
    assert_eq!(
        decision,
        GuardState::Unauthenticated {
            redirect: "/auth?redirect=%2Fdashboard".to_string(),
            retry_available: false,
        }
    );
}

#[tokio::test]
async fn test_fetch_failure_redirects_with_retry() {
    let provider = SecurityContextProvider::new(Arc::new(UnreachableBackend));
    let state = provider.load().await;

    match Guard::permission("plan.view_own").evaluate(&state, "/meal-plan") {
        GuardState::Unauthenticated { retry_available, .. } => assert!(retry_available),
        other => panic!("Expected redirect, got {:?}", other),
    }
}

#[tokio::test]
async fn test_guard_waits_on_subscription() {
    let provider = Arc::new(SecurityContextProvider::new(family_backend()));
    let mut rx = provider.subscribe();
    let guard = Guard::permission("grocery.edit_own");

    let loader = {
        let provider = provider.clone();
        tokio::spawn(async move { provider.load().await })
    };

    let decision = guard.wait_for_decision(&mut rx, "/grocery").await.unwrap();
    assert_eq!(decision, GuardState::Authorized);
    loader.await.unwrap();
}

#[tokio::test]
async fn test_invalidation_reenters_loading() {
    let backend = family_backend();
    let provider = SecurityContextProvider::new(backend.clone());
    let guard = Guard::role_level(Role::Moderator);
    let mut rx = provider.subscribe();

    provider.load().await;
    assert!(matches!(guard.evaluate(&provider.get_context(), "/mod"), GuardState::Denied { .. }));

    backend.sign_in("mod-1");
    let fresh = provider.invalidate();
    assert_eq!(guard.evaluate(&rx.borrow_and_update(), "/mod"), GuardState::Loading);
    assert_eq!(guard.evaluate(&fresh.get_context(), "/mod"), GuardState::Loading);

    fresh.load().await;
    assert_eq!(guard.evaluate(&fresh.get_context(), "/mod"), GuardState::Authorized);
    assert_eq!(guard.wait_for_decision(&mut rx, "/mod").await.unwrap(), GuardState::Authorized);
}
