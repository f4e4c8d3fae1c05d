//! Integration tests for a complete session
//!
//! Tests the full path from policy file to decision:
//! - Policy load and backend construction
//! - One-shot context resolution
//! - Evaluation with audit of denials
//! - Sign-out and re-authentication

use eatpal_authz::audit::DENIAL_EVENT;
use eatpal_authz::rbac::permissions::*;
use eatpal_authz::{
    check, meets_role, AuthzConfig, CheckReason, ContextState, OwnershipDescriptor, Role, SecurityContextProvider,
    UnauthenticatedCause,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const POLICY: &str = r#"
apiVersion: eatpal/v1
kind: AuthzPolicy
metadata:
  name: eatpal-web
spec:
  backend:
    kind: static
    session: parent-1
    actors:
      - id: parent-1
        role: user
      - id: parent-2
        role: user
      - id: mod-1
        role: moderator
      - id: ops
        role: admin
  audit:
    path: audit/security.jsonl
"#;

fn write_policy(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("authz.yaml");
    fs::write(&path, POLICY).unwrap();
    path
}

#[tokio::test]
async fn test_complete_session_lifecycle() {
    let temp = TempDir::new().unwrap();
    let config = AuthzConfig::load(write_policy(&temp)).unwrap();
    let evaluator = config.evaluator(temp.path());

    // 1. Resolve the context
    let provider = SecurityContextProvider::new(config.build_backend_with_env(|_| None).unwrap());
    assert!(provider.get_context().is_loading());
    let state = provider.load().await;
    let ctx = state.ready().expect("parent-1 should be signed in");
    assert_eq!(ctx.identity(), "parent-1");
    assert_eq!(ctx.role(), Role::User);

    // 2. Own records are reachable, other families' are not
    let own_food = OwnershipDescriptor::new("parent-1");
    let other_food = OwnershipDescriptor::new("parent-2");
    assert!(evaluator.check(&state, FOOD_EDIT_OWN, Some(&own_food)).allowed());
    assert_eq!(
        evaluator.check(&state, FOOD_EDIT_OWN, Some(&other_food)).reason(),
        CheckReason::OwnershipDenied
    );
    assert_eq!(
        evaluator.check(&state, ADMIN_DASHBOARD, None).reason(),
        CheckReason::PermissionDenied
    );
    assert!(!meets_role(&state, Role::Moderator));

    // 3. Denials were audited
    let audit = config.audit_log(temp.path()).unwrap();
    let entries = audit.read_entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.event == DENIAL_EVENT));
    assert!(entries.iter().all(|e| e.actor.as_deref() == Some("parent-1")));

    // 4. Sign out: fresh provider, no session
    let signed_out = provider.sign_out().await.unwrap();
    let state = signed_out.load().await;
    assert_eq!(state, ContextState::Unauthenticated(UnauthenticatedCause::NoSession));
    assert_eq!(
        check(&state, FOOD_VIEW_OWN, None).reason(),
        CheckReason::AuthenticationRequired
    );
}

#[tokio::test]
async fn test_each_role_against_default_table() {
    let temp = TempDir::new().unwrap();
    let mut config = AuthzConfig::load(write_policy(&temp)).unwrap();

    let mut states = Vec::new();
    for actor in ["parent-1", "mod-1", "ops"] {
        if let eatpal_authz::config::BackendConfig::Static { session, .. } = &mut config.spec.backend {
            *session = Some(actor.to_string());
        }
        let provider = SecurityContextProvider::new(config.build_backend_with_env(|_| None).unwrap());
        states.push(provider.load().await);
    }
    let (user, moderator, admin) = (&states[0], &states[1], &states[2]);
    let foreign = OwnershipDescriptor::new("parent-2");

    // Moderators may act on other families' content they are granted
    assert!(!check(user, FOOD_DELETE_ANY, Some(&foreign)).allowed());
    assert!(check(moderator, FOOD_DELETE_ANY, Some(&foreign)).allowed());
    assert!(!check(moderator, SEO_MANAGE, None).allowed());

    // Admin passes everything
    for permission in [FOOD_DELETE_ANY, SEO_MANAGE, USER_MANAGE, "billing.refund"] {
        assert!(check(admin, permission, Some(&foreign)).allowed());
    }
    assert!(meets_role(admin, Role::Admin));
    assert!(meets_role(moderator, Role::Moderator));
    assert!(!meets_role(moderator, Role::Admin));
}

#[tokio::test]
async fn test_provider_shared_across_tasks() {
    let temp = TempDir::new().unwrap();
    let config = AuthzConfig::load(write_policy(&temp)).unwrap();
    let provider = std::sync::Arc::new(SecurityContextProvider::new(
        config.build_backend_with_env(|_| None).unwrap(),
    ));

    let mut handles = Vec::new();
    for i in 0..8 {
        let provider = provider.clone();
        handles.push(tokio::spawn(async move {
            let state = provider.load().await;
            let owner = if i % 2 == 0 { "parent-1" } else { "parent-2" };
            check(&state, PLAN_VIEW_OWN, Some(&OwnershipDescriptor::new(owner))).allowed()
        }));
    }

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 4);
}
