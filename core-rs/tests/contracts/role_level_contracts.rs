// Role Ordering Contract Tests
//
// These tests verify INVARIANTS that MUST NEVER BREAK regardless of implementation.
//
// **Problem**: Role levels get renumbered or compared by name
// **Solution**: Pin the order and the monotonicity of level checks

use eatpal_authz::{meets_level, ContextState, Role, SecurityContext};
use std::collections::BTreeSet;

fn as_role(role: Role) -> ContextState {
    ContextState::loaded(SecurityContext::new("actor", role, BTreeSet::new()))
}

/// WHY: guest < user < moderator < admin, levels 0..=3
/// REASON: Persisted route requirements reference numeric levels
/// BREAKS: Every minimum-level route if renumbered
/// SACRIFICES: If this fails, stored level requirements change meaning
#[test]
fn role_levels_are_fixed() {
    assert_eq!(Role::Guest.level(), 0);
    assert_eq!(Role::User.level(), 1);
    assert_eq!(Role::Moderator.level(), 2);
    assert_eq!(Role::Admin.level(), 3);
    assert!(Role::Guest < Role::User && Role::User < Role::Moderator && Role::Moderator < Role::Admin);
}

/// WHY: meets_level is monotonic in the role
/// REASON: Promoting an actor must never lose access
/// BREAKS: Moderators locked out of user pages, admins out of moderator pages
#[test]
fn meets_level_is_monotonic() {
    for min in 0..=4u8 {
        for pair in Role::ALL.windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            if meets_level(&as_role(lower), min) {
                assert!(meets_level(&as_role(higher), min), "{} met {} but {} did not", lower, min, higher);
            }
        }
    }
}

/// WHY: No level is met without a loaded context
/// REASON: Level checks fail closed while loading or signed out
/// BREAKS: Flash of privileged content before the context resolves
#[test]
fn meets_level_fails_closed_without_context() {
    for min in 0..=3u8 {
        assert!(!meets_level(&ContextState::Loading, min));
        assert!(!meets_level(
            &ContextState::Unauthenticated(eatpal_authz::UnauthenticatedCause::NoSession),
            min
        ));
    }
}

/// WHY: Role names are the lowercase wire strings
/// REASON: Backend role rows and policy files store these exact strings
/// BREAKS: Role resolution for every actor
#[test]
fn role_names_round_trip() {
    for role in Role::ALL {
        assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        assert_eq!(role.as_str(), role.as_str().to_lowercase());
    }
    assert!("superuser".parse::<Role>().is_err());
}
