//! Property-based tests for the permission model.
//!
//! These tests verify the algebraic contracts of `PermissionSet::merge`:
//! - Idempotence: merging a set with itself is a no-op
//! - Commutativity and associativity
//! - Monotonicity: merging never lowers a grant
//! - Rendering order is independent of insertion order

use awc_core::{Level, PermissionSet, Scope};
use proptest::prelude::*;

// =============================================================================
// Strategies for generating test data
// =============================================================================

fn scope_strategy() -> impl Strategy<Value = Scope> {
    proptest::sample::select(Scope::ALL.to_vec())
}

fn level_strategy() -> impl Strategy<Value = Level> {
    prop_oneof![Just(Level::None), Just(Level::Read), Just(Level::Write)]
}

fn requirements_strategy() -> impl Strategy<Value = Vec<(Scope, Level)>> {
    proptest::collection::vec((scope_strategy(), level_strategy()), 0..12)
}

fn set_from(requirements: &[(Scope, Level)]) -> PermissionSet {
    requirements
        .iter()
        .fold(PermissionSet::new(), |set, &(scope, level)| set.with(scope, level))
}

fn permission_set_strategy() -> impl Strategy<Value = PermissionSet> {
    requirements_strategy().prop_map(|reqs| set_from(&reqs))
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_merge_is_idempotent(p in permission_set_strategy()) {
        prop_assert_eq!(p.merge(&p), p);
    }

    #[test]
    fn prop_merge_is_commutative(a in permission_set_strategy(), b in permission_set_strategy()) {
        prop_assert_eq!(a.merge(&b), b.merge(&a));
    }

    #[test]
    fn prop_merge_is_associative(
        a in permission_set_strategy(),
        b in permission_set_strategy(),
        c in permission_set_strategy(),
    ) {
        prop_assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
    }

    #[test]
    fn prop_merge_never_lowers(a in permission_set_strategy(), b in permission_set_strategy()) {
        let merged = a.merge(&b);
        for scope in Scope::ALL {
            prop_assert!(merged.level(scope) >= a.level(scope));
            prop_assert!(merged.level(scope) >= b.level(scope));
            prop_assert_eq!(merged.level(scope), a.level(scope).max(b.level(scope)));
        }
    }

    #[test]
    fn prop_rendering_ignores_insertion_order(reqs in requirements_strategy()) {
        let forward = set_from(&reqs);
        let mut reversed = reqs.clone();
        reversed.reverse();
        let backward = set_from(&reversed);

        prop_assert_eq!(
            serde_yaml::to_string(&forward).unwrap(),
            serde_yaml::to_string(&backward).unwrap()
        );
    }

    #[test]
    fn prop_write_only_from_a_write_requirement(reqs in requirements_strategy()) {
        let set = set_from(&reqs);
        let requested_write = reqs.iter().any(|&(_, level)| level == Level::Write);
        prop_assert_eq!(set.has_write(), requested_write);
    }

    #[test]
    fn prop_rendered_scopes_follow_declaration_order(p in permission_set_strategy()) {
        let rendered: Vec<Scope> = p.iter().map(|(scope, _)| scope).collect();
        let mut sorted = rendered.clone();
        sorted.sort();
        prop_assert_eq!(rendered, sorted);
    }
}
