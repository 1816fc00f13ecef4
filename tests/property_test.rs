use aclsync::core::diff;
use aclsync::core::grants;
use aclsync::core::privilege::{self, Scope};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn scope_strategy() -> impl Strategy<Value = Scope> {
    prop::sample::select(vec![Scope::Database, Scope::Schema, Scope::Table])
}

fn enumerated_names(scope: Scope) -> Vec<String> {
    scope
        .privilege_table()
        .iter()
        .skip(1)
        .map(|(_, name)| name.to_string())
        .collect()
}

/// A scope together with an arbitrary subset of its privilege names,
/// `all` included.
fn scope_and_subset() -> impl Strategy<Value = (Scope, Vec<String>)> {
    scope_strategy().prop_flat_map(|scope| {
        let names: Vec<String> = scope
            .privilege_table()
            .iter()
            .map(|(_, name)| name.to_string())
            .collect();
        let len = names.len();
        prop::sample::subsequence(names, 0..=len).prop_map(move |subset| (scope, subset))
    })
}

/// Privilege sets compare by what they grant: `all` stands for every
/// enumerated privilege of the scope.
fn granted_set(scope: Scope, names: &[String]) -> BTreeSet<String> {
    if names.iter().any(|name| name == "all") {
        enumerated_names(scope).into_iter().collect()
    } else {
        names.iter().cloned().collect()
    }
}

proptest! {
    #[test]
    fn prop_encode_then_parse_preserves_granted_privileges(
        (scope, subset) in scope_and_subset()
    ) {
        let encoded = privilege::encode_privileges(scope, &subset);
        let parsed = privilege::parse_privileges(scope, &encoded);
        prop_assert_eq!(granted_set(scope, &parsed), granted_set(scope, &subset));
    }

    #[test]
    fn prop_encoding_is_independent_of_input_order(
        (scope, subset) in scope_and_subset()
    ) {
        let mut reversed = subset.clone();
        reversed.reverse();
        prop_assert_eq!(
            privilege::encode_privileges(scope, &subset),
            privilege::encode_privileges(scope, &reversed)
        );
    }

    #[test]
    fn prop_parsed_flags_are_always_known_privileges(
        scope in scope_strategy(),
        flags in "[a-zA-Z*=/,]{0,16}"
    ) {
        let known: Vec<String> = scope
            .privilege_table()
            .iter()
            .map(|(_, name)| name.to_string())
            .collect();
        for privilege in privilege::parse_privileges(scope, &flags) {
            prop_assert!(known.contains(&privilege));
        }
    }

    #[test]
    fn prop_acl_parser_never_yields_the_master_user(
        scope in scope_strategy(),
        raw in ".{0,80}"
    ) {
        let parsed = grants::parse_acl_entries(scope, &raw, "admin");
        prop_assert!(!parsed.contains_key("admin"));
    }

    #[test]
    fn prop_diff_partitions_both_sides(
        current in prop::collection::vec("[a-d]{1,2}", 0..8),
        desired in prop::collection::vec("[a-d]{1,2}", 0..8)
    ) {
        let divergence = diff::diff(&current, &desired);
        for item in &divergence.undefined {
            prop_assert!(current.contains(item));
            prop_assert!(!desired.contains(item));
        }
        for item in &divergence.missing {
            prop_assert!(desired.contains(item));
            prop_assert!(!current.contains(item));
        }
        prop_assert_eq!(
            divergence.count(),
            divergence.undefined.len() + divergence.missing.len()
        );
    }

    #[test]
    fn prop_diff_of_a_permutation_is_synced(
        items in prop::collection::vec("[a-d]{1,2}", 0..8)
    ) {
        let mut reversed = items.clone();
        reversed.reverse();
        prop_assert!(diff::diff(&items, &reversed).is_synced());
    }
}
