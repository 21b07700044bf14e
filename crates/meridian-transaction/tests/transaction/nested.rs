// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use meridian_transaction::test_utils::TestEngine;
use meridian_type::Value;

#[test]
fn a_committed_nested_operation_writes_become_visible_through_the_transaction() {
    let harness = TestEngine::new();
    let txn = harness.begin_transaction();

    let child = txn.start_atomic_operation().unwrap();
    child.add("name", Value::String("alice".into()), 1).unwrap();
    assert!(child.commit().unwrap());

    // Visible to the transaction before its own commit...
    assert_eq!(txn.select("name", 1, None).unwrap(), std::collections::HashSet::from([Value::String("alice".into())]));

    assert!(txn.commit().unwrap());
}

#[test]
fn an_aborted_nested_operation_leaves_no_trace_in_the_parent_transaction() {
    let harness = TestEngine::new();
    let txn = harness.begin_transaction();

    let child = txn.start_atomic_operation().unwrap();
    child.add("name", Value::String("alice".into()), 1).unwrap();
    child.abort().unwrap();

    assert!(txn.select("name", 1, None).unwrap().is_empty());
    assert!(txn.commit().unwrap());
}

#[test]
fn two_sibling_nested_operations_on_disjoint_records_both_commit() {
    let harness = TestEngine::new();
    let txn = harness.begin_transaction();

    let a = txn.start_atomic_operation().unwrap();
    let b = txn.start_atomic_operation().unwrap();
    a.add("name", Value::String("alice".into()), 1).unwrap();
    b.add("name", Value::String("bob".into()), 2).unwrap();

    assert!(a.commit().unwrap());
    assert!(b.commit().unwrap());
    assert!(txn.commit().unwrap());
}

#[test]
fn a_nested_operation_conflicting_with_a_concurrent_outer_level_commit_aborts() {
    let harness = TestEngine::new();
    let txn = harness.begin_transaction();

    let child = txn.start_atomic_operation().unwrap();
    let _ = child.select("name", 1, None).unwrap();

    // A top-level write that lands directly in the engine (bypassing this
    // transaction entirely) changes the scope the child is watching.
    let other = harness.begin_atomic_operation();
    other.add("name", Value::String("dave".into()), 1).unwrap();
    assert!(other.commit().unwrap());

    assert!(child.is_conflicted());
    assert_eq!(child.commit().unwrap(), false);
}

#[test]
fn starting_a_nested_operation_on_a_closed_transaction_is_rejected() {
    let harness = TestEngine::new();
    let txn = harness.begin_transaction();
    assert!(txn.commit().unwrap());

    assert!(txn.start_atomic_operation().is_err());
}
