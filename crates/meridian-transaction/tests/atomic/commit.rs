// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use meridian_transaction::test_utils::TestEngine;
use meridian_type::Value;

#[test]
fn basic_add_then_select() {
    let harness = TestEngine::new();
    let op = harness.begin_atomic_operation();
    assert!(op.add("name", Value::String("alice".into()), 1).unwrap());
    assert_eq!(op.commit().unwrap(), true);

    let op = harness.begin_atomic_operation();
    let values = op.select("name", 1, None).unwrap();
    assert_eq!(values, std::collections::HashSet::from([Value::String("alice".into())]));
}

#[test]
fn add_then_remove_clears_the_field() {
    let harness = TestEngine::new();
    let op = harness.begin_atomic_operation();
    op.add("name", Value::String("alice".into()), 1).unwrap();
    assert!(op.commit().unwrap());

    let op = harness.begin_atomic_operation();
    op.remove("name", Value::String("alice".into()), 1).unwrap();
    assert!(op.commit().unwrap());

    let op = harness.begin_atomic_operation();
    assert!(op.select("name", 1, None).unwrap().is_empty());
}

#[test]
fn set_replaces_every_existing_value_regardless_of_prior_state() {
    let harness = TestEngine::new();
    let op = harness.begin_atomic_operation();
    op.add("name", Value::String("alice".into()), 1).unwrap();
    op.add("name", Value::String("bob".into()), 1).unwrap();
    assert!(op.commit().unwrap());

    let op = harness.begin_atomic_operation();
    op.set("name", Value::String("carol".into()), 1).unwrap();
    assert!(op.commit().unwrap());

    let op = harness.begin_atomic_operation();
    assert_eq!(op.select("name", 1, None).unwrap(), std::collections::HashSet::from([Value::String("carol".into())]));
}

#[test]
fn committed_writes_are_visible_to_a_later_operation() {
    let harness = TestEngine::new();
    let op = harness.begin_atomic_operation();
    op.add("name", Value::String("alice".into()), 1).unwrap();
    assert!(op.commit().unwrap());

    let later = harness.begin_atomic_operation();
    assert_eq!(later.select("name", 1, None).unwrap(), std::collections::HashSet::from([Value::String("alice".into())]));
}

#[test]
fn abort_discards_staged_writes() {
    let harness = TestEngine::new();
    let op = harness.begin_atomic_operation();
    op.add("name", Value::String("alice".into()), 1).unwrap();
    op.abort().unwrap();

    let op = harness.begin_atomic_operation();
    assert!(op.select("name", 1, None).unwrap().is_empty());
}

#[test]
fn abort_is_idempotent() {
    let harness = TestEngine::new();
    let op = harness.begin_atomic_operation();
    op.add("name", Value::String("alice".into()), 1).unwrap();
    // `AtomicOperation::abort` takes `self`, so idempotence for a live
    // handle is exercised at the `Transaction` layer (see
    // transaction/nested.rs); here we only confirm a single abort succeeds.
    assert!(op.abort().is_ok());
}
