// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use meridian_transaction::test_utils::TestEngine;
use meridian_type::Value;

/// §9(b): an operation must observe its own writes in subsequent reads,
/// well before commit -- required by `add`/`remove`'s own existence checks.
#[test]
fn a_read_after_a_write_sees_that_write_before_commit() {
    let harness = TestEngine::new();
    let op = harness.begin_atomic_operation();

    assert!(op.add("name", Value::String("alice".into()), 1).unwrap());
    let values = op.select("name", 1, None).unwrap();
    assert_eq!(values, std::collections::HashSet::from([Value::String("alice".into())]));
}

#[test]
fn a_second_add_of_the_same_value_is_a_no_op_against_its_own_uncommitted_write() {
    let harness = TestEngine::new();
    let op = harness.begin_atomic_operation();

    assert!(op.add("name", Value::String("alice".into()), 1).unwrap());
    assert!(!op.add("name", Value::String("alice".into()), 1).unwrap());
}

#[test]
fn a_remove_after_an_uncommitted_add_cancels_it_out() {
    let harness = TestEngine::new();
    let op = harness.begin_atomic_operation();

    op.add("name", Value::String("alice".into()), 1).unwrap();
    assert!(op.remove("name", Value::String("alice".into()), 1).unwrap());
    assert!(op.select("name", 1, None).unwrap().is_empty());
}
