// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

//! §8 scenario 4: a permanent ADD and a buffered REMOVE of the same triple
//! cancel out under XOR semantics; a further buffered ADD flips it back.

use meridian_transaction::test_utils::TestEngine;
use meridian_type::Value;

#[test]
fn a_buffered_remove_cancels_a_permanent_add_and_a_further_add_restores_it() {
    let harness = TestEngine::new();

    let setup = harness.begin_atomic_operation();
    setup.add("name", Value::String("alice".into()), 1).unwrap();
    assert!(setup.commit().unwrap());

    let txn = harness.begin_transaction();
    assert!(txn.verify("name", &Value::String("alice".into()), 1, None).unwrap());

    txn.remove("name", Value::String("alice".into()), 1).unwrap();
    assert!(!txn.verify("name", &Value::String("alice".into()), 1, None).unwrap());

    txn.add("name", Value::String("alice".into()), 1).unwrap();
    assert!(txn.verify("name", &Value::String("alice".into()), 1, None).unwrap());

    assert!(txn.commit().unwrap());
}

#[test]
fn browse_never_returns_empty_value_sets() {
    let harness = TestEngine::new();
    let txn = harness.begin_transaction();
    txn.add("name", Value::String("alice".into()), 1).unwrap();
    txn.add("name", Value::String("alice".into()), 2).unwrap();
    txn.remove("name", Value::String("alice".into()), 2).unwrap();

    let browsed = txn.browse_key("name", None).unwrap();
    let records = browsed.get(&Value::String("alice".into())).cloned().unwrap_or_default();
    assert_eq!(records, std::collections::HashSet::from([1]));
    assert!(browsed.values().all(|set| !set.is_empty()));
}
