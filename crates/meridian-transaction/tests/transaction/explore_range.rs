// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

//! §8 scenario 6: the permanent store returns `{1:{5}, 2:{10}}` for
//! `age > 3`; a buffered REMOVE(age,5,1) and ADD(age,4,3) must refine that
//! into `{2:{10}, 3:{4}}`.

use meridian_core::Operator;
use meridian_transaction::test_utils::TestEngine;
use meridian_type::Value;

#[test]
fn explore_refines_a_permanent_range_result_with_buffered_writes() {
    let harness = TestEngine::new();

    let setup = harness.begin_atomic_operation();
    setup.add("age", Value::Integer(5), 1).unwrap();
    setup.add("age", Value::Integer(10), 2).unwrap();
    assert!(setup.commit().unwrap());

    let txn = harness.begin_transaction();
    txn.remove("age", Value::Integer(5), 1).unwrap();
    txn.add("age", Value::Integer(4), 3).unwrap();

    let result = txn.explore(None, "age", Operator::Gt, &[Value::Integer(3)]).unwrap();
    assert!(!result.contains_key(&1));
    assert_eq!(result.get(&2), Some(&std::collections::HashSet::from([Value::Integer(10)])));
    assert_eq!(result.get(&3), Some(&std::collections::HashSet::from([Value::Integer(4)])));

    assert!(txn.commit().unwrap());
}

#[test]
fn between_operator_matches_the_inclusive_interval() {
    let harness = TestEngine::new();
    let txn = harness.begin_transaction();
    txn.add("age", Value::Integer(3), 1).unwrap();
    txn.add("age", Value::Integer(9), 2).unwrap();
    txn.add("age", Value::Integer(10), 3).unwrap();

    let result = txn.explore(None, "age", Operator::Between, &[Value::Integer(3), Value::Integer(9)]).unwrap();
    assert!(result.contains_key(&1));
    assert!(result.contains_key(&2));
    assert!(!result.contains_key(&3));
}
