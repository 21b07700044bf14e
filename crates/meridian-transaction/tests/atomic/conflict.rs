// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use meridian_transaction::test_utils::TestEngine;
use meridian_type::Value;

/// §8 scenario 3: T1 reads a scope, T2 commits a write touching it, T1's
/// commit must then observe the conflict and abort rather than silently
/// clobber T2's write.
#[test]
fn a_read_scope_changed_by_another_commit_aborts_the_reader() {
    let harness = TestEngine::new();

    let t1 = harness.begin_atomic_operation();
    let _ = t1.select("name", 1, None).unwrap();

    let t2 = harness.begin_atomic_operation();
    t2.add("name", Value::String("dave".into()), 1).unwrap();
    assert!(t2.commit().unwrap());

    assert!(t1.is_conflicted());
    assert_eq!(t1.commit().unwrap(), false);
}

#[test]
fn two_writers_on_disjoint_records_never_conflict() {
    let harness = TestEngine::new();
    let t1 = harness.begin_atomic_operation();
    let t2 = harness.begin_atomic_operation();

    t1.add("name", Value::String("alice".into()), 1).unwrap();
    t2.add("name", Value::String("bob".into()), 2).unwrap();

    assert!(t1.commit().unwrap());
    assert!(t2.commit().unwrap());
}

#[test]
fn a_write_only_operation_with_no_prior_reads_does_not_conflict_with_an_unrelated_write() {
    let harness = TestEngine::new();
    let t1 = harness.begin_atomic_operation();
    t1.add("name", Value::String("alice".into()), 1).unwrap();

    let t2 = harness.begin_atomic_operation();
    t2.add("age", Value::Integer(30), 2).unwrap();
    assert!(t2.commit().unwrap());

    // t1 never touched (age, 2), so t2's commit cannot have invalidated it.
    assert!(!t1.is_conflicted());
    assert!(t1.commit().unwrap());
}
