// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use meridian_transaction::test_utils::TestEngine;

fn backup_file_count(dir: &std::path::Path) -> usize {
    if !dir.exists() {
        return 0;
    }
    std::fs::read_dir(dir).unwrap().filter_map(|e| e.ok()).filter(|e| e.path().extension().and_then(|e| e.to_str()) == Some("txn")).count()
}

#[test]
fn a_read_only_transaction_commits_without_writing_a_backup_file() {
    let harness = TestEngine::new();
    let backup_dir = harness.engine().config().backup_dir.clone();

    let txn = harness.begin_transaction();
    let _ = txn.select("name", 1, None).unwrap();
    assert!(txn.commit().unwrap());

    assert_eq!(backup_file_count(&backup_dir), 0);
}

#[test]
fn a_transaction_with_writes_leaves_no_backup_file_after_a_clean_commit() {
    let harness = TestEngine::new();
    let backup_dir = harness.engine().config().backup_dir.clone();

    let txn = harness.begin_transaction();
    txn.add("name", meridian_type::Value::String("alice".into()), 1).unwrap();
    assert!(txn.commit().unwrap());

    assert_eq!(backup_file_count(&backup_dir), 0);
}
