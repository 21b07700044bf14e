// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

//! §8 scenario 5: a transaction backup that was forced to disk but never got
//! to delete itself (the crash window between steps 2 and 4 of durable
//! commit) must be replayed into the permanent store on the next recovery
//! pass, and the backup file must be gone afterward.

use meridian_core::{Action, MonotonicClock, Write};
use meridian_transaction::test_utils::TestEngine;
use meridian_type::Value;

/// Hand-assembles a backup file using the same wire framing the transaction
/// crate writes (`[u32 lockSectionLength][lockSection][writeSection]`, each
/// section a `[u32 count][for each: u32 size][bytes]` framed collection).
/// `meridian_transaction::backup` is crate-private, so an external,
/// black-box test reconstructs the format from the public `Write::encode`
/// wire form instead of reaching into the crate's internals.
fn frame(items: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend((items.len() as u32).to_be_bytes());
    for item in items {
        out.extend((item.len() as u32).to_be_bytes());
        out.extend(item);
    }
    out
}

fn backup_bytes(writes: &[Write]) -> Vec<u8> {
    let lock_section = frame(&[]);
    let write_section = frame(&writes.iter().map(Write::encode).collect::<Vec<_>>());
    let mut out = Vec::new();
    out.extend((lock_section.len() as u32).to_be_bytes());
    out.extend(lock_section);
    out.extend(write_section);
    out
}

#[test]
fn a_backup_left_on_disk_after_a_simulated_crash_is_replayed_and_then_deleted() {
    let harness = TestEngine::new();
    let backup_dir = harness.engine().config().backup_dir.clone();
    std::fs::create_dir_all(&backup_dir).unwrap();

    let clock = MonotonicClock::new();
    let write = Write::new(Action::Add, "name", Value::String("alice".into()), 1, &clock);
    let path = backup_dir.join("txn-00000000000000000001.txn");
    std::fs::write(&path, backup_bytes(&[write])).unwrap();

    let recovered = harness.engine().recover().unwrap();
    assert_eq!(recovered, 1);
    assert!(!path.exists());

    let op = harness.begin_atomic_operation();
    assert_eq!(op.select("name", 1, None).unwrap(), std::collections::HashSet::from([Value::String("alice".into())]));
}

#[test]
fn a_corrupt_backup_is_discarded_without_mutating_the_store() {
    let harness = TestEngine::new();
    let backup_dir = harness.engine().config().backup_dir.clone();
    std::fs::create_dir_all(&backup_dir).unwrap();

    let path = backup_dir.join("txn-00000000000000000002.txn");
    std::fs::write(&path, vec![0xffu8; 3]).unwrap();

    let recovered = harness.engine().recover().unwrap();
    assert_eq!(recovered, 0, "a corrupt backup is discarded, not counted as recovered");
    assert!(!path.exists());

    let op = harness.begin_atomic_operation();
    assert!(op.select("name", 1, None).unwrap().is_empty());
}

#[test]
fn recovering_an_empty_backup_directory_is_a_no_op() {
    let harness = TestEngine::new();
    assert_eq!(harness.engine().recover().unwrap(), 0);
}
