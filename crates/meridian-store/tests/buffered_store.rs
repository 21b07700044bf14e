// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

//! Black-box coverage of `BufferedStore`'s XOR-merge reads, focused on the
//! §9(a) `search` replay semantics (a buffered REMOVE must cancel a
//! permanent hit rather than re-add it, unlike a naive symmetric difference).

use meridian_buffer::InMemoryBuffer;
use meridian_core::{Action, MonotonicClock, Write};
use meridian_store::{BufferedStore, MemoryStore, PermanentStore};
use meridian_type::Value;
use std::sync::Arc;

fn store() -> BufferedStore<InMemoryBuffer, MemoryStore> {
    BufferedStore::new(Arc::new(InMemoryBuffer::new()), Arc::new(MemoryStore::new()), Arc::new(MonotonicClock::new()))
}

#[test]
fn a_buffered_remove_drops_a_search_hit_instead_of_symmetric_difference_re_adding_it() {
    let store = store();
    store.destination().accept(Write::new(Action::Add, "name", Value::String("alison".into()), 1, &MonotonicClock::starting_at(1))).unwrap();

    // Naive set-symmetric-difference would see {1} from the destination and
    // {} from the buffer's own search (a REMOVE contributes nothing to the
    // buffer's positive hit set), and XOR those into {1} -- wrongly still
    // matching. The faithful replay must drop it.
    store.remove("name", Value::String("alison".into()), 1, false, false, true);

    let hits = store.search("name", "ali", None, true);
    assert!(!hits.contains(&1));
}

#[test]
fn a_buffered_add_contributes_a_search_hit_not_present_in_the_destination() {
    let store = store();
    store.add("name", Value::String("alison".into()), 7, false, true, true);

    let hits = store.search("name", "ali", None, true);
    assert!(hits.contains(&7));
}

#[test]
fn search_excludes_a_record_whose_only_matching_value_was_removed_after_being_added() {
    let store = store();
    store.add("name", Value::String("alison".into()), 3, false, true, true);
    store.remove("name", Value::String("alison".into()), 3, false, true, true);

    let hits = store.search("name", "ali", None, true);
    assert!(!hits.contains(&3));
}

#[test]
fn historical_reads_use_the_destinations_own_timestamped_path() {
    let store = store();
    store.add("name", Value::String("alice".into()), 1, false, true, true);
    store.commit_buffer().unwrap();
    let checkpoint = store.get_version(&meridian_core::Token::key_record("name", 1));

    store.add("name", Value::String("alicia".into()), 1, false, true, true);
    store.commit_buffer().unwrap();

    let historical = store.select("name", 1, Some(checkpoint), true);
    assert_eq!(historical, std::collections::HashSet::from([Value::String("alice".into())]));

    let present = store.select("name", 1, None, true);
    assert_eq!(present, std::collections::HashSet::from([Value::String("alice".into()), Value::String("alicia".into())]));
}

#[test]
fn get_version_is_non_decreasing() {
    let store = store();
    let scope = meridian_core::Token::key_record("name", 1);
    let v0 = store.get_version(&scope);
    store.add("name", Value::String("alice".into()), 1, false, true, true);
    let v1 = store.get_version(&scope);
    assert!(v1 >= v0);
    store.commit_buffer().unwrap();
    let v2 = store.get_version(&scope);
    assert!(v2 >= v1);
}
