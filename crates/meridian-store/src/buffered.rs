// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use crate::permanent::Locking;
use crate::PermanentStore;
use meridian_buffer::{Buffer, WriteSink};
use meridian_core::{Action, MonotonicClock, Operator, RecordId, Token, Write};
use meridian_type::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;

/// Composes a `buffer` of pending writes with a `destination` permanent
/// store into one logical read/write surface.
///
/// Reads merge the destination's baseline with the buffer's pending writes
/// via XOR (see `meridian_buffer::Buffer`'s fold semantics); writes only
/// ever land in the buffer and reach `destination` through `commit_buffer`
/// (an `AtomicOperation`'s commit, or a top-level flush). This type holds no
/// lock of its own -- callers (`AtomicOperation`, `Transaction`) own
/// concurrency, choosing `Locking::Locked` or `Locking::Unsafe` per read via
/// the `lock_on_verify` flag.
pub struct BufferedStore<B: Buffer, D: PermanentStore + WriteSink> {
    buffer: Arc<B>,
    destination: Arc<D>,
    clock: Arc<MonotonicClock>,
}

impl<B: Buffer, D: PermanentStore + WriteSink> BufferedStore<B, D> {
    pub fn new(buffer: Arc<B>, destination: Arc<D>, clock: Arc<MonotonicClock>) -> Self {
        Self { buffer, destination, clock }
    }

    pub fn buffer(&self) -> &Arc<B> {
        &self.buffer
    }

    pub fn destination(&self) -> &Arc<D> {
        &self.destination
    }

    fn locking(lock_on_verify: bool) -> Locking {
        if lock_on_verify {
            Locking::Locked
        } else {
            Locking::Unsafe
        }
    }

    pub fn browse_key(&self, key: &str, timestamp: Option<u64>, lock_on_verify: bool) -> HashMap<Value, HashSet<RecordId>> {
        let mut context = self.destination.browse_key(key, timestamp, Self::locking(lock_on_verify));
        self.buffer.browse_key(key, timestamp.unwrap_or(self.clock.peek()), &mut context);
        context.retain(|_, set| !set.is_empty());
        context
    }

    pub fn browse_record(&self, record: RecordId, timestamp: Option<u64>, lock_on_verify: bool) -> HashMap<String, HashSet<Value>> {
        let mut context = self.destination.browse_record(record, timestamp, Self::locking(lock_on_verify));
        self.buffer.browse_record(record, timestamp.unwrap_or(self.clock.peek()), &mut context);
        context.retain(|_, set| !set.is_empty());
        context
    }

    pub fn select(&self, key: &str, record: RecordId, timestamp: Option<u64>, lock_on_verify: bool) -> HashSet<Value> {
        let mut context = self.destination.select(key, record, timestamp, Self::locking(lock_on_verify));
        self.buffer.select(key, record, timestamp.unwrap_or(self.clock.peek()), &mut context);
        context
    }

    pub fn verify(&self, key: &str, value: &Value, record: RecordId, timestamp: Option<u64>, lock_on_verify: bool) -> bool {
        let baseline = self.destination.verify(key, value, record, timestamp, Self::locking(lock_on_verify));
        let probe = Write::compare(key.to_string(), value.clone(), record, timestamp.unwrap_or(self.clock.peek()));
        self.buffer.verify(&probe, baseline)
    }

    pub fn explore(
        &self,
        timestamp: Option<u64>,
        key: &str,
        op: Operator,
        values: &[Value],
        lock_on_verify: bool,
    ) -> HashMap<RecordId, HashSet<Value>> {
        let mut context = self.destination.explore(timestamp, key, op, values, Self::locking(lock_on_verify));
        self.buffer.explore(&mut context, timestamp.unwrap_or(self.clock.peek()), key, op, values);
        context.retain(|_, set| !set.is_empty());
        context
    }

    /// Resolves the faithful `search` semantics: candidates are drawn from
    /// both the destination's textual hits and the buffer's own hits, then
    /// every candidate's *final* merged value set is recomputed and
    /// re-tested against `query` -- a buffered REMOVE that cancels a
    /// destination hit drops the candidate instead of (as a naive
    /// symmetric-difference would) re-adding it.
    pub fn search(&self, key: &str, query: &str, timestamp: Option<u64>, lock_on_verify: bool) -> HashSet<RecordId> {
        let effective_timestamp = timestamp.unwrap_or(self.clock.peek());
        let destination_context = self.destination.browse_key(key, timestamp, Self::locking(lock_on_verify));
        let mut candidates: HashSet<RecordId> = destination_context
            .iter()
            .filter(|(value, _)| value.to_string().contains(query))
            .flat_map(|(_, records)| records.iter().copied())
            .collect();
        candidates.extend(self.buffer.search(key, query, effective_timestamp));

        candidates
            .into_iter()
            .filter(|&record| {
                let values = self.select(key, record, timestamp, lock_on_verify);
                values.iter().any(|v| v.to_string().contains(query))
            })
            .collect()
    }

    /// `add` inserts an ADD write iff the field does not currently contain
    /// `value`. Returns `false` (a no-op) when it already does, or when
    /// `validate` is `false` the write is always inserted.
    pub fn add(&self, key: &str, value: Value, record: RecordId, sync: bool, validate: bool, lock_on_verify: bool) -> bool {
        if validate && self.verify(key, &value, record, None, lock_on_verify) {
            trace!(key, record, "add is a no-op: value already present");
            return false;
        }
        let write = Write::new(Action::Add, key.to_string(), value, record, &self.clock);
        self.buffer.insert(write, sync)
    }

    /// `remove` inserts a REMOVE write iff the field currently contains
    /// `value`.
    pub fn remove(&self, key: &str, value: Value, record: RecordId, sync: bool, validate: bool, lock_on_verify: bool) -> bool {
        if validate && !self.verify(key, &value, record, None, lock_on_verify) {
            trace!(key, record, "remove is a no-op: value already absent");
            return false;
        }
        let write = Write::new(Action::Remove, key.to_string(), value, record, &self.clock);
        self.buffer.insert(write, sync)
    }

    /// Unconditionally emits REMOVEs for every value currently held by
    /// `(key, record)`, then an ADD for `value`. Performs no existence
    /// check, so `select(key, record)` is `{value}` afterward regardless of
    /// prior state.
    pub fn set(&self, key: &str, value: Value, record: RecordId, sync: bool, lock_on_verify: bool) {
        let current = self.select(key, record, None, lock_on_verify);
        for existing in current {
            let write = Write::new(Action::Remove, key.to_string(), existing, record, &self.clock);
            self.buffer.insert(write, sync);
        }
        let write = Write::new(Action::Add, key.to_string(), value, record, &self.clock);
        self.buffer.insert(write, sync);
    }

    pub fn get_version(&self, scope: &Token) -> u64 {
        self.buffer.get_version(scope).max(self.destination.get_version(scope))
    }

    /// Drains the buffer into the destination in FIFO order. Used by an
    /// `AtomicOperation`'s commit once all locks are held.
    pub fn commit_buffer(&self) -> meridian_buffer::Result<()> {
        self.buffer.transport(self.destination.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use meridian_buffer::InMemoryBuffer;

    fn store() -> BufferedStore<InMemoryBuffer, MemoryStore> {
        BufferedStore::new(Arc::new(InMemoryBuffer::new()), Arc::new(MemoryStore::new()), Arc::new(MonotonicClock::new()))
    }

    #[test]
    fn add_then_select_sees_the_value() {
        let store = store();
        assert!(store.add("name", Value::String("alice".into()), 1, false, true, true));
        assert_eq!(store.select("name", 1, None, true), HashSet::from([Value::String("alice".into())]));
    }

    #[test]
    fn add_is_idempotent_when_validated() {
        let store = store();
        assert!(store.add("name", Value::String("alice".into()), 1, false, true, true));
        assert!(!store.add("name", Value::String("alice".into()), 1, false, true, true));
    }

    #[test]
    fn set_replaces_every_existing_value() {
        let store = store();
        store.add("name", Value::String("alice".into()), 1, false, true, true);
        store.add("name", Value::String("bob".into()), 1, false, true, true);
        store.set("name", Value::String("carol".into()), 1, false, true);
        assert_eq!(store.select("name", 1, None, true), HashSet::from([Value::String("carol".into())]));
    }

    #[test]
    fn committing_the_buffer_persists_to_the_destination() {
        let store = store();
        store.add("name", Value::String("alice".into()), 1, false, true, true);
        store.commit_buffer().unwrap();
        assert!(store.destination().verify("name", &Value::String("alice".into()), 1, None, Locking::Unsafe));
        assert!(store.buffer().iterate().is_empty());
    }

    #[test]
    fn explore_refines_permanent_hits_with_buffered_writes() {
        let store = store();
        store.destination().accept(Write::new(Action::Add, "age", Value::Integer(5), 1, &MonotonicClock::starting_at(1))).unwrap();
        store.destination().accept(Write::new(Action::Add, "age", Value::Integer(10), 2, &MonotonicClock::starting_at(2))).unwrap();
        store.remove("age", Value::Integer(5), 1, false, false, true);
        store.add("age", Value::Integer(4), 3, false, false, true);

        let result = store.explore(None, "age", Operator::Gt, &[Value::Integer(3)], true);
        assert!(!result.contains_key(&1));
        assert!(result.contains_key(&2));
        assert!(result.contains_key(&3));
    }
}
