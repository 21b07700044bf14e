// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use crate::{toggle, Buffer, Result, WriteSink};
use crossbeam_skiplist::SkipMap;
use meridian_core::{evaluate, Action, Operator, RecordId, Token, Write};
use meridian_type::Value;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// In-memory `Buffer` backed by a version-ordered skip list. One instance
/// backs every `Limbo`/`Queue`/`TransactionQueue` role; see `lib.rs`.
#[derive(Default)]
pub struct InMemoryBuffer {
    writes: SkipMap<u64, Write>,
}

impl InMemoryBuffer {
    pub fn new() -> Self {
        Self { writes: SkipMap::new() }
    }

    fn entries_up_to(&self, timestamp: u64) -> impl Iterator<Item = Write> + '_ {
        self.writes.range(..=timestamp).map(|e| e.value().clone())
    }
}

impl Buffer for InMemoryBuffer {
    #[tracing::instrument(level = "trace", skip(self, write), fields(key = %write.key(), record = write.record()))]
    fn insert(&self, write: Write, sync: bool) -> bool {
        let version = write.version().unwrap_or(0);
        self.writes.insert(version, write);
        trace!(sync, version, "buffered write");
        true
    }

    fn iterate(&self) -> Vec<Write> {
        self.writes.iter().map(|e| e.value().clone()).collect()
    }

    fn browse_key(&self, key: &str, timestamp: u64, context: &mut HashMap<Value, HashSet<RecordId>>) {
        for write in self.entries_up_to(timestamp) {
            if write.key() != key || !write.is_storable() {
                continue;
            }
            let set = context.entry(write.value().clone()).or_default();
            toggle(set, write.record(), write.action());
        }
    }

    fn browse_record(&self, record: RecordId, timestamp: u64, context: &mut HashMap<String, HashSet<Value>>) {
        for write in self.entries_up_to(timestamp) {
            if write.record() != record || !write.is_storable() {
                continue;
            }
            let set = context.entry(write.key().to_string()).or_default();
            toggle(set, write.value().clone(), write.action());
        }
    }

    fn select(&self, key: &str, record: RecordId, timestamp: u64, context: &mut HashSet<Value>) {
        for write in self.entries_up_to(timestamp) {
            if write.key() != key || write.record() != record || !write.is_storable() {
                continue;
            }
            toggle(context, write.value().clone(), write.action());
        }
    }

    fn verify(&self, probe: &Write, baseline: bool) -> bool {
        let mut toggles = 0u32;
        for write in self.writes.iter() {
            let write = write.value();
            if !write.is_storable() || !write.matches_triple(probe.key(), probe.value(), probe.record()) {
                continue;
            }
            match write.action() {
                Action::Add | Action::Remove => toggles += 1,
                Action::Compare => {}
            }
        }
        if toggles % 2 == 0 {
            baseline
        } else {
            !baseline
        }
    }

    fn explore(
        &self,
        context: &mut HashMap<RecordId, HashSet<Value>>,
        timestamp: u64,
        key: &str,
        op: Operator,
        values: &[Value],
    ) {
        for write in self.entries_up_to(timestamp) {
            if write.key() != key || !write.is_storable() {
                continue;
            }
            if !evaluate(op, write.value(), values) {
                continue;
            }
            let set = context.entry(write.record()).or_default();
            toggle(set, write.value().clone(), write.action());
        }
    }

    fn search(&self, key: &str, query: &str, timestamp: u64) -> HashSet<RecordId> {
        let mut membership: HashMap<RecordId, HashSet<Value>> = HashMap::new();
        for write in self.entries_up_to(timestamp) {
            if write.key() != key || !write.is_storable() {
                continue;
            }
            let set = membership.entry(write.record()).or_default();
            toggle(set, write.value().clone(), write.action());
        }
        membership
            .into_iter()
            .filter(|(_, values)| values.iter().any(|v| v.to_string().contains(query)))
            .map(|(record, _)| record)
            .collect()
    }

    fn transport(&self, destination: &dyn WriteSink) -> Result<()> {
        while let Some(entry) = self.writes.pop_front() {
            let write = entry.value().clone();
            if !write.is_storable() {
                continue;
            }
            destination.accept(write).map_err(crate::Error::Sink)?;
        }
        Ok(())
    }

    fn get_version(&self, scope: &Token) -> u64 {
        self.writes
            .iter()
            .filter(|e| scope_matches(scope, e.value()))
            .map(|e| e.value().version().unwrap_or(0))
            .max()
            .unwrap_or(0)
    }
}

fn scope_matches(scope: &Token, write: &Write) -> bool {
    match scope {
        Token::Record(record) => write.record() == *record,
        Token::Key(key) => write.key() == key,
        Token::KeyRecord(key, record) => write.key() == key && write.record() == *record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::MonotonicClock;

    fn add(clock: &MonotonicClock, key: &str, value: Value, record: RecordId) -> Write {
        Write::new(Action::Add, key.to_string(), value, record, clock)
    }

    fn remove(clock: &MonotonicClock, key: &str, value: Value, record: RecordId) -> Write {
        Write::new(Action::Remove, key.to_string(), value, record, clock)
    }

    #[test]
    fn verify_toggles_on_odd_write_count() {
        let clock = MonotonicClock::new();
        let buffer = InMemoryBuffer::new();
        let write = add(&clock, "name", Value::String("alice".into()), 1);
        buffer.insert(write.clone(), false);

        let probe = Write::compare("name".into(), Value::String("alice".into()), 1, clock.peek());
        assert!(buffer.verify(&probe, false));

        buffer.insert(remove(&clock, "name", Value::String("alice".into()), 1), false);
        assert!(!buffer.verify(&probe, false));
    }

    #[test]
    fn select_folds_membership_across_writes() {
        let clock = MonotonicClock::new();
        let buffer = InMemoryBuffer::new();
        buffer.insert(add(&clock, "name", Value::String("alice".into()), 1), false);
        buffer.insert(add(&clock, "name", Value::String("bob".into()), 1), false);
        buffer.insert(remove(&clock, "name", Value::String("alice".into()), 1), false);

        let mut context = HashSet::new();
        buffer.select("name", 1, clock.peek(), &mut context);
        assert_eq!(context, HashSet::from([Value::String("bob".into())]));
    }

    #[test]
    fn search_finds_substring_match_and_respects_removal() {
        let clock = MonotonicClock::new();
        let buffer = InMemoryBuffer::new();
        buffer.insert(add(&clock, "name", Value::String("alice".into()), 1), false);
        buffer.insert(add(&clock, "name", Value::String("alison".into()), 2), false);
        buffer.insert(remove(&clock, "name", Value::String("alice".into()), 1), false);

        let hits = buffer.search("name", "ali", clock.peek());
        assert_eq!(hits, HashSet::from([2]));
    }

    #[test]
    fn transport_drains_buffer_into_sink() {
        struct Collecting(std::sync::Mutex<Vec<Write>>);
        impl WriteSink for Collecting {
            fn accept(&self, write: Write) -> std::result::Result<(), crate::SinkError> {
                self.0.lock().unwrap().push(write);
                Ok(())
            }
        }

        let clock = MonotonicClock::new();
        let buffer = InMemoryBuffer::new();
        buffer.insert(add(&clock, "name", Value::String("alice".into()), 1), false);

        let sink = Collecting(std::sync::Mutex::new(Vec::new()));
        buffer.transport(&sink).unwrap();

        assert_eq!(sink.0.lock().unwrap().len(), 1);
        assert!(buffer.iterate().is_empty());
    }

    #[test]
    fn get_version_reports_highest_matching_write() {
        let clock = MonotonicClock::new();
        let buffer = InMemoryBuffer::new();
        buffer.insert(add(&clock, "name", Value::String("alice".into()), 1), false);
        let second = add(&clock, "name", Value::String("bob".into()), 2);
        let second_version = second.version().unwrap();
        buffer.insert(second, false);

        let version = buffer.get_version(&Token::key("name"));
        assert_eq!(version, second_version);
    }
}
