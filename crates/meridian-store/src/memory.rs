// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use crate::permanent::{Locking, PermanentStore};
use crate::{Error, Result};
use crossbeam_skiplist::SkipMap;
use meridian_buffer::{SinkError, WriteSink};
use meridian_core::{evaluate, Action, Operator, RecordId, Token, Write};
use meridian_type::Value;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};

fn toggle<K: std::hash::Hash + Eq>(set: &mut HashSet<K>, key: K, action: Action) {
    match action {
        Action::Add => {
            set.insert(key);
        }
        Action::Remove => {
            set.remove(&key);
        }
        Action::Compare => {}
    }
}

/// Reference, in-memory `PermanentStore`: the full write history, ordered by
/// version. Used as the durable substrate in tests, and as the Engine's own
/// permanent store in absence of a real on-disk backend.
#[derive(Default)]
pub struct MemoryStore {
    writes: SkipMap<u64, Write>,
    guard: RwLock<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn hold(&self, locking: Locking) -> Option<parking_lot::RwLockReadGuard<'_, ()>> {
        match locking {
            Locking::Locked => Some(self.guard.read()),
            Locking::Unsafe => None,
        }
    }

    fn entries_up_to(&self, timestamp: Option<u64>) -> impl Iterator<Item = Write> + '_ {
        let upper = timestamp.unwrap_or(u64::MAX);
        self.writes.range(..=upper).map(|e| e.value().clone())
    }
}

impl PermanentStore for MemoryStore {
    #[tracing::instrument(level = "trace", skip(self, write), fields(key = %write.key(), record = write.record()))]
    fn accept(&self, write: Write) -> Result<()> {
        if !write.is_storable() {
            return Err(Error::NotStorable);
        }
        let _guard = self.guard.write();
        self.writes.insert(write.version().unwrap_or(0), write);
        Ok(())
    }

    fn audit_record(&self, record: RecordId, locking: Locking) -> BTreeMap<u64, String> {
        let _guard = self.hold(locking);
        self.entries_up_to(None)
            .filter(|w| w.record() == record)
            .map(|w| (w.version().unwrap_or(0), format!("{:?} {}={} at v{}", w.action(), w.key(), w.value(), w.version().unwrap_or(0))))
            .collect()
    }

    fn audit_key_record(&self, key: &str, record: RecordId, locking: Locking) -> BTreeMap<u64, String> {
        let _guard = self.hold(locking);
        self.entries_up_to(None)
            .filter(|w| w.record() == record && w.key() == key)
            .map(|w| (w.version().unwrap_or(0), format!("{:?} {}={} at v{}", w.action(), w.key(), w.value(), w.version().unwrap_or(0))))
            .collect()
    }

    fn browse_key(&self, key: &str, timestamp: Option<u64>, locking: Locking) -> HashMap<Value, HashSet<RecordId>> {
        let _guard = self.hold(locking);
        let mut context: HashMap<Value, HashSet<RecordId>> = HashMap::new();
        for write in self.entries_up_to(timestamp) {
            if write.key() != key {
                continue;
            }
            let set = context.entry(write.value().clone()).or_default();
            toggle(set, write.record(), write.action());
        }
        context.retain(|_, set| !set.is_empty());
        context
    }

    fn browse_record(&self, record: RecordId, timestamp: Option<u64>, locking: Locking) -> HashMap<String, HashSet<Value>> {
        let _guard = self.hold(locking);
        let mut context: HashMap<String, HashSet<Value>> = HashMap::new();
        for write in self.entries_up_to(timestamp) {
            if write.record() != record {
                continue;
            }
            let set = context.entry(write.key().to_string()).or_default();
            toggle(set, write.value().clone(), write.action());
        }
        context.retain(|_, set| !set.is_empty());
        context
    }

    fn select(&self, key: &str, record: RecordId, timestamp: Option<u64>, locking: Locking) -> HashSet<Value> {
        let _guard = self.hold(locking);
        let mut context = HashSet::new();
        for write in self.entries_up_to(timestamp) {
            if write.key() != key || write.record() != record {
                continue;
            }
            toggle(&mut context, write.value().clone(), write.action());
        }
        context
    }

    fn verify(&self, key: &str, value: &Value, record: RecordId, timestamp: Option<u64>, locking: Locking) -> bool {
        let _guard = self.hold(locking);
        let mut toggles = 0u32;
        for write in self.entries_up_to(timestamp) {
            if write.matches_triple(key, value, record) {
                toggles += 1;
            }
        }
        toggles % 2 == 1
    }

    fn explore(
        &self,
        timestamp: Option<u64>,
        key: &str,
        op: Operator,
        values: &[Value],
        locking: Locking,
    ) -> HashMap<RecordId, HashSet<Value>> {
        let _guard = self.hold(locking);
        let mut context: HashMap<RecordId, HashSet<Value>> = HashMap::new();
        for write in self.entries_up_to(timestamp) {
            if write.key() != key {
                continue;
            }
            let set = context.entry(write.record()).or_default();
            toggle(set, write.value().clone(), write.action());
        }
        context.retain(|_, set| {
            set.retain(|v| evaluate(op, v, values));
            !set.is_empty()
        });
        context
    }

    fn get_version(&self, scope: &Token) -> u64 {
        self.entries_up_to(None)
            .filter(|w| scope_matches(scope, w))
            .map(|w| w.version().unwrap_or(0))
            .max()
            .unwrap_or(0)
    }
}

impl WriteSink for MemoryStore {
    fn accept(&self, write: Write) -> std::result::Result<(), SinkError> {
        PermanentStore::accept(self, write).map_err(|e| Box::new(e) as SinkError)
    }
}

fn scope_matches(scope: &Token, write: &Write) -> bool {
    match scope {
        Token::Record(record) => write.record() == *record,
        Token::Key(key) => write.key() == key,
        Token::KeyRecord(key, record) => write.key() == key && write.record() == *record,
    }
}
