// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use crate::atomic::implied_tokens;
use crate::config::EngineConfig;
use crate::listener::{ListenerTable, VersionChangeListener, VersionRegistry};
use crate::{AtomicOperation, Transaction};
use meridian_buffer::{SinkError, WriteSink};
use meridian_core::{MonotonicClock, Operator, RecordId, Token, Write};
use meridian_lock::LockService;
use meridian_store::Locking;
use meridian_type::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;

/// The top-level parent every plain [`AtomicOperation`] and every
/// [`Transaction`] ultimately drains its writes into: a permanent store `S`,
/// the lock service, the shared monotonic clock, and the version-change
/// listener registry those components coordinate through.
///
/// Always held behind an `Arc` -- every constructor that needs a parent
/// handle clones it from `self: &Arc<Self>`.
pub struct Engine<S> {
    store: Arc<S>,
    locks: LockService,
    clock: Arc<MonotonicClock>,
    registry: Arc<ListenerTable>,
    config: EngineConfig,
}

impl<S: meridian_store::PermanentStore + WriteSink + 'static> Engine<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Arc<Self> {
        Arc::new(Self { store, locks: LockService::new(), clock: Arc::new(MonotonicClock::new()), registry: Arc::new(ListenerTable::new()), config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<MonotonicClock> {
        &self.clock
    }

    /// A clone of the engine's real lock service, for a `Transaction`'s own
    /// directly-wrapped atomic operation (its nested children instead use
    /// `NoOpLockManager`, since the transaction already serializes them).
    pub(crate) fn locks(&self) -> LockService {
        self.locks.clone()
    }

    /// Starts a plain, top-level atomic operation whose parent is this
    /// engine and whose lock manager is the engine's real `LockService`.
    pub fn begin_atomic_operation(self: &Arc<Self>) -> AtomicOperation<Engine<S>, LockService> {
        AtomicOperation::new(self.clone(), self.locks.clone(), self.clock.clone(), self.config.lock_timeout)
    }

    /// Starts a durable transaction whose id is derived from the engine's
    /// own monotonic clock, guaranteeing uniqueness without depending on
    /// wall-clock time (see `MonotonicClock`'s docs on tie-breaking).
    pub fn begin_transaction(self: &Arc<Self>) -> Arc<Transaction<S>> {
        let id = format!("txn-{:020}", self.clock.next());
        Transaction::new(id, self.clone(), self.clock.clone(), self.config.clone())
    }

    /// Replays every `*.txn` backup file found in `config.backup_dir` on
    /// startup. Malformed files are logged and discarded -- their
    /// transaction never durably committed. See `Transaction::recover`.
    pub fn recover(self: &Arc<Self>) -> std::io::Result<usize> {
        crate::transaction::recover_all(self)
    }
}

impl<S: meridian_store::PermanentStore + WriteSink> meridian_store::PermanentStore for Engine<S> {
    #[tracing::instrument(level = "trace", skip(self, write), fields(key = %write.key(), record = write.record()))]
    fn accept(&self, write: Write) -> meridian_store::Result<()> {
        let tokens = implied_tokens(&write);
        self.store.accept(write)?;
        for token in &tokens {
            self.registry.notify(token);
        }
        Ok(())
    }

    fn audit_record(&self, record: RecordId, locking: Locking) -> BTreeMap<u64, String> {
        self.store.audit_record(record, locking)
    }

    fn audit_key_record(&self, key: &str, record: RecordId, locking: Locking) -> BTreeMap<u64, String> {
        self.store.audit_key_record(key, record, locking)
    }

    fn browse_key(&self, key: &str, timestamp: Option<u64>, locking: Locking) -> HashMap<Value, HashSet<RecordId>> {
        self.store.browse_key(key, timestamp, locking)
    }

    fn browse_record(&self, record: RecordId, timestamp: Option<u64>, locking: Locking) -> HashMap<String, HashSet<Value>> {
        self.store.browse_record(record, timestamp, locking)
    }

    fn select(&self, key: &str, record: RecordId, timestamp: Option<u64>, locking: Locking) -> HashSet<Value> {
        self.store.select(key, record, timestamp, locking)
    }

    fn verify(&self, key: &str, value: &Value, record: RecordId, timestamp: Option<u64>, locking: Locking) -> bool {
        self.store.verify(key, value, record, timestamp, locking)
    }

    fn explore(&self, timestamp: Option<u64>, key: &str, op: Operator, values: &[Value], locking: Locking) -> HashMap<RecordId, HashSet<Value>> {
        self.store.explore(timestamp, key, op, values, locking)
    }

    fn get_version(&self, scope: &Token) -> u64 {
        self.store.get_version(scope)
    }
}

impl<S: meridian_store::PermanentStore + WriteSink> WriteSink for Engine<S> {
    fn accept(&self, write: Write) -> std::result::Result<(), SinkError> {
        meridian_store::PermanentStore::accept(self, write).map_err(|e| Box::new(e) as SinkError)
    }
}

impl<S: Send + Sync> VersionRegistry for Engine<S> {
    fn add_version_change_listener(&self, token: Token, listener: Arc<dyn VersionChangeListener>) {
        trace!(%token, "engine: subscribing version-change listener");
        self.registry.add(token, listener);
    }

    fn remove_version_change_listener(&self, token: &Token, listener: &Arc<dyn VersionChangeListener>) {
        self.registry.remove(token, listener);
    }

    fn notify_version_change(&self, token: &Token) {
        self.registry.notify(token);
    }
}
