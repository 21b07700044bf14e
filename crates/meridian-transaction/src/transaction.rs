// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use crate::atomic::AtomicOperation;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::{TransactionError, TransactionResult};
use crate::listener::{VersionChangeListener, VersionRegistry};
use meridian_buffer::{SinkError, WriteSink};
use meridian_core::{Action, MonotonicClock, Operator, RecordId, Token, Write};
use meridian_lock::{LockService, NoOpLockManager};
use meridian_store::{Locking, PermanentStore};
use meridian_type::Value;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A dedicated multimap that lets several nested atomic operations share one
/// subscription with the [`Engine`] per token: the first child to touch a
/// token registers the router itself as the engine-facing listener; the
/// router then forwards that single notification to every child currently
/// watching the token, and unregisters from the engine once none are left.
///
/// Both sides address each other through opaque `Arc<dyn VersionChangeListener>`
/// handles, identified by pointer -- the same pattern [`crate::listener::ListenerTable`]
/// uses for the engine's own top-level subscriptions.
struct ChildRouter {
    engine: Arc<dyn VersionRegistry>,
    state: Arc<RouterState>,
}

struct RouterState {
    routes: Mutex<HashMap<Token, Vec<(usize, Arc<dyn VersionChangeListener>)>>>,
}

fn handle_id(listener: &Arc<dyn VersionChangeListener>) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

impl VersionChangeListener for RouterState {
    fn on_version_change(&self, token: &Token) {
        let children = self.routes.lock().remove(token);
        if let Some(children) = children {
            for (_, child) in children {
                child.on_version_change(token);
            }
        }
    }
}

impl ChildRouter {
    fn new(engine: Arc<dyn VersionRegistry>) -> Self {
        Self { engine, state: Arc::new(RouterState { routes: Mutex::new(HashMap::new()) }) }
    }

    fn listener(&self) -> Arc<dyn VersionChangeListener> {
        self.state.clone() as Arc<dyn VersionChangeListener>
    }

    fn register_child(&self, token: Token, child: Arc<dyn VersionChangeListener>) {
        let mut routes = self.state.routes.lock();
        let id = handle_id(&child);
        let entry = routes.entry(token.clone()).or_default();
        let first = entry.is_empty();
        entry.push((id, child));
        if first {
            drop(routes);
            self.engine.add_version_change_listener(token, self.listener());
        }
    }

    fn unregister_child(&self, token: &Token, child: &Arc<dyn VersionChangeListener>) {
        let id = handle_id(child);
        let mut routes = self.state.routes.lock();
        if let Some(entry) = routes.get_mut(token) {
            entry.retain(|(existing, _)| *existing != id);
            if entry.is_empty() {
                routes.remove(token);
                drop(routes);
                self.engine.remove_version_change_listener(token, &self.listener());
            }
        }
    }

    fn dispatch(&self, token: &Token) {
        self.state.on_version_change(token);
    }
}

/// A durable, nestable unit of work over an [`Engine`]. Reads and writes
/// made directly against the transaction are staged in its own
/// just-in-time-locked [`AtomicOperation`]; `start_atomic_operation` opens a
/// nested operation parented to the transaction itself, using
/// [`NoOpLockManager`] since the transaction is already the sole
/// serializing authority its children contend through.
///
/// A successful [`Transaction::commit`] is crash-durable: every buffered
/// write and the locks that cover it are forced to a `<id>.txn` backup file
/// before the writes are drained into the engine, so a crash between those
/// two steps can always be repaired by replaying the backup on the next
/// [`Engine::recover`] call.
pub struct Transaction<S> {
    id: String,
    engine: Arc<Engine<S>>,
    atomic: Mutex<Option<AtomicOperation<Engine<S>, LockService>>>,
    router: ChildRouter,
    config: EngineConfig,
    closed: AtomicBool,
}

impl<S: PermanentStore + WriteSink + 'static> Transaction<S> {
    pub(crate) fn new(id: String, engine: Arc<Engine<S>>, clock: Arc<MonotonicClock>, config: EngineConfig) -> Arc<Self> {
        let atomic = AtomicOperation::new(engine.clone(), engine.locks(), clock, config.lock_timeout);
        let router = ChildRouter::new(engine.clone() as Arc<dyn VersionRegistry>);
        Arc::new(Self { id, engine, atomic: Mutex::new(Some(atomic)), router, config, closed: AtomicBool::new(false) })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn with_atomic<T>(&self, f: impl FnOnce(&AtomicOperation<Engine<S>, LockService>) -> crate::error::Result<T>) -> TransactionResult<T> {
        let guard = self.atomic.lock();
        match guard.as_ref() {
            Some(op) => Ok(f(op)?),
            None => Err(TransactionError::Closed),
        }
    }

    pub fn browse_key(&self, key: &str, timestamp: Option<u64>) -> TransactionResult<HashMap<Value, HashSet<RecordId>>> {
        self.with_atomic(|op| op.browse_key(key, timestamp))
    }

    pub fn browse_record(&self, record: RecordId, timestamp: Option<u64>) -> TransactionResult<HashMap<String, HashSet<Value>>> {
        self.with_atomic(|op| op.browse_record(record, timestamp))
    }

    pub fn select(&self, key: &str, record: RecordId, timestamp: Option<u64>) -> TransactionResult<HashSet<Value>> {
        self.with_atomic(|op| op.select(key, record, timestamp))
    }

    pub fn verify(&self, key: &str, value: &Value, record: RecordId, timestamp: Option<u64>) -> TransactionResult<bool> {
        self.with_atomic(|op| op.verify(key, value, record, timestamp))
    }

    pub fn explore(&self, timestamp: Option<u64>, key: &str, op: Operator, values: &[Value]) -> TransactionResult<HashMap<RecordId, HashSet<Value>>> {
        self.with_atomic(|a| a.explore(timestamp, key, op, values))
    }

    pub fn search(&self, key: &str, query: &str, timestamp: Option<u64>) -> TransactionResult<HashSet<RecordId>> {
        self.with_atomic(|op| op.search(key, query, timestamp))
    }

    pub fn add(&self, key: &str, value: Value, record: RecordId) -> TransactionResult<bool> {
        self.with_atomic(|op| op.add(key, value, record))
    }

    pub fn remove(&self, key: &str, value: Value, record: RecordId) -> TransactionResult<bool> {
        self.with_atomic(|op| op.remove(key, value, record))
    }

    pub fn set(&self, key: &str, value: Value, record: RecordId) -> TransactionResult<()> {
        self.with_atomic(|op| op.set(key, value, record))
    }

    pub fn get_version(&self, scope: &Token) -> u64 {
        match self.atomic.lock().as_ref() {
            Some(op) => op.get_version(scope),
            None => self.engine.get_version(scope),
        }
    }

    /// Opens a nested atomic operation parented to this transaction. Its
    /// commit drains straight into this transaction's own buffer (see this
    /// type's `WriteSink` impl) rather than touching the engine directly,
    /// so the outer transaction's own commit -- and its backup -- remains
    /// the only durability boundary.
    pub fn start_atomic_operation(self: &Arc<Self>) -> TransactionResult<AtomicOperation<Transaction<S>, NoOpLockManager>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransactionError::Closed);
        }
        Ok(AtomicOperation::new(self.clone(), NoOpLockManager, self.engine.clock().clone(), self.config.lock_timeout))
    }

    /// Commits the transaction durably. `Ok(true)` means every write landed
    /// in the engine; `Ok(false)` means a conflicting version change or a
    /// lock timeout forced an abort. A read-only transaction (nothing ever
    /// buffered) skips the backup file entirely.
    #[tracing::instrument(level = "trace", skip(self), fields(id = %self.id))]
    pub fn commit(&self) -> TransactionResult<bool> {
        let op = self.atomic.lock().take().ok_or(TransactionError::Closed)?;
        self.closed.store(true, Ordering::SeqCst);

        let guards = match op.prepare_commit()? {
            Some(guards) => guards,
            None => return Ok(false),
        };

        let writes = op.pending_writes();
        if writes.is_empty() {
            trace!("read-only transaction commits without a backup file");
            op.finish_commit(guards)?;
            return Ok(true);
        }

        let descriptors = op.lock_descriptors();
        std::fs::create_dir_all(&self.config.backup_dir)?;
        let backup_path = self.config.backup_dir.join(format!("{}.txn", self.id));
        let bytes = crate::backup::serialize(&descriptors, &writes);
        {
            let mut file = std::fs::File::create(&backup_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        debug!(path = %backup_path.display(), writes = writes.len(), "transaction backup forced to disk");

        op.finish_commit(guards)?;
        std::fs::remove_file(&backup_path)?;
        trace!("transaction committed and backup cleaned up");
        Ok(true)
    }

    /// Aborts the transaction. Idempotent: a second call (or a call after
    /// `commit`) is a no-op.
    pub fn abort(&self) -> TransactionResult<()> {
        let op = self.atomic.lock().take();
        self.closed.store(true, Ordering::SeqCst);
        match op {
            Some(op) => Ok(op.abort()?),
            None => Ok(()),
        }
    }
}

impl<S: PermanentStore + WriteSink> PermanentStore for Transaction<S> {
    /// Re-dispatches a nested child's drained write through this
    /// transaction's own `add`/`remove` path (per §4.6) rather than
    /// inserting straight into the buffer: that's what registers the
    /// written scope in `self.atomic`'s `touched`/`ranges` sets, so a scope
    /// only ever touched by a child still gets locked (and backed up)
    /// when this transaction itself commits.
    fn accept(&self, write: Write) -> meridian_store::Result<()> {
        if !write.is_storable() {
            return Err(meridian_store::Error::NotStorable);
        }
        match self.atomic.lock().as_ref() {
            Some(op) => {
                let key = write.key().to_string();
                let value = write.value().clone();
                let record = write.record();
                let result = match write.action() {
                    Action::Add => op.add(&key, value, record).map(|_| ()),
                    Action::Remove => op.remove(&key, value, record).map(|_| ()),
                    Action::Compare => unreachable!("is_storable() already rejected COMPARE"),
                };
                result.map_err(|err| meridian_store::Error::Rejected(err.to_string()))
            }
            None => {
                warn!("dropping a nested write: parent transaction already closed");
                Ok(())
            }
        }
    }

    fn audit_record(&self, record: RecordId, locking: Locking) -> BTreeMap<u64, String> {
        let mut result = self.engine.audit_record(record, locking);
        if let Some(op) = self.atomic.lock().as_ref() {
            for write in op.store().buffer().iterate() {
                if write.is_storable() && write.record() == record {
                    if let Some(version) = write.version() {
                        result.insert(version, format!("{:?} {}={} at v{version}", write.action(), write.key(), write.value()));
                    }
                }
            }
        }
        result
    }

    fn audit_key_record(&self, key: &str, record: RecordId, locking: Locking) -> BTreeMap<u64, String> {
        let mut result = self.engine.audit_key_record(key, record, locking);
        if let Some(op) = self.atomic.lock().as_ref() {
            for write in op.store().buffer().iterate() {
                if write.is_storable() && write.record() == record && write.key() == key {
                    if let Some(version) = write.version() {
                        result.insert(version, format!("{:?} {}={} at v{version}", write.action(), write.key(), write.value()));
                    }
                }
            }
        }
        result
    }

    fn browse_key(&self, key: &str, timestamp: Option<u64>, _locking: Locking) -> HashMap<Value, HashSet<RecordId>> {
        match self.atomic.lock().as_ref() {
            Some(op) => op.store().browse_key(key, timestamp, false),
            None => self.engine.browse_key(key, timestamp, Locking::Unsafe),
        }
    }

    fn browse_record(&self, record: RecordId, timestamp: Option<u64>, _locking: Locking) -> HashMap<String, HashSet<Value>> {
        match self.atomic.lock().as_ref() {
            Some(op) => op.store().browse_record(record, timestamp, false),
            None => self.engine.browse_record(record, timestamp, Locking::Unsafe),
        }
    }

    fn select(&self, key: &str, record: RecordId, timestamp: Option<u64>, _locking: Locking) -> HashSet<Value> {
        match self.atomic.lock().as_ref() {
            Some(op) => op.store().select(key, record, timestamp, false),
            None => self.engine.select(key, record, timestamp, Locking::Unsafe),
        }
    }

    fn verify(&self, key: &str, value: &Value, record: RecordId, timestamp: Option<u64>, _locking: Locking) -> bool {
        match self.atomic.lock().as_ref() {
            Some(op) => op.store().verify(key, value, record, timestamp, false),
            None => self.engine.verify(key, value, record, timestamp, Locking::Unsafe),
        }
    }

    fn explore(&self, timestamp: Option<u64>, key: &str, op: Operator, values: &[Value], _locking: Locking) -> HashMap<RecordId, HashSet<Value>> {
        match self.atomic.lock().as_ref() {
            Some(atomic) => atomic.store().explore(timestamp, key, op, values, false),
            None => self.engine.explore(timestamp, key, op, values, Locking::Unsafe),
        }
    }

    fn get_version(&self, scope: &Token) -> u64 {
        Transaction::get_version(self, scope)
    }
}

impl<S: PermanentStore + WriteSink> WriteSink for Transaction<S> {
    fn accept(&self, write: Write) -> std::result::Result<(), SinkError> {
        PermanentStore::accept(self, write).map_err(|e| Box::new(e) as SinkError)
    }
}

impl<S: Send + Sync> VersionRegistry for Transaction<S> {
    fn add_version_change_listener(&self, token: Token, listener: Arc<dyn VersionChangeListener>) {
        self.router.register_child(token, listener);
    }

    fn remove_version_change_listener(&self, token: &Token, listener: &Arc<dyn VersionChangeListener>) {
        self.router.unregister_child(token, listener);
    }

    fn notify_version_change(&self, token: &Token) {
        self.router.dispatch(token);
    }
}

/// Replays every `*.txn` backup file found in `engine.config().backup_dir`,
/// applying its writes directly (no re-backup) and deleting the file
/// afterward. A file that fails to deserialize is logged and discarded --
/// its transaction never durably committed, so there is nothing to recover.
pub(crate) fn recover_all<S: PermanentStore + WriteSink + 'static>(engine: &Arc<Engine<S>>) -> std::io::Result<usize> {
    let dir = engine.config().backup_dir.clone();
    if !dir.exists() {
        return Ok(0);
    }

    let verbose = engine.config().verbose_recovery;
    let mut recovered = 0usize;
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("txn") {
            continue;
        }

        match std::fs::read(&path) {
            Ok(bytes) => match crate::backup::deserialize(&bytes) {
                Ok((locks, writes)) => {
                    // The backed-up lock set is intentionally not
                    // reacquired or replayed here: recovery runs at engine
                    // startup, before any concurrent traffic exists to
                    // conflict with, so there is nothing left for those
                    // locks to protect. They are only parsed (rather than
                    // skipped outright) so a truncated lock section still
                    // fails deserialization the same way a truncated write
                    // section would.
                    debug!(path = %path.display(), locks = locks.len(), "recovered lock section is not replayed");
                    let max_version = writes.iter().filter_map(Write::version).max().unwrap_or(0);
                    engine.clock().observe(max_version);
                    for write in writes {
                        if !write.is_storable() {
                            continue;
                        }
                        if verbose {
                            debug!(path = %path.display(), key = %write.key(), record = write.record(), "replaying recovered write");
                        }
                        if let Err(err) = PermanentStore::accept(engine.as_ref(), write) {
                            warn!(path = %path.display(), error = %err, "recovery could not re-apply a backed-up write");
                        }
                    }
                    recovered += 1;
                    debug!(path = %path.display(), "recovered transaction backup");
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "discarding corrupt transaction backup");
                }
            },
            Err(err) => warn!(path = %path.display(), error = %err, "could not read transaction backup file"),
        }

        if let Err(err) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), error = %err, "could not delete a recovered transaction backup");
        }
    }

    Ok(recovered)
}
