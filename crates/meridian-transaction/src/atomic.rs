// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use crate::error::{AtomicError, Result};
use crate::listener::{VersionChangeListener, VersionRegistry};
use crate::state::AtomicState;
use indexmap::{IndexMap, IndexSet};
use meridian_buffer::{Buffer, InMemoryBuffer, WriteSink};
use meridian_core::{MonotonicClock, Operator, RecordId, Token, Write};
use meridian_lock::{LockDescriptor, LockManager, LockMode, RangeGuard, RangePredicate, ScopeGuard};
use meridian_store::{BufferedStore, PermanentStore};
use meridian_type::Value;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// The three implied scopes a single write touches: any reader watching the
/// whole record, the whole key, or the exact (key, record) field must be
/// notified, since any of those reads could have observed this write.
pub(crate) fn implied_tokens(write: &Write) -> [Token; 3] {
    [
        Token::record(write.record()),
        Token::key(write.key().to_string()),
        Token::key_record(write.key().to_string(), write.record()),
    ]
}

/// A just-in-time-locked, version-watched transactional unit over a scoped
/// buffer. `P` is the parent the operation's buffer ultimately drains into
/// at commit (an [`crate::Engine`] for a top-level operation, a
/// [`crate::Transaction`] for a nested one); `L` is the lock manager used at
/// commit (a real [`meridian_lock::LockService`] for a top-level operation,
/// the [`meridian_lock::NoOpLockManager`] for a nested one, since the
/// enclosing Transaction is already the sole serializing authority).
pub struct AtomicOperation<P, L> {
    inner: Arc<Inner<P, L>>,
}

/// Lock guards held between `prepare_commit` and `finish_commit`, covering
/// both the instant this operation's writes are drained into its parent and
/// (for a [`crate::Transaction`]) the backup file naming them is forced to
/// disk.
pub(crate) type CommitGuards = (Vec<ScopeGuard>, Vec<RangeGuard>);

pub(crate) struct Inner<P, L> {
    state: Mutex<AtomicState>,
    conflicted: AtomicBool,
    store: BufferedStore<InMemoryBuffer, P>,
    parent: Arc<P>,
    locks: L,
    lock_timeout: Duration,
    touched: Mutex<IndexMap<Token, LockMode>>,
    ranges: Mutex<IndexSet<(RangePredicate, LockMode)>>,
}

impl<P, L> VersionChangeListener for Inner<P, L>
where
    P: Send + Sync,
    L: Send + Sync,
{
    fn on_version_change(&self, token: &Token) {
        let mut state = self.state.lock();
        if state.is_open() {
            warn!(%token, "atomic operation conflicted: scope changed under it");
            self.conflicted.store(true, Ordering::SeqCst);
            *state = AtomicState::Aborted;
        }
    }
}

impl<P, L> AtomicOperation<P, L>
where
    P: PermanentStore + WriteSink + VersionRegistry + 'static,
    L: LockManager + 'static,
{
    pub(crate) fn new(parent: Arc<P>, locks: L, clock: Arc<MonotonicClock>, lock_timeout: Duration) -> Self {
        let store = BufferedStore::new(Arc::new(InMemoryBuffer::new()), parent.clone(), clock);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(AtomicState::Open),
                conflicted: AtomicBool::new(false),
                store,
                parent,
                locks,
                lock_timeout,
                touched: Mutex::new(IndexMap::new()),
                ranges: Mutex::new(IndexSet::new()),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<Inner<P, L>> {
        &self.inner
    }

    fn listener(&self) -> Arc<dyn VersionChangeListener> {
        self.inner.clone() as Arc<dyn VersionChangeListener>
    }

    fn check_open(&self) -> Result<()> {
        match *self.inner.state.lock() {
            AtomicState::Open | AtomicState::Committing => Ok(()),
            AtomicState::Committed => Err(AtomicError::AlreadyCommitted),
            AtomicState::Aborted => Err(AtomicError::AlreadyAborted),
        }
    }

    /// Registers `token` as a scope this operation cares about (read or
    /// write), subscribing for version-change notifications the first time
    /// the token is touched and upgrading a prior read registration to a
    /// write if `mode` is stronger.
    fn touch(&self, token: Token, mode: LockMode) {
        let mut touched = self.inner.touched.lock();
        match touched.get_mut(&token) {
            Some(existing) => {
                if mode == LockMode::Write {
                    *existing = LockMode::Write;
                }
            }
            None => {
                self.inner.parent.add_version_change_listener(token.clone(), self.listener());
                touched.insert(token, mode);
            }
        }
    }

    fn touch_range(&self, key: &str, op: Operator, values: &[Value], mode: LockMode) {
        self.inner.ranges.lock().insert((RangePredicate::new(key, op, values.to_vec()), mode));
    }

    pub fn browse_key(&self, key: &str, timestamp: Option<u64>) -> Result<HashMap<Value, HashSet<RecordId>>> {
        self.check_open()?;
        self.touch(Token::key(key), LockMode::Read);
        Ok(self.inner.store.browse_key(key, timestamp, false))
    }

    pub fn browse_record(&self, record: RecordId, timestamp: Option<u64>) -> Result<HashMap<String, HashSet<Value>>> {
        self.check_open()?;
        self.touch(Token::record(record), LockMode::Read);
        Ok(self.inner.store.browse_record(record, timestamp, false))
    }

    pub fn select(&self, key: &str, record: RecordId, timestamp: Option<u64>) -> Result<HashSet<Value>> {
        self.check_open()?;
        self.touch(Token::key_record(key, record), LockMode::Read);
        Ok(self.inner.store.select(key, record, timestamp, false))
    }

    pub fn verify(&self, key: &str, value: &Value, record: RecordId, timestamp: Option<u64>) -> Result<bool> {
        self.check_open()?;
        self.touch(Token::key_record(key, record), LockMode::Read);
        Ok(self.inner.store.verify(key, value, record, timestamp, false))
    }

    pub fn explore(&self, timestamp: Option<u64>, key: &str, op: Operator, values: &[Value]) -> Result<HashMap<RecordId, HashSet<Value>>> {
        self.check_open()?;
        self.touch(Token::key(key), LockMode::Read);
        self.touch_range(key, op, values, LockMode::Read);
        Ok(self.inner.store.explore(timestamp, key, op, values, false))
    }

    pub fn search(&self, key: &str, query: &str, timestamp: Option<u64>) -> Result<HashSet<RecordId>> {
        self.check_open()?;
        self.touch(Token::key(key), LockMode::Read);
        Ok(self.inner.store.search(key, query, timestamp, false))
    }

    /// Adds `value` to `(key, record)` unless already present. Registers
    /// the field as a write scope of this operation; the write itself is
    /// staged in this operation's own buffer and is visible to this
    /// operation's own subsequent reads immediately (see `BufferedStore`'s
    /// read path), well before commit.
    pub fn add(&self, key: &str, value: Value, record: RecordId) -> Result<bool> {
        self.check_open()?;
        self.touch(Token::key_record(key, record), LockMode::Write);
        self.touch_range(key, Operator::Eq, std::slice::from_ref(&value), LockMode::Write);
        Ok(self.inner.store.add(key, value, record, false, true, false))
    }

    pub fn remove(&self, key: &str, value: Value, record: RecordId) -> Result<bool> {
        self.check_open()?;
        self.touch(Token::key_record(key, record), LockMode::Write);
        self.touch_range(key, Operator::Eq, std::slice::from_ref(&value), LockMode::Write);
        Ok(self.inner.store.remove(key, value, record, false, true, false))
    }

    pub fn set(&self, key: &str, value: Value, record: RecordId) -> Result<()> {
        self.check_open()?;
        self.touch(Token::key_record(key, record), LockMode::Write);
        self.touch_range(key, Operator::Eq, std::slice::from_ref(&value), LockMode::Write);
        self.inner.store.set(key, value, record, false, false);
        Ok(())
    }

    pub fn get_version(&self, scope: &Token) -> u64 {
        self.inner.store.get_version(scope)
    }

    pub fn is_conflicted(&self) -> bool {
        self.inner.conflicted.load(Ordering::SeqCst)
    }

    pub(crate) fn store(&self) -> &BufferedStore<InMemoryBuffer, P> {
        &self.inner.store
    }

    /// The writes currently staged in this operation's buffer, in commit
    /// order. Used by `Transaction::commit` to serialize a backup file
    /// after locks are acquired but before the writes are drained.
    pub(crate) fn pending_writes(&self) -> Vec<Write> {
        self.inner.store.buffer().iterate()
    }

    /// Every lock this operation has earned, in the same order
    /// `acquire_locks` would take them in. Used to populate a
    /// `Transaction`'s backup file's lock section.
    pub(crate) fn lock_descriptors(&self) -> Vec<LockDescriptor> {
        let mut scopes: Vec<(Token, LockMode)> = self.inner.touched.lock().iter().map(|(t, m)| (t.clone(), *m)).collect();
        scopes.sort_by(|a, b| a.0.cmp(&b.0));
        let mut descriptors: Vec<LockDescriptor> = scopes.into_iter().map(|(token, mode)| LockDescriptor::scope(mode, token)).collect();
        descriptors.extend(self.inner.ranges.lock().iter().map(|(predicate, mode)| LockDescriptor::range(*mode, predicate.clone())));
        descriptors
    }

    fn unsubscribe_all(&self) {
        let touched = self.inner.touched.lock();
        for token in touched.keys() {
            self.inner.parent.remove_version_change_listener(token, &self.listener());
        }
    }

    /// Acquires every lock this operation has earned through the scopes and
    /// writes it touched, sorted by `Token`'s total order so two operations
    /// racing to commit always acquire overlapping locks in the same
    /// sequence and cannot deadlock.
    fn acquire_locks(&self) -> Result<Option<CommitGuards>> {
        let mut scopes: Vec<(Token, LockMode)> = self.inner.touched.lock().iter().map(|(t, m)| (t.clone(), *m)).collect();
        scopes.sort_by(|a, b| a.0.cmp(&b.0));

        let mut scope_guards = Vec::with_capacity(scopes.len());
        for (token, mode) in &scopes {
            let guard = match mode {
                LockMode::Read => self.inner.locks.grab_read_lock(token, self.inner.lock_timeout),
                LockMode::Write => self.inner.locks.grab_write_lock(token, self.inner.lock_timeout),
            };
            match guard {
                Ok(guard) => scope_guards.push(guard),
                Err(_) => {
                    debug!(%token, "lock acquisition timed out during commit");
                    return Ok(None);
                }
            }
        }

        let ranges: Vec<(RangePredicate, LockMode)> = self.inner.ranges.lock().iter().cloned().collect();
        let mut range_guards = Vec::with_capacity(ranges.len());
        for (predicate, mode) in &ranges {
            let guard = match mode {
                LockMode::Read => self.inner.locks.grab_range_read_lock(predicate, self.inner.lock_timeout),
                LockMode::Write => self.inner.locks.grab_range_write_lock(predicate, self.inner.lock_timeout),
            };
            match guard {
                Ok(Some(guard)) => range_guards.push(guard),
                Ok(None) => {}
                Err(_) => {
                    debug!(key = %predicate.key, "range lock acquisition timed out during commit");
                    return Ok(None);
                }
            }
        }

        Ok(Some((scope_guards, range_guards)))
    }

    /// Acquires locks and performs the final conflict re-check, the first
    /// half of a commit. `Ok(None)` means a conflicting version change or a
    /// lock timeout forced an abort (already recorded) -- the caller's only
    /// recourse is to retry from scratch. `Ok(Some(guards))` means the
    /// operation is clear to drain; the guards must reach `finish_commit`
    /// (or be dropped alongside a call to `finish_aborted`) to release them.
    pub(crate) fn prepare_commit(&self) -> Result<Option<CommitGuards>> {
        {
            let mut state = self.inner.state.lock();
            match *state {
                AtomicState::Open => *state = AtomicState::Committing,
                AtomicState::Committing => {}
                AtomicState::Committed => return Err(AtomicError::AlreadyCommitted),
                AtomicState::Aborted => return Ok(None),
            }
        }

        let guards = match self.acquire_locks()? {
            Some(guards) => guards,
            None => {
                self.finish_aborted();
                return Ok(None);
            }
        };

        // Locks are held: re-check for a conflict that raced the acquisition.
        let conflicted = self.is_conflicted() || matches!(*self.inner.state.lock(), AtomicState::Aborted);
        if conflicted {
            drop(guards);
            self.finish_aborted();
            return Ok(None);
        }

        Ok(Some(guards))
    }

    /// Drains the buffer into the parent and transitions to `Committed`,
    /// releasing `guards` once the drain is done. The second half of a
    /// commit, split out so a `Transaction` can force its backup file to
    /// disk while the locks from `prepare_commit` are still held.
    pub(crate) fn finish_commit(&self, guards: CommitGuards) -> Result<()> {
        let result = self.inner.store.commit_buffer();
        drop(guards);

        match result {
            Ok(()) => {
                *self.inner.state.lock() = AtomicState::Committed;
                self.unsubscribe_all();
                trace!("atomic operation committed");
                Ok(())
            }
            Err(err) => {
                *self.inner.state.lock() = AtomicState::Aborted;
                self.unsubscribe_all();
                Err(AtomicError::Transport(err.to_string()))
            }
        }
    }

    fn finish_aborted(&self) {
        *self.inner.state.lock() = AtomicState::Aborted;
        self.unsubscribe_all();
    }

    /// Commits the operation, consuming it. `Ok(true)` means every write
    /// landed in the parent; `Ok(false)` means a conflicting version change
    /// or a lock timeout forced an abort. Only a fatal, non-recoverable
    /// failure (the parent rejecting the drained write sequence) is an
    /// `Err`.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn commit(self) -> Result<bool> {
        match self.prepare_commit()? {
            None => Ok(false),
            Some(guards) => {
                self.finish_commit(guards)?;
                Ok(true)
            }
        }
    }

    /// Idempotent: aborting twice, or aborting an operation the listener
    /// callback already flipped to `Aborted`, is a no-op.
    pub fn abort(self) -> Result<()> {
        let mut state = self.inner.state.lock();
        match *state {
            AtomicState::Open | AtomicState::Committing => {
                *state = AtomicState::Aborted;
                drop(state);
                self.unsubscribe_all();
                Ok(())
            }
            AtomicState::Aborted => Ok(()),
            AtomicState::Committed => Err(AtomicError::AlreadyCommitted),
        }
    }
}
