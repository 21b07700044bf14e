// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use crate::error::{Error, Result};
use crate::mode::LockMode;
use crate::range::RangePredicate;
use dashmap::DashMap;
use meridian_core::Token;
use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, Condvar, Mutex, RawRwLock, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// A live read or write lock on a named scope. Dropping it releases the
/// lock -- every acquisition path in this crate is scoped, so a lock can
/// never outlive the guard that represents it.
pub enum ScopeGuard {
    Read(ArcRwLockReadGuard<RawRwLock, ()>),
    Write(ArcRwLockWriteGuard<RawRwLock, ()>),
    /// Held by the `noOp` lock manager handed to nested atomic operations:
    /// the enclosing Transaction is already the serializing authority, so
    /// there is nothing to lock.
    NoOp,
}

/// A live range lock. Dropping it removes the predicate from the active set
/// and wakes any waiters.
pub struct RangeGuard {
    service: Option<Arc<RangeTable>>,
    id: u64,
}

impl Drop for RangeGuard {
    fn drop(&mut self) {
        if let Some(table) = self.service.take() {
            table.release(self.id);
        }
    }
}

struct ActiveRange {
    id: u64,
    predicate: RangePredicate,
    mode: LockMode,
}

#[derive(Default)]
struct RangeTable {
    state: Mutex<RangeTableState>,
    condvar: Condvar,
}

#[derive(Default)]
struct RangeTableState {
    active: Vec<ActiveRange>,
    next_id: u64,
}

impl RangeTable {
    fn acquire(self: &Arc<Self>, predicate: &RangePredicate, mode: LockMode, timeout: Duration) -> Result<RangeGuard> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            let conflict = state
                .active
                .iter()
                .any(|active| active.predicate.overlaps(predicate) && (mode == LockMode::Write || active.mode == LockMode::Write));
            if !conflict {
                let id = state.next_id;
                state.next_id += 1;
                state.active.push(ActiveRange { id, predicate: predicate.clone(), mode });
                return Ok(RangeGuard { service: Some(self.clone()), id });
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout);
            }
            let result = self.condvar.wait_for(&mut state, remaining);
            if result.timed_out() {
                return Err(Error::Timeout);
            }
        }
    }

    fn release(&self, id: u64) {
        let mut state = self.state.lock();
        state.active.retain(|active| active.id != id);
        self.condvar.notify_all();
    }
}

/// The live lock service: named scope locks keyed by [`Token`], plus a
/// separate table of active range locks.
#[derive(Clone)]
pub struct LockService {
    scopes: Arc<DashMap<Token, Arc<RwLock<()>>>>,
    ranges: Arc<RangeTable>,
}

impl Default for LockService {
    fn default() -> Self {
        Self::new()
    }
}

impl LockService {
    pub fn new() -> Self {
        Self { scopes: Arc::new(DashMap::new()), ranges: Arc::new(RangeTable::default()) }
    }

    fn scope_lock(&self, token: &Token) -> Arc<RwLock<()>> {
        self.scopes.entry(token.clone()).or_insert_with(|| Arc::new(RwLock::new(()))).clone()
    }

    #[tracing::instrument(level = "trace", skip(self), fields(%token))]
    pub fn grab_read_lock(&self, token: &Token, timeout: Duration) -> Result<ScopeGuard> {
        let lock = self.scope_lock(token);
        match lock.try_read_arc_for(timeout) {
            Some(guard) => {
                trace!("read lock acquired");
                Ok(ScopeGuard::Read(guard))
            }
            None => {
                debug!("read lock timed out");
                Err(Error::Timeout)
            }
        }
    }

    #[tracing::instrument(level = "trace", skip(self), fields(%token))]
    pub fn grab_write_lock(&self, token: &Token, timeout: Duration) -> Result<ScopeGuard> {
        let lock = self.scope_lock(token);
        match lock.try_write_arc_for(timeout) {
            Some(guard) => {
                trace!("write lock acquired");
                Ok(ScopeGuard::Write(guard))
            }
            None => {
                debug!("write lock timed out");
                Err(Error::Timeout)
            }
        }
    }

    pub fn grab_range_read_lock(&self, predicate: &RangePredicate, timeout: Duration) -> Result<RangeGuard> {
        self.ranges.acquire(predicate, LockMode::Read, timeout)
    }

    pub fn grab_range_write_lock(&self, predicate: &RangePredicate, timeout: Duration) -> Result<RangeGuard> {
        self.ranges.acquire(predicate, LockMode::Write, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::Operator;
    use meridian_type::Value;

    #[test]
    fn two_readers_do_not_block_each_other() {
        let service = LockService::new();
        let token = Token::record(1);
        let a = service.grab_read_lock(&token, Duration::from_millis(50)).unwrap();
        let b = service.grab_read_lock(&token, Duration::from_millis(50)).unwrap();
        drop(a);
        drop(b);
    }

    #[test]
    fn writer_excludes_readers() {
        let service = LockService::new();
        let token = Token::record(1);
        let _write = service.grab_write_lock(&token, Duration::from_millis(50)).unwrap();
        let result = service.grab_read_lock(&token, Duration::from_millis(20));
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[test]
    fn overlapping_range_reads_do_not_conflict() {
        let service = LockService::new();
        let predicate = RangePredicate::new("age", Operator::Gt, vec![Value::Integer(3)]);
        let a = service.grab_range_read_lock(&predicate, Duration::from_millis(50)).unwrap();
        let b = service.grab_range_read_lock(&predicate, Duration::from_millis(50)).unwrap();
        drop(a);
        drop(b);
    }

    #[test]
    fn range_write_conflicts_with_overlapping_read() {
        let service = LockService::new();
        let predicate = RangePredicate::new("age", Operator::Gt, vec![Value::Integer(3)]);
        let _read = service.grab_range_read_lock(&predicate, Duration::from_millis(50)).unwrap();
        let result = service.grab_range_write_lock(&predicate, Duration::from_millis(20));
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[test]
    fn releasing_a_range_lock_wakes_a_waiter() {
        let service = LockService::new();
        let predicate = RangePredicate::new("age", Operator::Gt, vec![Value::Integer(3)]);
        let write = service.grab_range_write_lock(&predicate, Duration::from_millis(50)).unwrap();
        let service2 = service.clone();
        let predicate2 = predicate.clone();
        let handle = std::thread::spawn(move || {
            service2.grab_range_write_lock(&predicate2, Duration::from_millis(500)).map(|_| ())
        });
        std::thread::sleep(Duration::from_millis(20));
        drop(write);
        assert!(handle.join().unwrap().is_ok());
    }
}
