// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use crate::error::Result;
use crate::range::RangePredicate;
use crate::service::{RangeGuard, ScopeGuard};
use meridian_core::Token;
use std::time::Duration;

/// Capability-based abstraction over "something that hands out scope and
/// range locks", so an `AtomicOperation` can be generic over either the real
/// [`crate::LockService`] or the `noOp` variant below without a trait
/// object or a class hierarchy.
pub trait LockManager: Send + Sync {
    fn grab_read_lock(&self, token: &Token, timeout: Duration) -> Result<ScopeGuard>;
    fn grab_write_lock(&self, token: &Token, timeout: Duration) -> Result<ScopeGuard>;
    fn grab_range_read_lock(&self, predicate: &RangePredicate, timeout: Duration) -> Result<Option<RangeGuard>>;
    fn grab_range_write_lock(&self, predicate: &RangePredicate, timeout: Duration) -> Result<Option<RangeGuard>>;
}

impl LockManager for crate::LockService {
    fn grab_read_lock(&self, token: &Token, timeout: Duration) -> Result<ScopeGuard> {
        crate::LockService::grab_read_lock(self, token, timeout)
    }

    fn grab_write_lock(&self, token: &Token, timeout: Duration) -> Result<ScopeGuard> {
        crate::LockService::grab_write_lock(self, token, timeout)
    }

    fn grab_range_read_lock(&self, predicate: &RangePredicate, timeout: Duration) -> Result<Option<RangeGuard>> {
        crate::LockService::grab_range_read_lock(self, predicate, timeout).map(Some)
    }

    fn grab_range_write_lock(&self, predicate: &RangePredicate, timeout: Duration) -> Result<Option<RangeGuard>> {
        crate::LockService::grab_range_write_lock(self, predicate, timeout).map(Some)
    }
}

/// Handed to every nested `AtomicOperation` created inside a `Transaction`
/// (`Transaction::start_atomic_operation`). The Transaction itself is the
/// single serializing authority for its children -- see
/// `meridian-transaction::transaction` -- so nested operations never
/// actually contend on a lock table.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLockManager;

impl LockManager for NoOpLockManager {
    fn grab_read_lock(&self, _token: &Token, _timeout: Duration) -> Result<ScopeGuard> {
        Ok(ScopeGuard::NoOp)
    }

    fn grab_write_lock(&self, _token: &Token, _timeout: Duration) -> Result<ScopeGuard> {
        Ok(ScopeGuard::NoOp)
    }

    fn grab_range_read_lock(&self, _predicate: &RangePredicate, _timeout: Duration) -> Result<Option<RangeGuard>> {
        Ok(None)
    }

    fn grab_range_write_lock(&self, _predicate: &RangePredicate, _timeout: Duration) -> Result<Option<RangeGuard>> {
        Ok(None)
    }
}
