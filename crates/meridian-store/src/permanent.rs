// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use crate::Result;
use meridian_core::{Operator, RecordId, Token, Write};
use meridian_type::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Whether a read should re-acquire the store's own concurrency protection
/// or trust that the caller already holds sufficient protection.
///
/// Threaded through as an explicit parameter rather than a second `*Unsafe`
/// method family so `Compoundable` can be a handful of default methods
/// rather than a duplicated trait surface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Locking {
    /// Acquire whatever protection the store normally uses for reads.
    Locked,
    /// Skip it -- the caller (an AtomicOperation or Transaction) is already
    /// the concurrency boundary.
    Unsafe,
}

/// The durable, queryable substrate every `BufferedStore` transports
/// committed writes into.
///
/// Implementations must preserve `accept` ordering (the order writes are
/// durably applied must match the order they were transported) and must
/// offer both present-time (`timestamp: None`) and historical
/// (`timestamp: Some(t)`) read paths through the same methods.
pub trait PermanentStore: Send + Sync {
    /// Durably absorbs one already-validated write. Rejects COMPARE writes.
    fn accept(&self, write: Write) -> Result<()>;

    /// Timestamp -> human-readable revision string, across every key of `record`.
    fn audit_record(&self, record: RecordId, locking: Locking) -> BTreeMap<u64, String>;

    /// Timestamp -> human-readable revision string, for one `(key, record)` field.
    fn audit_key_record(&self, key: &str, record: RecordId, locking: Locking) -> BTreeMap<u64, String>;

    /// All records holding any value for `key`, bucketed by value, as of
    /// `timestamp` (or the present if `None`).
    fn browse_key(
        &self,
        key: &str,
        timestamp: Option<u64>,
        locking: Locking,
    ) -> HashMap<Value, HashSet<RecordId>>;

    /// All keys set on `record`, bucketed by value, as of `timestamp` (or
    /// the present if `None`).
    fn browse_record(
        &self,
        record: RecordId,
        timestamp: Option<u64>,
        locking: Locking,
    ) -> HashMap<String, HashSet<Value>>;

    /// The current value set of one `(key, record)` field, as of `timestamp`.
    fn select(&self, key: &str, record: RecordId, timestamp: Option<u64>, locking: Locking) -> HashSet<Value>;

    /// Whether `(key, value, record)` is a member as of `timestamp`.
    fn verify(&self, key: &str, value: &Value, record: RecordId, timestamp: Option<u64>, locking: Locking) -> bool;

    /// Records whose `key` value satisfies `op(value, values)`, bucketed by
    /// the matching values, as of `timestamp`.
    fn explore(
        &self,
        timestamp: Option<u64>,
        key: &str,
        op: Operator,
        values: &[Value],
        locking: Locking,
    ) -> HashMap<RecordId, HashSet<Value>>;

    /// The highest durable write version touching `scope`.
    fn get_version(&self, scope: &Token) -> u64;
}

/// Convenience "unsafe" read surface for stores already protected by an
/// outer AtomicOperation/Transaction. Blanket-implemented for every
/// `PermanentStore` -- there is nothing to implement, only to call.
pub trait Compoundable: PermanentStore {
    fn audit_record_unsafe(&self, record: RecordId) -> BTreeMap<u64, String> {
        self.audit_record(record, Locking::Unsafe)
    }

    fn audit_key_record_unsafe(&self, key: &str, record: RecordId) -> BTreeMap<u64, String> {
        self.audit_key_record(key, record, Locking::Unsafe)
    }

    fn browse_key_unsafe(&self, key: &str, timestamp: Option<u64>) -> HashMap<Value, HashSet<RecordId>> {
        self.browse_key(key, timestamp, Locking::Unsafe)
    }

    fn browse_record_unsafe(&self, record: RecordId, timestamp: Option<u64>) -> HashMap<String, HashSet<Value>> {
        self.browse_record(record, timestamp, Locking::Unsafe)
    }

    fn select_unsafe(&self, key: &str, record: RecordId, timestamp: Option<u64>) -> HashSet<Value> {
        self.select(key, record, timestamp, Locking::Unsafe)
    }

    fn verify_unsafe(&self, key: &str, value: &Value, record: RecordId, timestamp: Option<u64>) -> bool {
        self.verify(key, value, record, timestamp, Locking::Unsafe)
    }

    fn explore_unsafe(
        &self,
        timestamp: Option<u64>,
        key: &str,
        op: Operator,
        values: &[Value],
    ) -> HashMap<RecordId, HashSet<Value>> {
        self.explore(timestamp, key, op, values, Locking::Unsafe)
    }
}

impl<T: PermanentStore + ?Sized> Compoundable for T {}
