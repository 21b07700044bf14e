// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

//! Limbo: the ordered, appendable log of uncommitted writes that sits in
//! front of a permanent store. Every buffered store (`meridian-store`) keeps
//! one of these and merges it with the permanent store's own state using
//! XOR-parity membership at read time -- see `Buffer::verify`.

mod error;
mod memory;

pub use error::{Error, Result, SinkError};
pub use memory::InMemoryBuffer;

use meridian_core::{Action, RecordId, Token, Write};
use meridian_type::Value;
use std::collections::{HashMap, HashSet};

/// Destination a buffer's contents are flushed to once a transaction commits.
/// Implemented by the permanent store (`meridian-store::PermanentStore`), kept
/// here rather than there so this crate never needs to depend upward on it.
pub trait WriteSink {
    fn accept(&self, write: Write) -> std::result::Result<(), SinkError>;
}

/// An ordered, append-only buffer of writes not yet durable in a permanent
/// store. Every method here operates purely on what the buffer itself holds;
/// reconciling a buffer's contents against a permanent store's own state is
/// `meridian-store::BufferedStore`'s job.
pub trait Buffer: Send + Sync {
    /// Appends `write`. Returns `false` if `sync` was requested and the
    /// buffer could not guarantee visibility to concurrent readers before
    /// returning (the in-memory buffer always succeeds; a durable-ahead-log
    /// variant could legitimately fail here).
    fn insert(&self, write: Write, sync: bool) -> bool;

    /// Every write currently buffered, oldest first.
    fn iterate(&self) -> Vec<Write>;

    /// For every write at or before `timestamp` touching `key`, folds the
    /// written value into `context`'s ADD/REMOVE XOR-membership set against
    /// the record that wrote it.
    fn browse_key(&self, key: &str, timestamp: u64, context: &mut HashMap<Value, HashSet<RecordId>>);

    /// For every write at or before `timestamp` touching `record`, folds the
    /// written key into `context`'s ADD/REMOVE XOR-membership set against the
    /// value that wrote it.
    fn browse_record(&self, record: RecordId, timestamp: u64, context: &mut HashMap<String, HashSet<Value>>);

    /// For every write at or before `timestamp` touching the exact
    /// `(key, record)` pair, folds the written value into `context`'s
    /// ADD/REMOVE XOR-membership set.
    fn select(&self, key: &str, record: RecordId, timestamp: u64, context: &mut HashSet<Value>);

    /// True if `probe`'s triple is currently a member of the buffer's
    /// XOR-folded membership set, given `baseline` (whether the permanent
    /// store already considers the triple present before the buffer is
    /// applied). An odd number of buffered ADD/REMOVE writes toggles
    /// `baseline`; an even number leaves it unchanged.
    fn verify(&self, probe: &Write, baseline: bool) -> bool;

    /// For every write at or before `timestamp` touching `key`, folds records
    /// whose buffered value for `key` satisfies `op(value, values)` into
    /// `context`'s XOR-membership set. This only ever contributes buffered
    /// ADDs that were not already part of the permanent store's own
    /// operator-filtered result -- the permanent store's own matches are
    /// found independently by `meridian-store`.
    fn explore(
        &self,
        context: &mut HashMap<RecordId, HashSet<Value>>,
        timestamp: u64,
        key: &str,
        op: meridian_core::Operator,
        values: &[Value],
    );

    /// Record ids whose buffered value for `key` textually matches `query`
    /// at or before `timestamp`. This is the buffer's own contribution to a
    /// full-text search; the permanent store composes it with its own hits
    /// and re-validates every candidate's final membership through
    /// `select`/`verify` so a record removed by a later buffered write is
    /// never returned.
    fn search(&self, key: &str, query: &str, timestamp: u64) -> HashSet<RecordId>;

    /// Drains every buffered write, in order, into `destination`, then clears
    /// the buffer. Used once a transaction's backup file has been made
    /// durable and its writes are being applied to the permanent store.
    fn transport(&self, destination: &dyn WriteSink) -> Result<()>;

    /// The highest write version currently buffered that touches `scope`, or
    /// `0` if none does. Used by `get_version` composition at the store
    /// layer to report the more recent of a buffered and a permanent
    /// version.
    fn get_version(&self, scope: &Token) -> u64;
}

/// XOR-folds `action` into a membership set keyed by `key`.
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

/// A buffer attached to a single atomic operation or transaction. All three
/// roles (`Limbo`, `Queue`, `TransactionQueue` in the design notes) are the
/// same structure used at different points of the write lifecycle, so they
/// share one implementation; see `DESIGN.md`.
pub type Limbo = InMemoryBuffer;
pub type Queue = InMemoryBuffer;
pub type TransactionQueue = InMemoryBuffer;
