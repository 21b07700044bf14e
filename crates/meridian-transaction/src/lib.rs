// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

//! Just-in-time-locked atomic operations (C6) and durable, nestable
//! transactions (C7) over a permanent store.
//!
//! An [`AtomicOperation`] stages reads and writes in its own buffer, watches
//! every scope it touches for version changes instead of holding locks while
//! open, and only acquires locks -- sorted by [`meridian_core::Token`]'s
//! total order, to make two racing commits deadlock-free -- at commit time.
//! A [`Transaction`] wraps one top-level `AtomicOperation` against an
//! [`Engine`], adds a crash-durable backup file to its commit, and lets
//! nested `AtomicOperation`s parent directly off it.

mod atomic;
mod backup;
mod config;
mod engine;
mod error;
mod listener;
mod state;
mod transaction;

pub mod test_utils;

pub use atomic::AtomicOperation;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{AtomicError, Result, TransactionError, TransactionResult};
pub use listener::{VersionChangeListener, VersionRegistry};
pub use state::AtomicState;
pub use transaction::Transaction;
