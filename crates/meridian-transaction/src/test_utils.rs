// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

//! A small harness wiring an in-memory-backed [`Engine`] for tests, mirroring
//! the shape of a real deployment without needing an on-disk permanent store.
//! Each instance gets its own temporary backup directory so concurrent tests
//! never collide over `*.txn` files.

use crate::{AtomicOperation, Engine, EngineConfig, Transaction};
use meridian_lock::LockService;
use meridian_store::MemoryStore;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestEngine {
    engine: Arc<Engine<MemoryStore>>,
    // Held for the lifetime of the harness so the backup directory isn't
    // cleaned up out from under an in-progress test.
    _backup_dir: TempDir,
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEngine {
    pub fn new() -> Self {
        let backup_dir = TempDir::new().expect("failed to create a temporary backup directory");
        let config = EngineConfig { backup_dir: backup_dir.path().to_path_buf(), ..EngineConfig::default() };
        let engine = Engine::new(Arc::new(MemoryStore::new()), config);
        Self { engine, _backup_dir: backup_dir }
    }

    pub fn engine(&self) -> &Arc<Engine<MemoryStore>> {
        &self.engine
    }

    pub fn begin_atomic_operation(&self) -> AtomicOperation<Engine<MemoryStore>, LockService> {
        self.engine.begin_atomic_operation()
    }

    pub fn begin_transaction(&self) -> Arc<Transaction<MemoryStore>> {
        self.engine.begin_transaction()
    }
}
