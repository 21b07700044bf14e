// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use std::path::PathBuf;
use std::time::Duration;

/// Configuration shared by an [`crate::Engine`] and the [`crate::Transaction`]s
/// it hosts. No external config crate is pulled in here -- this mirrors the
/// teacher's transaction crate, which itself takes no configuration
/// dependency; the surface layer that would parse this from a file or CLI
/// flags is out of scope for this core.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// How long lock acquisition at commit may block before the commit is
    /// treated as conflicted (see §5's "Timeouts").
    pub lock_timeout: Duration,
    /// Directory `<id>.txn` backup files are written to, forced, and
    /// deleted from during a `Transaction`'s durable commit.
    pub backup_dir: PathBuf,
    /// Verbosity of the `tracing` spans emitted while replaying `*.txn`
    /// backups on startup. `true` logs one `debug!` per recovered write;
    /// `false` logs only a summary per file.
    pub verbose_recovery: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            backup_dir: PathBuf::from(".meridian/txn"),
            verbose_recovery: false,
        }
    }
}
