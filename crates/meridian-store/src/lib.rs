// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

//! The permanent-store contract (C4) and the `BufferedStore` XOR-merge core
//! (C5) that composes a buffer with a permanent store into one logical
//! read/write surface. `meridian-transaction` builds `AtomicOperation` and
//! `Transaction` on top of a `BufferedStore`.

mod buffered;
mod error;
mod memory;
mod permanent;

pub use buffered::BufferedStore;
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use permanent::{Compoundable, Locking, PermanentStore};
