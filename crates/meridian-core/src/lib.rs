// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

//! Kernel types shared by every layer of the transactional core: the
//! [`Write`] record, the [`Token`] naming a lock/version scope, the
//! [`MonotonicClock`] that stamps writes, and the [`Operator`] grammar used
//! by range queries.

mod clock;
mod error;
mod operator;
mod token;
mod write;

pub use clock::MonotonicClock;
pub use error::Error;
pub use operator::{evaluate, Operator};
pub use token::Token;
pub use write::{Action, Write};

pub use meridian_type::{RecordId, Value, ValueType};

pub type Result<T> = std::result::Result<T, Error>;

/// The key naming a field within a record, e.g. `"name"`.
pub type Key = String;
