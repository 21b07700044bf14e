// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use thiserror::Error as ThisError;

/// Errors from a plain [`crate::AtomicOperation`].
///
/// Conflict and lock-timeout are deliberately *not* variants here: per the
/// error-handling policy, those are signaled as `Ok(false)` from `commit()`,
/// not an `Err`. Only state misuse and fatal transport failures are errors.
#[derive(ThisError, Debug)]
pub enum AtomicError {
    #[error("atomic operation already committed")]
    AlreadyCommitted,
    #[error("atomic operation already aborted")]
    AlreadyAborted,
    #[error("commit could not drain its buffer into the parent store: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, AtomicError>;

/// Errors from a [`crate::Transaction`]. Kept distinct from [`AtomicError`]
/// so callers can tell a transaction-level failure (backup I/O, recovery,
/// a transaction used after it closed) apart from an ordinary nested-op
/// conflict.
#[derive(ThisError, Debug)]
pub enum TransactionError {
    #[error(transparent)]
    Atomic(#[from] AtomicError),
    #[error("transaction is closed and accepts no further operations")]
    Closed,
    #[error("durable backup I/O failed: {0}")]
    Io(String),
    #[error("transaction backup is corrupt: {0}")]
    CorruptBackup(String),
    #[error("COMPARE writes cannot be accepted into a transaction")]
    InvalidWrite,
}

impl From<std::io::Error> for TransactionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

pub type TransactionResult<T> = std::result::Result<T, TransactionError>;
