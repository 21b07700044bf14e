// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use thiserror::Error;

/// Errors produced while decoding a [`crate::Value`] from its wire form.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    #[error("unknown value tag {0}")]
    UnknownTag(u8),
    #[error("invalid boolean byte {0}, expected 0 or 1")]
    InvalidBoolean(u8),
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("buffer truncated before the encoded value ended")]
    Truncated,
}
