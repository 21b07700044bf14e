// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use thiserror::Error as ThisError;

#[derive(ThisError, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),
    #[error("write record truncated before it ended")]
    TruncatedWrite,
    #[error("write record has invalid action byte {0}")]
    InvalidAction(u8),
    #[error("write record key is not valid UTF-8")]
    InvalidUtf8InKey,
    #[error(transparent)]
    Codec(#[from] meridian_type::CodecError),
}
