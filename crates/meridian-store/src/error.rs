// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use thiserror::Error as ThisError;

#[derive(ThisError, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    #[error("COMPARE writes are not storable and cannot be accepted")]
    NotStorable,
    #[error("destination rejected an accepted write: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, Error>;
