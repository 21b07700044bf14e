// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("timed out waiting for a lock")]
    Timeout,
    #[error("malformed lock descriptor in backup")]
    MalformedDescriptor,
}

pub type Result<T> = std::result::Result<T, Error>;
