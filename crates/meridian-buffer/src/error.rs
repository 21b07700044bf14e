// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use thiserror::Error as ThisError;

pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("destination rejected a transported write: {0}")]
    Sink(#[source] SinkError),
}

pub type Result<T> = std::result::Result<T, Error>;
