// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

/// The lifecycle of an [`crate::AtomicOperation`]: `Open -> (Committing ->
/// Committed) | Aborted`. Terminal states (`Committed`, `Aborted`) are
/// sticky -- every public operation on the op rejects them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AtomicState {
    Open,
    Committing,
    Committed,
    Aborted,
}

impl AtomicState {
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}
