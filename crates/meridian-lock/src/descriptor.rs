// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use crate::error::{Error, Result};
use crate::mode::LockMode;
use crate::range::RangePredicate;
use meridian_core::Token;

/// What a lock names: a named scope, or a range predicate.
#[derive(Clone, Debug, PartialEq)]
pub enum LockTarget {
    Scope(Token),
    Range(RangePredicate),
}

/// Enough information to recreate a lock during Transaction recovery.
/// Wire format: `[u8 mode][u8 kind][target bytes]`, where `kind`
/// distinguishes a named scope from a range predicate, since both can be
/// locked at commit.
#[derive(Clone, Debug, PartialEq)]
pub struct LockDescriptor {
    pub mode: LockMode,
    pub target: LockTarget,
}

impl LockDescriptor {
    pub fn scope(mode: LockMode, token: Token) -> Self {
        Self { mode, target: LockTarget::Scope(token) }
    }

    pub fn range(mode: LockMode, predicate: RangePredicate) -> Self {
        Self { mode, target: LockTarget::Range(predicate) }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.mode.as_byte()];
        match &self.target {
            LockTarget::Scope(token) => {
                out.push(0);
                out.extend(token.encode());
            }
            LockTarget::Range(predicate) => {
                out.push(1);
                out.extend(predicate.encode());
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let mode_byte = *bytes.first().ok_or(Error::MalformedDescriptor)?;
        let mode = LockMode::from_byte(mode_byte).ok_or(Error::MalformedDescriptor)?;
        let kind = *bytes.get(1).ok_or(Error::MalformedDescriptor)?;
        let rest = bytes.get(2..).ok_or(Error::MalformedDescriptor)?;
        let (target, consumed) = match kind {
            0 => {
                let (token, consumed) = Token::decode(rest).ok_or(Error::MalformedDescriptor)?;
                (LockTarget::Scope(token), consumed)
            }
            1 => {
                let (predicate, consumed) =
                    RangePredicate::decode(rest).map_err(|_| Error::MalformedDescriptor)?;
                (LockTarget::Range(predicate), consumed)
            }
            _ => return Err(Error::MalformedDescriptor),
        };
        Ok((Self { mode, target }, 2 + consumed))
    }
}
