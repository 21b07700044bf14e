// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use meridian_type::RecordId;
use std::fmt::{Display, Formatter};

/// Names the scope a lock or version-change subscription applies to.
///
/// A `Token` is produced from whatever a read or write actually touched: a
/// whole record, a whole key (across every record), or a single `(key,
/// record)` field. Tokens are hashable and totally ordered so lock
/// acquisition can sort them into a deadlock-free total order, and so they
/// can be serialized into a Transaction backup file (see
/// `meridian-transaction::backup`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Token {
    Record(RecordId),
    Key(String),
    KeyRecord(String, RecordId),
}

impl Token {
    pub fn record(record: RecordId) -> Self {
        Self::Record(record)
    }

    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }

    pub fn key_record(key: impl Into<String>, record: RecordId) -> Self {
        Self::KeyRecord(key.into(), record)
    }

    /// A one-byte discriminant used by the backup file's `LockDescription`
    /// framing (`[u8 kind][token bytes]`).
    pub fn kind_byte(&self) -> u8 {
        match self {
            Self::Record(_) => 0,
            Self::Key(_) => 1,
            Self::KeyRecord(_, _) => 2,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.kind_byte()];
        match self {
            Self::Record(record) => out.extend(record.to_be_bytes()),
            Self::Key(key) => {
                out.extend((key.len() as u32).to_be_bytes());
                out.extend(key.as_bytes());
            }
            Self::KeyRecord(key, record) => {
                out.extend((key.len() as u32).to_be_bytes());
                out.extend(key.as_bytes());
                out.extend(record.to_be_bytes());
            }
        }
        out
    }

    /// Decodes a token as framed by [`Token::encode`], returning the token
    /// and the number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> Option<(Self, usize)> {
        let kind = *bytes.first()?;
        let rest = &bytes[1..];
        match kind {
            0 => {
                let record = RecordId::from_be_bytes(rest.get(..8)?.try_into().ok()?);
                Some((Self::Record(record), 1 + 8))
            }
            1 => {
                let len = u32::from_be_bytes(rest.get(..4)?.try_into().ok()?) as usize;
                let key = String::from_utf8(rest.get(4..4 + len)?.to_vec()).ok()?;
                Some((Self::Key(key), 1 + 4 + len))
            }
            2 => {
                let len = u32::from_be_bytes(rest.get(..4)?.try_into().ok()?) as usize;
                let key = String::from_utf8(rest.get(4..4 + len)?.to_vec()).ok()?;
                let record = RecordId::from_be_bytes(rest.get(4 + len..4 + len + 8)?.try_into().ok()?);
                Some((Self::KeyRecord(key, record), 1 + 4 + len + 8))
            }
            _ => None,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Record(record) => write!(f, "record({record})"),
            Self::Key(key) => write!(f, "key({key})"),
            Self::KeyRecord(key, record) => write!(f, "key_record({key}, {record})"),
        }
    }
}
