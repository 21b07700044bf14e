// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use crate::{Error, MonotonicClock};
use meridian_type::{RecordId, Value};

/// The intent a [`Write`] carries: toggle a value's membership, or probe it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Action {
    Add = 1,
    Remove = 2,
    /// A non-storable read probe (see `Write::compare`). Never enters a
    /// buffer and is rejected by every `accept()`.
    Compare = 3,
}

impl Action {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Add),
            2 => Some(Self::Remove),
            3 => Some(Self::Compare),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// An immutable intent record describing a membership toggle of one value in
/// one field at a version.
///
/// Writes are never mutated after construction. `Action::Compare` writes are
/// "not storable": they carry no version, are never appended to a buffer,
/// and exist only to drive `BufferedStore`'s internal existence checks (see
/// `meridian-store::buffered`).
#[derive(Clone, Debug, PartialEq)]
pub struct Write {
    action: Action,
    key: String,
    value: Value,
    record: RecordId,
    version: Option<u64>,
}

impl Write {
    /// Creates a storable Add/Remove write, stamping it with the clock's
    /// next version.
    pub fn new(action: Action, key: impl Into<String>, value: Value, record: RecordId, clock: &MonotonicClock) -> Self {
        assert_ne!(action, Action::Compare, "use Write::compare for probes");
        Self { action, key: key.into(), value, record, version: Some(clock.next()) }
    }

    /// Creates a non-storable COMPARE probe at an explicit timestamp (often
    /// "now", but historical reads probe at an earlier version).
    pub fn compare(key: impl Into<String>, value: Value, record: RecordId, at: u64) -> Self {
        Self { action: Action::Compare, key: key.into(), value, record, version: Some(at) }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn record(&self) -> RecordId {
        self.record
    }

    /// `None` only for writes built in some future non-storable variant;
    /// today every `Write` (including COMPARE probes) carries a version, but
    /// `accept()` rejects COMPARE regardless (see `is_storable`).
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn is_storable(&self) -> bool {
        self.action != Action::Compare
    }

    /// Whether this write toggles membership of `(key, value, record)`
    /// identically to `other` -- i.e. they describe the same field triple,
    /// regardless of action or version. Used by `verify`/`explore` to match
    /// a probe against buffered writes.
    pub fn matches_triple(&self, key: &str, value: &Value, record: RecordId) -> bool {
        self.key == key && &self.value == value && self.record == record
    }

    /// Encodes the Write record as:
    /// `action(1) ++ version(8) ++ key_len(4) ++ key ++ value(tag+len+bytes) ++ record(8)`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.action.as_byte());
        out.extend(self.version.unwrap_or(0).to_be_bytes());
        out.extend((self.key.len() as u32).to_be_bytes());
        out.extend(self.key.as_bytes());
        out.extend(self.value.encode());
        out.extend(self.record.to_be_bytes());
        out
    }

    /// Decodes a Write as framed by [`Write::encode`], returning the write
    /// and the number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), Error> {
        let action_byte = *bytes.first().ok_or(Error::TruncatedWrite)?;
        let action = Action::from_byte(action_byte).ok_or(Error::InvalidAction(action_byte))?;
        let version = u64::from_be_bytes(bytes.get(1..9).ok_or(Error::TruncatedWrite)?.try_into().unwrap());
        let key_len = u32::from_be_bytes(bytes.get(9..13).ok_or(Error::TruncatedWrite)?.try_into().unwrap()) as usize;
        let key_start = 13;
        let key_end = key_start + key_len;
        let key = String::from_utf8(bytes.get(key_start..key_end).ok_or(Error::TruncatedWrite)?.to_vec())
            .map_err(|_| Error::InvalidUtf8InKey)?;
        let (value, value_len) = Value::decode(bytes.get(key_end..).ok_or(Error::TruncatedWrite)?)?;
        let record_start = key_end + value_len;
        let record = RecordId::from_be_bytes(
            bytes.get(record_start..record_start + 8).ok_or(Error::TruncatedWrite)?.try_into().unwrap(),
        );
        let total = record_start + 8;
        Ok((Self { action, key, value, record, version: Some(version) }, total))
    }
}
