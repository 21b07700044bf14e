// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

//! The tagged value union stored in fields, and its bit-exact binary codec.
//!
//! Every value that can live in a field is one of a fixed set of primitive
//! kinds. Encoding is deterministic: a one-byte tag followed by a
//! fixed-or-framed payload (see [`Value::encode`]). Equality is structural
//! over `(tag, bytes)`, which is exactly what `#[derive(PartialEq)]` gives us
//! here since every variant's payload already implements `PartialEq` the way
//! we want.

mod codec;

pub use codec::Error as CodecError;

use std::fmt::{Display, Formatter};

pub type Result<T> = std::result::Result<T, CodecError>;

/// The record a [`Value::Link`] points to.
pub type RecordId = u64;

/// The tag discriminant for a [`Value`], used both for dispatch and as the
/// leading byte of the wire encoding.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum ValueType {
    Boolean = 0,
    Integer = 1,
    Long = 2,
    Float = 3,
    Double = 4,
    String = 5,
    Tag = 6,
    Link = 7,
}

impl ValueType {
    pub fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => Self::Boolean,
            1 => Self::Integer,
            2 => Self::Long,
            3 => Self::Float,
            4 => Self::Double,
            5 => Self::String,
            6 => Self::Tag,
            7 => Self::Link,
            other => return Err(CodecError::UnknownTag(other)),
        })
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Boolean => "BOOLEAN",
            Self::Integer => "INTEGER",
            Self::Long => "LONG",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::String => "STRING",
            Self::Tag => "TAG",
            Self::Link => "LINK",
        })
    }
}

/// A value stored in a field. See the module docs for the encoding.
///
/// `Eq`/`Hash` are implemented by hand rather than derived: Float/Double
/// compare and hash by bit pattern (`to_bits`) rather than IEEE equality, so
/// that a `Value` can be used as a `HashMap`/`HashSet` key (as every XOR-fold
/// membership set in this crate family requires) without violating `Eq`'s
/// reflexivity on NaN.
#[derive(Clone, Debug)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// A string-typed enumeration variant, distinct from a free-form string
    /// so that callers can distinguish "tag" fields from prose.
    Tag(String),
    /// A reference to another record.
    Link(RecordId),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Boolean(_) => ValueType::Boolean,
            Self::Integer(_) => ValueType::Integer,
            Self::Long(_) => ValueType::Long,
            Self::Float(_) => ValueType::Float,
            Self::Double(_) => ValueType::Double,
            Self::String(_) => ValueType::String,
            Self::Tag(_) => ValueType::Tag,
            Self::Link(_) => ValueType::Link,
        }
    }

    /// Encodes the payload only (no tag byte, no length framing). Callers
    /// that need length framing (e.g. the Write record encoding in
    /// `meridian-core`) prefix this with a 4-byte big-endian length.
    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            Self::Boolean(v) => vec![if *v { 1 } else { 0 }],
            Self::Integer(v) => v.to_be_bytes().to_vec(),
            Self::Long(v) => v.to_be_bytes().to_vec(),
            Self::Float(v) => v.to_be_bytes().to_vec(),
            Self::Double(v) => v.to_be_bytes().to_vec(),
            Self::String(v) => v.as_bytes().to_vec(),
            Self::Tag(v) => v.as_bytes().to_vec(),
            Self::Link(v) => v.to_be_bytes().to_vec(),
        }
    }

    /// Decodes a payload of the given type. `len` is required for the
    /// variable-length variants (String, Tag) since they carry no
    /// terminator of their own; it is ignored for fixed-width variants.
    pub fn decode_payload(value_type: ValueType, bytes: &[u8]) -> Result<Self> {
        Ok(match value_type {
            ValueType::Boolean => {
                let b = *bytes.first().ok_or(CodecError::Truncated)?;
                match b {
                    0 => Self::Boolean(false),
                    1 => Self::Boolean(true),
                    other => return Err(CodecError::InvalidBoolean(other)),
                }
            }
            ValueType::Integer => Self::Integer(i32::from_be_bytes(take4(bytes)?)),
            ValueType::Long => Self::Long(i64::from_be_bytes(take8(bytes)?)),
            ValueType::Float => Self::Float(f32::from_be_bytes(take4(bytes)?)),
            ValueType::Double => Self::Double(f64::from_be_bytes(take8(bytes)?)),
            ValueType::String => Self::String(
                String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)?,
            ),
            ValueType::Tag => {
                Self::Tag(String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)?)
            }
            ValueType::Link => Self::Link(u64::from_be_bytes(take8(bytes)?)),
        })
    }

    /// Encodes `tag byte ++ 4-byte big-endian payload length ++ payload`.
    /// This is the framing used wherever a Value is embedded in a larger
    /// record (the Write record, the Transaction backup file).
    pub fn encode(&self) -> Vec<u8> {
        let payload = self.encode_payload();
        let mut out = Vec::with_capacity(1 + 4 + payload.len());
        out.push(self.value_type() as u8);
        out.extend((payload.len() as u32).to_be_bytes());
        out.extend(payload);
        out
    }

    /// Decodes a value framed as by [`Value::encode`], returning the value
    /// and the number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let tag = *bytes.first().ok_or(CodecError::Truncated)?;
        let value_type = ValueType::from_tag(tag)?;
        let len_bytes = bytes.get(1..5).ok_or(CodecError::Truncated)?;
        let len = u32::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
        let payload = bytes.get(5..5 + len).ok_or(CodecError::Truncated)?;
        let value = Self::decode_payload(value_type, payload)?;
        Ok((value, 5 + len))
    }
}

fn take4(bytes: &[u8]) -> Result<[u8; 4]> {
    bytes.get(..4).ok_or(CodecError::Truncated)?.try_into().map_err(|_| CodecError::Truncated)
}

fn take8(bytes: &[u8]) -> Result<[u8; 8]> {
    bytes.get(..8).ok_or(CodecError::Truncated)?.try_into().map_err(|_| CodecError::Truncated)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Tag(a), Self::Tag(b)) => a == b,
            (Self::Link(a), Self::Link(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Boolean(v) => v.hash(state),
            Self::Integer(v) => v.hash(state),
            Self::Long(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Double(v) => v.to_bits().hash(state),
            Self::String(v) => v.hash(state),
            Self::Tag(v) => v.hash(state),
            Self::Link(v) => v.hash(state),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean(v) => Display::fmt(v, f),
            Self::Integer(v) => Display::fmt(v, f),
            Self::Long(v) => Display::fmt(v, f),
            Self::Float(v) => Display::fmt(v, f),
            Self::Double(v) => Display::fmt(v, f),
            Self::String(v) => Display::fmt(v, f),
            Self::Tag(v) => Display::fmt(v, f),
            Self::Link(v) => write!(f, "@{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: Value) {
        let encoded = value.encode();
        let (decoded, consumed) = Value::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, value);
    }

    #[test]
    fn round_trips_every_variant() {
        roundtrip(Value::Boolean(true));
        roundtrip(Value::Boolean(false));
        roundtrip(Value::Integer(-42));
        roundtrip(Value::Long(i64::MIN));
        roundtrip(Value::Float(1.5));
        roundtrip(Value::Double(-0.0));
        roundtrip(Value::String("alice".into()));
        roundtrip(Value::Tag("active".into()));
        roundtrip(Value::Link(7));
    }

    #[test]
    fn encoding_is_big_endian() {
        let v = Value::Long(1);
        let encoded = v.encode();
        assert_eq!(encoded[0], ValueType::Long as u8);
        // tag(1) + len(4) + payload(8)
        assert_eq!(encoded.len(), 1 + 4 + 8);
        assert_eq!(&encoded[5..], &1i64.to_be_bytes());
    }

    #[test]
    fn equality_is_structural_not_cross_type() {
        // Same bytes, different declared type: not equal.
        assert_ne!(Value::Integer(0), Value::Boolean(false));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let mut encoded = Value::Long(1).encode();
        encoded.truncate(encoded.len() - 1);
        assert!(Value::decode(&encoded).is_err());
    }
}
