// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use meridian_core::{Error as CoreError, Operator};
use meridian_type::Value;

/// A range/operator predicate over one key, e.g. `age > 3` or
/// `age >< [3, 9]`. Two predicates over different keys never conflict; two
/// predicates over the same key conflict by the rule in
/// [`RangePredicate::overlaps`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RangePredicate {
    pub key: String,
    pub operator: Operator,
    pub values: Vec<Value>,
}

impl RangePredicate {
    pub fn new(key: impl Into<String>, operator: Operator, values: Vec<Value>) -> Self {
        Self { key: key.into(), operator, values }
    }

    /// Whether this predicate's interval could overlap `other`'s.
    ///
    /// The core does not own the permanent store's indexing, so it cannot
    /// compare typed values across every operator combination precisely.
    /// Two point-equality predicates (`=`) conflict only if they name the
    /// same value -- that much is exact. Every other pair of predicates on
    /// the same key is conservatively treated as overlapping, which is
    /// always safe (it can only cause unnecessary serialization, never a
    /// missed conflict).
    pub fn overlaps(&self, other: &Self) -> bool {
        if self.key != other.key {
            return false;
        }
        use meridian_core::Operator::*;
        match (self.operator, other.operator) {
            (Eq, Eq) => self.values == other.values,
            _ => true,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend((self.key.len() as u32).to_be_bytes());
        out.extend(self.key.as_bytes());
        out.push(operator_byte(self.operator));
        out.extend((self.values.len() as u32).to_be_bytes());
        for value in &self.values {
            out.extend(value.encode());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), CoreError> {
        let key_len = u32::from_be_bytes(bytes.get(..4).ok_or(CoreError::TruncatedWrite)?.try_into().unwrap()) as usize;
        let mut offset = 4;
        let key = String::from_utf8(bytes.get(offset..offset + key_len).ok_or(CoreError::TruncatedWrite)?.to_vec())
            .map_err(|_| CoreError::InvalidUtf8InKey)?;
        offset += key_len;
        let op_byte = *bytes.get(offset).ok_or(CoreError::TruncatedWrite)?;
        let operator = operator_from_byte(op_byte)?;
        offset += 1;
        let count = u32::from_be_bytes(bytes.get(offset..offset + 4).ok_or(CoreError::TruncatedWrite)?.try_into().unwrap()) as usize;
        offset += 4;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let (value, consumed) = Value::decode(bytes.get(offset..).ok_or(CoreError::TruncatedWrite)?)?;
            values.push(value);
            offset += consumed;
        }
        Ok((Self { key, operator, values }, offset))
    }
}

fn operator_byte(op: Operator) -> u8 {
    use Operator::*;
    match op {
        Eq => 0,
        Ne => 1,
        Gt => 2,
        Gte => 3,
        Lt => 4,
        Lte => 5,
        Between => 6,
        LinksTo => 7,
        Regex => 8,
        NRegex => 9,
    }
}

fn operator_from_byte(byte: u8) -> Result<Operator, CoreError> {
    use Operator::*;
    Ok(match byte {
        0 => Eq,
        1 => Ne,
        2 => Gt,
        3 => Gte,
        4 => Lt,
        5 => Lte,
        6 => Between,
        7 => LinksTo,
        8 => Regex,
        9 => NRegex,
        other => return Err(CoreError::UnknownOperator(format!("byte {other}"))),
    })
}
