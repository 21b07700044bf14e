// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Meridian Contributors

use crate::Error;
use meridian_type::Value;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The predicate grammar used by `explore` (range/operator queries) and by
/// the string surface that parses them. Both the symbolic (`>=`) and
/// wordform (`gte`) spellings are accepted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Between (inclusive), written `><` or `bw`.
    Between,
    /// "Links to" -- matches `Value::Link(record)` fields pointing at a
    /// given record, written `->` or `lnk2`.
    LinksTo,
    Regex,
    NRegex,
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "=" | "eq" => Self::Eq,
            "!=" | "ne" => Self::Ne,
            ">" | "gt" => Self::Gt,
            ">=" | "gte" => Self::Gte,
            "<" | "lt" => Self::Lt,
            "<=" | "lte" => Self::Lte,
            "><" | "bw" => Self::Between,
            "->" | "lnk2" => Self::LinksTo,
            "regex" => Self::Regex,
            "nregex" => Self::NRegex,
            other => return Err(Error::UnknownOperator(other.to_string())),
        })
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Between => "bw",
            Self::LinksTo => "lnk2",
            Self::Regex => "regex",
            Self::NRegex => "nregex",
        })
    }
}

/// Orders two values of the same underlying kind. Values of different kinds
/// (or non-orderable kinds, like Link) have no defined order.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
        (Value::Long(a), Value::Long(b)) => a.partial_cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => a.partial_cmp(b),
        (Value::Tag(a), Value::Tag(b)) => a.partial_cmp(b),
        _ => None,
    }
}

fn matches_regex(value: &Value, pattern: Option<&Value>) -> bool {
    let Some(Value::String(pattern)) = pattern else { return false };
    let Ok(re) = regex::Regex::new(pattern) else { return false };
    re.is_match(&value.to_string())
}

/// Evaluates `value <op> values...`, shared by `meridian-buffer`'s `explore`
/// replay and `meridian-store`'s permanent-store range queries so both sides
/// of a refined operator query agree on what matches. Operands that cannot
/// be compared (different kinds, or a comparison operator applied to
/// Link/Boolean) never match.
pub fn evaluate(op: Operator, value: &Value, args: &[Value]) -> bool {
    match op {
        Operator::Eq => args.first().is_some_and(|a| a == value),
        Operator::Ne => args.first().is_some_and(|a| a != value),
        Operator::Gt => args.first().and_then(|a| compare(value, a)).is_some_and(|o| o == Ordering::Greater),
        Operator::Gte => args
            .first()
            .and_then(|a| compare(value, a))
            .is_some_and(|o| o != Ordering::Less),
        Operator::Lt => args.first().and_then(|a| compare(value, a)).is_some_and(|o| o == Ordering::Less),
        Operator::Lte => args
            .first()
            .and_then(|a| compare(value, a))
            .is_some_and(|o| o != Ordering::Greater),
        Operator::Between => {
            let (Some(lo), Some(hi)) = (args.first(), args.get(1)) else { return false };
            let above_lo = compare(value, lo).is_some_and(|o| o != Ordering::Less);
            let below_hi = compare(value, hi).is_some_and(|o| o != Ordering::Greater);
            above_lo && below_hi
        }
        Operator::LinksTo => match (value, args.first()) {
            (Value::Link(record), Some(Value::Link(target))) => record == target,
            _ => false,
        },
        Operator::Regex => matches_regex(value, args.first()),
        Operator::NRegex => !matches_regex(value, args.first()),
    }
}
