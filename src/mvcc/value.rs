//! Data values
//!
//! The unit of key and value content. Values are totally ordered so they
//! can key a table: first by kind, then by content within a kind. Floats
//! use IEEE total ordering.

use std::cmp::Ordering;
use std::fmt;

use super::Timestamp;

/// A tagged key or value.
#[derive(Clone, Debug)]
pub enum DataValue {
    None,
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(Timestamp),
}

impl DataValue {
    /// Returns true for `DataValue::None`.
    pub fn is_none(&self) -> bool {
        matches!(self, DataValue::None)
    }

    fn rank(&self) -> u8 {
        match self {
            DataValue::None => 0,
            DataValue::Int(_) => 1,
            DataValue::UInt(_) => 2,
            DataValue::Float(_) => 3,
            DataValue::String(_) => 4,
            DataValue::Bytes(_) => 5,
            DataValue::Timestamp(_) => 6,
        }
    }
}

impl Ord for DataValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DataValue::None, DataValue::None) => Ordering::Equal,
            (DataValue::Int(a), DataValue::Int(b)) => a.cmp(b),
            (DataValue::UInt(a), DataValue::UInt(b)) => a.cmp(b),
            (DataValue::Float(a), DataValue::Float(b)) => a.total_cmp(b),
            (DataValue::String(a), DataValue::String(b)) => a.cmp(b),
            (DataValue::Bytes(a), DataValue::Bytes(b)) => a.cmp(b),
            (DataValue::Timestamp(a), DataValue::Timestamp(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for DataValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DataValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DataValue {}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::None => write!(f, "(none)"),
            DataValue::Int(v) => write!(f, "{}", v),
            DataValue::UInt(v) => write!(f, "{}", v),
            DataValue::Float(v) => write!(f, "{}", v),
            DataValue::String(v) => write!(f, "{}", v),
            DataValue::Bytes(v) => write!(f, "0x{}", hex::encode(v)),
            DataValue::Timestamp(v) => write!(f, "ts({})", v),
        }
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::String(value.to_string())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::String(value)
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        DataValue::Int(value)
    }
}

impl From<u64> for DataValue {
    fn from(value: u64) -> Self {
        DataValue::UInt(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Float(value)
    }
}

impl From<Vec<u8>> for DataValue {
    fn from(value: Vec<u8>) -> Self {
        DataValue::Bytes(value)
    }
}

impl From<&[u8]> for DataValue {
    fn from(value: &[u8]) -> Self {
        DataValue::Bytes(value.to_vec())
    }
}

impl From<Timestamp> for DataValue {
    fn from(value: Timestamp) -> Self {
        DataValue::Timestamp(value)
    }
}
