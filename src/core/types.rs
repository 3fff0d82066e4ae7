use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Text form accepted for DATE values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column data types supported by quill.
///
/// Parsing is case-insensitive and accepts the usual aliases, so `int`,
/// `VARCHAR` and `bool` all resolve to a variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    /// 64-bit signed integer.
    #[strum(to_string = "INTEGER", serialize = "INT", serialize = "BIGINT")]
    Integer,

    /// 64-bit floating point number. Also accepts integer values.
    #[strum(to_string = "FLOAT", serialize = "REAL", serialize = "DOUBLE")]
    Float,

    /// UTF-8 text of any length.
    #[strum(
        to_string = "TEXT",
        serialize = "VARCHAR",
        serialize = "CHAR",
        serialize = "STRING"
    )]
    Text,

    /// Calendar date, written as `YYYY-MM-DD`.
    #[strum(to_string = "DATE")]
    Date,

    /// Boolean true/false value.
    #[strum(to_string = "BOOLEAN", serialize = "BOOL")]
    Boolean,
}

/// A value that can be stored in a column.
///
/// Values are persisted externally tagged (`{"Integer": 1}`, `"Null"`) so a
/// reloaded row is identical to the one written, including dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A 64-bit signed integer value.
    Integer(i64),

    /// A 64-bit floating point number.
    Float(f64),

    /// A UTF-8 text string.
    Text(String),

    /// A calendar date.
    Date(NaiveDate),

    /// A boolean value (true/false).
    Boolean(bool),

    /// Represents a NULL value (absence of data).
    ///
    /// Only allowed in nullable columns.
    Null,
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(fl) => write!(f, "{fl}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Null => write!(f, "NULL"),
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// SQL equality as used by WHERE and JOIN.
    ///
    /// `NULL` never equals anything, not even another `NULL`. Integers and
    /// floats compare exactly by numeric value, and a date equals the text
    /// of its `YYYY-MM-DD` rendering.
    pub fn sql_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(i), Value::Float(f)) | (Value::Float(f), Value::Integer(i)) => {
                float_as_integer(*f) == Some(*i)
            }
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Date(d), Value::Text(s)) | (Value::Text(s), Value::Date(d)) => {
                d.format(DATE_FORMAT).to_string() == *s
            }
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            _ => false,
        }
    }

    /// Total order used by ORDER BY.
    ///
    /// NULL sorts first, then booleans, numbers, dates and text. Numbers of
    /// either kind compare by value.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.total_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            _ => self.sort_rank().cmp(&other.sort_rank()),
        }
    }

    fn sort_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::Date(_) => 3,
            Value::Text(_) => 4,
        }
    }
}

/// Returns the integer a float represents exactly, if any.
pub(crate) fn float_as_integer(f: f64) -> Option<i64> {
    // 2^63 is exactly representable; anything at or above it overflows i64.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;

    if f.fract() == 0.0 && f >= -LIMIT && f < LIMIT {
        Some(f as i64)
    } else {
        None
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
