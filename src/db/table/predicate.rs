use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::row::Row;
use crate::core::types::Value;

/// How every condition of a [`Predicate`] compares a row value.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum MatchOperator {
    /// SQL equality (`=`).
    #[default]
    #[strum(to_string = "=")]
    Equal,

    /// Case-insensitive wildcard match (`LIKE`).
    #[strum(to_string = "LIKE")]
    Like,
}

/// A conjunctive WHERE clause: every `(column, value)` condition must hold.
///
/// One operator applies to all conditions; mixing `=` and `LIKE` in a single
/// predicate is not supported.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predicate {
    pub operator: MatchOperator,
    pub conditions: Vec<(String, Value)>,
}

impl Predicate {
    pub fn new<K, V>(operator: MatchOperator, conditions: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            operator,
            conditions: conditions
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Equality on every given column.
    pub fn eq<K, V>(conditions: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::new(MatchOperator::Equal, conditions)
    }

    /// LIKE match on every given column.
    pub fn like<K, V>(conditions: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::new(MatchOperator::Like, conditions)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.conditions.iter().map(|(column, _)| column.as_str())
    }

    /// Whether `row` satisfies every condition.
    ///
    /// A row without a value for a referenced column never matches.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|(column, expected)| {
            let Some(actual) = row.get(column) else {
                return false;
            };

            match self.operator {
                MatchOperator::Equal => actual.sql_eq(expected),
                MatchOperator::Like => like_value(actual, expected),
            }
        })
    }
}

fn like_value(actual: &Value, pattern: &Value) -> bool {
    let Value::Text(pattern) = pattern else {
        return false;
    };

    match actual {
        Value::Text(text) => like_match(text, pattern),
        Value::Date(_) => like_match(&actual.to_string(), pattern),
        _ => false,
    }
}

/// SQL LIKE: `%` matches any run of characters, `_` exactly one.
///
/// Case-insensitive and anchored at both ends.
pub fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    let (mut t, mut p) = (0, 0);
    // Position of the last `%` seen and the text index it was tried against.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some('_') => {
                t += 1;
                p += 1;
            }
            Some(c) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, start)) => {
                    p = star + 1;
                    t = start + 1;
                    backtrack = Some((star, start + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}
