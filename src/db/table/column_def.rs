use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    DatabaseError, Result,
    core::types::{DATE_FORMAT, DataType, Value},
};

/// Definition of a single column in a table schema.
///
/// Specifies the column name, data type and the constraints every stored
/// value must satisfy. A primary key is always unique and never nullable,
/// whatever the flags say.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// The column name.
    pub name: String,

    /// The data type for values in this column.
    pub data_type: DataType,

    /// Whether this column is the table's primary key.
    #[serde(default)]
    pub is_primary: bool,

    /// Whether two rows may not share a non-null value.
    #[serde(default)]
    pub is_unique: bool,

    /// Whether this column can contain NULL values.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    /// Creates a nullable column without key constraints.
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_owned(),
            data_type,
            is_primary: false,
            is_unique: false,
            nullable: true,
        }
    }

    /// Marks this column as the primary key (implies `NOT NULL`).
    pub fn primary_key(mut self) -> Self {
        self.is_primary = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Whether values in this column must be distinct.
    pub fn enforces_uniqueness(&self) -> bool {
        self.is_primary || self.is_unique
    }

    /// Whether NULL is accepted.
    pub fn accepts_null(&self) -> bool {
        self.nullable && !self.is_primary
    }

    /// Checks a value against this column's type and nullability.
    pub fn validate(&self, value: &Value) -> bool {
        match (self.data_type, value) {
            (_, Value::Null) => self.accepts_null(),
            (DataType::Integer, Value::Integer(_))
            | (DataType::Float, Value::Float(_) | Value::Integer(_))
            | (DataType::Text, Value::Text(_))
            | (DataType::Date, Value::Date(_))
            | (DataType::Boolean, Value::Boolean(_)) => true,
            (DataType::Date, Value::Text(text)) => {
                NaiveDate::parse_from_str(text, DATE_FORMAT).is_ok()
            }
            _ => false,
        }
    }

    /// Like [`Column::validate`], but reports which constraint failed.
    pub(crate) fn check(&self, table: &str, value: &Value) -> Result<()> {
        if self.validate(value) {
            return Ok(());
        }

        if value.is_null() {
            Err(DatabaseError::NullViolation {
                table: table.to_string(),
                column: self.name.clone(),
            })
        } else {
            Err(DatabaseError::TypeMismatch {
                table: table.to_string(),
                column: self.name.clone(),
                expected: self.data_type,
                value: format!("{value:?}"),
            })
        }
    }

    /// Converts a validated value to its stored form: DATE text becomes a date.
    pub(crate) fn normalize(&self, value: Value) -> Value {
        match (self.data_type, value) {
            (DataType::Date, Value::Text(text)) => {
                match NaiveDate::parse_from_str(&text, DATE_FORMAT) {
                    Ok(date) => Value::Date(date),
                    Err(_) => Value::Text(text),
                }
            }
            (_, value) => value,
        }
    }
}
