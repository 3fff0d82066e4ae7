use std::collections::HashSet;

use super::column_def::Column;
use crate::{DatabaseError, Result};

/// A table schema defining the structure of rows.
///
/// A schema is an ordered list of column definitions with at most one
/// primary key and no repeated column names.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// The ordered list of column definitions.
    columns: Vec<Column>,
}

impl Schema {
    /// Creates a schema for `table`, rejecting duplicate names and extra primary keys.
    pub fn new(table: &str, columns: Vec<Column>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(DatabaseError::DuplicateColumn {
                    table: table.to_string(),
                    column: column.name.clone(),
                });
            }
        }

        if columns.iter().filter(|c| c.is_primary).count() > 1 {
            return Err(DatabaseError::MultiplePrimaryKeys {
                table: table.to_string(),
            });
        }

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|col| col.is_primary)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|col| col.name.as_str())
    }
}
