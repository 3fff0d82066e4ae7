use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use column_def::Column;
pub use predicate::{MatchOperator, Predicate, like_match};
pub use row::{Row, RowId};
pub use schema::Schema;

use crate::{
    DatabaseError, Result,
    core::types::{DataType, Value},
    db::index::IndexManager,
    storage::Store,
};

pub mod column_def;
pub mod predicate;
pub mod row;
pub mod schema;

/// Persisted form of a table: its rows in id order and the key counter.
#[derive(Serialize)]
struct TableImage<'a> {
    rows: Vec<&'a Row>,
    next_id: i64,
}

#[derive(Deserialize)]
struct StoredTable {
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default = "first_id")]
    next_id: i64,
}

fn first_id() -> i64 {
    1
}

/// A table: schema, rows and the indexes over them.
///
/// Rows live in an arena keyed by [`RowId`]; ids are handed out in increasing
/// order, so iterating the arena yields rows in insertion order.
///
/// Every mutating operation validates first, then writes the complete new
/// image to storage, and only then changes memory. A statement that fails
/// leaves rows, indexes and the stored blob as they were. Rewriting the whole
/// blob makes each write O(rows).
#[derive(Debug)]
pub struct Table {
    name: String,
    schema: Schema,
    rows: BTreeMap<RowId, Row>,

    /// Next value for an omitted INTEGER primary key.
    next_id: i64,

    /// Next row identifier. Never persisted; ids are reassigned on load.
    next_row_id: u64,

    indexes: IndexManager,
    store: Store,
}

impl Table {
    pub(crate) fn new(name: &str, schema: Schema, store: Store) -> Self {
        Self {
            name: name.to_string(),
            schema,
            rows: BTreeMap::new(),
            next_id: first_id(),
            next_row_id: 1,
            indexes: IndexManager::new(),
            store,
        }
    }

    /// Restores a table's rows from storage. Indexes are rebuilt by the caller.
    pub(crate) fn load(name: &str, schema: Schema, store: Store) -> Result<Self> {
        let stored: Option<StoredTable> = store.load_table(name)?;
        let mut table = Self::new(name, schema, store);

        if let Some(stored) = stored {
            table.next_id = stored.next_id;
            for row in stored.rows {
                let id = table.allocate_row_id();
                table.rows.insert(id, row);
            }
        }

        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn columns(&self) -> &[Column] {
        self.schema.columns()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.schema.column(name)
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.schema.primary_key()
    }

    pub fn indexes(&self) -> &IndexManager {
        &self.indexes
    }

    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indexes.names()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.get(&id)
    }

    /// Live rows in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = (RowId, &Row)> {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    pub fn row_ids(&self) -> impl Iterator<Item = RowId> + '_ {
        self.rows.keys().copied()
    }

    /// Ids of rows whose `column` equals `value`, found by a full scan.
    pub fn scan_ids(&self, column: &str, value: &Value) -> Vec<RowId> {
        self.rows
            .iter()
            .filter(|(_, row)| row.get(column).is_some_and(|v| v.sql_eq(value)))
            .map(|(id, _)| *id)
            .collect()
    }

    pub(crate) fn require_column(&self, column: &str) -> Result<&Column> {
        self.schema
            .column(column)
            .ok_or_else(|| DatabaseError::ColumnNotFound {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Inserts a row and returns its identifier.
    ///
    /// Omitted nullable columns are stored as NULL, and an omitted INTEGER
    /// primary key takes the next value of the table's counter.
    pub fn insert(&mut self, mut values: Row) -> Result<RowId> {
        if let Some(column) = values.values.keys().find(|c| self.schema.column(c).is_none()) {
            return Err(DatabaseError::ColumnNotFound {
                table: self.name.clone(),
                column: column.clone(),
            });
        }

        let mut next_id = self.next_id;
        if let Some(pk) = self.schema.primary_key()
            && pk.data_type == DataType::Integer
        {
            match values.get(&pk.name) {
                None => {
                    values.set(pk.name.clone(), next_id);
                    next_id = next_id.checked_add(1).ok_or_else(|| {
                        DatabaseError::KeyExhausted {
                            table: self.name.clone(),
                            column: pk.name.clone(),
                        }
                    })?;
                }
                Some(Value::Integer(key)) if *key >= next_id => next_id = key.saturating_add(1),
                Some(_) => {}
            }
        }

        for column in self.schema.columns() {
            let value = values.values.remove(&column.name).unwrap_or(Value::Null);
            column.check(&self.name, &value)?;
            values.set(column.name.clone(), column.normalize(value));
        }

        for column in self.unique_columns() {
            if let Some(value) = values.get(&column.name)
                && self.holds_value(&column.name, value, &BTreeSet::new())
            {
                return Err(self.unique_violation(column, value));
            }
        }

        let id = RowId(self.next_row_id);
        self.persist(self.rows.values().chain(std::iter::once(&values)), next_id)?;

        self.indexes.add(id, &values);
        self.rows.insert(id, values);
        self.next_id = next_id;
        self.allocate_row_id();

        debug!(table = %self.name, row_id = %id, "inserted row");
        Ok(id)
    }

    /// Returns copies of the rows matching `predicate` (all rows for `None`).
    pub fn select(&self, predicate: Option<&Predicate>) -> Result<Vec<Row>> {
        Ok(self
            .matching_ids(predicate)?
            .iter()
            .filter_map(|id| self.rows.get(id).cloned())
            .collect())
    }

    /// Applies `assignments` to every matching row and returns how many matched.
    ///
    /// All assignments are validated, including uniqueness against the table
    /// as it would look afterwards, before any row changes.
    pub fn update(&mut self, assignments: &Row, predicate: Option<&Predicate>) -> Result<usize> {
        let mut assigned = Row::new();
        for (column, value) in assignments.iter() {
            let definition = self.require_column(column)?;
            definition.check(&self.name, value)?;
            assigned.set(column, definition.normalize(value.clone()));
        }

        let matched: BTreeSet<RowId> = self.matching_ids(predicate)?.into_iter().collect();
        if matched.is_empty() {
            return Ok(0);
        }

        for column in self.unique_columns() {
            let Some(value) = assigned.get(&column.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if matched.len() > 1 || self.holds_value(&column.name, value, &matched) {
                return Err(self.unique_violation(column, value));
            }
        }

        let mut next_id = self.next_id;
        if let Some(pk) = self.schema.primary_key()
            && let Some(Value::Integer(key)) = assigned.get(&pk.name)
            && *key >= next_id
        {
            next_id = key.saturating_add(1);
        }

        let images: BTreeMap<RowId, Row> = matched
            .iter()
            .filter_map(|id| {
                let mut row = self.rows.get(id)?.clone();
                for (column, value) in assigned.iter() {
                    row.set(column, value.clone());
                }
                Some((*id, row))
            })
            .collect();

        self.persist(
            self.rows.iter().map(|(id, row)| images.get(id).unwrap_or(row)),
            next_id,
        )?;

        let count = images.len();
        for (id, image) in images {
            if let Some(old) = self.rows.insert(id, image) {
                self.indexes.update(id, &old, &self.rows[&id]);
            }
        }
        self.next_id = next_id;

        debug!(table = %self.name, rows = count, "updated rows");
        Ok(count)
    }

    /// Removes every matching row and returns how many were removed.
    pub fn delete(&mut self, predicate: Option<&Predicate>) -> Result<usize> {
        let doomed: BTreeSet<RowId> = self.matching_ids(predicate)?.into_iter().collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        self.persist(
            self.rows
                .iter()
                .filter(|(id, _)| !doomed.contains(id))
                .map(|(_, row)| row),
            self.next_id,
        )?;

        for id in doomed.iter().rev() {
            if let Some(row) = self.rows.remove(id) {
                self.indexes.remove(*id, &row);
            }
        }

        debug!(table = %self.name, rows = doomed.len(), "deleted rows");
        Ok(doomed.len())
    }

    /// Builds an equality index over `column` from the current rows.
    ///
    /// Defaults the name to `idx_<table>_<column>` and returns the name used.
    pub fn create_index(&mut self, column: &str, name: Option<&str>) -> Result<String> {
        self.require_column(column)?;

        let name = name.map_or_else(|| format!("idx_{}_{}", self.name, column), str::to_string);
        if self.indexes.contains(&name) {
            return Err(DatabaseError::IndexExists {
                table: self.name.clone(),
                index: name,
            });
        }

        self.indexes.create(&name, column, &self.rows);
        if let Some(index) = self.indexes.get(&name) {
            debug!(table = %self.name, index = %name, keys = index.distinct_values(), "built index");
        }
        Ok(name)
    }

    /// Drops an index, returning whether it existed.
    pub fn drop_index(&mut self, name: &str) -> bool {
        self.indexes.drop(name)
    }

    /// Ids of rows matching `predicate`, in ascending order.
    ///
    /// Equality predicates on an indexed column take their candidates from
    /// the index; the full predicate is still applied to each candidate.
    fn matching_ids(&self, predicate: Option<&Predicate>) -> Result<Vec<RowId>> {
        let Some(predicate) = predicate else {
            return Ok(self.rows.keys().copied().collect());
        };

        for column in predicate.columns() {
            self.require_column(column)?;
        }

        if predicate.operator == MatchOperator::Equal
            && let Some(candidates) = predicate
                .conditions
                .iter()
                .find_map(|(column, value)| self.indexes.search(column, value))
        {
            return Ok(candidates
                .into_iter()
                .filter(|id| self.rows.get(id).is_some_and(|row| predicate.matches(row)))
                .collect());
        }

        Ok(self
            .rows
            .iter()
            .filter(|(_, row)| predicate.matches(row))
            .map(|(id, _)| *id)
            .collect())
    }

    fn unique_columns(&self) -> impl Iterator<Item = &Column> {
        self.schema
            .columns()
            .iter()
            .filter(|column| column.enforces_uniqueness())
    }

    /// Whether a row outside `excluded` holds `value` in `column`.
    fn holds_value(&self, column: &str, value: &Value, excluded: &BTreeSet<RowId>) -> bool {
        if value.is_null() {
            return false;
        }

        match self.indexes.search(column, value) {
            Some(ids) => ids.iter().any(|id| !excluded.contains(id)),
            None => self.rows.iter().any(|(id, row)| {
                !excluded.contains(id) && row.get(column).is_some_and(|v| v.sql_eq(value))
            }),
        }
    }

    fn unique_violation(&self, column: &Column, value: &Value) -> DatabaseError {
        DatabaseError::UniqueViolation {
            table: self.name.clone(),
            column: column.name.clone(),
            value: value.to_string(),
        }
    }

    fn allocate_row_id(&mut self) -> RowId {
        let id = RowId(self.next_row_id);
        self.next_row_id += 1;
        id
    }

    fn persist<'a>(&self, rows: impl Iterator<Item = &'a Row>, next_id: i64) -> Result<()> {
        let image = TableImage {
            rows: rows.collect(),
            next_id,
        };
        self.store.save_table(&self.name, &image)
    }
}
