use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
    core::types::{Value, float_as_integer},
    db::table::{Row, RowId},
};

/// Hashable form of a [`Value`] under SQL equality.
///
/// Two values are [`Value::sql_eq`] exactly when their keys are equal, which
/// is what keeps index lookups identical to a linear scan: integral floats key
/// as integers and dates key as their text rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IndexKey {
    Integer(i64),
    Float(u64),
    Text(String),
    Boolean(bool),
}

impl IndexKey {
    /// Returns `None` for values that equal nothing (`NULL`, NaN).
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Integer(i) => Some(Self::Integer(*i)),
            Value::Float(f) if f.is_nan() => None,
            Value::Float(f) => Some(match float_as_integer(*f) {
                Some(i) => Self::Integer(i),
                None => Self::Float(f.to_bits()),
            }),
            Value::Text(s) => Some(Self::Text(s.clone())),
            Value::Date(_) => Some(Self::Text(value.to_string())),
            Value::Boolean(b) => Some(Self::Boolean(*b)),
        }
    }
}

/// Name and column of an index, as persisted in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub column: String,
}

/// Equality index over one column: value to the ids of rows holding it.
#[derive(Debug, Clone)]
pub struct Index {
    definition: IndexDefinition,
    entries: HashMap<IndexKey, BTreeSet<RowId>>,
}

impl Index {
    pub fn new(name: &str, column: &str) -> Self {
        Self {
            definition: IndexDefinition {
                name: name.to_string(),
                column: column.to_string(),
            },
            entries: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn column(&self) -> &str {
        &self.definition.column
    }

    pub fn definition(&self) -> &IndexDefinition {
        &self.definition
    }

    /// Records `id` under the row's value for the indexed column.
    pub fn add(&mut self, id: RowId, row: &Row) {
        if let Some(key) = row.get(self.column()).and_then(IndexKey::from_value) {
            self.entries.entry(key).or_default().insert(id);
        }
    }

    /// Forgets `id` under the row's value for the indexed column.
    pub fn remove(&mut self, id: RowId, row: &Row) {
        let Some(key) = row.get(self.column()).and_then(IndexKey::from_value) else {
            return;
        };

        if let Some(ids) = self.entries.get_mut(&key) {
            ids.remove(&id);
            if ids.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    /// Ids of rows whose indexed value equals `value`, in ascending order.
    pub fn search(&self, value: &Value) -> BTreeSet<RowId> {
        IndexKey::from_value(value)
            .and_then(|key| self.entries.get(&key))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of distinct indexed values.
    pub fn distinct_values(&self) -> usize {
        self.entries.len()
    }
}

/// All live indexes of one table, kept in step with its rows.
#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    indexes: BTreeMap<String, Index>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a new index from `rows`. The caller checks the name is free.
    pub(crate) fn create<'a>(
        &mut self,
        name: &str,
        column: &str,
        rows: impl IntoIterator<Item = (&'a RowId, &'a Row)>,
    ) {
        let mut index = Index::new(name, column);
        for (id, row) in rows {
            index.add(*id, row);
        }
        self.indexes.insert(name.to_string(), index);
    }

    pub(crate) fn drop(&mut self, name: &str) -> bool {
        self.indexes.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &IndexDefinition> {
        self.indexes.values().map(Index::definition)
    }

    pub(crate) fn add(&mut self, id: RowId, row: &Row) {
        for index in self.indexes.values_mut() {
            index.add(id, row);
        }
    }

    pub(crate) fn remove(&mut self, id: RowId, row: &Row) {
        for index in self.indexes.values_mut() {
            index.remove(id, row);
        }
    }

    pub(crate) fn update(&mut self, id: RowId, old: &Row, new: &Row) {
        self.remove(id, old);
        self.add(id, new);
    }

    /// Looks `value` up in any index on `column`.
    ///
    /// Returns `None` when no index covers the column.
    pub fn search(&self, column: &str, value: &Value) -> Option<BTreeSet<RowId>> {
        self.indexes
            .values()
            .find(|index| index.column() == column)
            .map(|index| index.search(value))
    }
}
