use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::db::{
    index::IndexDefinition,
    table::{Column, Table},
};

/// Schema metadata for every table: the contents of the metadata blob.
///
/// Row data lives in per-table blobs. Index contents are never stored, only
/// their declarations, and are rebuilt from the rows on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemCatalog {
    #[serde(default)]
    pub tables: BTreeMap<String, TableEntry>,
}

/// Catalog record for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub columns: Vec<Column>,

    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
}

impl TableEntry {
    pub fn from_table(table: &Table) -> Self {
        Self {
            columns: table.columns().to_vec(),
            indexes: table.indexes().definitions().cloned().collect(),
        }
    }
}

impl SystemCatalog {
    pub fn from_tables<'a>(tables: impl IntoIterator<Item = &'a Table>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|table| (table.name().to_string(), TableEntry::from_table(table)))
                .collect(),
        }
    }
}
