use std::collections::HashMap;

use parking_lot::Mutex;

use super::StorageEngine;
use crate::Result;

/// In-process storage. Contents live as long as the engine does.
///
/// Sharing one `Arc<MemoryStorage>` between two [`crate::Database`] instances
/// behaves like closing and reopening a database on disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: Mutex<HashMap<String, Vec<u8>>>,
    metadata: Mutex<Option<Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of tables that currently have a stored blob.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tables.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl StorageEngine for MemoryStorage {
    fn load_table(&self, table: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.tables.lock().get(table).cloned())
    }

    fn save_table(&self, table: &str, blob: &[u8]) -> Result<()> {
        self.tables.lock().insert(table.to_string(), blob.to_vec());
        Ok(())
    }

    fn delete_table(&self, table: &str) -> Result<()> {
        self.tables.lock().remove(table);
        Ok(())
    }

    fn load_metadata(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.metadata.lock().clone())
    }

    fn save_metadata(&self, blob: &[u8]) -> Result<()> {
        *self.metadata.lock() = Some(blob.to_vec());
        Ok(())
    }
}
