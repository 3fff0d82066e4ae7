//! Persistence contract.
//!
//! A storage engine is a durable map from table name to an opaque row blob,
//! plus a single metadata blob describing the schema. Encoding lives with the
//! callers ([`crate::Table`] and the catalog), so engines only move bytes.

use std::{fmt::Debug, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};

use crate::Result;

pub use file::FileStorage;
pub use memory::MemoryStorage;

pub mod file;
pub mod memory;

/// Shared engine handle that encodes blobs as JSON.
#[derive(Debug, Clone)]
pub(crate) struct Store {
    engine: Arc<dyn StorageEngine>,
    pretty: bool,
}

impl Store {
    pub(crate) fn new(engine: Arc<dyn StorageEngine>, pretty: bool) -> Self {
        Self { engine, pretty }
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        Ok(bytes)
    }

    pub(crate) fn load_table<T: DeserializeOwned>(&self, table: &str) -> Result<Option<T>> {
        match self.engine.load_table(table)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn save_table<T: Serialize + ?Sized>(&self, table: &str, value: &T) -> Result<()> {
        let blob = self.encode(value)?;
        self.engine.save_table(table, &blob)
    }

    pub(crate) fn delete_table(&self, table: &str) -> Result<()> {
        self.engine.delete_table(table)
    }

    pub(crate) fn load_metadata<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.engine.load_metadata()? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn save_metadata<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let blob = self.encode(value)?;
        self.engine.save_metadata(&blob)
    }
}

pub trait StorageEngine: Debug + Send + Sync {
    /// Returns the row blob stored for `table`, if any.
    fn load_table(&self, table: &str) -> Result<Option<Vec<u8>>>;

    /// Replaces the row blob for `table`.
    fn save_table(&self, table: &str, blob: &[u8]) -> Result<()>;

    /// Removes the row blob for `table`. Missing tables are not an error.
    fn delete_table(&self, table: &str) -> Result<()>;

    /// Returns the metadata blob, if one was ever saved.
    fn load_metadata(&self) -> Result<Option<Vec<u8>>>;

    /// Replaces the metadata blob.
    fn save_metadata(&self, blob: &[u8]) -> Result<()>;
}
