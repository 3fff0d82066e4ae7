//! quill: an embedded table store driven by a small SQL dialect.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use quill_db::{Database, MemoryStorage, QueryResult};
//!
//! # fn main() -> quill_db::Result<()> {
//! let mut db = Database::with_storage("demo", Arc::new(MemoryStorage::new()))?;
//! db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")?;
//! db.execute("INSERT INTO users (name) VALUES ('Alice')")?;
//!
//! if let QueryResult::Rows { rows, .. } = db.execute("SELECT * FROM users WHERE name LIKE 'a%'")? {
//!     assert_eq!(rows.len(), 1);
//! }
//! # Ok(())
//! # }
//! ```

pub(crate) mod catalog;
pub(crate) mod common;
pub mod config;
pub(crate) mod core;
pub mod db;
pub mod sql;
pub mod storage;

pub use common::error::{DatabaseError, ErrorKind, Result};
pub use config::DatabaseConfig;
pub use crate::core::types::{DATE_FORMAT, DataType, Value};
pub use db::{
    database::{Database, QueryResult},
    index::{Index, IndexDefinition, IndexManager},
    table::*,
};
pub use sql::parser::{SqlParser, Statement};
pub use storage::{FileStorage, MemoryStorage, StorageEngine};
