use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::debug;

use super::StorageEngine;
use crate::Result;

const METADATA_FILE: &str = "metadata.json";
const TABLES_DIR: &str = "tables";

/// Directory-backed storage.
///
/// # Directory Structure
///
/// ```text
/// <dir>/
/// ├── metadata.json       # Table and index definitions
/// └── tables/
///     └── <table>.json    # Rows and next_id of one table
/// ```
///
/// Each write goes to a temporary sibling which is then renamed over the
/// target, so a reader never sees a half-written blob.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Directory where database files are stored.
    data_directory: PathBuf,
}

impl FileStorage {
    /// Opens storage rooted at `data_directory`, creating it if needed.
    pub fn open<P: AsRef<Path>>(data_directory: P) -> Result<Self> {
        let data_directory = data_directory.as_ref().to_path_buf();
        std::fs::create_dir_all(data_directory.join(TABLES_DIR))?;

        Ok(Self { data_directory })
    }

    pub fn data_directory(&self) -> &Path {
        &self.data_directory
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.data_directory
            .join(TABLES_DIR)
            .join(format!("{table}.json"))
    }

    fn metadata_path(&self) -> PathBuf {
        self.data_directory.join(METADATA_FILE)
    }

    fn read(path: &Path) -> Result<Option<Vec<u8>>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(path: &Path, blob: &[u8]) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, blob)?;
        std::fs::rename(&tmp, path)?;

        debug!(path = %path.display(), bytes = blob.len(), "wrote blob");
        Ok(())
    }
}

impl StorageEngine for FileStorage {
    fn load_table(&self, table: &str) -> Result<Option<Vec<u8>>> {
        Self::read(&self.table_path(table))
    }

    fn save_table(&self, table: &str, blob: &[u8]) -> Result<()> {
        Self::write(&self.table_path(table), blob)
    }

    fn delete_table(&self, table: &str) -> Result<()> {
        match std::fs::remove_file(self.table_path(table)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn load_metadata(&self) -> Result<Option<Vec<u8>>> {
        Self::read(&self.metadata_path())
    }

    fn save_metadata(&self, blob: &[u8]) -> Result<()> {
        Self::write(&self.metadata_path(), blob)
    }
}
