use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Settings for opening a [`crate::Database`] on disk.
///
/// Deserializable so a host can embed it in its own configuration file.
/// Missing fields take their [`Default`] values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Name reported by [`crate::Database::name`].
    pub name: String,

    /// Directory holding `metadata.json` and the `tables/` blobs.
    pub data_directory: PathBuf,

    /// Write indented JSON.
    pub pretty: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            data_directory: PathBuf::from("data"),
            pretty: true,
        }
    }
}

impl DatabaseConfig {
    pub fn new<P: AsRef<Path>>(data_directory: P) -> Self {
        Self {
            data_directory: data_directory.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}
