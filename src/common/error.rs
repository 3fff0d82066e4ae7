use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::DataType;

/// Result alias used throughout the crate.
pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;

/// Broad category of a [`DatabaseError`].
///
/// Hosts (a shell, an HTTP layer) use this to pick a presentation without
/// matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ErrorKind {
    /// The schema does not allow the operation (duplicate table, two primary keys, ...).
    Schema,
    /// A table or column named by the operation does not exist.
    NotFound,
    /// A row would break a column constraint.
    Constraint,
    /// The command text could not be parsed.
    Syntax,
    /// Reading or writing persisted state failed.
    Storage,
}

#[derive(Debug, Error, Diagnostic)]
pub enum DatabaseError {
    #[error("Table {0} already exists")]
    #[diagnostic(code(quill::schema::table_exists))]
    TableExists(String),

    #[error("Table {table} declares more than one primary key")]
    #[diagnostic(code(quill::schema::primary_key))]
    MultiplePrimaryKeys { table: String },

    #[error("Column {column} is declared more than once in table {table}")]
    #[diagnostic(code(quill::schema::duplicate_column))]
    DuplicateColumn { table: String, column: String },

    #[error("Index {index} already exists on table {table}")]
    #[diagnostic(code(quill::schema::index_exists))]
    IndexExists { table: String, index: String },

    #[error("Invalid identifier: {0:?}")]
    #[diagnostic(
        code(quill::schema::identifier),
        help("identifiers may only contain lower-case ASCII letters, digits and underscores")
    )]
    InvalidIdentifier(String),

    #[error("Table not found: {0}")]
    #[diagnostic(code(quill::not_found::table))]
    TableNotFound(String),

    #[error("Column not found: {table}.{column}")]
    #[diagnostic(code(quill::not_found::column))]
    ColumnNotFound { table: String, column: String },

    #[error("Column {table}.{column} cannot be null")]
    #[diagnostic(code(quill::constraint::not_null))]
    NullViolation { table: String, column: String },

    #[error("Duplicate value {value} for unique column {table}.{column}")]
    #[diagnostic(code(quill::constraint::unique))]
    UniqueViolation {
        table: String,
        column: String,
        value: String,
    },

    #[error("Key space exhausted for {table}.{column}")]
    #[diagnostic(
        code(quill::constraint::key_exhausted),
        help("supply an explicit key value")
    )]
    KeyExhausted { table: String, column: String },

    #[error("Type mismatch: {value} cannot be stored in {table}.{column} ({expected})")]
    #[diagnostic(code(quill::constraint::type_mismatch))]
    TypeMismatch {
        table: String,
        column: String,
        expected: DataType,
        value: String,
    },

    #[error("Syntax error: {message}")]
    #[diagnostic(code(quill::syntax))]
    Syntax {
        message: String,
        fragment: String,
        #[source_code]
        query: String,
        #[label("{message}")]
        span: SourceSpan,
    },

    #[error("Table {table} has {expected} columns but {found} values were given")]
    #[diagnostic(
        code(quill::syntax::value_count),
        help("list the target columns explicitly or supply one value per column")
    )]
    ValueCount {
        table: String,
        expected: usize,
        found: usize,
    },

    #[error("IO Error: {0}")]
    #[diagnostic(code(quill::storage::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization Error: {0}")]
    #[diagnostic(code(quill::storage::serialization))]
    Serialization(#[from] serde_json::Error),
}

impl DatabaseError {
    /// Builds a syntax error pointing at `span` within `query`.
    pub(crate) fn syntax(
        query: &str,
        span: std::ops::Range<usize>,
        message: impl Into<String>,
    ) -> Self {
        let start = span.start.min(query.len());
        let end = span.end.clamp(start, query.len());

        Self::Syntax {
            message: message.into(),
            fragment: query.get(start..end).unwrap_or_default().to_string(),
            query: query.to_string(),
            span: (start, end - start).into(),
        }
    }

    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TableExists(_)
            | Self::MultiplePrimaryKeys { .. }
            | Self::DuplicateColumn { .. }
            | Self::IndexExists { .. }
            | Self::InvalidIdentifier(_) => ErrorKind::Schema,
            Self::TableNotFound(_) | Self::ColumnNotFound { .. } => ErrorKind::NotFound,
            Self::NullViolation { .. }
            | Self::UniqueViolation { .. }
            | Self::KeyExhausted { .. }
            | Self::TypeMismatch { .. } => ErrorKind::Constraint,
            Self::Syntax { .. } | Self::ValueCount { .. } => ErrorKind::Syntax,
            Self::Io(_) | Self::Serialization(_) => ErrorKind::Storage,
        }
    }
}
