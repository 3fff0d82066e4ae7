pub(crate) mod statement;

pub use statement::{
    ColumnConstraint, ColumnDefinition, ColumnRef, CreateStatement, DeleteStatement,
    InsertStatement, JoinClause, JoinKind, OrderBy, SelectStatement, SelectTarget, Statement,
    UpdateStatement, WhereClause,
};
