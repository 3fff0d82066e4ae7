use crate::{
    DataType, DatabaseError, Result, Value,
    db::table::{Column, MatchOperator, Predicate, Row},
};

/// A parsed command, with every identifier folded to lower case.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateStatement),
    DropTable {
        table_name: String,
        if_exists: bool,
    },
    Insert(InsertStatement),
    Select(SelectStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    CreateIndex {
        index_name: String,
        table_name: String,
        column_name: String,
    },
    DropIndex {
        index_name: String,
        table_name: String,
    },
}

impl Statement {
    /// Short name of the command, used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::CreateTable(_) => "CREATE TABLE",
            Statement::DropTable { .. } => "DROP TABLE",
            Statement::Insert(_) => "INSERT",
            Statement::Select(_) => "SELECT",
            Statement::Update(_) => "UPDATE",
            Statement::Delete(_) => "DELETE",
            Statement::CreateIndex { .. } => "CREATE INDEX",
            Statement::DropIndex { .. } => "DROP INDEX",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateStatement {
    pub table_name: String,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnConstraint {
    NotNull,
    Nullable,
    PrimaryKey,
    Unique,
}

impl From<ColumnDefinition> for Column {
    fn from(definition: ColumnDefinition) -> Self {
        let mut column = Column::new(&definition.name, definition.data_type);

        for constraint in definition.constraints {
            column = match constraint {
                ColumnConstraint::PrimaryKey => column.primary_key(),
                ColumnConstraint::Unique => column.unique(),
                ColumnConstraint::NotNull => column.not_null(),
                ColumnConstraint::Nullable => column,
            };
        }

        column
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table_name: String,

    /// Target columns. `None` means every column in schema order.
    pub columns: Option<Vec<String>>,
    pub values: Vec<Value>,
}

/// A possibly qualified column reference, `column` or `table.column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(column: &str) -> Self {
        Self {
            table: None,
            column: column.to_string(),
        }
    }

    pub fn qualified(table: &str, column: &str) -> Self {
        Self {
            table: Some(table.to_string()),
            column: column.to_string(),
        }
    }
}

/// A parsed WHERE clause. Column references keep their qualifiers until the
/// clause is bound to the table(s) of its statement.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub operator: MatchOperator,
    pub conditions: Vec<(ColumnRef, Value)>,
}

impl WhereClause {
    /// Binds the clause to a single table.
    ///
    /// Fails with `TableNotFound` when a qualifier names any other table.
    pub fn bind(self, table: &str) -> Result<Predicate> {
        let mut conditions = Vec::with_capacity(self.conditions.len());

        for (column, value) in self.conditions {
            match column.table {
                Some(qualifier) if qualifier != table => {
                    return Err(DatabaseError::TableNotFound(qualifier));
                }
                _ => conditions.push((column.column, value)),
            }
        }

        Ok(Predicate {
            operator: self.operator,
            conditions,
        })
    }
}

impl From<Predicate> for WhereClause {
    fn from(predicate: Predicate) -> Self {
        Self {
            operator: predicate.operator,
            conditions: predicate
                .conditions
                .into_iter()
                .map(|(column, value)| (ColumnRef::new(&column), value))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectTarget {
    Star,
    Column(ColumnRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub select_list: Vec<SelectTarget>,
    pub table_name: String,
    pub filter: Option<WhereClause>,
    pub order_by: Option<OrderBy>,
    pub join: Option<JoinClause>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

/// `[INNER | LEFT] JOIN table_name ON left = right`.
///
/// `left` always refers to the FROM table and `right` to the joined one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table_name: String,
    pub left: ColumnRef,
    pub right: ColumnRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table_name: String,
    pub assignments: Row,
    pub filter: Option<WhereClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table_name: String,
    pub filter: Option<WhereClause>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_definition_into_column() {
        let column: Column = ColumnDefinition {
            name: "id".to_string(),
            data_type: DataType::Integer,
            constraints: vec![ColumnConstraint::PrimaryKey],
        }
        .into();

        assert!(column.is_primary);
        assert!(!column.nullable);

        let column: Column = ColumnDefinition {
            name: "email".to_string(),
            data_type: DataType::Text,
            constraints: vec![ColumnConstraint::Unique, ColumnConstraint::NotNull],
        }
        .into();

        assert!(column.is_unique);
        assert!(!column.nullable);
    }

    #[test]
    fn test_where_clause_bind() {
        let clause = WhereClause {
            operator: MatchOperator::Equal,
            conditions: vec![
                (ColumnRef::qualified("users", "id"), Value::Integer(1)),
                (ColumnRef::new("name"), Value::from("Bob")),
            ],
        };

        assert_eq!(
            clause.clone().bind("users").unwrap(),
            Predicate::eq([("id", Value::Integer(1)), ("name", Value::from("Bob"))])
        );
        assert!(matches!(
            clause.bind("orders"),
            Err(DatabaseError::TableNotFound(ref table)) if table == "users"
        ));
    }
}
