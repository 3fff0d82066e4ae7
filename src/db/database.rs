use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    DatabaseError, Result,
    catalog::system_catalog::SystemCatalog,
    config::DatabaseConfig,
    core::types::Value,
    db::table::{Column, Predicate, Row, RowId, Schema, Table},
    sql::parser::{
        ColumnRef, InsertStatement, JoinClause, JoinKind, SelectStatement, SelectTarget,
        SqlParser, Statement, WhereClause,
    },
    storage::{FileStorage, StorageEngine, Store},
};

/// Outcome of executing a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Rows produced by a SELECT, with the output column names in order.
    ///
    /// Right-hand columns of a join are named `<table>.<column>`.
    Rows { columns: Vec<String>, rows: Vec<Row> },

    /// Number of rows changed by an UPDATE or DELETE.
    Count(usize),

    /// Identifier of the row created by an INSERT.
    Inserted(RowId),

    /// A schema statement completed.
    Done,
}

impl QueryResult {
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            QueryResult::Rows { rows, .. } => Some(rows),
            _ => None,
        }
    }

    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            QueryResult::Rows { rows, .. } => Some(rows),
            _ => None,
        }
    }

    pub fn count(&self) -> Option<usize> {
        match self {
            QueryResult::Count(count) => Some(*count),
            _ => None,
        }
    }
}

/// The main database handle.
///
/// `Database` owns every [`Table`] and the catalog describing them. Table
/// rows and the catalog are persisted through one [`StorageEngine`]; indexes
/// are declared in the catalog and rebuilt from the rows when the database is
/// opened.
///
/// Statements run one at a time to completion. There is no internal locking:
/// a host serving several callers wraps the database in its own lock.
#[derive(Debug)]
pub struct Database {
    name: String,

    /// All tables, keyed by lower-case name.
    tables: BTreeMap<String, Table>,

    store: Store,
}

impl Database {
    /// Opens (or creates) a database in `config.data_directory`.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let storage = FileStorage::open(&config.data_directory)?;
        debug!(path = %storage.data_directory().display(), "opening storage");
        Self::with_config(config, Arc::new(storage))
    }

    /// Opens a database on any storage engine with default settings.
    pub fn with_storage(name: &str, storage: Arc<dyn StorageEngine>) -> Result<Self> {
        Self::with_config(&DatabaseConfig::default().with_name(name), storage)
    }

    /// Opens a database on `storage`, loading every table it holds.
    pub fn with_config(config: &DatabaseConfig, storage: Arc<dyn StorageEngine>) -> Result<Self> {
        let mut database = Self {
            name: config.name.clone(),
            tables: BTreeMap::new(),
            store: Store::new(storage, config.pretty),
        };

        database.load()?;
        Ok(database)
    }

    fn load(&mut self) -> Result<()> {
        let catalog: SystemCatalog = self.store.load_metadata()?.unwrap_or_default();

        for (name, entry) in catalog.tables {
            let schema = Schema::new(&name, entry.columns)?;
            let mut table = Table::load(&name, schema, self.store.clone())?;

            for index in entry.indexes {
                table.create_index(&index.column, Some(&index.name))?;
            }

            debug!(table = %name, rows = table.len(), "loaded table");
            self.tables.insert(name, table);
        }

        info!(database = %self.name, tables = self.tables.len(), "opened database");
        Ok(())
    }

    fn save_catalog(&self) -> Result<()> {
        self.store
            .save_metadata(&SystemCatalog::from_tables(self.tables.values()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates a table and records it in the catalog.
    pub fn create_table(&mut self, name: &str, columns: Vec<Column>) -> Result<&mut Table> {
        validate_identifier(name)?;
        for column in &columns {
            validate_identifier(&column.name)?;
        }

        if self.tables.contains_key(name) {
            return Err(DatabaseError::TableExists(name.to_string()));
        }

        let schema = Schema::new(name, columns)?;
        let table = Table::new(name, schema, self.store.clone());

        // Rows left behind by an earlier table of the same name must not
        // reappear on the next load.
        self.store.delete_table(name)?;
        let catalog =
            SystemCatalog::from_tables(self.tables.values().chain(std::iter::once(&table)));
        self.store.save_metadata(&catalog)?;

        info!(table = %name, columns = table.columns().len(), "created table");
        Ok(self.tables.entry(name.to_string()).or_insert(table))
    }

    /// Removes a table, its rows and its catalog entry.
    ///
    /// The catalog write decides the outcome. A row blob that cannot be
    /// removed afterwards is left behind and cleared by the next
    /// [`Database::create_table`] of the same name.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        if !self.tables.contains_key(name) {
            return Err(DatabaseError::TableNotFound(name.to_string()));
        }

        let catalog =
            SystemCatalog::from_tables(self.tables.values().filter(|table| table.name() != name));
        self.store.save_metadata(&catalog)?;
        self.tables.remove(name);

        if let Err(err) = self.store.delete_table(name) {
            warn!(table = %name, error = %err, "failed to remove row blob of dropped table");
        }

        info!(table = %name, "dropped table");
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    /// Table names in sorted order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| DatabaseError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DatabaseError::TableNotFound(name.to_string()))
    }

    /// Builds an index on `table.column` and records it in the catalog.
    ///
    /// Returns the index name, `idx_<table>_<column>` when none is given.
    pub fn create_index(&mut self, table: &str, column: &str, name: Option<&str>) -> Result<String> {
        let index_name = self.table_mut(table)?.create_index(column, name)?;

        if let Err(err) = self.save_catalog() {
            self.table_mut(table)?.drop_index(&index_name);
            return Err(err);
        }

        info!(table = %table, column = %column, index = %index_name, "created index");
        Ok(index_name)
    }

    /// Drops an index. Returns `false` when the table has no such index.
    pub fn drop_index(&mut self, table: &str, name: &str) -> Result<bool> {
        let table_ref = self.table_mut(table)?;
        let Some(definition) = table_ref.indexes().get(name).map(|i| i.definition().clone())
        else {
            return Ok(false);
        };
        table_ref.drop_index(name);

        if let Err(err) = self.save_catalog() {
            self.table_mut(table)?
                .create_index(&definition.column, Some(&definition.name))?;
            return Err(err);
        }

        info!(table = %table, index = %name, "dropped index");
        Ok(true)
    }

    /// Parses and executes one statement.
    pub fn execute(&mut self, query: &str) -> Result<QueryResult> {
        let statement = SqlParser::new(query).parse()?;
        self.execute_statement(statement)
    }

    pub fn execute_statement(&mut self, statement: Statement) -> Result<QueryResult> {
        debug!(statement = statement.kind(), "executing");

        let result = match statement {
            Statement::CreateTable(create) => {
                if create.if_not_exists && self.tables.contains_key(&create.table_name) {
                    warn!(table = %create.table_name, "table already exists, skipping create");
                } else {
                    let columns = create.columns.into_iter().map(Column::from).collect();
                    self.create_table(&create.table_name, columns)?;
                }
                QueryResult::Done
            }
            Statement::DropTable {
                table_name,
                if_exists,
            } => {
                if if_exists && !self.tables.contains_key(&table_name) {
                    warn!(table = %table_name, "table does not exist, skipping drop");
                } else {
                    self.drop_table(&table_name)?;
                }
                QueryResult::Done
            }
            Statement::Insert(insert) => QueryResult::Inserted(self.insert(insert)?),
            Statement::Select(select) => self.select(select)?,
            Statement::Update(update) => {
                let table = self.table_mut(&update.table_name)?;
                let filter = bind_filter(update.filter, &update.table_name)?;
                QueryResult::Count(table.update(&update.assignments, filter.as_ref())?)
            }
            Statement::Delete(delete) => {
                let table = self.table_mut(&delete.table_name)?;
                let filter = bind_filter(delete.filter, &delete.table_name)?;
                QueryResult::Count(table.delete(filter.as_ref())?)
            }
            Statement::CreateIndex {
                index_name,
                table_name,
                column_name,
            } => {
                self.create_index(&table_name, &column_name, Some(&index_name))?;
                QueryResult::Done
            }
            Statement::DropIndex {
                index_name,
                table_name,
            } => {
                if !self.drop_index(&table_name, &index_name)? {
                    warn!(table = %table_name, index = %index_name, "index does not exist");
                }
                QueryResult::Done
            }
        };

        if let Some(rows) = result.count() {
            debug!(rows, "rows affected");
        }
        Ok(result)
    }

    fn insert(&mut self, insert: InsertStatement) -> Result<RowId> {
        let table = self.table_mut(&insert.table_name)?;
        let found = insert.values.len();

        let columns = match insert.columns {
            Some(columns) => columns,
            None => {
                if found != table.columns().len() {
                    return Err(DatabaseError::ValueCount {
                        table: table.name().to_string(),
                        expected: table.columns().len(),
                        found,
                    });
                }
                table.schema().column_names().map(str::to_string).collect()
            }
        };

        let mut row = Row::new();
        for (column, value) in columns.into_iter().zip(insert.values) {
            if row.contains(&column) {
                return Err(DatabaseError::DuplicateColumn {
                    table: table.name().to_string(),
                    column,
                });
            }
            row.set(column, value);
        }

        table.insert(row)
    }

    fn select(&self, select: SelectStatement) -> Result<QueryResult> {
        let left = self.table(&select.table_name)?;
        let right = match &select.join {
            Some(join) => Some(self.table(&join.table_name)?),
            None => None,
        };
        let scope = Scope { left, right };

        let (filter, joined_filter) = match select.filter {
            Some(clause) => scope.split_filter(clause)?,
            None => (None, None),
        };

        let mut rows = left.select(filter.as_ref())?;

        if let (Some(join), Some(right)) = (&select.join, right) {
            rows = nested_loop_join(&scope, rows, join, right)?;
        }
        if let Some(predicate) = &joined_filter {
            rows.retain(|row| predicate.matches(row));
        }

        if let Some(order_by) = &select.order_by {
            let key = scope.resolve(&order_by.column)?;
            // Stable: rows with equal keys keep insertion order either way.
            rows.sort_by(|a, b| {
                let ordering = sort_value(a, &key).sort_cmp(sort_value(b, &key));
                if order_by.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let mut columns = Vec::new();
        for target in &select.select_list {
            match target {
                SelectTarget::Star => columns.extend(scope.all_columns()),
                SelectTarget::Column(column) => columns.push(scope.resolve(column)?),
            }
        }

        if select.select_list != [SelectTarget::Star] {
            rows = rows
                .into_iter()
                .map(|row| {
                    columns
                        .iter()
                        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                        .collect::<Row>()
                })
                .collect();
        }

        debug!(table = %left.name(), rows = rows.len(), "selected rows");
        Ok(QueryResult::Rows { columns, rows })
    }
}

/// The tables a SELECT can see, used to resolve column references to the
/// keys of result rows.
struct Scope<'a> {
    left: &'a Table,
    right: Option<&'a Table>,
}

impl Scope<'_> {
    fn resolve(&self, column: &ColumnRef) -> Result<String> {
        let left = self.left;
        let name = column.column.as_str();

        match (column.table.as_deref(), self.right) {
            (Some(table), _) if table == left.name() => {
                left.require_column(name).map(|c| c.name.clone())
            }
            (Some(table), Some(right)) if table == right.name() => right
                .require_column(name)
                .map(|c| joined_key(right, &c.name)),
            (Some(table), _) => Err(DatabaseError::TableNotFound(table.to_string())),
            (None, _) if left.column(name).is_some() => Ok(name.to_string()),
            (None, Some(right)) if right.column(name).is_some() => Ok(joined_key(right, name)),
            (None, _) => Err(DatabaseError::ColumnNotFound {
                table: left.name().to_string(),
                column: name.to_string(),
            }),
        }
    }

    /// Splits a WHERE clause into conditions on the FROM table, applied before
    /// the join, and conditions on the joined table, applied to joined rows.
    fn split_filter(&self, clause: WhereClause) -> Result<(Option<Predicate>, Option<Predicate>)> {
        let operator = clause.operator;
        let mut left = Vec::new();
        let mut right = Vec::new();

        for (column, value) in clause.conditions {
            let key = self.resolve(&column)?;
            if is_joined_key(&key) {
                right.push((key, value));
            } else {
                left.push((key, value));
            }
        }

        let predicate = |conditions: Vec<(String, Value)>| {
            (!conditions.is_empty()).then(|| Predicate::new(operator, conditions))
        };
        Ok((predicate(left), predicate(right)))
    }

    fn all_columns(&self) -> Vec<String> {
        let left = self.left.columns().iter().map(|c| c.name.clone());
        let right = self
            .right
            .into_iter()
            .flat_map(|t| t.columns().iter().map(move |c| joined_key(t, &c.name)));

        left.chain(right).collect()
    }
}

fn joined_key(table: &Table, column: &str) -> String {
    format!("{}.{}", table.name(), column)
}

/// Identifiers never contain `.`, so only right-hand join keys do.
fn is_joined_key(key: &str) -> bool {
    key.contains('.')
}

fn bind_filter(filter: Option<WhereClause>, table: &str) -> Result<Option<Predicate>> {
    filter.map(|clause| clause.bind(table)).transpose()
}

fn sort_value<'r>(row: &'r Row, key: &str) -> &'r Value {
    row.get(key).unwrap_or(&Value::Null)
}

/// For each left row, probes `right` for rows whose join column equals the
/// left value. Uses the right table's index on that column when it has one.
fn nested_loop_join(
    scope: &Scope<'_>,
    left_rows: Vec<Row>,
    join: &JoinClause,
    right: &Table,
) -> Result<Vec<Row>> {
    let left_key = scope.resolve(&join.left)?;
    if is_joined_key(&left_key) {
        return Err(DatabaseError::ColumnNotFound {
            table: scope.left.name().to_string(),
            column: join.left.column.clone(),
        });
    }
    if let Some(table) = &join.right.table
        && table != right.name()
    {
        return Err(DatabaseError::TableNotFound(table.clone()));
    }
    let right_column = right.require_column(&join.right.column)?.name.clone();

    let mut joined = Vec::new();
    for left_row in left_rows {
        let matches = match left_row.get(&left_key) {
            Some(value) if !value.is_null() => {
                right.select(Some(&Predicate::eq([(right_column.as_str(), value.clone())])))?
            }
            _ => Vec::new(),
        };

        if matches.is_empty() {
            if join.kind == JoinKind::Left {
                let mut row = left_row;
                for column in right.columns() {
                    row.set(joined_key(right, &column.name), Value::Null);
                }
                joined.push(row);
            }
            continue;
        }

        for right_row in matches {
            let mut row = left_row.clone();
            for (column, value) in right_row.iter() {
                row.set(joined_key(right, column), value.clone());
            }
            joined.push(row);
        }
    }

    Ok(joined)
}

/// Table and column names: lower-case ASCII letters, digits and `_`, not
/// starting with a digit. Names are used as file names by [`FileStorage`].
///
/// Statements fold identifiers to lower case, so upper-case names would be
/// unreachable from query text.
fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(DatabaseError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::{DataType, storage::MemoryStorage};

    fn database() -> Database {
        Database::with_storage("test", Arc::new(MemoryStorage::new())).unwrap()
    }

    fn users(db: &mut Database) {
        db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT UNIQUE)")
            .unwrap();
    }

    #[test]
    fn test_create_table_errors() {
        let mut db = database();
        users(&mut db);

        assert!(matches!(
            db.execute("CREATE TABLE users (id INTEGER)"),
            Err(DatabaseError::TableExists(_))
        ));
        assert!(matches!(
            db.execute("CREATE TABLE t (a INTEGER PRIMARY KEY, b INTEGER PRIMARY KEY)"),
            Err(DatabaseError::MultiplePrimaryKeys { .. })
        ));
        assert!(matches!(
            db.create_table("bad/name", vec![Column::new("a", DataType::Text)]),
            Err(DatabaseError::InvalidIdentifier(_))
        ));
        assert!(db.get_table("t").is_none());

        db.execute("CREATE TABLE IF NOT EXISTS users (x TEXT)").unwrap();
        assert_eq!(db.get_table("users").unwrap().columns().len(), 3);
    }

    #[test]
    fn test_drop_table() {
        let mut db = database();
        users(&mut db);

        db.execute("DROP TABLE users").unwrap();
        assert!(db.get_table("users").is_none());
        assert!(matches!(
            db.execute("DROP TABLE users"),
            Err(DatabaseError::TableNotFound(_))
        ));
        assert_eq!(db.execute("DROP TABLE IF EXISTS users").unwrap(), QueryResult::Done);
    }

    #[test]
    fn test_insert_without_column_list() {
        let mut db = database();
        users(&mut db);

        let result = db
            .execute("INSERT INTO users VALUES (7, 'Grace', 'g@x.com')")
            .unwrap();
        assert_eq!(result, QueryResult::Inserted(RowId(1)));

        assert!(matches!(
            db.execute("INSERT INTO users VALUES (8, 'Ada')"),
            Err(DatabaseError::ValueCount {
                expected: 3,
                found: 2,
                ..
            })
        ));
        assert!(matches!(
            db.execute("INSERT INTO users (name, name) VALUES ('a', 'b')"),
            Err(DatabaseError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn test_select_projection_and_order() {
        let mut db = database();
        users(&mut db);
        for (name, email) in [("Carol", "c@x.com"), ("Alice", "a@x.com"), ("Bob", "b@x.com")] {
            db.execute(&format!(
                "INSERT INTO users (name, email) VALUES ('{name}', '{email}')"
            ))
            .unwrap();
        }

        let QueryResult::Rows { columns, rows } = db
            .execute("SELECT name FROM users ORDER BY name")
            .unwrap()
        else {
            panic!("Expected rows");
        };
        assert_eq!(columns, vec!["name"]);
        let names: Vec<_> = rows.iter().map(|r| r.get("name").unwrap().to_string()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
        assert_eq!(rows[0].len(), 1);

        let rows = db
            .execute("SELECT id, name FROM users ORDER BY users.id DESC")
            .unwrap()
            .into_rows()
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.get("id").cloned().unwrap()).collect();
        assert_eq!(ids, vec![Value::Integer(3), Value::Integer(2), Value::Integer(1)]);

        assert!(matches!(
            db.execute("SELECT nope FROM users"),
            Err(DatabaseError::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn test_index_statements_update_catalog() {
        let storage = Arc::new(MemoryStorage::new());
        let mut db = Database::with_storage("test", storage.clone()).unwrap();
        users(&mut db);

        db.execute("CREATE INDEX by_email ON users (email)").unwrap();
        assert!(matches!(
            db.execute("CREATE INDEX by_email ON users (name)"),
            Err(DatabaseError::IndexExists { .. })
        ));
        assert!(matches!(
            db.execute("CREATE INDEX x ON users (nope)"),
            Err(DatabaseError::ColumnNotFound { .. })
        ));

        let reopened = Database::with_storage("test", storage.clone()).unwrap();
        assert_eq!(
            reopened.get_table("users").unwrap().index_names().collect::<Vec<_>>(),
            vec!["by_email"]
        );

        db.execute("DROP INDEX by_email ON users").unwrap();
        // Dropping an absent index is a no-op.
        db.execute("DROP INDEX by_email ON users").unwrap();
        assert!(!db.drop_index("users", "by_email").unwrap());

        let reopened = Database::with_storage("test", storage).unwrap();
        assert_eq!(reopened.get_table("users").unwrap().index_names().count(), 0);
    }

    #[test]
    fn test_unknown_table() {
        let mut db = database();

        for query in [
            "SELECT * FROM ghosts",
            "INSERT INTO ghosts (a) VALUES (1)",
            "UPDATE ghosts SET a = 1",
            "DELETE FROM ghosts",
            "CREATE INDEX i ON ghosts (a)",
        ] {
            assert!(
                matches!(db.execute(query), Err(DatabaseError::TableNotFound(_))),
                "{query}"
            );
        }
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("_tmp_2").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2fast").is_err());
        assert!(validate_identifier("../etc").is_err());
        assert!(validate_identifier("Users").is_err());
    }

    #[test]
    fn test_create_table_rejects_mixed_case() {
        let mut db = database();

        assert!(matches!(
            db.create_table("Users", vec![Column::new("id", DataType::Integer)]),
            Err(DatabaseError::InvalidIdentifier(ref name)) if name == "Users"
        ));
        assert!(matches!(
            db.create_table("users", vec![Column::new("Id", DataType::Integer)]),
            Err(DatabaseError::InvalidIdentifier(_))
        ));
        assert_eq!(db.table_names().count(), 0);

        // Query text is folded, so the same name works through SQL.
        db.execute("CREATE TABLE Users (Id INTEGER)").unwrap();
        assert!(db.get_table("users").unwrap().column("id").is_some());
    }

    fn orders(db: &mut Database) {
        users(db);
        db.execute("CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER, name TEXT)")
            .unwrap();
        for query in [
            "INSERT INTO users (name, email) VALUES ('Alice', 'a@x.com')",
            "INSERT INTO users (name, email) VALUES ('Bob', 'b@x.com')",
            "INSERT INTO orders (user_id, name) VALUES (1, 'Bob')",
            "INSERT INTO orders (user_id, name) VALUES (2, 'book')",
        ] {
            db.execute(query).unwrap();
        }
    }

    #[test]
    fn test_where_on_joined_table() {
        let mut db = database();
        orders(&mut db);

        let rows = db
            .execute("SELECT * FROM orders JOIN users ON orders.user_id = users.id WHERE users.name = 'Bob'")
            .unwrap()
            .into_rows()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::from("book")));
        assert_eq!(rows[0].get("users.name"), Some(&Value::from("Bob")));

        // Unqualified names still prefer the FROM table.
        let rows = db
            .execute("SELECT * FROM orders JOIN users ON orders.user_id = users.id WHERE name = 'Bob'")
            .unwrap()
            .into_rows()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("users.name"), Some(&Value::from("Alice")));

        // Both sides at once.
        let rows = db
            .execute("SELECT * FROM orders LEFT JOIN users ON orders.user_id = users.id WHERE orders.name LIKE 'b%' AND users.email LIKE 'b@%'")
            .unwrap()
            .into_rows()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::from("book")));
    }

    #[test]
    fn test_where_qualifier_must_name_a_table_in_scope() {
        let mut db = database();
        orders(&mut db);

        for query in [
            "SELECT * FROM orders WHERE ghost.id = 1",
            "SELECT * FROM orders WHERE users.id = 1",
            "SELECT * FROM orders JOIN users ON orders.user_id = users.id WHERE ghost.name = 'Bob'",
            "UPDATE users SET name = 'x' WHERE ghost.id = 1",
            "DELETE FROM users WHERE ghost.id = 1",
            "DELETE FROM users WHERE orders.id = 1",
        ] {
            assert!(
                matches!(db.execute(query), Err(DatabaseError::TableNotFound(_))),
                "{query}"
            );
        }
        assert_eq!(db.get_table("users").unwrap().len(), 2);

        assert_eq!(
            db.execute("DELETE FROM users WHERE users.id = 1").unwrap(),
            QueryResult::Count(1)
        );
    }

    #[test]
    fn test_join_on_unknown_table() {
        let mut db = database();
        orders(&mut db);

        for query in [
            "SELECT * FROM orders JOIN users ON orders.user_id = ghost.id",
            "SELECT * FROM orders JOIN users ON ghost.user_id = users.id",
        ] {
            assert!(
                matches!(db.execute(query), Err(DatabaseError::TableNotFound(ref t)) if t == "ghost"),
                "{query}"
            );
        }
    }

    /// Memory storage whose blob deletes can be made to fail.
    #[derive(Debug, Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        fail_deletes: AtomicBool,
    }

    impl StorageEngine for FlakyStorage {
        fn load_table(&self, table: &str) -> Result<Option<Vec<u8>>> {
            self.inner.load_table(table)
        }

        fn save_table(&self, table: &str, blob: &[u8]) -> Result<()> {
            self.inner.save_table(table, blob)
        }

        fn delete_table(&self, table: &str) -> Result<()> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(std::io::Error::other("disk unplugged").into());
            }
            self.inner.delete_table(table)
        }

        fn load_metadata(&self) -> Result<Option<Vec<u8>>> {
            self.inner.load_metadata()
        }

        fn save_metadata(&self, blob: &[u8]) -> Result<()> {
            self.inner.save_metadata(blob)
        }
    }

    #[test]
    fn test_drop_table_survives_blob_delete_failure() {
        let storage = Arc::new(FlakyStorage::default());
        let mut db = Database::with_storage("test", storage.clone()).unwrap();
        users(&mut db);
        db.execute("INSERT INTO users (name) VALUES ('Alice')").unwrap();

        storage.fail_deletes.store(true, Ordering::SeqCst);
        db.execute("DROP TABLE users").unwrap();
        assert!(db.get_table("users").is_none());

        let reopened = Database::with_storage("test", storage.clone()).unwrap();
        assert!(reopened.get_table("users").is_none());

        // The leftover rows are cleared when the name is reused.
        storage.fail_deletes.store(false, Ordering::SeqCst);
        users(&mut db);
        let reopened = Database::with_storage("test", storage).unwrap();
        assert!(reopened.get_table("users").unwrap().is_empty());
    }
}
