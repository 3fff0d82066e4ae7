use std::{collections::BTreeSet, sync::Arc};

use chrono::NaiveDate;
use quill_db::{
    Column, DataType, Database, DatabaseConfig, MemoryStorage, Predicate, Row, RowId,
    StorageEngine, Table, Value,
};
use tempfile::TempDir;

fn assert_index_matches_scan(table: &Table, column: &str, values: &[Value]) {
    for value in values {
        let indexed = table.indexes().search(column, value).unwrap();
        let scanned: BTreeSet<RowId> = table.scan_ids(column, value).into_iter().collect();
        assert_eq!(indexed, scanned, "{column} = {value}");
    }
}

#[test]
fn index_and_scan_agree_through_mutations() -> miette::Result<()> {
    let mut db = Database::with_storage("props", Arc::new(MemoryStorage::new()))?;
    db.execute("CREATE TABLE items (id INTEGER PRIMARY KEY, tag TEXT, qty FLOAT)")?;
    db.execute("CREATE INDEX by_tag ON items (tag)")?;
    db.execute("CREATE INDEX by_qty ON items (qty)")?;

    let tags = [
        Value::from("red"),
        Value::from("blue"),
        Value::from("green"),
        Value::Null,
    ];
    let quantities = [Value::Integer(1), Value::Float(1.0), Value::Float(2.5), Value::Null];

    let statements = [
        "INSERT INTO items (tag, qty) VALUES ('red', 1)",
        "INSERT INTO items (tag, qty) VALUES ('blue', 2.5)",
        "INSERT INTO items (tag, qty) VALUES ('red', 1.0)",
        "INSERT INTO items (tag) VALUES (NULL)",
        "UPDATE items SET tag = 'green' WHERE tag = 'red' AND qty = 1",
        "DELETE FROM items WHERE id = 2",
        "INSERT INTO items (tag, qty) VALUES ('blue', 2.5)",
        "UPDATE items SET qty = 2.5, tag = 'red' WHERE id = 4",
        "DELETE FROM items WHERE tag LIKE 'gr%'",
        "UPDATE items SET tag = NULL",
    ];

    for statement in statements {
        db.execute(statement)?;
        let table = db.get_table("items").unwrap();
        assert_index_matches_scan(table, "tag", &tags);
        assert_index_matches_scan(table, "qty", &quantities);
    }
    Ok(())
}

#[test]
fn row_counts_are_conserved() -> miette::Result<()> {
    let mut db = Database::with_storage("props", Arc::new(MemoryStorage::new()))?;
    db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, grp TEXT)")?;
    for group in ["a", "b", "a", "c", "a"] {
        db.execute(&format!("INSERT INTO t (grp) VALUES ('{group}')"))?;
    }

    let table = db.get_table_mut("t").unwrap();
    let before = table.len();
    let updated = table.update(&Row::from([("grp", "z")]), Some(&Predicate::eq([("grp", "b")])))?;
    assert!(updated <= before);

    let before = table.len();
    let deleted = table.delete(Some(&Predicate::eq([("grp", "a")])))?;
    assert_eq!(deleted, 3);
    assert_eq!(before, table.len() + deleted);

    let before = table.len();
    let deleted = table.delete(Some(&Predicate::eq([("grp", "missing")])))?;
    assert_eq!((deleted, table.len()), (0, before));
    Ok(())
}

#[test]
fn reopen_on_shared_memory_storage() -> miette::Result<()> {
    let storage = Arc::new(MemoryStorage::new());

    let (columns, rows) = {
        let mut db = Database::with_storage("shared", storage.clone())?;
        db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT UNIQUE)")?;
        db.execute("CREATE INDEX idx_users_email ON users (email)")?;
        db.execute("INSERT INTO users (name, email) VALUES ('Alice', 'a@x.com')")?;
        db.execute("INSERT INTO users (name, email) VALUES ('Bob', 'b@x.com')")?;
        db.execute("INSERT INTO users (name, email) VALUES ('Carol', 'c@x.com')")?;
        db.execute("DELETE FROM users WHERE name = 'Bob'")?;

        let table = db.get_table("users").unwrap();
        (table.columns().to_vec(), table.select(None)?)
    };
    assert_eq!(storage.table_names(), vec!["users"]);

    let mut db = Database::with_storage("shared", storage)?;
    let table = db.get_table("users").unwrap();
    assert_eq!(table.columns(), columns.as_slice());
    assert_eq!(table.select(None)?, rows);
    assert_eq!(table.index_names().collect::<Vec<_>>(), vec!["idx_users_email"]);
    assert_index_matches_scan(
        table,
        "email",
        &[Value::from("a@x.com"), Value::from("b@x.com"), Value::from("c@x.com")],
    );

    // The key counter survives the reopen.
    db.execute("INSERT INTO users (name, email) VALUES ('Dave', 'd@x.com')")?;
    let dave = db.get_table("users").unwrap().select(Some(&Predicate::eq([("name", "Dave")])))?;
    assert_eq!(dave[0].get("id"), Some(&Value::Integer(4)));
    Ok(())
}

#[test]
fn reopen_from_directory() -> miette::Result<()> {
    let tmp = TempDir::new().unwrap();
    let config = DatabaseConfig::new(tmp.path()).with_name("disk");
    let born = NaiveDate::from_ymd_opt(1815, 12, 10).unwrap();

    {
        let mut db = Database::open(&config)?;
        let people = db.create_table(
            "people",
            vec![
                Column::new("id", DataType::Integer).primary_key(),
                Column::new("name", DataType::Text).not_null(),
                Column::new("born", DataType::Date),
                Column::new("score", DataType::Float),
                Column::new("active", DataType::Boolean),
            ],
        )?;
        people.insert(Row::from([
            ("name", Value::from("Ada")),
            ("born", Value::from(born)),
            ("score", Value::from(9.5)),
            ("active", Value::from(true)),
        ]))?;
        db.execute("INSERT INTO people (name, born) VALUES ('Grace', '1906-12-09')")?;
    }

    assert!(tmp.path().join("metadata.json").exists());
    assert!(tmp.path().join("tables/people.json").exists());

    let mut db = Database::open(&config)?;
    assert_eq!(db.name(), "disk");
    assert_eq!(db.table_names().collect::<Vec<_>>(), vec!["people"]);

    let rows = db
        .execute("SELECT name, born FROM people WHERE born = '1815-12-10'")?
        .into_rows()
        .unwrap();
    assert_eq!(
        rows,
        vec![Row::from([("name", Value::from("Ada")), ("born", Value::Date(born))])]
    );

    // DATE text is stored as a date.
    let grace = db
        .execute("SELECT born FROM people WHERE name = 'Grace'")?
        .into_rows()
        .unwrap();
    assert_eq!(
        grace[0].get("born"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(1906, 12, 9).unwrap()))
    );

    db.execute("DROP TABLE people")?;
    assert!(!tmp.path().join("tables/people.json").exists());
    assert!(Database::open(&config)?.get_table("people").is_none());
    Ok(())
}

#[test]
fn failed_statement_leaves_storage_untouched() -> miette::Result<()> {
    let storage = Arc::new(MemoryStorage::new());
    let mut db = Database::with_storage("atomic", storage.clone())?;
    db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT UNIQUE)")?;
    db.execute("INSERT INTO users (name, email) VALUES ('Alice', 'a@x.com')")?;
    db.execute("INSERT INTO users (name, email) VALUES ('Bob', 'b@x.com')")?;
    let blob = storage.load_table("users")?;

    for query in [
        "INSERT INTO users (name, email) VALUES ('Eve', 'a@x.com')",
        "INSERT INTO users (email) VALUES ('e@x.com')",
        "INSERT INTO users (name, age) VALUES ('Eve', 3)",
        "UPDATE users SET email = 'same@x.com'",
        "UPDATE users SET name = NULL WHERE id = 1",
        "UPDATE users SET id = 'one'",
        "DELETE FROM users WHERE age = 3",
    ] {
        assert!(db.execute(query).is_err(), "{query}");
        assert_eq!(storage.load_table("users")?, blob, "{query}");
    }
    assert_eq!(db.get_table("users").unwrap().len(), 2);
    Ok(())
}

#[test]
fn order_by_is_stable_and_nulls_sort_first() -> miette::Result<()> {
    let mut db = Database::with_storage("order", Arc::new(MemoryStorage::new()))?;
    db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, rank INTEGER)")?;
    for rank in ["2", "1", "NULL", "2", "1"] {
        db.execute(&format!("INSERT INTO t (rank) VALUES ({rank})"))?;
    }

    let ids = |rows: Vec<Row>| -> Vec<Value> {
        rows.into_iter().map(|r| r.get("id").cloned().unwrap()).collect()
    };

    let ascending = db.execute("SELECT * FROM t ORDER BY rank")?.into_rows().unwrap();
    assert_eq!(
        ids(ascending),
        [3, 2, 5, 1, 4].map(Value::from).to_vec()
    );

    let descending = db.execute("SELECT * FROM t ORDER BY rank DESC")?.into_rows().unwrap();
    assert_eq!(
        ids(descending),
        [1, 4, 2, 5, 3].map(Value::from).to_vec()
    );
    Ok(())
}
