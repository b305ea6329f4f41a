//! SQLite implementation of the store.

use std::collections::BTreeSet;
use std::path::Path;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use super::Store;
use crate::error::Result;
use crate::models::{Record, Value};

/// Store backed by a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Bulk loads are rebuilt from scratch on failure, so durability is not needed
        conn.pragma_update(None, "journal_mode", "OFF")?;
        conn.pragma_update(None, "synchronous", "OFF")?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }
}

impl From<&Value> for SqlValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Integer(i) => SqlValue::Integer(*i),
            Value::Real(f) => SqlValue::Real(*f),
            Value::Text(s) => SqlValue::Text(s.clone()),
        }
    }
}

impl From<SqlValue> for Value {
    fn from(value: SqlValue) -> Self {
        match value {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::Integer(i),
            SqlValue::Real(f) => Value::Real(f),
            SqlValue::Text(s) => Value::Text(s),
            SqlValue::Blob(b) => Value::Text(String::from_utf8_lossy(&b).into_owned()),
        }
    }
}

impl Store for SqliteStore {
    fn bulk_insert(&mut self, table: &str, rows: &[Record]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        // Records of one kind share their fields, but take the union to be safe
        let columns: Vec<&str> = rows
            .iter()
            .flat_map(|r| r.keys())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        );

        debug!("Inserting {} rows into {}", rows.len(), table);

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for row in rows {
                let values = columns
                    .iter()
                    .map(|c| row.get(c).map(SqlValue::from).unwrap_or(SqlValue::Null));
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        Ok(rows.len())
    }

    fn execute(&mut self, statement: &str) -> Result<usize> {
        Ok(self.conn.execute(statement, [])?)
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count == 1)
    }

    fn fetch_scalar(&self, query: &str) -> Result<Value> {
        let value = self
            .conn
            .query_row(query, [], |row| row.get::<_, SqlValue>(0))
            .optional()?;
        Ok(value.map(Value::from).unwrap_or(Value::Null))
    }

    fn fetch_rows(&self, query: &str) -> Result<Vec<Vec<Value>>> {
        let mut stmt = self.conn.prepare(query)?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, SqlValue>(i).map(Value::from))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .execute("CREATE TABLE t (id TEXT PRIMARY KEY, year INTEGER, area REAL)")
            .unwrap();
        store
    }

    fn row(id: &str, year: Option<&str>) -> Record {
        let mut r = Record::new();
        r.set("id", id);
        r.set("year", Value::from(year.map(str::to_string)));
        r
    }

    #[test]
    fn test_bulk_insert_replaces_on_primary_key() {
        let mut store = store();
        store
            .bulk_insert("t", &[row("a", Some("1990")), row("b", None)])
            .unwrap();
        store.bulk_insert("t", &[row("a", Some("1985"))]).unwrap();

        assert_eq!(store.count("SELECT COUNT(*) FROM t").unwrap(), 2);
        // INTEGER affinity turns the extracted text into a number
        assert_eq!(
            store.fetch_scalar("SELECT year FROM t WHERE id = 'a'").unwrap(),
            Value::Integer(1985)
        );
    }

    #[test]
    fn test_missing_fields_insert_null() {
        let mut store = store();
        let mut with_area = row("c", None);
        with_area.set("area", 12.5);
        store.bulk_insert("t", &[row("a", None), with_area]).unwrap();

        let rows = store
            .fetch_rows("SELECT id, area FROM t ORDER BY id")
            .unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::from("a"), Value::Null],
                vec![Value::from("c"), Value::Real(12.5)],
            ]
        );
    }

    #[test]
    fn test_table_exists_and_empty_scalar() {
        let store = store();
        assert!(store.table_exists("t").unwrap());
        assert!(!store.table_exists("nope").unwrap());
        assert_eq!(
            store.fetch_scalar("SELECT id FROM t").unwrap(),
            Value::Null
        );
    }
}
