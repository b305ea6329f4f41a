//! Relational store used as the pipeline sink.
//!
//! The pipeline and reconciliation only talk to the [`Store`] trait: bulk
//! loads, set-based statements and scalar/row fetches. [`SqliteStore`] is the
//! bundled implementation.

pub mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::models::{Record, Value};

/// The set-semantics surface the pipeline depends on.
pub trait Store {
    /// Insert rows, replacing rows with the same primary key. Returns the row count.
    fn bulk_insert(&mut self, table: &str, rows: &[Record]) -> Result<usize>;

    /// Run one statement. Returns the number of rows changed.
    fn execute(&mut self, statement: &str) -> Result<usize>;

    fn table_exists(&self, name: &str) -> Result<bool>;

    /// First column of the first row, `Value::Null` when there is no row
    fn fetch_scalar(&self, query: &str) -> Result<Value>;

    fn fetch_rows(&self, query: &str) -> Result<Vec<Vec<Value>>>;

    /// `fetch_scalar` for COUNT-style queries
    fn count(&self, query: &str) -> Result<i64> {
        Ok(self.fetch_scalar(query)?.as_i64().unwrap_or(0))
    }
}
