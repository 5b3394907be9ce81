//! The seam between the runner and a database backend.
//!
//! A [`Backend`] opens pools, a [`ConnectionPool`] leases connections, and a
//! [`Connection`] runs one statement at a time. The SQLite backend lives in
//! [`crate::sqlite`]; other engines plug in by implementing these traits.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use oxide_ddl::query::Query;
use oxide_ddl::value::SqlValue;

use crate::config::{Credentials, DataSourceOptions};
use crate::error::Result;

/// A boxed future for async connection operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One result row, columns in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Column names and values.
    pub columns: Vec<(String, SqlValue)>,
}

impl Row {
    /// Builds a row from name/value pairs.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, SqlValue)>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        }
    }

    /// Value of a column, matched case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Text value of a column; `None` for NULL or non-text values.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(SqlValue::as_str)
    }

    /// Text value of a column, owned.
    #[must_use]
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get_str(name).map(str::to_string)
    }

    /// Integer value of a column, coercing numeric text.
    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(SqlValue::as_i64)
    }

    /// Truthiness of a column (`1`, `true`, `YES`, `Y`).
    #[must_use]
    pub fn get_flag(&self, name: &str) -> bool {
        match self.get(name) {
            Some(SqlValue::Bool(b)) => *b,
            Some(SqlValue::Int(n)) => *n != 0,
            Some(SqlValue::Text(s)) => {
                matches!(s.trim().to_ascii_uppercase().as_str(), "1" | "TRUE" | "YES" | "Y")
            }
            _ => false,
        }
    }

    /// Row as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let object: Map<String, JsonValue> = self
            .columns
            .iter()
            .map(|(name, value)| {
                let json = serde_json::to_value(value).unwrap_or(JsonValue::Null);
                (name.clone(), json)
            })
            .collect();
        JsonValue::Object(object)
    }
}

/// Uniform result of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Backend payload as reported (rows, or counters for writes).
    pub raw: JsonValue,
    /// Returned rows.
    pub records: Vec<Row>,
    /// Rows affected by a write, when the backend reports it.
    pub affected: Option<u64>,
}

impl QueryResult {
    /// Result of a statement returning rows.
    #[must_use]
    pub fn rows(records: Vec<Row>) -> Self {
        Self {
            raw: JsonValue::Array(records.iter().map(Row::to_json).collect()),
            records,
            affected: None,
        }
    }

    /// Result of a write.
    #[must_use]
    pub fn affected(affected: u64) -> Self {
        Self {
            raw: serde_json::json!({ "affected": affected }),
            records: Vec::new(),
            affected: Some(affected),
        }
    }
}

/// A leased connection. Runs one statement at a time.
pub trait Connection: Send {
    /// Runs a statement whose parameters are already bound to placeholders.
    fn execute<'a>(&'a mut self, query: &'a Query) -> BoxFuture<'a, Result<QueryResult>>;

    /// Returns the connection to its pool.
    fn release(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}

/// A pool of connections to one server.
pub trait ConnectionPool: Send + Sync {
    /// Leases a connection.
    fn acquire(&self) -> BoxFuture<'_, Result<Box<dyn Connection>>>;

    /// Closes the pool. Closing a closed pool succeeds.
    fn close(&self) -> BoxFuture<'_, Result<()>>;
}

/// Opens pools for one engine.
pub trait Backend: Send + Sync {
    /// Opens a pool to the server behind `credentials`.
    fn open<'a>(
        &'a self,
        credentials: &'a Credentials,
        options: &'a DataSourceOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn ConnectionPool>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accessors() {
        let row = Row::new([
            ("Name", SqlValue::Text("id".into())),
            ("pk", SqlValue::Int(1)),
            ("nullable", SqlValue::Text("YES".into())),
            ("dflt", SqlValue::Null),
        ]);
        assert_eq!(row.get_str("name"), Some("id"));
        assert_eq!(row.get_i64("PK"), Some(1));
        assert!(row.get_flag("nullable"));
        assert!(!row.get_flag("dflt"));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn test_rows_result_keeps_raw_payload() {
        let result = QueryResult::rows(vec![Row::new([("a", SqlValue::Int(1))])]);
        assert_eq!(result.raw, serde_json::json!([{ "a": 1 }]));
        assert_eq!(result.affected, None);
        assert_eq!(QueryResult::affected(3).affected, Some(3));
    }
}
