//! SQLite backend on sqlx.

use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row as _, Sqlite, TypeInfo, ValueRef};
use tracing::info;

use oxide_ddl::dialect::DatabaseType;
use oxide_ddl::query::Query;
use oxide_ddl::value::SqlValue;

use crate::config::{Credentials, DataSourceOptions};
use crate::connection::{Backend, BoxFuture, Connection, ConnectionPool, QueryResult, Row};
use crate::error::{DriverError, Result};

/// Opens sqlx SQLite pools.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteBackend;

impl SqliteBackend {
    /// Creates the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Backend for SqliteBackend {
    fn open<'a>(
        &'a self,
        credentials: &'a Credentials,
        options: &'a DataSourceOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn ConnectionPool>>> {
        Box::pin(async move {
            let init = DatabaseType::Sqlite
                .dialect()
                .session_init_sql(options.use_utc);
            let in_memory = credentials.url.contains(":memory:");
            let pool_options = pool_options(in_memory, options.pool_size);
            let size = pool_options.get_max_connections();
            let pool = pool_options
                .after_connect(move |conn, _meta| {
                    let init = init.clone();
                    Box::pin(async move {
                        for statement in &init {
                            conn.execute(statement.as_str()).await?;
                        }
                        Ok(())
                    })
                })
                .connect(&credentials.url)
                .await?;
            info!(url = %credentials.url, max_connections = size, "Opened SQLite pool");
            Ok(Arc::new(SqlitePoolHandle { pool }) as Arc<dyn ConnectionPool>)
        })
    }
}

/// Every connection to `:memory:` is a separate database, so such pools
/// hold exactly one connection and never retire it.
fn pool_options(in_memory: bool, pool_size: u32) -> SqlitePoolOptions {
    if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(pool_size)
    }
}

/// A sqlx pool behind the [`ConnectionPool`] seam.
#[derive(Debug, Clone)]
pub struct SqlitePoolHandle {
    pool: SqlitePool,
}

impl SqlitePoolHandle {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ConnectionPool for SqlitePoolHandle {
    fn acquire(&self) -> BoxFuture<'_, Result<Box<dyn Connection>>> {
        Box::pin(async move {
            let connection = self.pool.acquire().await?;
            Ok(Box::new(SqliteConnection { connection }) as Box<dyn Connection>)
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if !self.pool.is_closed() {
                self.pool.close().await;
            }
            Ok(())
        })
    }
}

/// A leased sqlx SQLite connection.
pub struct SqliteConnection {
    connection: PoolConnection<Sqlite>,
}

impl Connection for SqliteConnection {
    fn execute<'a>(&'a mut self, query: &'a Query) -> BoxFuture<'a, Result<QueryResult>> {
        Box::pin(async move {
            let mut statement = sqlx::query(&query.text);
            for value in &query.parameters {
                statement = bind(statement, value)?;
            }

            if returns_rows(&query.text) {
                let rows = statement
                    .fetch_all(&mut *self.connection)
                    .await
                    .map_err(database_error)?;
                let records = rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?;
                Ok(QueryResult::rows(records))
            } else {
                let done = statement
                    .persistent(false)
                    .execute(&mut *self.connection)
                    .await
                    .map_err(database_error)?;
                let mut result = QueryResult::affected(done.rows_affected());
                result.raw = serde_json::json!({
                    "affected": done.rows_affected(),
                    "last_insert_id": done.last_insert_rowid(),
                });
                Ok(result)
            }
        })
    }

    fn release(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            drop(self.connection);
            Ok(())
        })
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind<'q>(statement: SqliteQuery<'q>, value: &SqlValue) -> Result<SqliteQuery<'q>> {
    Ok(match value {
        SqlValue::Null => statement.bind(None::<String>),
        SqlValue::Bool(b) => statement.bind(*b),
        SqlValue::Int(n) => statement.bind(*n),
        SqlValue::Float(f) => statement.bind(*f),
        SqlValue::Text(s) => statement.bind(s.clone()),
        SqlValue::Blob(b) => statement.bind(b.clone()),
        SqlValue::List(_) => {
            return Err(DriverError::unsupported(
                "SQLite",
                "binding a list to a single placeholder",
            ))
        }
    })
}

/// Whether a statement produces a result set.
fn returns_rows(text: &str) -> bool {
    let head = text
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(
        head.as_str(),
        "SELECT" | "PRAGMA" | "WITH" | "VALUES" | "EXPLAIN"
    ) || text.to_ascii_uppercase().contains(" RETURNING ")
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.columns().len());
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            SqlValue::Null
        } else {
            let storage = raw.type_info().name().to_ascii_uppercase();
            match storage.as_str() {
                "INTEGER" | "BOOLEAN" => SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?),
                "REAL" | "NUMERIC" => SqlValue::Float(row.try_get_unchecked::<f64, _>(index)?),
                "BLOB" => SqlValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
                _ => SqlValue::Text(row.try_get_unchecked::<String, _>(index)?),
            }
        };
        columns.push((column.name().to_string(), value));
    }
    Ok(Row { columns })
}

fn database_error(error: sqlx::Error) -> DriverError {
    match error.as_database_error() {
        Some(db) => DriverError::Database {
            code: db.code().map(|c| c.into_owned()),
            message: db.message().to_string(),
        },
        None => DriverError::Sqlx(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("select 1"));
        assert!(returns_rows("  PRAGMA table_xinfo('t')"));
        assert!(returns_rows("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(returns_rows("INSERT INTO t (a) VALUES (1) RETURNING id"));
        assert!(!returns_rows("INSERT INTO t (a) VALUES (1)"));
        assert!(!returns_rows("CREATE TABLE t (a int)"));
    }

    #[tokio::test]
    async fn test_execute_and_decode() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let handle = SqlitePoolHandle::new(pool);
        let mut connection = handle.acquire().await.unwrap();

        connection
            .execute(&Query::new(
                "CREATE TABLE t (id integer PRIMARY KEY, name varchar, score real, data blob)",
            ))
            .await
            .unwrap();
        let insert = Query::with_parameters(
            "INSERT INTO t (name, score, data) VALUES (?, ?, ?)",
            vec![
                SqlValue::Text("a".into()),
                SqlValue::Float(1.5),
                SqlValue::Blob(vec![1, 2]),
            ],
        );
        let result = connection.execute(&insert).await.unwrap();
        assert_eq!(result.affected, Some(1));

        let rows = connection
            .execute(&Query::new("SELECT id, name, score, data, NULL AS empty FROM t"))
            .await
            .unwrap()
            .records;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("id"), Some(1));
        assert_eq!(rows[0].get_str("name"), Some("a"));
        assert_eq!(rows[0].get("score"), Some(&SqlValue::Float(1.5)));
        assert_eq!(rows[0].get("data"), Some(&SqlValue::Blob(vec![1, 2])));
        assert_eq!(rows[0].get("empty"), Some(&SqlValue::Null));
    }

    #[test]
    fn test_memory_pools_keep_their_connection() {
        let memory = pool_options(true, 10);
        assert_eq!(memory.get_max_connections(), 1);
        assert_eq!(memory.get_idle_timeout(), None);
        assert_eq!(memory.get_max_lifetime(), None);

        let file = pool_options(false, 10);
        assert_eq!(file.get_max_connections(), 10);
        assert!(file.get_idle_timeout().is_some());
    }

    #[tokio::test]
    async fn test_database_errors_carry_codes() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let mut connection = SqlitePoolHandle::new(pool).acquire().await.unwrap();
        let error = connection
            .execute(&Query::new("SELECT * FROM missing"))
            .await
            .unwrap_err();
        assert!(matches!(error, DriverError::Database { .. }));
        assert!(error.to_string().contains("missing"));
    }
}
