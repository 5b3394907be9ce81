//! Error types for connection management and query execution.

use std::sync::Arc;

use oxide_ddl::dialect::IsolationLevel;
use oxide_ddl::error::DdlError;
use oxide_ddl::value::SqlValue;

/// Errors raised by the connection manager and the query runner.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// An operation needed a pool that was never opened.
    #[error("Driver is not connected to the database")]
    NotConnected,

    /// Opening a connection failed. Shared by every caller that waited on
    /// the same attempt.
    #[error("Failed to connect: {0}")]
    ConnectionFailed(#[source] Arc<DriverError>),

    /// The runner was used after `release()`.
    #[error("Query runner already released, cannot run queries anymore")]
    RunnerReleased,

    /// Commit or rollback without an active transaction.
    #[error("Transaction is not started yet, start transaction before committing or rolling back")]
    TransactionNotStarted,

    /// The dialect rejects the requested isolation level.
    #[error("{dialect} does not support isolation level {level}")]
    UnsupportedIsolationLevel {
        /// Dialect name.
        dialect: &'static str,
        /// Requested level.
        level: IsolationLevel,
    },

    /// The backend lacks the requested feature.
    #[error("{dialect} does not support {feature}")]
    Unsupported {
        /// Dialect name.
        dialect: &'static str,
        /// Description of the rejected feature.
        feature: String,
    },

    /// A table, view or constraint is absent from the catalog.
    #[error("{kind} '{name}' was not found")]
    NotFound {
        /// Kind of object ("Table", "View", ...).
        kind: &'static str,
        /// Object name.
        name: String,
    },

    /// The database rejected a statement. Backends report this; the runner
    /// wraps it into [`DriverError::QueryFailed`].
    #[error("{message}")]
    Database {
        /// Native error code, if the backend reports one.
        code: Option<String>,
        /// Native error message.
        message: String,
    },

    /// A statement failed; carries the statement for diagnostics.
    #[error("Query failed: {query}: {source}")]
    QueryFailed {
        /// Statement text as sent.
        query: String,
        /// Bound parameters.
        parameters: Vec<SqlValue>,
        /// Underlying error.
        #[source]
        source: Box<DriverError>,
    },

    /// Rows left violating a foreign key after a table rebuild.
    #[error("{rows} row(s) violate a foreign key of table '{table}'")]
    ForeignKeyViolation {
        /// First table reported with a violation.
        table: String,
        /// Number of violating rows.
        rows: usize,
    },

    /// Invalid data source options.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Planning failed.
    #[error(transparent)]
    Ddl(#[from] DdlError),

    /// sqlx error outside statement execution (pool setup, acquire).
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IO error (reading configuration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Multiple errors occurred.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<DriverError>),
}

impl DriverError {
    /// Native error code of a database failure, looking through wrappers.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Database { code, .. } => code.as_deref(),
            Self::QueryFailed { source, .. } => source.code(),
            _ => None,
        }
    }

    pub(crate) fn unsupported(dialect: &'static str, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            dialect,
            feature: feature.into(),
        }
    }

    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_looks_through_query_failed() {
        let error = DriverError::QueryFailed {
            query: "CREATE INDEX x ON t (a)".into(),
            parameters: Vec::new(),
            source: Box::new(DriverError::Database {
                code: Some("1913".into()),
                message: "exists".into(),
            }),
        };
        assert_eq!(error.code(), Some("1913"));
        assert!(error.to_string().contains("CREATE INDEX x ON t (a)"));
        assert_eq!(DriverError::NotConnected.code(), None);
    }

    #[test]
    fn test_multiple_lists_every_error() {
        let error = DriverError::Multiple(vec![
            DriverError::RunnerReleased,
            DriverError::TransactionNotStarted,
        ]);
        let text = error.to_string();
        assert!(text.contains("already released"));
        assert!(text.contains("not started"));
    }
}
