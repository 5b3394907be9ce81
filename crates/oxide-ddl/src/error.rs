//! Error types for schema planning and value conversion.

/// Errors raised while planning DDL or converting values.
#[derive(Debug, thiserror::Error)]
pub enum DdlError {
    /// A column referenced by an operation is absent from the table.
    #[error("Column '{column}' was not found in table '{table}'")]
    ColumnNotFound {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A column with the same name already exists.
    #[error("Column '{column}' already exists in table '{table}'")]
    ColumnExists {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A named constraint or index is absent from the table.
    #[error("{kind} '{name}' was not found in table '{table}'")]
    ConstraintNotFound {
        /// Kind of object ("Index", "Unique constraint", ...).
        kind: &'static str,
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// The table already has a primary key where a new one was requested.
    #[error("Table '{0}' already has a primary key")]
    PrimaryKeyExists(String),

    /// The table has no primary key where one was expected.
    #[error("Table '{0}' has no primary key")]
    PrimaryKeyNotFound(String),

    /// The requested feature is not available on this dialect.
    #[error("{dialect} does not support {feature}")]
    Unsupported {
        /// Dialect name.
        dialect: &'static str,
        /// Description of the rejected feature.
        feature: String,
    },

    /// The requested schema shape cannot be expressed.
    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    /// A value could not be converted between application and wire form.
    #[error("Cannot convert value for column type '{column_type}': {message}")]
    ValueConversion {
        /// Column type being converted.
        column_type: String,
        /// What went wrong.
        message: String,
    },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DdlError {
    /// Shorthand for [`DdlError::Unsupported`].
    pub fn unsupported(dialect: &'static str, feature: impl Into<String>) -> Self {
        Self::Unsupported {
            dialect,
            feature: feature.into(),
        }
    }
}

/// Result type for planning operations.
pub type Result<T> = std::result::Result<T, DdlError>;
