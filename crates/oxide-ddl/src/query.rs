//! Statements and the up/down journal.

use serde::{Deserialize, Serialize};

use crate::value::{SqlValue, ToSqlValue};

/// A SQL statement with its positional parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Statement text.
    pub text: String,
    /// Parameters, in placeholder order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<SqlValue>,
}

impl Query {
    /// Creates a statement without parameters.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    /// Creates a statement with parameters.
    #[must_use]
    pub fn with_parameters(text: impl Into<String>, parameters: Vec<SqlValue>) -> Self {
        Self {
            text: text.into(),
            parameters,
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn bind(mut self, value: impl ToSqlValue) -> Self {
        self.parameters.push(value.to_sql_value());
        self
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)?;
        if !self.parameters.is_empty() {
            let params: Vec<String> = self.parameters.iter().map(SqlValue::to_sql_inline).collect();
            write!(f, " -- PARAMETERS: [{}]", params.join(", "))?;
        }
        Ok(())
    }
}

/// Forward and inverse statements of one or more schema operations.
///
/// `up` runs in order; `down` is stored in the same order it was produced and
/// is replayed reversed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlInMemory {
    /// Forward statements.
    pub up: Vec<Query>,
    /// Inverse statements.
    pub down: Vec<Query>,
}

impl SqlInMemory {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a forward statement together with its inverse.
    pub fn push(&mut self, up: impl Into<Query>, down: impl Into<Query>) {
        self.up.push(up.into());
        self.down.push(down.into());
    }

    /// Records a forward statement that has no inverse.
    pub fn push_up(&mut self, up: impl Into<Query>) {
        self.up.push(up.into());
    }

    /// Records an inverse statement that has no forward counterpart.
    pub fn push_down(&mut self, down: impl Into<Query>) {
        self.down.push(down.into());
    }

    /// Appends all statements of `other`.
    pub fn extend(&mut self, other: Self) {
        self.up.extend(other.up);
        self.down.extend(other.down);
    }

    /// Returns `true` when neither list holds a statement.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.up.is_empty() && self.down.is_empty()
    }

    /// Returns the inverse statements in execution order.
    #[must_use]
    pub fn down_in_execution_order(&self) -> Vec<Query> {
        self.down.iter().rev().cloned().collect()
    }

    /// Renders one list as a `;`-terminated script.
    #[must_use]
    pub fn script(queries: &[Query]) -> String {
        queries
            .iter()
            .map(|q| format!("{q};"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
