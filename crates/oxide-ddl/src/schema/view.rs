//! View definitions.

use serde::{Deserialize, Serialize};

/// A plain or materialized view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    /// Database (catalog) name.
    #[serde(default)]
    pub database: Option<String>,
    /// Schema name.
    #[serde(default)]
    pub schema: Option<String>,
    /// View name.
    pub name: String,
    /// Defining SELECT, verbatim.
    pub expression: String,
    /// Whether the result set is persisted.
    #[serde(default)]
    pub materialized: bool,
}

impl View {
    /// Creates a plain view.
    #[must_use]
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            ..Self::default()
        }
    }

    /// Persists the result set.
    #[must_use]
    pub const fn materialized(mut self) -> Self {
        self.materialized = true;
        self
    }

    /// Sets the schema.
    #[must_use]
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Returns the dotted path of the parts present.
    #[must_use]
    pub fn path(&self) -> String {
        super::table::table_path(self.database.as_deref(), self.schema.as_deref(), &self.name)
    }
}
