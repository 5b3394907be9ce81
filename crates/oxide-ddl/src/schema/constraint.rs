//! Indices and table constraints.

use serde::{Deserialize, Serialize};

/// A (possibly unique, possibly partial) index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableIndex {
    /// Index name; derived by the naming strategy when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Indexed columns.
    pub column_names: Vec<String>,
    /// Whether the index enforces uniqueness.
    #[serde(default)]
    pub is_unique: bool,
    /// Predicate of a partial index.
    #[serde(default, rename = "where")]
    pub where_clause: Option<String>,
}

impl TableIndex {
    /// Creates an index over the given columns.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            column_names: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Makes the index unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    /// Restricts the index to rows matching `predicate`.
    #[must_use]
    pub fn partial(mut self, predicate: impl Into<String>) -> Self {
        self.where_clause = Some(predicate.into());
        self
    }
}

/// A unique constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableUnique {
    /// Constraint name; derived by the naming strategy when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Constrained columns.
    pub column_names: Vec<String>,
}

impl TableUnique {
    /// Creates a unique constraint over the given columns.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            column_names: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Sets the name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A check constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCheck {
    /// Constraint name; derived by the naming strategy when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Boolean SQL expression.
    pub expression: String,
    /// Columns the expression refers to.
    #[serde(default)]
    pub column_names: Vec<String>,
}

impl TableCheck {
    /// Creates a check constraint.
    #[must_use]
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            name: None,
            expression: expression.into(),
            column_names: Vec::new(),
        }
    }

    /// Sets the name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Records the columns referenced by the expression.
    #[must_use]
    pub fn on_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.column_names = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// An exclusion constraint. None of the supported dialects accept one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableExclusion {
    /// Constraint name.
    #[serde(default)]
    pub name: Option<String>,
    /// Exclusion expression.
    pub expression: String,
}

/// Referential action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    /// Error if referenced rows still exist at the end of the statement.
    #[serde(rename = "NO ACTION")]
    NoAction,
    /// Error immediately.
    #[serde(rename = "RESTRICT")]
    Restrict,
    /// Propagate to referencing rows.
    #[serde(rename = "CASCADE")]
    Cascade,
    /// Set referencing columns to NULL.
    #[serde(rename = "SET NULL")]
    SetNull,
    /// Set referencing columns to their default.
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses the catalog spelling of an action.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().replace('_', " ").as_str() {
            "NO ACTION" => Some(Self::NoAction),
            "RESTRICT" => Some(Self::Restrict),
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }
}

/// Deferral of a foreign key check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Deferrable {
    /// Checked at commit.
    #[serde(rename = "INITIALLY DEFERRED")]
    InitiallyDeferred,
    /// Checked per statement unless deferred.
    #[serde(rename = "INITIALLY IMMEDIATE")]
    InitiallyImmediate,
}

impl Deferrable {
    /// Returns the SQL representation.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::InitiallyDeferred => "INITIALLY DEFERRED",
            Self::InitiallyImmediate => "INITIALLY IMMEDIATE",
        }
    }
}

/// A foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableForeignKey {
    /// Constraint name; derived by the naming strategy when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Referencing columns.
    pub column_names: Vec<String>,
    /// Database of the referenced table.
    #[serde(default)]
    pub referenced_database: Option<String>,
    /// Schema of the referenced table.
    #[serde(default)]
    pub referenced_schema: Option<String>,
    /// Referenced table name.
    pub referenced_table_name: String,
    /// Referenced columns.
    pub referenced_column_names: Vec<String>,
    /// ON DELETE action.
    #[serde(default)]
    pub on_delete: Option<ForeignKeyAction>,
    /// ON UPDATE action.
    #[serde(default)]
    pub on_update: Option<ForeignKeyAction>,
    /// Deferral.
    #[serde(default)]
    pub deferrable: Option<Deferrable>,
}

impl TableForeignKey {
    /// Creates a foreign key from `columns` to `table(referenced)`.
    #[must_use]
    pub fn new<I, S, J, T>(columns: I, table: impl Into<String>, referenced: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            column_names: columns.into_iter().map(Into::into).collect(),
            referenced_table_name: table.into(),
            referenced_column_names: referenced.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub const fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub const fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = Some(action);
        self
    }

    /// Sets the deferral.
    #[must_use]
    pub const fn deferrable(mut self, deferrable: Deferrable) -> Self {
        self.deferrable = Some(deferrable);
        self
    }

    /// Dotted path of the referenced table.
    #[must_use]
    pub fn referenced_path(&self) -> String {
        super::table::table_path(
            self.referenced_database.as_deref(),
            self.referenced_schema.as_deref(),
            &self.referenced_table_name,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse() {
        assert_eq!(ForeignKeyAction::parse("cascade"), Some(ForeignKeyAction::Cascade));
        assert_eq!(ForeignKeyAction::parse("SET_NULL"), Some(ForeignKeyAction::SetNull));
        assert_eq!(ForeignKeyAction::parse("NO ACTION"), Some(ForeignKeyAction::NoAction));
        assert_eq!(ForeignKeyAction::parse("bogus"), None);
    }

    #[test]
    fn test_foreign_key_builder() {
        let fk = TableForeignKey::new(["author_id"], "user", ["id"])
            .on_delete(ForeignKeyAction::Cascade);
        assert_eq!(fk.column_names, vec!["author_id"]);
        assert_eq!(fk.referenced_path(), "user");
        assert_eq!(fk.on_delete.map(ForeignKeyAction::to_sql), Some("CASCADE"));
        assert!(fk.name.is_none());
    }
}
