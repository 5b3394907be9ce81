//! Table and column definitions.
//!
//! A [`Table`] is a value: planners take one by reference and hand back a new
//! one describing the shape after the change.

use serde::{Deserialize, Serialize};

use super::constraint::{TableCheck, TableForeignKey, TableIndex, TableUnique};

/// How a generated column gets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStrategy {
    /// Auto-incrementing integer.
    Increment,
    /// Database-generated UUID.
    Uuid,
}

/// Storage of a computed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GeneratedType {
    /// Computed on read.
    Virtual,
    /// Computed on write and stored.
    Stored,
}

impl GeneratedType {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Virtual => "VIRTUAL",
            Self::Stored => "STORED",
        }
    }
}

/// A column as the database sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumn {
    /// Column name.
    pub name: String,
    /// Dialect-native type name, without length or precision.
    #[serde(rename = "type")]
    pub column_type: String,
    /// Length (`"255"`, `"MAX"`).
    #[serde(default)]
    pub length: Option<String>,
    /// Numeric or fractional-second precision.
    #[serde(default)]
    pub precision: Option<u32>,
    /// Numeric scale.
    #[serde(default)]
    pub scale: Option<u32>,
    /// Whether NULL is allowed.
    #[serde(default)]
    pub is_nullable: bool,
    /// Whether the column belongs to the primary key.
    #[serde(default)]
    pub is_primary: bool,
    /// Whether the column carries a single-column unique constraint.
    #[serde(default)]
    pub is_unique: bool,
    /// Whether the value is generated by the database.
    #[serde(default)]
    pub is_generated: bool,
    /// Generation strategy when `is_generated` is set.
    #[serde(default)]
    pub generation_strategy: Option<GenerationStrategy>,
    /// Default expression, verbatim SQL.
    #[serde(default)]
    pub default: Option<String>,
    /// Column comment.
    #[serde(default)]
    pub comment: Option<String>,
    /// Character set.
    #[serde(default)]
    pub charset: Option<String>,
    /// Collation.
    #[serde(default)]
    pub collation: Option<String>,
    /// Allowed values, rendered as an `IN (...)` check.
    #[serde(default, rename = "enum")]
    pub enum_values: Option<Vec<String>>,
    /// Expression of a computed column.
    #[serde(default)]
    pub as_expression: Option<String>,
    /// Storage of a computed column.
    #[serde(default)]
    pub generated_type: Option<GeneratedType>,
    /// User-supplied name of the primary key this column belongs to.
    #[serde(default)]
    pub primary_key_constraint_name: Option<String>,
    /// Whether the column holds an array.
    #[serde(default)]
    pub is_array: bool,
}

impl TableColumn {
    /// Creates a NOT NULL column of the given type.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            length: None,
            precision: None,
            scale: None,
            is_nullable: false,
            is_primary: false,
            is_unique: false,
            is_generated: false,
            generation_strategy: None,
            default: None,
            comment: None,
            charset: None,
            collation: None,
            enum_values: None,
            as_expression: None,
            generated_type: None,
            primary_key_constraint_name: None,
            is_array: false,
        }
    }

    /// Allows NULL.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    /// Marks the column as (part of) the primary key.
    #[must_use]
    pub const fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Adds a single-column unique constraint.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    /// Sets the length.
    #[must_use]
    pub fn length(mut self, length: impl ToString) -> Self {
        self.length = Some(length.to_string());
        self
    }

    /// Sets precision and optional scale.
    #[must_use]
    pub const fn precision(mut self, precision: u32, scale: Option<u32>) -> Self {
        self.precision = Some(precision);
        self.scale = scale;
        self
    }

    /// Sets the default expression.
    #[must_use]
    pub fn default_value(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self
    }

    /// Lets the database generate the value.
    #[must_use]
    pub const fn generated(mut self, strategy: GenerationStrategy) -> Self {
        self.is_generated = true;
        self.generation_strategy = Some(strategy);
        self
    }

    /// Turns the column into a computed column.
    #[must_use]
    pub fn computed(mut self, expression: impl Into<String>, kind: GeneratedType) -> Self {
        self.as_expression = Some(expression.into());
        self.generated_type = Some(kind);
        self
    }

    /// Restricts the column to the given values.
    #[must_use]
    pub fn enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the collation.
    #[must_use]
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Returns `true` for auto-incrementing columns.
    #[must_use]
    pub fn is_increment(&self) -> bool {
        self.is_generated && self.generation_strategy == Some(GenerationStrategy::Increment)
    }

    /// Returns `true` for computed (virtual or stored) columns.
    #[must_use]
    pub const fn is_computed(&self) -> bool {
        self.as_expression.is_some() && self.generated_type.is_some()
    }

    /// Compares the attributes an in-place ALTER can change.
    ///
    /// Name, type, length, key flags and generation are compared separately by
    /// the planners because each maps to a different statement.
    #[must_use]
    pub fn attributes_changed(&self, other: &Self, check_default: bool) -> bool {
        self.charset != other.charset
            || self.collation != other.collation
            || self.precision != other.precision
            || self.scale != other.scale
            || self.as_expression != other.as_expression
            || (check_default && self.default != other.default)
            || self.is_nullable != other.is_nullable
            || self.enum_values.as_deref().unwrap_or_default()
                != other.enum_values.as_deref().unwrap_or_default()
    }

    /// Returns `true` when the change cannot be applied in place on engines
    /// that lack safe retyping of identity and computed columns.
    #[must_use]
    pub fn requires_replace(&self, other: &Self) -> bool {
        (self.is_generated != other.is_generated
            && other.generation_strategy != Some(GenerationStrategy::Uuid))
            || self.column_type != other.column_type
            || self.length != other.length
            || self.as_expression != other.as_expression
            || self.generated_type != other.generated_type
    }
}

/// A table as the database sees it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Database (catalog) name.
    #[serde(default)]
    pub database: Option<String>,
    /// Schema name.
    #[serde(default)]
    pub schema: Option<String>,
    /// Table name.
    pub name: String,
    /// Columns in definition order.
    #[serde(default)]
    pub columns: Vec<TableColumn>,
    /// Indices.
    #[serde(default)]
    pub indices: Vec<TableIndex>,
    /// Unique constraints.
    #[serde(default)]
    pub uniques: Vec<TableUnique>,
    /// Check constraints.
    #[serde(default)]
    pub checks: Vec<TableCheck>,
    /// Foreign keys.
    #[serde(default)]
    pub foreign_keys: Vec<TableForeignKey>,
    /// Set on snapshots created in this session and not yet re-read.
    #[serde(default, skip_serializing)]
    pub just_created: bool,
}

impl Table {
    /// Creates an empty table definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the schema.
    #[must_use]
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Sets the database.
    #[must_use]
    pub fn in_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: TableColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: TableIndex) -> Self {
        self.indices.push(index);
        self
    }

    /// Adds a unique constraint.
    #[must_use]
    pub fn unique(mut self, unique: TableUnique) -> Self {
        self.uniques.push(unique);
        self
    }

    /// Adds a check constraint.
    #[must_use]
    pub fn check(mut self, check: TableCheck) -> Self {
        self.checks.push(check);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, foreign_key: TableForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Returns the dotted path (`database.schema.name`) of the parts present.
    #[must_use]
    pub fn path(&self) -> String {
        table_path(self.database.as_deref(), self.schema.as_deref(), &self.name)
    }

    /// Finds a column by name.
    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Finds a column by name, mutably.
    pub fn find_column_mut(&mut self, name: &str) -> Option<&mut TableColumn> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Returns the primary key columns.
    #[must_use]
    pub fn primary_columns(&self) -> Vec<&TableColumn> {
        self.columns.iter().filter(|c| c.is_primary).collect()
    }

    /// Returns the primary key column names.
    #[must_use]
    pub fn primary_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_primary)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Returns the user-supplied primary key name, if any.
    #[must_use]
    pub fn primary_key_constraint_name(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.is_primary)
            .and_then(|c| c.primary_key_constraint_name.as_deref())
    }

    /// Indices covering the column.
    #[must_use]
    pub fn find_column_indices(&self, column: &str) -> Vec<&TableIndex> {
        self.indices
            .iter()
            .filter(|i| i.column_names.iter().any(|c| c == column))
            .collect()
    }

    /// Unique constraints covering the column.
    #[must_use]
    pub fn find_column_uniques(&self, column: &str) -> Vec<&TableUnique> {
        self.uniques
            .iter()
            .filter(|u| u.column_names.iter().any(|c| c == column))
            .collect()
    }

    /// Check constraints referring to the column.
    #[must_use]
    pub fn find_column_checks(&self, column: &str) -> Vec<&TableCheck> {
        self.checks
            .iter()
            .filter(|c| c.column_names.iter().any(|n| n == column))
            .collect()
    }

    /// Foreign keys using the column.
    #[must_use]
    pub fn find_column_foreign_keys(&self, column: &str) -> Vec<&TableForeignKey> {
        self.foreign_keys
            .iter()
            .filter(|f| f.column_names.iter().any(|c| c == column))
            .collect()
    }
}

/// Joins the present path parts with `.`.
#[must_use]
pub fn table_path(database: Option<&str>, schema: Option<&str>, name: &str) -> String {
    [database, schema, Some(name)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_table() -> Table {
        Table::new("user")
            .column(TableColumn::new("id", "integer").primary())
            .column(TableColumn::new("email", "varchar").unique())
            .column(TableColumn::new("age", "integer").nullable())
    }

    #[test]
    fn test_primary_columns() {
        let table = user_table();
        assert_eq!(table.primary_column_names(), vec!["id"]);
        assert!(table.find_column("email").is_some_and(|c| c.is_unique));
        assert!(table.find_column("missing").is_none());
    }

    #[test]
    fn test_path() {
        assert_eq!(user_table().path(), "user");
        assert_eq!(user_table().in_schema("dbo").path(), "dbo.user");
        assert_eq!(
            user_table().in_schema("dbo").in_database("app").path(),
            "app.dbo.user"
        );
    }

    #[test]
    fn test_requires_replace() {
        let old = TableColumn::new("age", "int");
        assert!(old.requires_replace(&TableColumn::new("age", "bigint")));
        assert!(old.requires_replace(&TableColumn::new("age", "int").length(10)));
        assert!(!old.requires_replace(&TableColumn::new("age", "int").nullable()));
        assert!(old.attributes_changed(&TableColumn::new("age", "int").nullable(), false));
    }

    #[test]
    fn test_attributes_default_is_optional() {
        let old = TableColumn::new("age", "int");
        let new = TableColumn::new("age", "int").default_value("0");
        assert!(!old.attributes_changed(&new, false));
        assert!(old.attributes_changed(&new, true));
    }

    #[test]
    fn test_deserialize_column() {
        let column: TableColumn = serde_json::from_str(
            r#"{"name": "status", "type": "varchar", "length": "20", "enum": ["a", "b"]}"#,
        )
        .unwrap();
        assert_eq!(column.column_type, "varchar");
        assert_eq!(column.length.as_deref(), Some("20"));
        assert_eq!(column.enum_values, Some(vec!["a".into(), "b".into()]));
        assert!(!column.is_nullable);
    }
}
