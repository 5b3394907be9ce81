//! The bookkeeping table.
//!
//! Catalogs do not return view definitions or computed-column expressions
//! verbatim, so both are recorded in a private table with the columns
//! `database, schema, table, type, name, value`.

use serde::{Deserialize, Serialize};

use crate::dialect::SchemaDialect;
use crate::query::Query;
use crate::schema::Table;
use crate::value::SqlValue;

/// Default name of the bookkeeping table.
pub const DEFAULT_METADATA_TABLE: &str = "oxide_metadata";

/// What a bookkeeping row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataKind {
    /// A plain view.
    View,
    /// A materialized view.
    MaterializedView,
    /// A computed column.
    GeneratedColumn,
}

impl MetadataKind {
    /// Value stored in the `type` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "VIEW",
            Self::MaterializedView => "MATERIALIZED_VIEW",
            Self::GeneratedColumn => "GENERATED_COLUMN",
        }
    }

    /// Parses the `type` column.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "VIEW" => Some(Self::View),
            "MATERIALIZED_VIEW" => Some(Self::MaterializedView),
            "GENERATED_COLUMN" => Some(Self::GeneratedColumn),
            _ => None,
        }
    }
}

/// One bookkeeping row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    /// Database of the described object.
    pub database: Option<String>,
    /// Schema of the described object.
    pub schema: Option<String>,
    /// Owning table (computed columns only).
    pub table: Option<String>,
    /// Row kind.
    #[serde(rename = "type")]
    pub kind: MetadataKind,
    /// View or column name.
    pub name: String,
    /// View expression or column expression.
    pub value: Option<String>,
}

/// Location of the bookkeeping table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataTable {
    /// Database holding the table.
    #[serde(default)]
    pub database: Option<String>,
    /// Schema holding the table.
    #[serde(default)]
    pub schema: Option<String>,
    /// Table name.
    pub name: String,
}

impl Default for MetadataTable {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_TABLE)
    }
}

impl MetadataTable {
    /// Creates a location in the default database and schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            database: None,
            schema: None,
            name: name.into(),
        }
    }

    /// Quoted path in the given dialect.
    #[must_use]
    pub fn escaped(&self, dialect: &dyn SchemaDialect) -> String {
        dialect.escape_path(self.database.as_deref(), self.schema.as_deref(), &self.name)
    }
}

/// Table definition of the bookkeeping table in the given dialect.
#[must_use]
pub fn definition(dialect: &dyn SchemaDialect, location: &MetadataTable) -> Table {
    let types = dialect.mapped_types();
    let mut table = Table::new(&location.name)
        .column(types.metadata_type.column("type"))
        .column(types.metadata_name.column("database").nullable())
        .column(types.metadata_name.column("schema").nullable())
        .column(types.metadata_name.column("table").nullable())
        .column(types.metadata_name.column("name").nullable())
        .column(types.metadata_value.column("value").nullable());
    table.database.clone_from(&location.database);
    table.schema.clone_from(&location.schema);
    table
}

fn optional_text(value: Option<&String>) -> SqlValue {
    value.map_or(SqlValue::Null, |s| SqlValue::Text(s.clone()))
}

/// `INSERT` of one row.
#[must_use]
pub fn insert_row(dialect: &dyn SchemaDialect, location: &MetadataTable, row: &MetadataRow) -> Query {
    let columns = ["database", "schema", "table", "type", "name", "value"]
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (0..6)
        .map(|i| dialect.placeholder(i))
        .collect::<Vec<_>>()
        .join(", ");
    Query::with_parameters(
        format!(
            "INSERT INTO {}({columns}) VALUES ({placeholders})",
            location.escaped(dialect)
        ),
        vec![
            optional_text(row.database.as_ref()),
            optional_text(row.schema.as_ref()),
            optional_text(row.table.as_ref()),
            SqlValue::Text(row.kind.as_str().to_string()),
            SqlValue::Text(row.name.clone()),
            optional_text(row.value.as_ref()),
        ],
    )
}

/// `DELETE` of the rows matching kind, name and whichever of database,
/// schema and table are set on `row`.
#[must_use]
pub fn delete_row(dialect: &dyn SchemaDialect, location: &MetadataTable, row: &MetadataRow) -> Query {
    let mut conditions = Vec::new();
    let mut parameters = Vec::new();
    let mut condition = |column: &str, value: &str| {
        conditions.push(format!(
            "{} = {}",
            dialect.quote_identifier(column),
            dialect.placeholder(parameters.len())
        ));
        parameters.push(SqlValue::Text(value.to_string()));
    };
    condition("type", row.kind.as_str());
    condition("name", &row.name);
    if let Some(database) = &row.database {
        condition("database", database);
    }
    if let Some(schema) = &row.schema {
        condition("schema", schema);
    }
    if let Some(table) = &row.table {
        condition("table", table);
    }
    Query::with_parameters(
        format!(
            "DELETE FROM {} WHERE {}",
            location.escaped(dialect),
            conditions.join(" AND ")
        ),
        parameters,
    )
}

/// `SELECT` of the computed-column rows recorded for a table.
#[must_use]
pub fn select_generated_columns(
    dialect: &dyn SchemaDialect,
    location: &MetadataTable,
    table: &Table,
) -> Query {
    Query::with_parameters(
        format!(
            "SELECT {}, {} FROM {} WHERE {} = {} AND {} = {}",
            dialect.quote_identifier("name"),
            dialect.quote_identifier("value"),
            location.escaped(dialect),
            dialect.quote_identifier("type"),
            dialect.placeholder(0),
            dialect.quote_identifier("table"),
            dialect.placeholder(1),
        ),
        vec![
            SqlValue::Text(MetadataKind::GeneratedColumn.as_str().to_string()),
            SqlValue::Text(table.name.clone()),
        ],
    )
}

/// Bookkeeping row of a computed column.
#[must_use]
pub fn generated_column_row(table: &Table, column: &str, expression: Option<&str>) -> MetadataRow {
    MetadataRow {
        database: table.database.clone(),
        schema: table.schema.clone(),
        table: Some(table.name.clone()),
        kind: MetadataKind::GeneratedColumn,
        name: column.to_string(),
        value: expression.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DatabaseType;

    fn row() -> MetadataRow {
        MetadataRow {
            database: None,
            schema: Some("dbo".into()),
            table: None,
            kind: MetadataKind::View,
            name: "active_users".into(),
            value: Some("SELECT 1".into()),
        }
    }

    #[test]
    fn test_insert_uses_dialect_placeholders() {
        let location = MetadataTable::default();
        let sqlite = insert_row(DatabaseType::Sqlite.dialect(), &location, &row());
        assert_eq!(
            sqlite.text,
            r#"INSERT INTO "oxide_metadata"("database", "schema", "table", "type", "name", "value") VALUES (?, ?, ?, ?, ?, ?)"#
        );
        assert_eq!(sqlite.parameters.len(), 6);
        assert_eq!(sqlite.parameters[3], SqlValue::Text("VIEW".into()));

        let oracle = insert_row(DatabaseType::Oracle.dialect(), &location, &row());
        assert!(oracle.text.ends_with("VALUES (:1, :2, :3, :4, :5, :6)"));
    }

    #[test]
    fn test_delete_filters_on_present_parts() {
        let location = MetadataTable::default();
        let query = delete_row(DatabaseType::SqlServer.dialect(), &location, &row());
        assert_eq!(
            query.text,
            "DELETE FROM [oxide_metadata] WHERE [type] = @0 AND [name] = @1 AND [schema] = @2"
        );
        assert_eq!(query.parameters.len(), 3);
    }

    #[test]
    fn test_definition_columns() {
        let table = definition(DatabaseType::Sqlite.dialect(), &MetadataTable::new("meta"));
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["type", "database", "schema", "table", "name", "value"]);
        assert!(!table.columns[0].is_nullable);
        assert!(table.columns[5].is_nullable);
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            MetadataKind::View,
            MetadataKind::MaterializedView,
            MetadataKind::GeneratedColumn,
        ] {
            assert_eq!(MetadataKind::parse(kind.as_str()), Some(kind));
        }
    }
}
