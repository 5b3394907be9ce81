//! Database dialect implementations.
//!
//! Each dialect is a stateless strategy object. It knows how to quote
//! identifiers, normalize column types, convert values, spell transaction
//! statements, and plan every structural change as a pair of forward and
//! inverse statement lists. Planning never touches a database.

mod alter;
mod common;
mod oracle;
mod sqlite;
mod sqlserver;

pub use oracle::OracleDialect;
pub use sqlite::SqliteDialect;
pub use sqlserver::SqlServerDialect;

use serde::{Deserialize, Serialize};

use crate::defend::DefendRules;
use crate::error::{DdlError, Result};
use crate::metadata::{self, MetadataKind, MetadataRow, MetadataTable};
use crate::naming::NamingStrategy;
use crate::query::{Query, SqlInMemory};
use crate::schema::{
    Table, TableCheck, TableColumn, TableExclusion, TableForeignKey, TableIndex, TableUnique,
    View,
};
use crate::types::{self, ColumnTypeDescriptor, ValueRules, ValueTransformer};
use crate::value::{ColumnValue, SqlValue};

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// SQLite (single-file embedded engine).
    Sqlite,
    /// Microsoft SQL Server.
    #[serde(alias = "mssql")]
    SqlServer,
    /// Oracle Database.
    Oracle,
}

impl DatabaseType {
    /// Returns the dialect strategy for this engine.
    #[must_use]
    pub fn dialect(self) -> &'static dyn SchemaDialect {
        static SQLITE: SqliteDialect = SqliteDialect::new();
        static SQLSERVER: SqlServerDialect = SqlServerDialect::new();
        static ORACLE: OracleDialect = OracleDialect::new();
        match self {
            Self::Sqlite => &SQLITE,
            Self::SqlServer => &SQLSERVER,
            Self::Oracle => &ORACLE,
        }
    }
}

impl std::str::FromStr for DatabaseType {
    type Err = DdlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            "oracle" => Ok(Self::Oracle),
            other => Err(DdlError::InvalidDefinition(format!(
                "unknown database type '{other}'"
            ))),
        }
    }
}

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationLevel {
    /// Dirty reads allowed.
    ReadUncommitted,
    /// Only committed data is read.
    ReadCommitted,
    /// Rows read stay stable.
    RepeatableRead,
    /// Full isolation.
    Serializable,
    /// Row versioning (SQL Server).
    Snapshot,
}

impl IsolationLevel {
    /// Returns the SQL spelling.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
            Self::Snapshot => "SNAPSHOT",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Collaborators a planner needs besides the table itself.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    /// Derives constraint and index names.
    pub naming: &'a dyn NamingStrategy,
    /// Location of the bookkeeping table.
    pub metadata: &'a MetadataTable,
}

impl<'a> BuildContext<'a> {
    /// Creates a context.
    #[must_use]
    pub fn new(naming: &'a dyn NamingStrategy, metadata: &'a MetadataTable) -> Self {
        Self { naming, metadata }
    }
}

/// Result of planning a table change: statements plus the resulting shape.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaChange {
    /// Forward and inverse statements.
    pub sql: SqlInMemory,
    /// Table snapshot after the forward statements ran.
    pub table: Table,
}

impl SchemaChange {
    /// Bundles statements and the new snapshot.
    #[must_use]
    pub const fn new(sql: SqlInMemory, table: Table) -> Self {
        Self { sql, table }
    }
}

/// A native type name with an optional length, used for internal tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedType {
    /// Native type name.
    pub name: &'static str,
    /// Length, if the type needs one.
    pub length: Option<&'static str>,
}

impl MappedType {
    const fn plain(name: &'static str) -> Self {
        Self { name, length: None }
    }

    const fn sized(name: &'static str, length: &'static str) -> Self {
        Self {
            name,
            length: Some(length),
        }
    }

    /// Builds a column of this type.
    #[must_use]
    pub fn column(self, name: &str) -> TableColumn {
        let column = TableColumn::new(name, self.name);
        match self.length {
            Some(length) => column.length(length),
            None => column,
        }
    }
}

/// Native types of the columns of the bookkeeping and cache tables.
#[derive(Debug, Clone, Copy)]
pub struct MappedTypes {
    /// `type` column of the bookkeeping table.
    pub metadata_type: MappedType,
    /// `database`, `schema`, `table` and `name` columns.
    pub metadata_name: MappedType,
    /// `value` column of the bookkeeping table.
    pub metadata_value: MappedType,
    /// Cache `id`.
    pub cache_id: MappedType,
    /// Cache `identifier`.
    pub cache_identifier: MappedType,
    /// Cache `time`.
    pub cache_time: MappedType,
    /// Cache `duration`.
    pub cache_duration: MappedType,
    /// Cache `query`.
    pub cache_query: MappedType,
    /// Cache `result`.
    pub cache_result: MappedType,
}

/// Database-specific SQL generation.
pub trait SchemaDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the engine this dialect belongs to.
    fn database_type(&self) -> DatabaseType;

    // ----- identifiers and parameters -----

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quotes and joins the present parts of a path.
    fn escape_path(&self, database: Option<&str>, schema: Option<&str>, name: &str) -> String {
        [database, schema, Some(name)]
            .into_iter()
            .flatten()
            .map(|part| self.quote_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Quoted path of a table.
    fn table_name(&self, table: &Table) -> String {
        self.escape_path(table.database.as_deref(), table.schema.as_deref(), &table.name)
    }

    /// Quoted path of a view.
    fn view_name(&self, view: &View) -> String {
        self.escape_path(view.database.as_deref(), view.schema.as_deref(), &view.name)
    }

    /// Longest identifier the engine accepts, if limited.
    fn max_identifier_length(&self) -> Option<usize> {
        None
    }

    /// Shortens an identifier to the engine limit.
    fn truncate_identifier(&self, name: &str) -> String {
        match self.max_identifier_length() {
            Some(max) if name.chars().count() > max => name.chars().take(max).collect(),
            _ => name.to_string(),
        }
    }

    /// Placeholder for the zero-based parameter `index`.
    fn placeholder(&self, index: usize) -> String {
        let _ = index;
        String::from("?")
    }

    /// Rewrite and suppression rules applied around execution.
    fn defend_rules(&self) -> &'static DefendRules;

    // ----- types and values -----

    /// Maps an abstract type descriptor to the native type name.
    fn normalize_type(&self, column: &ColumnTypeDescriptor) -> String;

    /// Types that take a length.
    fn with_length_column_types(&self) -> &'static [&'static str];

    /// Explicit length, or the engine default for the type.
    fn column_length(&self, column: &ColumnTypeDescriptor) -> Option<String>;

    /// Full type text including length, precision and scale.
    fn full_type(&self, column: &TableColumn) -> String {
        let descriptor = ColumnTypeDescriptor::from(column);
        types::compose_full_type(column, self.column_length(&descriptor).as_deref())
    }

    /// Knobs of the shared value conversion.
    fn value_rules(&self) -> ValueRules;

    /// Native types of internal tables.
    fn mapped_types(&self) -> MappedTypes;

    /// Converts an application value into its wire form.
    fn prepare_persistent_value(
        &self,
        value: ColumnValue,
        column: &ColumnTypeDescriptor,
        transformer: Option<&dyn ValueTransformer>,
    ) -> Result<SqlValue> {
        types::persist(value, column, &self.value_rules(), transformer)
    }

    /// Converts a wire value into its application form.
    fn prepare_hydrated_value(
        &self,
        value: SqlValue,
        column: &ColumnTypeDescriptor,
        transformer: Option<&dyn ValueTransformer>,
    ) -> Result<ColumnValue> {
        types::hydrate(value, column, &self.value_rules(), transformer)
    }

    // ----- transactions and sessions -----

    /// Isolation levels the engine accepts.
    fn supported_isolation_levels(&self) -> &'static [IsolationLevel];

    /// Statements opening a transaction.
    fn begin_transaction_sql(&self, isolation: Option<IsolationLevel>) -> Vec<String>;

    /// Statement creating a savepoint.
    fn savepoint_sql(&self, name: &str) -> String {
        format!("SAVEPOINT {name}")
    }

    /// Statement releasing a savepoint, if the engine has one.
    fn release_savepoint_sql(&self, name: &str) -> Option<String> {
        let _ = name;
        None
    }

    /// Statement rolling back to a savepoint.
    fn rollback_to_savepoint_sql(&self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {name}")
    }

    /// Statement committing the outermost transaction.
    fn commit_sql(&self) -> &'static str {
        "COMMIT"
    }

    /// Statement rolling back the outermost transaction.
    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK"
    }

    /// Statements run once on every freshly opened connection.
    fn session_init_sql(&self, use_utc: bool) -> Vec<String>;

    /// Statement switching foreign key enforcement for the session, on
    /// engines where it must be switched off outside a transaction to drop
    /// tables in any order.
    fn foreign_key_checks_sql(&self, enabled: bool) -> Option<String> {
        let _ = enabled;
        None
    }

    /// Query returning one row with a `foreign_keys` flag telling whether
    /// the session enforces foreign keys.
    fn foreign_keys_enabled_query(&self) -> Option<Query> {
        None
    }

    /// Query listing rows that violate a foreign key, one row per
    /// violation with the offending `table`.
    fn foreign_key_violations_query(&self) -> Option<Query> {
        None
    }

    // ----- catalog queries -----

    /// Returns one row with `database` and `schema` columns.
    fn current_database_query(&self) -> Query;

    /// Returns a row when the database exists.
    fn has_database_query(&self, database: &str) -> Result<Query>;

    /// Returns a row when the schema exists.
    fn has_schema_query(&self, schema: &str) -> Result<Query>;

    /// Returns a row when the table exists.
    fn has_table_query(&self, table: &Table) -> Query;

    /// Returns a row when the column exists.
    fn has_column_query(&self, table: &Table, column: &str) -> Query;

    /// Subquery returning the names of the views present in the catalog.
    fn catalog_views_subquery(&self) -> &'static str;

    /// Lists the recorded views that still exist, as bookkeeping rows.
    fn views_query(&self, location: &MetadataTable) -> Query {
        let q = |name: &str| self.quote_identifier(name);
        Query::with_parameters(
            format!(
                "SELECT {}, {}, {}, {}, {} FROM {} WHERE {} IN ({}, {}) AND {} IN ({})",
                q("database"),
                q("schema"),
                q("type"),
                q("name"),
                q("value"),
                location.escaped(self.as_dyn()),
                q("type"),
                self.placeholder(0),
                self.placeholder(1),
                q("name"),
                self.catalog_views_subquery()
            ),
            vec![
                SqlValue::Text(MetadataKind::View.as_str().to_string()),
                SqlValue::Text(MetadataKind::MaterializedView.as_str().to_string()),
            ],
        )
    }

    // ----- databases and schemas -----

    /// Plans `CREATE DATABASE`.
    fn create_database(&self, database: &str, if_not_exists: bool) -> Result<SqlInMemory>;

    /// Plans `DROP DATABASE`.
    fn drop_database(&self, database: &str, if_exists: bool) -> Result<SqlInMemory>;

    /// Plans `CREATE SCHEMA`.
    fn create_schema(&self, schema: &str, if_not_exists: bool) -> Result<SqlInMemory> {
        let _ = (schema, if_not_exists);
        Err(DdlError::unsupported(self.name(), "table schemas"))
    }

    /// Plans `DROP SCHEMA`.
    fn drop_schema(&self, schema: &str, if_exists: bool, cascade: bool) -> Result<SqlInMemory> {
        let _ = (schema, if_exists, cascade);
        Err(DdlError::unsupported(self.name(), "table schemas"))
    }

    // ----- tables -----

    /// Plans `CREATE TABLE` with its indices and bookkeeping rows.
    fn create_table(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        create_foreign_keys: bool,
        create_indices: bool,
    ) -> Result<SchemaChange>;

    /// Plans `DROP TABLE`; the inverse recreates the table as given.
    fn drop_table(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        drop_foreign_keys: bool,
        drop_indices: bool,
    ) -> Result<SqlInMemory>;

    /// Plans a table rename, renaming auto-named constraints along.
    fn rename_table(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        new_name: &str,
    ) -> Result<SchemaChange>;

    /// Statement emptying a table.
    fn clear_table(&self, table: &Table) -> Query {
        Query::new(format!("TRUNCATE TABLE {}", self.table_name(table)))
    }

    /// Statements dropping every given foreign key, view and table.
    fn clear_database(
        &self,
        ctx: &BuildContext<'_>,
        tables: &[Table],
        views: &[View],
    ) -> Result<Vec<Query>>;

    // ----- columns -----

    /// Plans adding columns.
    fn add_columns(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        columns: &[TableColumn],
    ) -> Result<SchemaChange>;

    /// Plans dropping columns by name.
    fn drop_columns(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        columns: &[String],
    ) -> Result<SchemaChange>;

    /// Plans changing columns; each pair is `(current name, new definition)`.
    fn change_columns(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        changes: &[(String, TableColumn)],
    ) -> Result<SchemaChange>;

    /// Plans a column rename.
    fn rename_column(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        old_name: &str,
        new_name: &str,
    ) -> Result<SchemaChange> {
        let mut renamed = common::require_column(table, old_name)?.clone();
        renamed.name = new_name.to_string();
        self.change_columns(ctx, table, &[(old_name.to_string(), renamed)])
    }

    // ----- keys and constraints -----

    /// Plans a primary key over `columns`.
    fn create_primary_key(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        columns: &[String],
        name: Option<&str>,
    ) -> Result<SchemaChange>;

    /// Plans replacing the primary key with the given columns.
    fn update_primary_keys(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        columns: &[String],
    ) -> Result<SchemaChange>;

    /// Plans dropping the primary key.
    fn drop_primary_key(&self, ctx: &BuildContext<'_>, table: &Table) -> Result<SchemaChange>;

    /// Plans unique constraints.
    fn create_unique_constraints(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        uniques: &[TableUnique],
    ) -> Result<SchemaChange>;

    /// Plans dropping unique constraints by name.
    fn drop_unique_constraints(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        names: &[String],
    ) -> Result<SchemaChange>;

    /// Plans check constraints.
    fn create_check_constraints(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        checks: &[TableCheck],
    ) -> Result<SchemaChange>;

    /// Plans dropping check constraints by name.
    fn drop_check_constraints(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        names: &[String],
    ) -> Result<SchemaChange>;

    /// Exclusion constraints are not available on any supported engine.
    fn create_exclusion_constraints(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        exclusions: &[TableExclusion],
    ) -> Result<SchemaChange> {
        let _ = (ctx, table, exclusions);
        Err(DdlError::unsupported(self.name(), "exclusion constraints"))
    }

    /// Plans foreign keys.
    fn create_foreign_keys(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        foreign_keys: &[TableForeignKey],
    ) -> Result<SchemaChange>;

    /// Plans dropping foreign keys by name.
    fn drop_foreign_keys(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        names: &[String],
    ) -> Result<SchemaChange>;

    /// Renders a foreign key as a table constraint clause.
    fn foreign_key_clause(&self, foreign_key: &TableForeignKey) -> Result<String> {
        common::foreign_key_clause(self.as_dyn(), foreign_key, true)
    }

    // ----- indices -----

    /// Statement creating an index; the index must be named.
    fn create_index_sql(&self, table: &Table, index: &TableIndex) -> Result<Query>;

    /// Statement dropping an index; the index must be named.
    fn drop_index_sql(&self, table: &Table, index: &TableIndex) -> Query;

    /// Plans indices.
    fn create_indices(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        indices: &[TableIndex],
    ) -> Result<SchemaChange> {
        let mut next = table.clone();
        let mut sql = SqlInMemory::new();
        for index in indices {
            let index = common::named_index(ctx, table, index);
            sql.push(
                self.create_index_sql(table, &index)?,
                self.drop_index_sql(table, &index),
            );
            next.indices.push(index);
        }
        Ok(SchemaChange::new(sql, next))
    }

    /// Plans dropping indices by name.
    fn drop_indices(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        names: &[String],
    ) -> Result<SchemaChange> {
        let _ = ctx;
        let mut next = table.clone();
        let mut sql = SqlInMemory::new();
        for name in names {
            let index = common::take_index(&mut next, name)?;
            sql.push(
                self.drop_index_sql(table, &index),
                self.create_index_sql(table, &index)?,
            );
        }
        Ok(SchemaChange::new(sql, next))
    }

    // ----- views -----

    /// Statement creating a view.
    fn create_view_sql(&self, view: &View) -> Result<Query> {
        if view.materialized {
            return Err(DdlError::unsupported(self.name(), "materialized views"));
        }
        Ok(Query::new(format!(
            "CREATE VIEW {} AS {}",
            self.view_name(view),
            view.expression
        )))
    }

    /// Statement dropping a view.
    fn drop_view_sql(&self, view: &View) -> Result<Query> {
        if view.materialized {
            return Err(DdlError::unsupported(self.name(), "materialized views"));
        }
        Ok(Query::new(format!("DROP VIEW {}", self.view_name(view))))
    }

    /// Plans a view together with its bookkeeping row.
    fn create_view(&self, ctx: &BuildContext<'_>, view: &View) -> Result<SqlInMemory> {
        let row = view_row(view);
        let mut sql = SqlInMemory::new();
        sql.push(self.create_view_sql(view)?, self.drop_view_sql(view)?);
        sql.push(
            metadata::insert_row(self.as_dyn(), ctx.metadata, &row),
            metadata::delete_row(self.as_dyn(), ctx.metadata, &row),
        );
        Ok(sql)
    }

    /// Plans dropping a view, removing its bookkeeping row first.
    fn drop_view(&self, ctx: &BuildContext<'_>, view: &View) -> Result<SqlInMemory> {
        let row = view_row(view);
        let mut sql = SqlInMemory::new();
        sql.push(
            metadata::delete_row(self.as_dyn(), ctx.metadata, &row),
            metadata::insert_row(self.as_dyn(), ctx.metadata, &row),
        );
        sql.push(self.drop_view_sql(view)?, self.create_view_sql(view)?);
        Ok(sql)
    }

    /// Upcast helper for shared planning code.
    fn as_dyn(&self) -> &dyn SchemaDialect;
}

fn view_row(view: &View) -> MetadataRow {
    MetadataRow {
        database: view.database.clone(),
        schema: view.schema.clone(),
        table: None,
        kind: if view.materialized {
            MetadataKind::MaterializedView
        } else {
            MetadataKind::View
        },
        name: view.name.clone(),
        value: Some(view.expression.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_lookup() {
        assert_eq!(DatabaseType::Sqlite.dialect().name(), "SQLite");
        assert_eq!(DatabaseType::SqlServer.dialect().name(), "SQL Server");
        assert_eq!(DatabaseType::Oracle.dialect().name(), "Oracle");
        assert_eq!(
            "mssql".parse::<DatabaseType>().unwrap(),
            DatabaseType::SqlServer
        );
        assert!("mysql".parse::<DatabaseType>().is_err());
    }

    #[test]
    fn test_truncate_identifier() {
        let oracle = DatabaseType::Oracle.dialect();
        let long = "a".repeat(40);
        assert_eq!(oracle.truncate_identifier(&long).len(), 30);
        let sqlite = DatabaseType::Sqlite.dialect();
        assert_eq!(sqlite.truncate_identifier(&long).len(), 40);
    }

    #[test]
    fn test_isolation_display() {
        assert_eq!(IsolationLevel::RepeatableRead.to_string(), "REPEATABLE READ");
    }
}
