//! Microsoft SQL Server dialect.

use crate::defend::{DefendRules, PlaceholderStyle, Rewrite, Suppression};
use crate::error::{DdlError, Result};
use crate::query::{Query, SqlInMemory};
use crate::schema::{
    GeneratedType, GenerationStrategy, Table, TableCheck, TableColumn, TableForeignKey,
    TableIndex, TableUnique, View,
};
use crate::types::{ColumnKind, ColumnTypeDescriptor, HostType, ValueRules};
use crate::value::SqlValue;

use super::alter::{self, ColumnConstraint, ColumnSql, InPlaceAlter};
use super::common::{self, ConstraintKind, ConstraintRename};
use super::{
    BuildContext, DatabaseType, IsolationLevel, MappedType, MappedTypes, SchemaChange,
    SchemaDialect,
};

static DEFEND_RULES: DefendRules = DefendRules {
    placeholders: PlaceholderStyle::AtIndexed,
    rewrites: &[Rewrite::ExpandListParameters, Rewrite::BooleanLiterals],
    suppressions: &[Suppression {
        code: "1913",
        statements: &["CREATE INDEX", "CREATE UNIQUE INDEX"],
        reason: "an index with this name already exists",
    }],
};

const WITH_LENGTH: &[&str] = &["char", "varchar", "nchar", "nvarchar", "binary", "varbinary"];

/// SQL Server dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl SqlServerDialect {
    /// Creates the dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn default_length(type_name: &str) -> Option<&'static str> {
        match type_name {
            "char" | "nchar" | "binary" | "varbinary" => Some("1"),
            "varchar" | "nvarchar" => Some("255"),
            _ => None,
        }
    }

    /// `'schema.name'` argument of `sp_rename`.
    fn object_argument(table: &Table, name: &str) -> String {
        let path = match &table.schema {
            Some(schema) => format!("{schema}.{name}"),
            None => name.to_string(),
        };
        common::string_literal(&path)
    }

    fn schema_condition(
        &self,
        schema: Option<&String>,
        column: &str,
        index: usize,
    ) -> (String, Option<SqlValue>) {
        match schema {
            Some(schema) => (
                format!("{column} = {}", self.placeholder(index)),
                Some(SqlValue::Text(schema.clone())),
            ),
            None => (format!("{column} = SCHEMA_NAME()"), None),
        }
    }

    fn information_schema(&self, database: Option<&String>, view: &str) -> String {
        match database {
            Some(database) => format!(
                "{}.INFORMATION_SCHEMA.{view}",
                self.quote_identifier(database)
            ),
            None => format!("INFORMATION_SCHEMA.{view}"),
        }
    }
}

impl InPlaceAlter for SqlServerDialect {
    fn column_definition(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        column: &TableColumn,
        parts: ColumnSql,
    ) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.full_type(column)
        );
        if parts.enum_check {
            if let Some(expression) = common::enum_expression(self, column) {
                let name = ctx
                    .naming
                    .check_constraint_name(&table.name, &expression, true);
                sql.push_str(&format!(
                    " CONSTRAINT {} CHECK({expression})",
                    self.quote_identifier(&name)
                ));
            }
        }
        if let Some(collation) = &column.collation {
            sql.push_str(" COLLATE ");
            sql.push_str(collation);
        }
        match (&column.as_expression, column.generated_type) {
            (Some(expression), kind) => {
                sql.push_str(&format!(" AS ({expression})"));
                if kind == Some(GeneratedType::Stored) {
                    sql.push_str(" PERSISTED");
                    if !column.is_nullable {
                        sql.push_str(" NOT NULL");
                    }
                }
            }
            (None, _) => {
                if !column.is_nullable {
                    sql.push_str(" NOT NULL");
                }
            }
        }
        if parts.identity && column.is_increment() {
            sql.push_str(" IDENTITY(1,1)");
        }
        if parts.default {
            let name = ctx.naming.default_constraint_name(&table.name, &column.name);
            if let Some(default) = &column.default {
                sql.push_str(&format!(
                    " CONSTRAINT {} DEFAULT {default}",
                    self.quote_identifier(&name)
                ));
            } else if column.is_generated
                && column.generation_strategy == Some(GenerationStrategy::Uuid)
            {
                sql.push_str(&format!(
                    " CONSTRAINT {} DEFAULT NEWSEQUENTIALID()",
                    self.quote_identifier(&name)
                ));
            }
        }
        sql
    }

    fn column_constraints(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        column: &TableColumn,
    ) -> Vec<ColumnConstraint> {
        let mut constraints = Vec::new();
        if let Some(expression) = common::enum_expression(self, column) {
            let name = ctx
                .naming
                .check_constraint_name(&table.name, &expression, true);
            constraints.push(ColumnConstraint {
                clause: format!(
                    "CONSTRAINT {} CHECK ({expression})",
                    self.quote_identifier(&name)
                ),
                name,
            });
        }
        let default = column.default.clone().or_else(|| {
            (column.is_generated && column.generation_strategy == Some(GenerationStrategy::Uuid))
                .then(|| String::from("NEWSEQUENTIALID()"))
        });
        if let Some(default) = default {
            let name = ctx.naming.default_constraint_name(&table.name, &column.name);
            constraints.push(ColumnConstraint {
                clause: format!(
                    "CONSTRAINT {} DEFAULT {default} FOR {}",
                    self.quote_identifier(&name),
                    self.quote_identifier(&column.name)
                ),
                name,
            });
        }
        constraints
    }

    fn rename_table_sql(&self, table: &Table, new_name: &str) -> Query {
        Query::new(format!(
            "EXEC sp_rename {}, {}",
            common::string_literal(&table.path()),
            common::string_literal(new_name)
        ))
    }

    fn rename_column_sql(&self, table: &Table, old: &str, new: &str) -> Query {
        let path = format!("{}.{old}", table.path());
        Query::new(format!(
            "EXEC sp_rename {}, {}, 'COLUMN'",
            common::string_literal(&path),
            common::string_literal(new)
        ))
    }

    fn rename_object_sql(&self, table: &Table, rename: &ConstraintRename) -> Query {
        match rename.kind {
            ConstraintKind::Index => {
                let path = format!("{}.{}", table.path(), rename.old);
                Query::new(format!(
                    "EXEC sp_rename {}, {}, 'INDEX'",
                    common::string_literal(&path),
                    common::string_literal(&rename.new)
                ))
            }
            _ => Query::new(format!(
                "EXEC sp_rename {}, {}, 'OBJECT'",
                Self::object_argument(table, &rename.old),
                common::string_literal(&rename.new)
            )),
        }
    }

    fn modify_column_sql(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        old: &TableColumn,
        new: &TableColumn,
    ) -> Query {
        let _ = old;
        Query::new(format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.table_name(table),
            self.column_definition(ctx, table, new, ColumnSql::ALTER)
        ))
    }

    fn modify_covers_default(&self) -> bool {
        false
    }
}

impl SchemaDialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "SQL Server"
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::SqlServer
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn max_identifier_length(&self) -> Option<usize> {
        Some(128)
    }

    fn placeholder(&self, index: usize) -> String {
        PlaceholderStyle::AtIndexed.render(index)
    }

    fn defend_rules(&self) -> &'static DefendRules {
        &DEFEND_RULES
    }

    fn normalize_type(&self, column: &ColumnTypeDescriptor) -> String {
        match &column.kind {
            ColumnKind::Host(HostType::Number) => "int".into(),
            ColumnKind::Host(HostType::String) => "nvarchar".into(),
            ColumnKind::Host(HostType::Date) => "datetime".into(),
            ColumnKind::Host(HostType::Boolean) => "bit".into(),
            ColumnKind::Host(HostType::Buffer) => "binary".into(),
            ColumnKind::Named(_) => {
                let name = column.name().unwrap_or_default();
                match name.as_str() {
                    "integer" => "int".into(),
                    "uuid" => "uniqueidentifier".into(),
                    "simple-array" | "simple-json" => "ntext".into(),
                    "simple-enum" => "nvarchar".into(),
                    "dec" => "decimal".into(),
                    "double precision" => "float".into(),
                    "rowversion" => "timestamp".into(),
                    _ => name,
                }
            }
        }
    }

    fn with_length_column_types(&self) -> &'static [&'static str] {
        WITH_LENGTH
    }

    fn column_length(&self, column: &ColumnTypeDescriptor) -> Option<String> {
        if column.length.is_some() {
            return column.length.clone();
        }
        let name = self.normalize_type(column);
        Self::default_length(&name).map(str::to_string)
    }

    fn value_rules(&self) -> ValueRules {
        ValueRules {
            boolean_as_integer: true,
            datetime_types: &["datetime", "datetime2", "smalldatetime", "datetimeoffset"],
            date_types: &["date"],
            time_types: &["time"],
            json_types: &[],
        }
    }

    fn mapped_types(&self) -> MappedTypes {
        MappedTypes {
            metadata_type: MappedType::sized("varchar", "255"),
            metadata_name: MappedType::sized("varchar", "255"),
            metadata_value: MappedType::plain("ntext"),
            cache_id: MappedType::plain("int"),
            cache_identifier: MappedType::sized("nvarchar", "255"),
            cache_time: MappedType::plain("bigint"),
            cache_duration: MappedType::plain("int"),
            cache_query: MappedType::sized("nvarchar", "MAX"),
            cache_result: MappedType::sized("nvarchar", "MAX"),
        }
    }

    fn supported_isolation_levels(&self) -> &'static [IsolationLevel] {
        &[
            IsolationLevel::ReadUncommitted,
            IsolationLevel::ReadCommitted,
            IsolationLevel::RepeatableRead,
            IsolationLevel::Serializable,
            IsolationLevel::Snapshot,
        ]
    }

    fn begin_transaction_sql(&self, isolation: Option<IsolationLevel>) -> Vec<String> {
        let mut statements = Vec::new();
        if let Some(level) = isolation {
            statements.push(format!("SET TRANSACTION ISOLATION LEVEL {level}"));
        }
        statements.push(String::from("BEGIN TRANSACTION"));
        statements
    }

    fn savepoint_sql(&self, name: &str) -> String {
        format!("SAVE TRANSACTION {name}")
    }

    fn rollback_to_savepoint_sql(&self, name: &str) -> String {
        format!("ROLLBACK TRANSACTION {name}")
    }

    fn session_init_sql(&self, use_utc: bool) -> Vec<String> {
        let _ = use_utc;
        vec![String::from("SET DATEFORMAT ymd")]
    }

    fn current_database_query(&self) -> Query {
        Query::new("SELECT DB_NAME() AS [database], SCHEMA_NAME() AS [schema]")
    }

    fn has_database_query(&self, database: &str) -> Result<Query> {
        Ok(Query::with_parameters(
            "SELECT 1 AS [exists] FROM sys.databases WHERE [name] = @0",
            vec![SqlValue::Text(database.to_string())],
        ))
    }

    fn has_schema_query(&self, schema: &str) -> Result<Query> {
        Ok(Query::with_parameters(
            "SELECT 1 AS [exists] FROM sys.schemas WHERE [name] = @0",
            vec![SqlValue::Text(schema.to_string())],
        ))
    }

    fn has_table_query(&self, table: &Table) -> Query {
        let mut parameters = vec![SqlValue::Text(table.name.clone())];
        let (schema, value) = self.schema_condition(table.schema.as_ref(), "TABLE_SCHEMA", 1);
        parameters.extend(value);
        Query::with_parameters(
            format!(
                "SELECT 1 AS [exists] FROM {} WHERE TABLE_NAME = @0 AND {schema}",
                self.information_schema(table.database.as_ref(), "TABLES")
            ),
            parameters,
        )
    }

    fn has_column_query(&self, table: &Table, column: &str) -> Query {
        let mut parameters = vec![
            SqlValue::Text(table.name.clone()),
            SqlValue::Text(column.to_string()),
        ];
        let (schema, value) = self.schema_condition(table.schema.as_ref(), "TABLE_SCHEMA", 2);
        parameters.extend(value);
        Query::with_parameters(
            format!(
                "SELECT 1 AS [exists] FROM {} WHERE TABLE_NAME = @0 AND COLUMN_NAME = @1 AND {schema}",
                self.information_schema(table.database.as_ref(), "COLUMNS")
            ),
            parameters,
        )
    }

    fn catalog_views_subquery(&self) -> &'static str {
        "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.VIEWS"
    }

    fn create_database(&self, database: &str, if_not_exists: bool) -> Result<SqlInMemory> {
        let name = self.quote_identifier(database);
        let up = if if_not_exists {
            format!(
                "IF DB_ID({}) IS NULL CREATE DATABASE {name}",
                common::string_literal(database)
            )
        } else {
            format!("CREATE DATABASE {name}")
        };
        let mut sql = SqlInMemory::new();
        sql.push(up, format!("DROP DATABASE {name}"));
        Ok(sql)
    }

    fn drop_database(&self, database: &str, if_exists: bool) -> Result<SqlInMemory> {
        let name = self.quote_identifier(database);
        let up = if if_exists {
            format!(
                "IF DB_ID({}) IS NOT NULL DROP DATABASE {name}",
                common::string_literal(database)
            )
        } else {
            format!("DROP DATABASE {name}")
        };
        let mut sql = SqlInMemory::new();
        sql.push(up, format!("CREATE DATABASE {name}"));
        Ok(sql)
    }

    fn create_schema(&self, schema: &str, if_not_exists: bool) -> Result<SqlInMemory> {
        let name = self.quote_identifier(schema);
        let up = if if_not_exists {
            format!(
                "IF SCHEMA_ID(N{}) IS NULL BEGIN EXEC ({}) END",
                common::string_literal(schema),
                common::string_literal(&format!("CREATE SCHEMA {name}"))
            )
        } else {
            format!("CREATE SCHEMA {name}")
        };
        let mut sql = SqlInMemory::new();
        sql.push(up, format!("DROP SCHEMA {name}"));
        Ok(sql)
    }

    fn drop_schema(&self, schema: &str, if_exists: bool, cascade: bool) -> Result<SqlInMemory> {
        if cascade {
            return Err(DdlError::unsupported(self.name(), "DROP SCHEMA ... CASCADE"));
        }
        let name = self.quote_identifier(schema);
        let up = if if_exists {
            format!(
                "IF SCHEMA_ID(N{}) IS NOT NULL BEGIN EXEC ({}) END",
                common::string_literal(schema),
                common::string_literal(&format!("DROP SCHEMA {name}"))
            )
        } else {
            format!("DROP SCHEMA {name}")
        };
        let mut sql = SqlInMemory::new();
        sql.push(up, format!("CREATE SCHEMA {name}"));
        Ok(sql)
    }

    fn create_table(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        create_foreign_keys: bool,
        create_indices: bool,
    ) -> Result<SchemaChange> {
        alter::create_table(self, ctx, table, create_foreign_keys, create_indices)
    }

    fn drop_table(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        drop_foreign_keys: bool,
        drop_indices: bool,
    ) -> Result<SqlInMemory> {
        alter::drop_table(self, ctx, table, drop_foreign_keys, drop_indices)
    }

    fn rename_table(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        new_name: &str,
    ) -> Result<SchemaChange> {
        alter::rename_table(self, ctx, table, new_name)
    }

    fn clear_database(
        &self,
        ctx: &BuildContext<'_>,
        tables: &[Table],
        views: &[View],
    ) -> Result<Vec<Query>> {
        let _ = ctx;
        let mut queries = alter::drop_all_foreign_keys(self, tables);
        for view in views {
            queries.push(self.drop_view_sql(view)?);
        }
        for table in tables {
            queries.push(Query::new(format!("DROP TABLE {}", self.table_name(table))));
        }
        Ok(queries)
    }

    fn add_columns(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        columns: &[TableColumn],
    ) -> Result<SchemaChange> {
        alter::add_columns(self, ctx, table, columns)
    }

    fn drop_columns(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        columns: &[String],
    ) -> Result<SchemaChange> {
        alter::drop_columns(self, ctx, table, columns)
    }

    fn change_columns(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        changes: &[(String, TableColumn)],
    ) -> Result<SchemaChange> {
        alter::change_columns(self, ctx, table, changes)
    }

    fn create_primary_key(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        columns: &[String],
        name: Option<&str>,
    ) -> Result<SchemaChange> {
        alter::create_primary_key(self, ctx, table, columns, name)
    }

    fn update_primary_keys(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        columns: &[String],
    ) -> Result<SchemaChange> {
        alter::update_primary_keys(self, ctx, table, columns)
    }

    fn drop_primary_key(&self, ctx: &BuildContext<'_>, table: &Table) -> Result<SchemaChange> {
        alter::drop_primary_key(self, ctx, table)
    }

    fn create_unique_constraints(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        uniques: &[TableUnique],
    ) -> Result<SchemaChange> {
        alter::create_unique_constraints(self, ctx, table, uniques)
    }

    fn drop_unique_constraints(
        &self,
        _ctx: &BuildContext<'_>,
        table: &Table,
        names: &[String],
    ) -> Result<SchemaChange> {
        alter::drop_unique_constraints(self, table, names)
    }

    fn create_check_constraints(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        checks: &[TableCheck],
    ) -> Result<SchemaChange> {
        alter::create_check_constraints(self, ctx, table, checks)
    }

    fn drop_check_constraints(
        &self,
        _ctx: &BuildContext<'_>,
        table: &Table,
        names: &[String],
    ) -> Result<SchemaChange> {
        alter::drop_check_constraints(self, table, names)
    }

    fn create_foreign_keys(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        foreign_keys: &[TableForeignKey],
    ) -> Result<SchemaChange> {
        alter::create_foreign_keys(self, ctx, table, foreign_keys)
    }

    fn drop_foreign_keys(
        &self,
        _ctx: &BuildContext<'_>,
        table: &Table,
        names: &[String],
    ) -> Result<SchemaChange> {
        alter::drop_foreign_keys(self, table, names)
    }

    fn create_index_sql(&self, table: &Table, index: &TableIndex) -> Result<Query> {
        let name = index.name.as_deref().unwrap_or_default();
        let mut sql = format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.is_unique { "UNIQUE " } else { "" },
            self.quote_identifier(name),
            self.table_name(table),
            common::quoted_columns(self, &index.column_names)
        );
        if let Some(predicate) = &index.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }
        Ok(Query::new(sql))
    }

    fn drop_index_sql(&self, table: &Table, index: &TableIndex) -> Query {
        Query::new(format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(index.name.as_deref().unwrap_or_default()),
            self.table_name(table)
        ))
    }

    fn as_dyn(&self) -> &dyn SchemaDialect {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataTable;
    use crate::naming::{DefaultNamingStrategy, NamingStrategy};

    const DIALECT: SqlServerDialect = SqlServerDialect::new();
    const NAMING: DefaultNamingStrategy = DefaultNamingStrategy::new();

    fn texts(queries: &[Query]) -> Vec<&str> {
        queries.iter().map(|q| q.text.as_str()).collect()
    }

    fn post() -> Table {
        Table::new("post")
            .in_schema("dbo")
            .column(
                TableColumn::new("id", "int")
                    .primary()
                    .generated(GenerationStrategy::Increment),
            )
            .column(TableColumn::new("title", "nvarchar").length(100))
            .column(TableColumn::new("views", "int").default_value("0"))
    }

    #[test]
    fn test_quoting_and_placeholders() {
        assert_eq!(DIALECT.quote_identifier("a]b"), "[a]]b]");
        assert_eq!(DIALECT.escape_path(Some("app"), Some("dbo"), "t"), "[app].[dbo].[t]");
        assert_eq!(DIALECT.placeholder(3), "@3");
    }

    #[test]
    fn test_normalize_type() {
        let d = |kind| DIALECT.normalize_type(&ColumnTypeDescriptor::host(kind));
        assert_eq!(d(HostType::Number), "int");
        assert_eq!(d(HostType::String), "nvarchar");
        assert_eq!(d(HostType::Boolean), "bit");
        let named = |n: &str| DIALECT.normalize_type(&ColumnTypeDescriptor::named(n));
        assert_eq!(named("uuid"), "uniqueidentifier");
        assert_eq!(named("simple-json"), "ntext");
        assert_eq!(named("double precision"), "float");
        assert_eq!(named("rowversion"), "timestamp");
        assert_eq!(named("money"), "money");
    }

    #[test]
    fn test_default_lengths() {
        let length = |n: &str| DIALECT.column_length(&ColumnTypeDescriptor::named(n));
        assert_eq!(length("nvarchar").as_deref(), Some("255"));
        assert_eq!(length("char").as_deref(), Some("1"));
        assert_eq!(length("int"), None);
        assert_eq!(
            DIALECT
                .column_length(&ColumnTypeDescriptor::named("varchar").length(20))
                .as_deref(),
            Some("20")
        );
    }

    #[test]
    fn test_create_table() {
        let meta = MetadataTable::default();
        let ctx = BuildContext::new(&NAMING, &meta);
        let change = DIALECT.create_table(&ctx, &post(), true, true).unwrap();
        let pk = NAMING.primary_key_name("post", &["id".to_string()]);
        let df = NAMING.default_constraint_name("post", "views");
        assert_eq!(
            change.sql.up[0].text,
            format!(
                "CREATE TABLE [dbo].[post] ([id] int NOT NULL IDENTITY(1,1), [title] nvarchar(100) NOT NULL, \
                 [views] int NOT NULL CONSTRAINT [{df}] DEFAULT 0, CONSTRAINT [{pk}] PRIMARY KEY ([id]))"
            )
        );
        assert_eq!(texts(&change.sql.down), ["DROP TABLE [dbo].[post]"]);
        assert!(change.table.just_created);
    }

    #[test]
    fn test_transaction_statements() {
        assert_eq!(
            DIALECT.begin_transaction_sql(Some(IsolationLevel::Snapshot)),
            ["SET TRANSACTION ISOLATION LEVEL SNAPSHOT", "BEGIN TRANSACTION"]
        );
        assert_eq!(DIALECT.savepoint_sql("typeorm_1"), "SAVE TRANSACTION typeorm_1");
        assert_eq!(DIALECT.release_savepoint_sql("typeorm_1"), None);
        assert_eq!(
            DIALECT.rollback_to_savepoint_sql("typeorm_1"),
            "ROLLBACK TRANSACTION typeorm_1"
        );
    }

    #[test]
    fn test_change_type_drops_and_adds() {
        let meta = MetadataTable::default();
        let ctx = BuildContext::new(&NAMING, &meta);
        let table = DIALECT.create_table(&ctx, &post(), true, true).unwrap().table;
        let change = DIALECT
            .change_columns(
                &ctx,
                &table,
                &[("views".into(), TableColumn::new("views", "bigint").default_value("0"))],
            )
            .unwrap();
        let df = NAMING.default_constraint_name("post", "views");
        assert_eq!(
            texts(&change.sql.up),
            [
                format!("ALTER TABLE [dbo].[post] DROP CONSTRAINT [{df}]").as_str(),
                "ALTER TABLE [dbo].[post] DROP COLUMN [views]",
                format!("ALTER TABLE [dbo].[post] ADD [views] bigint NOT NULL CONSTRAINT [{df}] DEFAULT 0")
                    .as_str(),
            ]
        );
        assert_eq!(
            change.table.find_column("views").map(|c| c.column_type.as_str()),
            Some("bigint")
        );
    }

    #[test]
    fn test_rename_column_renames_default_and_index() {
        let meta = MetadataTable::default();
        let ctx = BuildContext::new(&NAMING, &meta);
        let table = DIALECT
            .create_table(&ctx, &post().index(TableIndex::new(["views"])), true, true)
            .unwrap()
            .table;
        let change = DIALECT.rename_column(&ctx, &table, "views", "hits").unwrap();
        let up = texts(&change.sql.up);
        assert!(up.contains(&"EXEC sp_rename 'dbo.post.views', 'hits', 'COLUMN'"));
        let old_index = NAMING.index_name("post", &["views".to_string()], None);
        let new_index = NAMING.index_name("post", &["hits".to_string()], None);
        assert!(up.contains(
            &format!("EXEC sp_rename 'dbo.post.{old_index}', '{new_index}', 'INDEX'").as_str()
        ));
        let new_df = NAMING.default_constraint_name("post", "hits");
        assert!(up.contains(
            &format!("ALTER TABLE [dbo].[post] ADD CONSTRAINT [{new_df}] DEFAULT 0 FOR [hits]")
                .as_str()
        ));
        assert_eq!(change.table.indices[0].name.as_deref(), Some(new_index.as_str()));
    }

    #[test]
    fn test_index_with_predicate() {
        let table = Table::new("t");
        let index = TableIndex::new(["a"]).named("IDX_a").unique().partial("[a] IS NOT NULL");
        assert_eq!(
            DIALECT.create_index_sql(&table, &index).unwrap().text,
            "CREATE UNIQUE INDEX [IDX_a] ON [t] ([a]) WHERE [a] IS NOT NULL"
        );
        assert_eq!(DIALECT.drop_index_sql(&table, &index).text, "DROP INDEX [IDX_a] ON [t]");
    }

    #[test]
    fn test_create_database_if_not_exists() {
        let sql = DIALECT.create_database("app", true).unwrap();
        assert_eq!(sql.up[0].text, "IF DB_ID('app') IS NULL CREATE DATABASE [app]");
        assert_eq!(sql.down[0].text, "DROP DATABASE [app]");
    }
}
