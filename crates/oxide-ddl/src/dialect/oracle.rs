//! Oracle dialect.
//!
//! Oracle opens transactions implicitly, has no savepoint release, no
//! `ON UPDATE` referential actions and no partial indices. Identifiers are
//! limited to 30 characters.

use crate::defend::{DefendRules, PlaceholderStyle, Rewrite, Suppression};
use crate::error::{DdlError, Result};
use crate::query::{Query, SqlInMemory};
use crate::schema::{
    ForeignKeyAction, Table, TableCheck, TableColumn, TableForeignKey, TableIndex, TableUnique,
    View,
};
use crate::types::{self, ColumnKind, ColumnTypeDescriptor, HostType, ValueRules};
use crate::value::SqlValue;

use super::alter::{self, ColumnSql, InPlaceAlter};
use super::common::{self, ConstraintKind, ConstraintRename};
use super::{
    BuildContext, DatabaseType, IsolationLevel, MappedType, MappedTypes, SchemaChange,
    SchemaDialect,
};

const INDEX_STATEMENTS: &[&str] = &["CREATE INDEX", "CREATE UNIQUE INDEX"];

static DEFEND_RULES: DefendRules = DefendRules {
    placeholders: PlaceholderStyle::ColonIndexed,
    rewrites: &[Rewrite::ExpandListParameters, Rewrite::BooleanLiterals],
    suppressions: &[
        Suppression {
            code: "ORA-00955",
            statements: INDEX_STATEMENTS,
            reason: "name is already used by an existing object",
        },
        Suppression {
            code: "ORA-01408",
            statements: INDEX_STATEMENTS,
            reason: "such column list already indexed",
        },
    ],
};

const WITH_LENGTH: &[&str] = &["char", "nchar", "nvarchar2", "varchar2", "varchar", "raw"];

/// Oracle dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

impl OracleDialect {
    /// Creates the dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn default_length(type_name: &str) -> Option<&'static str> {
        match type_name {
            "char" | "nchar" => Some("1"),
            "varchar" | "varchar2" | "nvarchar2" => Some("255"),
            "raw" => Some("2000"),
            _ => None,
        }
    }

    fn index_name(&self, table: &Table, name: &str) -> String {
        self.escape_path(None, table.schema.as_deref(), name)
    }

    fn dictionary_query(&self, table: &Table, view: &str, extra: Option<&str>) -> Query {
        let mut conditions = Vec::new();
        let mut parameters = Vec::new();
        let from = match &table.schema {
            Some(schema) => {
                conditions.push(format!("\"OWNER\" = {}", self.placeholder(0)));
                parameters.push(SqlValue::Text(schema.clone()));
                format!("\"ALL_{view}\"")
            }
            None => format!("\"USER_{view}\""),
        };
        conditions.push(format!(
            "\"TABLE_NAME\" = {}",
            self.placeholder(parameters.len())
        ));
        parameters.push(SqlValue::Text(table.name.clone()));
        if let Some(column) = extra {
            conditions.push(format!(
                "\"COLUMN_NAME\" = {}",
                self.placeholder(parameters.len())
            ));
            parameters.push(SqlValue::Text(column.to_string()));
        }
        Query::with_parameters(
            format!(
                "SELECT 1 AS \"exists\" FROM {from} WHERE {}",
                conditions.join(" AND ")
            ),
            parameters,
        )
    }
}

impl InPlaceAlter for OracleDialect {
    fn column_definition(
        &self,
        _ctx: &BuildContext<'_>,
        _table: &Table,
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
                sql.push_str(&format!(" CHECK( {expression} )"));
            }
        }
        if let Some(collation) = &column.collation {
            sql.push_str(" COLLATE ");
            sql.push_str(collation);
        }
        if let Some(expression) = &column.as_expression {
            sql.push_str(&format!(" AS ({expression}) VIRTUAL"));
        }
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        if !column.is_nullable && column.as_expression.is_none() {
            sql.push_str(" NOT NULL");
        }
        if parts.identity && column.is_increment() {
            sql.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        }
        sql
    }

    fn rename_table_sql(&self, table: &Table, new_name: &str) -> Query {
        Query::new(format!(
            "ALTER TABLE {} RENAME TO {}",
            self.table_name(table),
            self.quote_identifier(new_name)
        ))
    }

    fn rename_column_sql(&self, table: &Table, old: &str, new: &str) -> Query {
        Query::new(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.table_name(table),
            self.quote_identifier(old),
            self.quote_identifier(new)
        ))
    }

    fn rename_object_sql(&self, table: &Table, rename: &ConstraintRename) -> Query {
        match rename.kind {
            ConstraintKind::Index => Query::new(format!(
                "ALTER INDEX {} RENAME TO {}",
                self.index_name(table, &rename.old),
                self.quote_identifier(&rename.new)
            )),
            _ => Query::new(format!(
                "ALTER TABLE {} RENAME CONSTRAINT {} TO {}",
                self.table_name(table),
                self.quote_identifier(&rename.old),
                self.quote_identifier(&rename.new)
            )),
        }
    }

    fn modify_column_sql(
        &self,
        _ctx: &BuildContext<'_>,
        table: &Table,
        old: &TableColumn,
        new: &TableColumn,
    ) -> Query {
        let mut parts = vec![format!(
            "ALTER TABLE {} MODIFY {} {}",
            self.table_name(table),
            self.quote_identifier(&new.name),
            self.full_type(new)
        )];
        if old.default != new.default {
            parts.push(match &new.default {
                Some(default) => format!("DEFAULT {default}"),
                None => String::from("DEFAULT NULL"),
            });
        }
        if old.is_nullable != new.is_nullable {
            parts.push(String::from(if new.is_nullable { "NULL" } else { "NOT NULL" }));
        }
        Query::new(parts.join(" "))
    }

    fn modify_covers_default(&self) -> bool {
        true
    }
}

impl SchemaDialect for OracleDialect {
    fn name(&self) -> &'static str {
        "Oracle"
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Oracle
    }

    fn escape_path(&self, _database: Option<&str>, schema: Option<&str>, name: &str) -> String {
        [schema, Some(name)]
            .into_iter()
            .flatten()
            .map(|part| self.quote_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn max_identifier_length(&self) -> Option<usize> {
        Some(30)
    }

    fn placeholder(&self, index: usize) -> String {
        PlaceholderStyle::ColonIndexed.render(index)
    }

    fn defend_rules(&self) -> &'static DefendRules {
        &DEFEND_RULES
    }

    fn normalize_type(&self, column: &ColumnTypeDescriptor) -> String {
        match &column.kind {
            ColumnKind::Host(HostType::Number | HostType::Boolean) => "number".into(),
            ColumnKind::Host(HostType::String) => "varchar2".into(),
            ColumnKind::Host(HostType::Date) => "timestamp".into(),
            ColumnKind::Host(HostType::Buffer) => "blob".into(),
            ColumnKind::Named(_) => {
                let name = column.name().unwrap_or_default();
                match name.as_str() {
                    "numeric" | "dec" | "decimal" | "int" | "integer" | "smallint" => {
                        "number".into()
                    }
                    "real" | "double precision" => "float".into(),
                    "varchar" | "uuid" | "simple-enum" => "varchar2".into(),
                    "simple-array" | "simple-json" => "clob".into(),
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
        if column.is_named(&["uuid"]) {
            return Some(String::from("36"));
        }
        Self::default_length(&self.normalize_type(column)).map(str::to_string)
    }

    fn full_type(&self, column: &TableColumn) -> String {
        let precision = column
            .precision
            .map(|p| format!("({p})"))
            .unwrap_or_default();
        match column.column_type.to_ascii_lowercase().as_str() {
            "timestamp with time zone" => format!("TIMESTAMP{precision} WITH TIME ZONE"),
            "timestamp with local time zone" => {
                format!("TIMESTAMP{precision} WITH LOCAL TIME ZONE")
            }
            _ => {
                let length = self.column_length(&ColumnTypeDescriptor::from(column));
                match (length, column.precision, column.scale) {
                    (None, None, Some(scale)) => format!("{}(0,{scale})", column.column_type),
                    (length, _, _) => types::compose_full_type(column, length.as_deref()),
                }
            }
        }
    }

    fn value_rules(&self) -> ValueRules {
        ValueRules {
            boolean_as_integer: true,
            datetime_types: &[
                "date",
                "timestamp",
                "timestamp with time zone",
                "timestamp with local time zone",
            ],
            date_types: &[],
            time_types: &[],
            json_types: &[],
        }
    }

    fn mapped_types(&self) -> MappedTypes {
        MappedTypes {
            metadata_type: MappedType::sized("varchar2", "255"),
            metadata_name: MappedType::sized("varchar2", "255"),
            metadata_value: MappedType::plain("clob"),
            cache_id: MappedType::plain("number"),
            cache_identifier: MappedType::sized("varchar2", "255"),
            cache_time: MappedType::plain("number"),
            cache_duration: MappedType::plain("number"),
            cache_query: MappedType::plain("clob"),
            cache_result: MappedType::plain("clob"),
        }
    }

    fn supported_isolation_levels(&self) -> &'static [IsolationLevel] {
        &[IsolationLevel::ReadCommitted, IsolationLevel::Serializable]
    }

    fn begin_transaction_sql(&self, isolation: Option<IsolationLevel>) -> Vec<String> {
        let level = isolation.unwrap_or(IsolationLevel::ReadCommitted);
        vec![format!("SET TRANSACTION ISOLATION LEVEL {level}")]
    }

    fn session_init_sql(&self, use_utc: bool) -> Vec<String> {
        let mut statements = vec![
            String::from("ALTER SESSION SET NLS_DATE_FORMAT = 'YYYY-MM-DD HH24:MI:SS'"),
            String::from("ALTER SESSION SET NLS_TIMESTAMP_FORMAT = 'YYYY-MM-DD HH24:MI:SS.FF'"),
            String::from(
                "ALTER SESSION SET NLS_TIMESTAMP_TZ_FORMAT = 'YYYY-MM-DD HH24:MI:SS.FF TZH:TZM'",
            ),
        ];
        if use_utc {
            statements.push(String::from("ALTER SESSION SET TIME_ZONE = 'UTC'"));
        }
        statements
    }

    fn current_database_query(&self) -> Query {
        Query::new(
            "SELECT SYS_CONTEXT('USERENV', 'DB_NAME') AS \"database\", \
             SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA') AS \"schema\" FROM DUAL",
        )
    }

    fn has_database_query(&self, database: &str) -> Result<Query> {
        Ok(Query::with_parameters(
            "SELECT 1 AS \"exists\" FROM DUAL WHERE SYS_CONTEXT('USERENV', 'DB_NAME') = :1",
            vec![SqlValue::Text(database.to_string())],
        ))
    }

    fn has_schema_query(&self, schema: &str) -> Result<Query> {
        Ok(Query::with_parameters(
            "SELECT 1 AS \"exists\" FROM \"ALL_USERS\" WHERE \"USERNAME\" = :1",
            vec![SqlValue::Text(schema.to_string())],
        ))
    }

    fn has_table_query(&self, table: &Table) -> Query {
        self.dictionary_query(table, "TABLES", None)
    }

    fn has_column_query(&self, table: &Table, column: &str) -> Query {
        self.dictionary_query(table, "TAB_COLS", Some(column))
    }

    fn catalog_views_subquery(&self) -> &'static str {
        "SELECT \"VIEW_NAME\" FROM \"USER_VIEWS\" UNION SELECT \"MVIEW_NAME\" FROM \"USER_MVIEWS\""
    }

    fn create_database(&self, database: &str, if_not_exists: bool) -> Result<SqlInMemory> {
        let _ = (database, if_not_exists);
        Err(DdlError::unsupported(self.name(), "creating databases"))
    }

    fn drop_database(&self, database: &str, if_exists: bool) -> Result<SqlInMemory> {
        let _ = (database, if_exists);
        Err(DdlError::unsupported(self.name(), "dropping databases"))
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
        let mut queries = Vec::new();
        for view in views {
            queries.push(self.drop_view_sql(view)?);
        }
        for table in tables {
            queries.push(Query::new(format!(
                "DROP TABLE {} CASCADE CONSTRAINTS",
                self.table_name(table)
            )));
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

    fn foreign_key_clause(&self, foreign_key: &TableForeignKey) -> Result<String> {
        let mut foreign_key = foreign_key.clone();
        if foreign_key.on_delete == Some(ForeignKeyAction::NoAction) {
            foreign_key.on_delete = None;
        }
        common::foreign_key_clause(self, &foreign_key, false)
    }

    fn create_index_sql(&self, table: &Table, index: &TableIndex) -> Result<Query> {
        if index.where_clause.is_some() {
            return Err(DdlError::unsupported(self.name(), "partial indices"));
        }
        Ok(Query::new(format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.is_unique { "UNIQUE " } else { "" },
            self.index_name(table, index.name.as_deref().unwrap_or_default()),
            self.table_name(table),
            common::quoted_columns(self, &index.column_names)
        )))
    }

    fn drop_index_sql(&self, table: &Table, index: &TableIndex) -> Query {
        Query::new(format!(
            "DROP INDEX {}",
            self.index_name(table, index.name.as_deref().unwrap_or_default())
        ))
    }

    fn create_view_sql(&self, view: &View) -> Result<Query> {
        Ok(Query::new(format!(
            "CREATE {}VIEW {} AS {}",
            if view.materialized { "MATERIALIZED " } else { "" },
            self.view_name(view),
            view.expression
        )))
    }

    fn drop_view_sql(&self, view: &View) -> Result<Query> {
        Ok(Query::new(format!(
            "DROP {}VIEW {}",
            if view.materialized { "MATERIALIZED " } else { "" },
            self.view_name(view)
        )))
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
    use crate::schema::{GeneratedType, GenerationStrategy};

    const DIALECT: OracleDialect = OracleDialect::new();
    const NAMING: DefaultNamingStrategy = DefaultNamingStrategy::new();

    fn texts(queries: &[Query]) -> Vec<&str> {
        queries.iter().map(|q| q.text.as_str()).collect()
    }

    #[test]
    fn test_normalize_type() {
        let host = |kind| DIALECT.normalize_type(&ColumnTypeDescriptor::host(kind));
        assert_eq!(host(HostType::Number), "number");
        assert_eq!(host(HostType::Boolean), "number");
        assert_eq!(host(HostType::String), "varchar2");
        assert_eq!(host(HostType::Date), "timestamp");
        let named = |n: &str| DIALECT.normalize_type(&ColumnTypeDescriptor::named(n));
        assert_eq!(named("integer"), "number");
        assert_eq!(named("double precision"), "float");
        assert_eq!(named("uuid"), "varchar2");
        assert_eq!(named("simple-json"), "clob");
    }

    #[test]
    fn test_lengths() {
        let length = |n: &str| DIALECT.column_length(&ColumnTypeDescriptor::named(n));
        assert_eq!(length("varchar2").as_deref(), Some("255"));
        assert_eq!(length("raw").as_deref(), Some("2000"));
        assert_eq!(length("uuid").as_deref(), Some("36"));
        assert_eq!(length("number"), None);
    }

    #[test]
    fn test_timestamp_with_time_zone() {
        let column = TableColumn::new("at", "timestamp with local time zone").precision(6, None);
        assert_eq!(DIALECT.full_type(&column), "TIMESTAMP(6) WITH LOCAL TIME ZONE");
        let scaled = TableColumn {
            scale: Some(2),
            ..TableColumn::new("n", "number")
        };
        assert_eq!(DIALECT.full_type(&scaled), "number(0,2)");
    }

    #[test]
    fn test_transactions_and_session() {
        assert_eq!(
            DIALECT.begin_transaction_sql(None),
            ["SET TRANSACTION ISOLATION LEVEL READ COMMITTED"]
        );
        assert_eq!(DIALECT.release_savepoint_sql("typeorm_1"), None);
        assert_eq!(DIALECT.session_init_sql(true).len(), 4);
        assert_eq!(DIALECT.session_init_sql(false).len(), 3);
    }

    #[test]
    fn test_foreign_key_actions() {
        let fk = TableForeignKey::new(["author_id"], "author", ["id"])
            .named("FK_a")
            .on_delete(ForeignKeyAction::NoAction);
        assert_eq!(
            DIALECT.foreign_key_clause(&fk).unwrap(),
            r#"CONSTRAINT "FK_a" FOREIGN KEY ("author_id") REFERENCES "author" ("id")"#
        );
        let cascade = fk.clone().on_delete(ForeignKeyAction::Cascade);
        assert!(DIALECT
            .foreign_key_clause(&cascade)
            .unwrap()
            .ends_with("ON DELETE CASCADE"));
        let on_update = fk.on_update(ForeignKeyAction::Cascade);
        assert!(matches!(
            DIALECT.foreign_key_clause(&on_update),
            Err(DdlError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_partial_index_unsupported() {
        let index = TableIndex::new(["a"]).named("IDX_a").partial("a > 0");
        assert!(DIALECT.create_index_sql(&Table::new("t"), &index).is_err());
    }

    #[test]
    fn test_create_table_with_identity_and_virtual_column() {
        let meta = MetadataTable::default();
        let ctx = BuildContext::new(&NAMING, &meta);
        let table = Table::new("item")
            .column(
                TableColumn::new("id", "number")
                    .primary()
                    .generated(GenerationStrategy::Increment),
            )
            .column(TableColumn::new("price", "number"))
            .column(TableColumn::new("doubled", "number").computed("price * 2", GeneratedType::Virtual));
        let change = DIALECT.create_table(&ctx, &table, true, true).unwrap();
        let pk = NAMING.primary_key_name("item", &["id".to_string()]);
        assert_eq!(
            change.sql.up[0].text,
            format!(
                "CREATE TABLE \"item\" (\"id\" number NOT NULL GENERATED BY DEFAULT AS IDENTITY, \
                 \"price\" number NOT NULL, \"doubled\" number AS (price * 2) VIRTUAL, \
                 CONSTRAINT \"{pk}\" PRIMARY KEY (\"id\"))"
            )
        );
        assert!(change.sql.up[1].text.starts_with("INSERT INTO \"oxide_metadata\""));
        assert!(change.sql.down[1].text.starts_with("DELETE FROM \"oxide_metadata\""));
    }

    #[test]
    fn test_modify_column() {
        let meta = MetadataTable::default();
        let ctx = BuildContext::new(&NAMING, &meta);
        let table = Table::new("item").column(TableColumn::new("name", "varchar2").length(50));
        let change = DIALECT
            .change_columns(
                &ctx,
                &table,
                &[(
                    "name".into(),
                    TableColumn::new("name", "varchar2")
                        .length(50)
                        .nullable()
                        .default_value("'x'"),
                )],
            )
            .unwrap();
        assert_eq!(
            texts(&change.sql.up),
            [r#"ALTER TABLE "item" MODIFY "name" varchar2(50) DEFAULT 'x' NULL"#]
        );
        assert_eq!(
            texts(&change.sql.down),
            [r#"ALTER TABLE "item" MODIFY "name" varchar2(50) DEFAULT NULL NOT NULL"#]
        );
    }

    #[test]
    fn test_rename_table_renames_constraints() {
        let meta = MetadataTable::default();
        let ctx = BuildContext::new(&NAMING, &meta);
        let table = DIALECT
            .create_table(
                &ctx,
                &Table::new("item")
                    .column(TableColumn::new("id", "number").primary())
                    .index(TableIndex::new(["id"])),
                true,
                true,
            )
            .unwrap()
            .table;
        let change = DIALECT.rename_table(&ctx, &table, "product").unwrap();
        let up = texts(&change.sql.up);
        assert_eq!(up[0], r#"ALTER TABLE "item" RENAME TO "product""#);
        let old_pk = NAMING.primary_key_name("item", &["id".to_string()]);
        let new_pk = NAMING.primary_key_name("product", &["id".to_string()]);
        assert_eq!(
            up[1],
            format!(r#"ALTER TABLE "product" RENAME CONSTRAINT "{old_pk}" TO "{new_pk}""#)
        );
        assert!(up[2].starts_with("ALTER INDEX \"IDX_"));
        assert_eq!(change.table.name, "product");
    }

    #[test]
    fn test_materialized_views() {
        let view = View::new("totals", "SELECT 1 FROM DUAL").materialized();
        assert_eq!(
            DIALECT.create_view_sql(&view).unwrap().text,
            r#"CREATE MATERIALIZED VIEW "totals" AS SELECT 1 FROM DUAL"#
        );
    }

    #[test]
    fn test_databases_unsupported() {
        assert!(DIALECT.create_database("x", true).is_err());
        assert!(DIALECT.create_schema("x", true).is_err());
    }
}
