//! SQLite dialect.
//!
//! SQLite can add a column or rename a table in place, but most other
//! structural changes need the table rebuilt: create `temporary_<name>` with
//! the new shape, copy the rows, drop the old table and rename the new one.
//! Every column and constraint change below goes through that rebuild.

use crate::defend::{DefendRules, PlaceholderStyle, Rewrite};
use crate::error::{DdlError, Result};
use crate::query::{Query, SqlInMemory};
use crate::schema::{
    GeneratedType, Table, TableCheck, TableColumn, TableForeignKey, TableIndex, TableUnique, View,
};
use crate::types::{ColumnKind, ColumnTypeDescriptor, HostType, ValueRules};
use crate::value::SqlValue;

use super::common::{self, ConstraintKind};
use super::{
    BuildContext, DatabaseType, IsolationLevel, MappedType, MappedTypes, SchemaChange,
    SchemaDialect,
};

static DEFEND_RULES: DefendRules = DefendRules {
    placeholders: PlaceholderStyle::Question,
    rewrites: &[Rewrite::ExpandListParameters],
    suppressions: &[],
};

const WITH_LENGTH: &[&str] = &[
    "character",
    "varchar",
    "varying character",
    "nchar",
    "native character",
    "nvarchar",
    "text",
    "blob",
    "clob",
];

const TEMPORARY_PREFIX: &str = "temporary_";
const FOREIGN_KEYS_ON: &str = "PRAGMA foreign_keys = ON";
const FOREIGN_KEYS_OFF: &str = "PRAGMA foreign_keys = OFF";

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates the dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn column_definition(&self, column: &TableColumn, skip_primary: bool) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.full_type(column)
        );
        if let Some(expression) = common::enum_expression(self, column) {
            sql.push_str(&format!(" CHECK( {expression} )"));
        }
        if column.is_primary && !skip_primary {
            sql.push_str(" PRIMARY KEY");
        }
        if column.is_increment() {
            sql.push_str(" AUTOINCREMENT");
        }
        if let Some(collation) = &column.collation {
            sql.push_str(" COLLATE ");
            sql.push_str(collation);
        }
        if !column.is_nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(expression) = &column.as_expression {
            let kind = column.generated_type.unwrap_or(GeneratedType::Virtual);
            sql.push_str(&format!(" AS ({expression}) {}", kind.as_sql()));
        } else if let Some(default) = &column.default {
            sql.push_str(&format!(" DEFAULT ({default})"));
        }
        sql
    }

    fn create_table_sql(&self, table: &Table) -> Result<Query> {
        let primary = table.primary_column_names();
        let composite = primary.len() > 1;
        if composite && table.primary_columns().iter().any(|c| c.is_increment()) {
            return Err(DdlError::InvalidDefinition(format!(
                "table '{}': AUTOINCREMENT is not allowed on a composite primary key",
                table.name
            )));
        }

        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c, composite))
            .collect();
        parts.extend(table.uniques.iter().map(|u| common::unique_clause(self, u)));
        parts.extend(table.checks.iter().map(|c| common::check_clause(self, c)));
        for foreign_key in &table.foreign_keys {
            parts.push(self.foreign_key_clause(foreign_key)?);
        }
        if composite {
            parts.push(format!(
                "PRIMARY KEY ({})",
                common::quoted_columns(self, &primary)
            ));
        }
        Ok(Query::new(format!(
            "CREATE TABLE {} ({})",
            self.table_name(table),
            parts.join(", ")
        )))
    }

    fn drop_table_sql(&self, table: &Table) -> Query {
        Query::new(format!("DROP TABLE {}", self.table_name(table)))
    }

    fn rename_table_sql(&self, table: &Table, new_name: &str) -> Query {
        Query::new(format!(
            "ALTER TABLE {} RENAME TO {}",
            self.table_name(table),
            self.quote_identifier(new_name)
        ))
    }

    /// Rebuilds `old` into the shape of `new`, copying rows column by column.
    /// `renames` maps old column names to new ones.
    ///
    /// Foreign key enforcement is switched off around the rebuild so that
    /// dropping the original does not run the referencing tables' `ON DELETE`
    /// actions. The runner issues the switches outside its transaction.
    fn recreate(
        &self,
        old: &Table,
        new: &Table,
        renames: &[(String, String)],
    ) -> Result<SqlInMemory> {
        let mut sql = SqlInMemory::new();
        sql.push(FOREIGN_KEYS_OFF, FOREIGN_KEYS_ON);

        for index in &old.indices {
            sql.push(self.drop_index_sql(old, index), self.create_index_sql(old, index)?);
        }

        let mut temporary = new.clone();
        temporary.name = format!("{TEMPORARY_PREFIX}{}", new.name);
        sql.push(self.create_table_sql(&temporary)?, self.drop_table_sql(&temporary));

        let (target, source) = column_mapping(old, new, renames);
        if !target.is_empty() {
            let target = common::quoted_columns(self, &target);
            let source = common::quoted_columns(self, &source);
            sql.push(
                format!(
                    "INSERT INTO {}({target}) SELECT {source} FROM {}",
                    self.table_name(&temporary),
                    self.table_name(old)
                ),
                format!(
                    "INSERT INTO {}({source}) SELECT {target} FROM {}",
                    self.table_name(old),
                    self.table_name(&temporary)
                ),
            );
        }

        sql.push(self.drop_table_sql(old), self.create_table_sql(old)?);
        sql.push(
            self.rename_table_sql(&temporary, &new.name),
            self.rename_table_sql(new, &temporary.name),
        );

        for index in &new.indices {
            sql.push(self.create_index_sql(new, index)?, self.drop_index_sql(new, index));
        }

        sql.push(FOREIGN_KEYS_ON, FOREIGN_KEYS_OFF);
        Ok(sql)
    }

    /// Names everything on `next`, then plans the rebuild from `old`.
    fn rebuild(
        &self,
        ctx: &BuildContext<'_>,
        old: &Table,
        next: &Table,
        renames: &[(String, String)],
    ) -> Result<SchemaChange> {
        let next = common::with_derived_names(ctx, next);
        let mut sql = self.recreate(old, &next, renames)?;
        sql.extend(common::generated_column_changes(ctx, self, Some(old), Some(&next)));
        Ok(SchemaChange::new(sql, next))
    }

    fn require_columns(table: &Table, columns: &[String]) -> Result<()> {
        for column in columns {
            common::require_column(table, column)?;
        }
        Ok(())
    }
}

/// Pairs of (new column, old column) whose data survives a rebuild.
/// Computed columns are never copied.
fn column_mapping(
    old: &Table,
    new: &Table,
    renames: &[(String, String)],
) -> (Vec<String>, Vec<String>) {
    new.columns
        .iter()
        .filter(|c| c.as_expression.is_none())
        .filter_map(|column| {
            let source = renames
                .iter()
                .find(|(_, renamed)| *renamed == column.name)
                .map_or(column.name.as_str(), |(original, _)| original.as_str());
            old.find_column(source)
                .filter(|c| c.as_expression.is_none())
                .map(|_| (column.name.clone(), source.to_string()))
        })
        .unzip()
}

impl SchemaDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "SQLite"
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn defend_rules(&self) -> &'static DefendRules {
        &DEFEND_RULES
    }

    fn normalize_type(&self, column: &ColumnTypeDescriptor) -> String {
        match &column.kind {
            ColumnKind::Host(HostType::Number) => "integer".into(),
            ColumnKind::Host(HostType::String) => "varchar".into(),
            ColumnKind::Host(HostType::Date) => "datetime".into(),
            ColumnKind::Host(HostType::Boolean) => "boolean".into(),
            ColumnKind::Host(HostType::Buffer) => "blob".into(),
            ColumnKind::Named(_) => {
                let name = column.name().unwrap_or_default();
                match name.as_str() {
                    "uuid" | "simple-enum" => "varchar".into(),
                    "simple-array" | "simple-json" => "text".into(),
                    _ => name,
                }
            }
        }
    }

    fn with_length_column_types(&self) -> &'static [&'static str] {
        WITH_LENGTH
    }

    fn column_length(&self, column: &ColumnTypeDescriptor) -> Option<String> {
        column.length.clone()
    }

    fn value_rules(&self) -> ValueRules {
        ValueRules {
            boolean_as_integer: true,
            datetime_types: &["datetime", "timestamp"],
            date_types: &["date"],
            time_types: &["time"],
            json_types: &[],
        }
    }

    fn mapped_types(&self) -> MappedTypes {
        MappedTypes {
            metadata_type: MappedType::plain("varchar"),
            metadata_name: MappedType::plain("varchar"),
            metadata_value: MappedType::plain("text"),
            cache_id: MappedType::plain("integer"),
            cache_identifier: MappedType::plain("varchar"),
            cache_time: MappedType::plain("bigint"),
            cache_duration: MappedType::plain("integer"),
            cache_query: MappedType::plain("text"),
            cache_result: MappedType::plain("text"),
        }
    }

    fn supported_isolation_levels(&self) -> &'static [IsolationLevel] {
        &[IsolationLevel::ReadUncommitted, IsolationLevel::Serializable]
    }

    fn begin_transaction_sql(&self, isolation: Option<IsolationLevel>) -> Vec<String> {
        let mut statements = Vec::new();
        if let Some(level) = isolation {
            statements.push(format!(
                "PRAGMA read_uncommitted = {}",
                level == IsolationLevel::ReadUncommitted
            ));
        }
        statements.push(String::from("BEGIN TRANSACTION"));
        statements
    }

    fn release_savepoint_sql(&self, name: &str) -> Option<String> {
        Some(format!("RELEASE SAVEPOINT {name}"))
    }

    fn session_init_sql(&self, use_utc: bool) -> Vec<String> {
        let _ = use_utc;
        vec![String::from(FOREIGN_KEYS_ON)]
    }

    fn foreign_key_checks_sql(&self, enabled: bool) -> Option<String> {
        Some(String::from(if enabled {
            FOREIGN_KEYS_ON
        } else {
            FOREIGN_KEYS_OFF
        }))
    }

    fn foreign_keys_enabled_query(&self) -> Option<Query> {
        Some(Query::new("PRAGMA foreign_keys"))
    }

    fn foreign_key_violations_query(&self) -> Option<Query> {
        Some(Query::new("PRAGMA foreign_key_check"))
    }

    fn current_database_query(&self) -> Query {
        Query::new(
            "SELECT \"file\" AS \"database\", NULL AS \"schema\" FROM pragma_database_list WHERE \"name\" = 'main'",
        )
    }

    fn has_database_query(&self, database: &str) -> Result<Query> {
        Ok(Query::with_parameters(
            "SELECT 1 AS \"exists\" FROM pragma_database_list WHERE \"name\" = ?",
            vec![SqlValue::Text(database.to_string())],
        ))
    }

    fn has_schema_query(&self, schema: &str) -> Result<Query> {
        let _ = schema;
        Err(DdlError::unsupported(self.name(), "table schemas"))
    }

    fn has_table_query(&self, table: &Table) -> Query {
        Query::with_parameters(
            format!(
                "SELECT 1 AS \"exists\" FROM {} WHERE \"type\" = 'table' AND \"name\" = ?",
                self.escape_path(table.database.as_deref(), None, "sqlite_master")
            ),
            vec![SqlValue::Text(table.name.clone())],
        )
    }

    fn has_column_query(&self, table: &Table, column: &str) -> Query {
        let mut parameters = vec![SqlValue::Text(table.name.clone())];
        let arguments = match &table.database {
            Some(database) => {
                parameters.push(SqlValue::Text(database.clone()));
                "?, ?"
            }
            None => "?",
        };
        parameters.push(SqlValue::Text(column.to_string()));
        Query::with_parameters(
            format!(
                "SELECT 1 AS \"exists\" FROM pragma_table_xinfo({arguments}) WHERE \"name\" = ?"
            ),
            parameters,
        )
    }

    fn catalog_views_subquery(&self) -> &'static str {
        "SELECT \"name\" FROM \"sqlite_master\" WHERE \"type\" = 'view'"
    }

    fn create_database(&self, database: &str, if_not_exists: bool) -> Result<SqlInMemory> {
        let _ = (database, if_not_exists);
        Ok(SqlInMemory::new())
    }

    fn drop_database(&self, database: &str, if_exists: bool) -> Result<SqlInMemory> {
        let _ = (database, if_exists);
        Ok(SqlInMemory::new())
    }

    fn create_table(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        create_foreign_keys: bool,
        create_indices: bool,
    ) -> Result<SchemaChange> {
        let mut named = common::with_derived_names(ctx, table);
        if !create_foreign_keys {
            named.foreign_keys.clear();
        }
        if !create_indices {
            named.indices.clear();
        }

        let mut sql = SqlInMemory::new();
        sql.push(self.create_table_sql(&named)?, self.drop_table_sql(&named));
        for index in &named.indices {
            sql.push(
                self.create_index_sql(&named, index)?,
                self.drop_index_sql(&named, index),
            );
        }
        sql.extend(common::generated_column_changes(ctx, self, None, Some(&named)));
        named.just_created = true;
        Ok(SchemaChange::new(sql, named))
    }

    fn drop_table(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        drop_foreign_keys: bool,
        drop_indices: bool,
    ) -> Result<SqlInMemory> {
        // Foreign keys live inside the table definition.
        let _ = drop_foreign_keys;
        let mut sql = common::generated_column_changes(ctx, self, Some(table), None);
        if drop_indices {
            for index in &table.indices {
                sql.push(
                    self.drop_index_sql(table, index),
                    self.create_index_sql(table, index)?,
                );
            }
        }
        sql.push(self.drop_table_sql(table), self.create_table_sql(table)?);
        Ok(sql)
    }

    fn rename_table(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        new_name: &str,
    ) -> Result<SchemaChange> {
        let mut renamed = table.clone();
        renamed.name = new_name.to_string();
        let mut next = renamed.clone();
        let renames = common::rename_auto_named(ctx, table, &mut next);

        let mut sql = SqlInMemory::new();
        sql.push(
            self.rename_table_sql(table, new_name),
            self.rename_table_sql(&renamed, &table.name),
        );

        let needs_rebuild = renames.iter().any(|r| {
            matches!(
                r.kind,
                ConstraintKind::Unique | ConstraintKind::Check | ConstraintKind::ForeignKey
            )
        });
        if needs_rebuild {
            sql.extend(self.recreate(&renamed, &next, &[])?);
        } else {
            for rename in renames.iter().filter(|r| r.kind == ConstraintKind::Index) {
                let before = renamed
                    .indices
                    .iter()
                    .find(|i| i.name.as_deref() == Some(rename.old.as_str()));
                let after = next
                    .indices
                    .iter()
                    .find(|i| i.name.as_deref() == Some(rename.new.as_str()));
                if let (Some(before), Some(after)) = (before, after) {
                    sql.push(
                        self.drop_index_sql(&renamed, before),
                        self.create_index_sql(&renamed, before)?,
                    );
                    sql.push(
                        self.create_index_sql(&next, after)?,
                        self.drop_index_sql(&next, after),
                    );
                }
            }
        }
        sql.extend(common::generated_column_changes(ctx, self, Some(table), Some(&next)));
        Ok(SchemaChange::new(sql, next))
    }

    fn clear_table(&self, table: &Table) -> Query {
        Query::new(format!("DELETE FROM {}", self.table_name(table)))
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
            queries.push(Query::new(format!(
                "DROP VIEW IF EXISTS {}",
                self.view_name(view)
            )));
        }
        for table in tables {
            queries.push(Query::new(format!(
                "DROP TABLE IF EXISTS {}",
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
        let mut next = table.clone();
        for column in columns {
            if next.find_column(&column.name).is_some() {
                return Err(DdlError::ColumnExists {
                    table: table.name.clone(),
                    column: column.name.clone(),
                });
            }
            next.columns.push(column.clone());
        }
        self.rebuild(ctx, table, &next, &[])
    }

    fn drop_columns(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        columns: &[String],
    ) -> Result<SchemaChange> {
        let mut next = table.clone();
        for name in columns {
            common::require_column(&next, name)?;
            let keeps = |names: &[String]| !names.iter().any(|n| n == name);
            next.columns.retain(|c| c.name != *name);
            next.indices.retain(|i| keeps(&i.column_names));
            next.uniques.retain(|u| keeps(&u.column_names));
            next.checks.retain(|c| keeps(&c.column_names));
            next.foreign_keys.retain(|f| keeps(&f.column_names));
        }
        self.rebuild(ctx, table, &next, &[])
    }

    fn change_columns(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        changes: &[(String, TableColumn)],
    ) -> Result<SchemaChange> {
        let mut next = table.clone();
        let mut renames: Vec<(String, String)> = Vec::new();

        for (old_name, new_column) in changes {
            let old_column = common::require_column(&next, old_name)?.clone();

            if new_column.name != *old_name {
                if next.find_column(&new_column.name).is_some() {
                    return Err(DdlError::ColumnExists {
                        table: table.name.clone(),
                        column: new_column.name.clone(),
                    });
                }
                let before = next.clone();
                common::rename_column_in(&mut next, old_name, &new_column.name);
                common::rename_auto_named(ctx, &before, &mut next);
                match renames.iter_mut().find(|(_, renamed)| renamed == old_name) {
                    Some(entry) => entry.1.clone_from(&new_column.name),
                    None => renames.push((old_name.clone(), new_column.name.clone())),
                }
            }

            if old_column.is_unique && !new_column.is_unique {
                next.uniques.retain(|u| {
                    !(u.column_names.len() == 1 && u.column_names[0] == new_column.name)
                });
            }

            if let Some(column) = next.find_column_mut(&new_column.name) {
                *column = new_column.clone();
            }
        }

        self.rebuild(ctx, table, &next, &renames)
    }

    fn create_primary_key(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        columns: &[String],
        name: Option<&str>,
    ) -> Result<SchemaChange> {
        if !table.primary_column_names().is_empty() {
            return Err(DdlError::PrimaryKeyExists(table.name.clone()));
        }
        Self::require_columns(table, columns)?;
        let mut next = table.clone();
        for column in &mut next.columns {
            if columns.contains(&column.name) {
                column.is_primary = true;
                column.primary_key_constraint_name = name.map(str::to_string);
            }
        }
        self.rebuild(ctx, table, &next, &[])
    }

    fn update_primary_keys(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        columns: &[String],
    ) -> Result<SchemaChange> {
        Self::require_columns(table, columns)?;
        let mut next = table.clone();
        for column in &mut next.columns {
            column.is_primary = columns.contains(&column.name);
        }
        self.rebuild(ctx, table, &next, &[])
    }

    fn drop_primary_key(&self, ctx: &BuildContext<'_>, table: &Table) -> Result<SchemaChange> {
        if table.primary_column_names().is_empty() {
            return Err(DdlError::PrimaryKeyNotFound(table.name.clone()));
        }
        let mut next = table.clone();
        for column in &mut next.columns {
            column.is_primary = false;
            column.primary_key_constraint_name = None;
        }
        self.rebuild(ctx, table, &next, &[])
    }

    fn create_unique_constraints(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        uniques: &[TableUnique],
    ) -> Result<SchemaChange> {
        let mut next = table.clone();
        for unique in uniques {
            Self::require_columns(table, &unique.column_names)?;
            next.uniques.push(common::named_unique(ctx, table, unique));
        }
        self.rebuild(ctx, table, &next, &[])
    }

    fn drop_unique_constraints(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        names: &[String],
    ) -> Result<SchemaChange> {
        let mut next = table.clone();
        for name in names {
            common::take_unique(&mut next, name)?;
        }
        self.rebuild(ctx, table, &next, &[])
    }

    fn create_check_constraints(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        checks: &[TableCheck],
    ) -> Result<SchemaChange> {
        let mut next = table.clone();
        next.checks
            .extend(checks.iter().map(|c| common::named_check(ctx, table, c)));
        self.rebuild(ctx, table, &next, &[])
    }

    fn drop_check_constraints(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        names: &[String],
    ) -> Result<SchemaChange> {
        let mut next = table.clone();
        for name in names {
            common::take_check(&mut next, name)?;
        }
        self.rebuild(ctx, table, &next, &[])
    }

    fn create_foreign_keys(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        foreign_keys: &[TableForeignKey],
    ) -> Result<SchemaChange> {
        let mut next = table.clone();
        for foreign_key in foreign_keys {
            Self::require_columns(table, &foreign_key.column_names)?;
            next.foreign_keys
                .push(common::named_foreign_key(ctx, table, foreign_key));
        }
        self.rebuild(ctx, table, &next, &[])
    }

    fn drop_foreign_keys(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        names: &[String],
    ) -> Result<SchemaChange> {
        let mut next = table.clone();
        for name in names {
            common::take_foreign_key(&mut next, name)?;
        }
        self.rebuild(ctx, table, &next, &[])
    }

    fn create_index_sql(&self, table: &Table, index: &TableIndex) -> Result<Query> {
        let mut sql = format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.is_unique { "UNIQUE " } else { "" },
            self.escape_path(
                table.database.as_deref(),
                None,
                index.name.as_deref().unwrap_or_default()
            ),
            self.quote_identifier(&table.name),
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
            "DROP INDEX {}",
            self.escape_path(
                table.database.as_deref(),
                None,
                index.name.as_deref().unwrap_or_default()
            )
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
    use crate::schema::GenerationStrategy;

    const DIALECT: SqliteDialect = SqliteDialect::new();
    const NAMING: DefaultNamingStrategy = DefaultNamingStrategy::new();

    fn texts(queries: &[Query]) -> Vec<&str> {
        queries.iter().map(|q| q.text.as_str()).collect()
    }

    fn user() -> Table {
        Table::new("user")
            .column(
                TableColumn::new("id", "integer")
                    .primary()
                    .generated(GenerationStrategy::Increment),
            )
            .column(TableColumn::new("name", "varchar").nullable())
            .column(TableColumn::new("age", "int").default_value("0"))
    }

    #[test]
    fn test_create_table() {
        let meta = MetadataTable::default();
        let ctx = BuildContext::new(&NAMING, &meta);
        let change = DIALECT.create_table(&ctx, &user(), true, true).unwrap();
        assert_eq!(
            texts(&change.sql.up),
            [
                r#"CREATE TABLE "user" ("id" integer PRIMARY KEY AUTOINCREMENT NOT NULL, "name" varchar, "age" int NOT NULL DEFAULT (0))"#
            ]
        );
        assert_eq!(texts(&change.sql.down), [r#"DROP TABLE "user""#]);
    }

    #[test]
    fn test_composite_primary_key() {
        let meta = MetadataTable::default();
        let ctx = BuildContext::new(&NAMING, &meta);
        let table = Table::new("membership")
            .column(TableColumn::new("user_id", "integer").primary())
            .column(TableColumn::new("group_id", "integer").primary());
        let change = DIALECT.create_table(&ctx, &table, true, true).unwrap();
        assert_eq!(
            change.sql.up[0].text,
            r#"CREATE TABLE "membership" ("user_id" integer NOT NULL, "group_id" integer NOT NULL, PRIMARY KEY ("user_id", "group_id"))"#
        );

        let invalid = Table::new("bad")
            .column(
                TableColumn::new("a", "integer")
                    .primary()
                    .generated(GenerationStrategy::Increment),
            )
            .column(TableColumn::new("b", "integer").primary());
        assert!(matches!(
            DIALECT.create_table(&ctx, &invalid, true, true),
            Err(DdlError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_enum_and_generated_columns() {
        let status = TableColumn::new("status", "varchar").enum_values(["on", "off"]);
        assert_eq!(
            DIALECT.column_definition(&status, false),
            r#""status" varchar CHECK( "status" IN ('on','off') ) NOT NULL"#
        );
        let total = TableColumn::new("total", "integer")
            .nullable()
            .computed("a + b", GeneratedType::Stored);
        assert_eq!(
            DIALECT.column_definition(&total, false),
            r#""total" integer AS (a + b) STORED"#
        );
    }

    #[test]
    fn test_change_type_recreates_table() {
        let meta = MetadataTable::default();
        let ctx = BuildContext::new(&NAMING, &meta);
        let table = DIALECT
            .create_table(&ctx, &user().index(TableIndex::new(["age"])), true, true)
            .unwrap()
            .table;
        let index = NAMING.index_name("user", &["age".to_string()], None);
        let change = DIALECT
            .change_columns(
                &ctx,
                &table,
                &[("age".into(), TableColumn::new("age", "bigint").default_value("0"))],
            )
            .unwrap();
        assert_eq!(
            texts(&change.sql.up),
            [
                "PRAGMA foreign_keys = OFF",
                format!(r#"DROP INDEX "{index}""#).as_str(),
                r#"CREATE TABLE "temporary_user" ("id" integer PRIMARY KEY AUTOINCREMENT NOT NULL, "name" varchar, "age" bigint NOT NULL DEFAULT (0))"#,
                r#"INSERT INTO "temporary_user"("id", "name", "age") SELECT "id", "name", "age" FROM "user""#,
                r#"DROP TABLE "user""#,
                r#"ALTER TABLE "temporary_user" RENAME TO "user""#,
                format!(r#"CREATE INDEX "{index}" ON "user" ("age")"#).as_str(),
                "PRAGMA foreign_keys = ON",
            ]
        );
        assert_eq!(change.sql.up.len(), change.sql.down.len());
        let down = change.sql.down_in_execution_order();
        assert_eq!(down[0].text, "PRAGMA foreign_keys = OFF");
        assert_eq!(down[2].text, r#"ALTER TABLE "user" RENAME TO "temporary_user""#);
        assert_eq!(
            change.table.find_column("age").map(|c| c.column_type.as_str()),
            Some("bigint")
        );
    }

    #[test]
    fn test_rename_column_copies_by_old_name() {
        let meta = MetadataTable::default();
        let ctx = BuildContext::new(&NAMING, &meta);
        let table = DIALECT.create_table(&ctx, &user(), true, true).unwrap().table;
        let change = DIALECT.rename_column(&ctx, &table, "name", "nick").unwrap();
        assert!(texts(&change.sql.up).contains(
            &r#"INSERT INTO "temporary_user"("id", "nick", "age") SELECT "id", "name", "age" FROM "user""#
        ));
        assert!(change.table.find_column("nick").is_some());
        assert!(change.table.find_column("name").is_none());
    }

    #[test]
    fn test_rename_table_with_unique_rebuilds() {
        let meta = MetadataTable::default();
        let ctx = BuildContext::new(&NAMING, &meta);
        let plain = DIALECT.create_table(&ctx, &user(), true, true).unwrap().table;
        let change = DIALECT.rename_table(&ctx, &plain, "person").unwrap();
        assert_eq!(
            texts(&change.sql.up),
            [r#"ALTER TABLE "user" RENAME TO "person""#]
        );

        let with_unique = DIALECT
            .create_table(&ctx, &user().unique(TableUnique::new(["name"])), true, true)
            .unwrap()
            .table;
        let change = DIALECT.rename_table(&ctx, &with_unique, "person").unwrap();
        let up = texts(&change.sql.up);
        assert_eq!(up[0], r#"ALTER TABLE "user" RENAME TO "person""#);
        assert!(up
            .iter()
            .any(|q| q.starts_with(r#"CREATE TABLE "temporary_person""#)));
        assert_eq!(up.last(), Some(&"PRAGMA foreign_keys = ON"));
        assert_eq!(
            change.table.uniques[0].name,
            Some(NAMING.unique_constraint_name("person", &["name".to_string()]))
        );
    }

    #[test]
    fn test_transaction_statements() {
        assert_eq!(
            DIALECT.begin_transaction_sql(Some(IsolationLevel::ReadUncommitted)),
            ["PRAGMA read_uncommitted = true", "BEGIN TRANSACTION"]
        );
        assert_eq!(DIALECT.begin_transaction_sql(None), ["BEGIN TRANSACTION"]);
        assert_eq!(
            DIALECT.release_savepoint_sql("typeorm_2").as_deref(),
            Some("RELEASE SAVEPOINT typeorm_2")
        );
    }

    #[test]
    fn test_type_normalization() {
        let host = |kind| DIALECT.normalize_type(&ColumnTypeDescriptor::host(kind));
        assert_eq!(host(HostType::Number), "integer");
        assert_eq!(host(HostType::Date), "datetime");
        let named = |n: &str| DIALECT.normalize_type(&ColumnTypeDescriptor::named(n));
        assert_eq!(named("uuid"), "varchar");
        assert_eq!(named("simple-json"), "text");
        assert_eq!(DIALECT.column_length(&ColumnTypeDescriptor::named("varchar")), None);
    }

    #[test]
    fn test_clear_table_uses_delete() {
        assert_eq!(DIALECT.clear_table(&Table::new("t")).text, r#"DELETE FROM "t""#);
    }
}
