//! Catalog introspection.
//!
//! SQLite is read through its pragmas and the stored `CREATE TABLE` text.
//! SQL Server and Oracle are read through catalog queries that alias their
//! columns to one standard row shape, assembled into tables here:
//!
//! | query | columns |
//! |-------|---------|
//! | tables | `table_name` |
//! | columns | `table_name, column_name, data_type, length, precision, scale, is_nullable, default_value, is_identity, generated_kind, expression` |
//! | keys | `table_name, constraint_name, constraint_type, column_name, is_unique, where_clause` |
//! | checks | `table_name, constraint_name, column_name, expression` |
//! | foreign keys | `table_name, constraint_name, column_name, referenced_schema, referenced_table_name, referenced_column_name, on_delete, on_update` |
//!
//! `constraint_type` is `PRIMARY KEY`, `UNIQUE` or `INDEX`.

mod oracle;
mod sqlite;
mod sqlserver;

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use oxide_ddl::dialect::DatabaseType;
use oxide_ddl::naming::NamingStrategy;
use oxide_ddl::query::Query;
use oxide_ddl::schema::{
    ForeignKeyAction, GeneratedType, GenerationStrategy, Table, TableCheck, TableColumn,
    TableForeignKey, TableIndex, TableUnique, View,
};

use crate::bookkeeper;
use crate::connection::Row;
use crate::error::Result;
use crate::runner::QueryRunner;

static ENUM_CHECK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^\s*\(?\s*["\[]?(\w+)["\]]?\s+IN\s*\((.*)\)\s*\)?\s*$"#)
        .expect("Invalid enum check regex")
});

static EQUALS_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^\s*\(*\s*["\[]?(\w+)["\]]?\s*=\s*'((?:[^']|'')*)'\s*\)*\s*$"#)
        .expect("Invalid equality check regex")
});

static OR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+OR\s+").expect("Invalid OR regex"));

static STRING_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'((?:[^']|'')*)'").expect("Invalid string literal regex"));

/// Catalog queries returning the standard row shapes.
#[derive(Debug, Clone)]
pub struct CatalogQueries {
    /// One row per table.
    pub tables: Query,
    /// One row per column, in ordinal order.
    pub columns: Query,
    /// One row per key or index column, in key order.
    pub keys: Query,
    /// One row per check constraint.
    pub checks: Query,
    /// One row per foreign key column, in key order.
    pub foreign_keys: Query,
}

/// Rows returned by [`CatalogQueries`].
#[derive(Debug, Clone, Default)]
pub struct CatalogRows {
    /// Table rows.
    pub tables: Vec<Row>,
    /// Column rows.
    pub columns: Vec<Row>,
    /// Key and index rows.
    pub keys: Vec<Row>,
    /// Check rows.
    pub checks: Vec<Row>,
    /// Foreign key rows.
    pub foreign_keys: Vec<Row>,
}

/// Reads tables from the catalog. `filter` limits the read to the given
/// tables; without it every table is read. The bookkeeping and cache tables
/// are skipped unless `include_internal` is set.
pub async fn load_tables(
    runner: &QueryRunner,
    filter: Option<&[Table]>,
    include_internal: bool,
) -> Result<Vec<Table>> {
    let dialect = runner.dialect();
    let mut tables = match dialect.database_type() {
        DatabaseType::Sqlite => sqlite::load_tables(runner, filter).await?,
        DatabaseType::SqlServer => {
            let schema = runner.manager().schema().await;
            let queries = sqlserver::queries(schema.as_deref(), filter);
            load_standard(runner, queries).await?
        }
        DatabaseType::Oracle => {
            let queries = oracle::queries(filter);
            load_standard(runner, queries).await?
        }
    };

    if let Some(filter) = filter {
        for table in &mut tables {
            if let Some(wanted) = filter.iter().find(|t| t.name == table.name) {
                table.database.clone_from(&wanted.database);
                table.schema.clone_from(&wanted.schema);
            }
        }
    }

    if !include_internal {
        let options = runner.manager().options();
        let internal = [
            options.metadata_table_name.as_str(),
            options.cache_table_name.as_str(),
        ];
        tables.retain(|t| !internal.contains(&t.name.as_str()));
    }
    debug!(tables = tables.len(), dialect = dialect.name(), "Loaded tables");
    Ok(tables)
}

/// Names of every view in the catalog, recorded or not.
pub async fn load_view_names(runner: &QueryRunner) -> Result<Vec<View>> {
    let rows = runner
        .query_rows(runner.dialect().catalog_views_subquery())
        .await?;
    Ok(rows
        .iter()
        .filter_map(|row| row.columns.first())
        .filter_map(|(_, value)| value.as_str())
        .map(|name| View::new(name, ""))
        .collect())
}

async fn load_standard(runner: &QueryRunner, queries: CatalogQueries) -> Result<Vec<Table>> {
    let rows = CatalogRows {
        tables: runner.query_rows(queries.tables).await?,
        columns: runner.query_rows(queries.columns).await?,
        keys: runner.query_rows(queries.keys).await?,
        checks: runner.query_rows(queries.checks).await?,
        foreign_keys: runner.query_rows(queries.foreign_keys).await?,
    };
    let mut tables = assemble(&rows, runner.naming());
    for table in &mut tables {
        if table.columns.iter().any(|c| c.generated_type.is_some()) {
            let expressions = bookkeeper::generated_columns(runner, table).await?;
            for column in &mut table.columns {
                if let Some(expression) = expressions.get(&column.name) {
                    column.as_expression = Some(expression.clone());
                }
            }
        }
    }
    Ok(tables)
}

/// Builds tables from standard catalog rows.
#[must_use]
pub fn assemble(rows: &CatalogRows, naming: &dyn NamingStrategy) -> Vec<Table> {
    let mut tables: Vec<Table> = rows
        .tables
        .iter()
        .filter_map(|row| row.get_string("table_name"))
        .map(Table::new)
        .collect();

    for row in &rows.columns {
        let Some(table) = owner(&mut tables, row) else {
            continue;
        };
        if let Some(column) = standard_column(row) {
            table.columns.push(column);
        }
    }

    for (table_name, name, group) in grouped(&rows.keys) {
        let Some(table) = tables.iter_mut().find(|t| t.name == table_name) else {
            continue;
        };
        let columns: Vec<String> = group
            .iter()
            .filter_map(|r| r.get_string("column_name"))
            .collect();
        let Some(first) = group.first() else {
            continue;
        };
        match first.get_str("constraint_type").unwrap_or_default() {
            "PRIMARY KEY" => {
                let derived = naming.primary_key_name(&table.name, &columns);
                for column in &mut table.columns {
                    if columns.contains(&column.name) {
                        column.is_primary = true;
                        if name != derived {
                            column.primary_key_constraint_name = Some(name.clone());
                        }
                    }
                }
            }
            "UNIQUE" => table.uniques.push(TableUnique::new(columns).named(name)),
            _ => {
                let mut index = TableIndex::new(columns).named(name);
                index.is_unique = first.get_flag("is_unique");
                index.where_clause = first.get_string("where_clause");
                table.indices.push(index);
            }
        }
    }

    for row in &rows.checks {
        let Some(table) = owner(&mut tables, row) else {
            continue;
        };
        let (Some(name), Some(expression)) =
            (row.get_string("constraint_name"), row.get_string("expression"))
        else {
            continue;
        };
        apply_check(table, name, expression);
    }

    for (table_name, name, group) in grouped(&rows.foreign_keys) {
        let Some(table) = tables.iter_mut().find(|t| t.name == table_name) else {
            continue;
        };
        let Some(first) = group.first() else {
            continue;
        };
        let mut foreign_key = TableForeignKey::new(
            group.iter().filter_map(|r| r.get_string("column_name")),
            first.get_string("referenced_table_name").unwrap_or_default(),
            group
                .iter()
                .filter_map(|r| r.get_string("referenced_column_name")),
        )
        .named(name);
        foreign_key.referenced_schema = first.get_string("referenced_schema");
        foreign_key.on_delete = action(first.get_str("on_delete"));
        foreign_key.on_update = action(first.get_str("on_update"));
        table.foreign_keys.push(foreign_key);
    }

    for table in &mut tables {
        mark_unique_columns(table);
    }
    tables
}

fn owner<'t>(tables: &'t mut [Table], row: &Row) -> Option<&'t mut Table> {
    let name = row.get_str("table_name")?;
    tables.iter_mut().find(|t| t.name == name)
}

/// Groups consecutive rows by `(table_name, constraint_name)`.
fn grouped(rows: &[Row]) -> Vec<(String, String, Vec<&Row>)> {
    let mut groups: Vec<(String, String, Vec<&Row>)> = Vec::new();
    for row in rows {
        let (Some(table), Some(name)) = (
            row.get_string("table_name"),
            row.get_string("constraint_name"),
        ) else {
            continue;
        };
        match groups.iter_mut().find(|(t, n, _)| *t == table && *n == name) {
            Some((_, _, group)) => group.push(row),
            None => groups.push((table, name, vec![row])),
        }
    }
    groups
}

fn standard_column(row: &Row) -> Option<TableColumn> {
    let name = row.get_string("column_name")?;
    let data_type = row
        .get_string("data_type")
        .unwrap_or_default()
        .to_ascii_lowercase();
    let mut column = TableColumn::new(name, data_type);
    column.length = row.get("length").and_then(|value| match value.as_i64() {
        Some(-1) => Some("MAX".to_string()),
        Some(n) if n > 0 => Some(n.to_string()),
        Some(_) => None,
        None => value.as_str().map(str::to_string),
    });
    column.precision = row
        .get_i64("precision")
        .and_then(|p| u32::try_from(p).ok());
    column.scale = row.get_i64("scale").and_then(|s| u32::try_from(s).ok());
    column.is_nullable = row.get_flag("is_nullable");
    column.default = row.get_str("default_value").map(strip_parentheses);
    if row.get_flag("is_identity") {
        column.is_generated = true;
        column.generation_strategy = Some(GenerationStrategy::Increment);
    }
    column.generated_type = match row.get_str("generated_kind") {
        Some(kind) if kind.eq_ignore_ascii_case("STORED") => Some(GeneratedType::Stored),
        Some(kind) if kind.eq_ignore_ascii_case("VIRTUAL") => Some(GeneratedType::Virtual),
        _ => None,
    };
    if column.generated_type.is_some() {
        // Oracle reports the expression of a virtual column as its default.
        let default = column.default.take();
        column.as_expression = row.get_string("expression").or(default);
    }
    Some(column)
}

/// Adds a check to `table`, or turns it into enum values when it is the
/// enum check of a single column.
fn apply_check(table: &mut Table, name: String, expression: String) {
    if let Some((column, values)) = enum_check(&expression) {
        let derived_enum = name.ends_with("_ENUM") || name.starts_with("SYS_C");
        if derived_enum {
            if let Some(column) = table.find_column_mut(&column) {
                column.enum_values = Some(values);
                return;
            }
        }
    }
    if name.starts_with("SYS_C") && expression.trim_end().ends_with("IS NOT NULL") {
        return;
    }
    table.checks.push(TableCheck::new(expression).named(name));
}

/// Parses `"col" IN ('a', 'b')` into the column and its values. SQL Server
/// stores the same check as `([col]='a' OR [col]='b')`, which is accepted
/// too.
pub(crate) fn enum_check(expression: &str) -> Option<(String, Vec<String>)> {
    if let Some(captures) = ENUM_CHECK.captures(expression) {
        let column = captures.get(1)?.as_str().to_string();
        let values = STRING_LITERAL
            .captures_iter(captures.get(2)?.as_str())
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().replace("''", "'"))
            .collect::<Vec<_>>();
        return (!values.is_empty()).then_some((column, values));
    }

    let mut column: Option<String> = None;
    let mut values = Vec::new();
    for part in OR.split(&strip_parentheses(expression)) {
        let captures = EQUALS_LITERAL.captures(part)?;
        let name = captures.get(1)?.as_str();
        if column.as_deref().is_some_and(|c| c != name) {
            return None;
        }
        column = Some(name.to_string());
        values.push(captures.get(2)?.as_str().replace("''", "'"));
    }
    column.map(|c| (c, values))
}

/// Referential action as the planners spell it; `NO ACTION` is the default
/// and reads as none.
pub(crate) fn action(text: Option<&str>) -> Option<ForeignKeyAction> {
    text.and_then(ForeignKeyAction::parse)
        .filter(|a| *a != ForeignKeyAction::NoAction)
}

/// Removes parentheses wrapping a whole default expression, as SQL Server
/// reports `((0))` for `0`.
pub(crate) fn strip_parentheses(text: &str) -> String {
    let mut current = text.trim();
    while current.starts_with('(') && current.ends_with(')') && wraps_whole(current) {
        current = current[1..current.len() - 1].trim();
    }
    current.to_string()
}

fn wraps_whole(text: &str) -> bool {
    let mut depth = 0_i32;
    for (i, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i != text.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Sets `is_unique` on every column covered by a single-column unique.
pub(crate) fn mark_unique_columns(table: &mut Table) {
    let singles: Vec<String> = table
        .uniques
        .iter()
        .filter(|u| u.column_names.len() == 1)
        .map(|u| u.column_names[0].clone())
        .collect();
    for column in &mut table.columns {
        column.is_unique = singles.contains(&column.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_ddl::naming::DefaultNamingStrategy;
    use oxide_ddl::value::SqlValue;

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.into())
    }

    fn column_row(table: &str, name: &str, data_type: &str, nullable: &str) -> Row {
        Row::new([
            ("table_name", text(table)),
            ("column_name", text(name)),
            ("data_type", text(data_type)),
            ("length", SqlValue::Null),
            ("precision", SqlValue::Null),
            ("scale", SqlValue::Null),
            ("is_nullable", text(nullable)),
            ("default_value", SqlValue::Null),
            ("is_identity", SqlValue::Int(0)),
            ("generated_kind", SqlValue::Null),
        ])
    }

    fn key_row(table: &str, name: &str, kind: &str, column: &str) -> Row {
        Row::new([
            ("table_name", text(table)),
            ("constraint_name", text(name)),
            ("constraint_type", text(kind)),
            ("column_name", text(column)),
            ("is_unique", SqlValue::Int(0)),
            ("where_clause", SqlValue::Null),
        ])
    }

    #[test]
    fn test_assemble_standard_rows() {
        let naming = DefaultNamingStrategy::new();
        let pk = naming.primary_key_name("user", &["id".to_string()]);
        let mut email = column_row("user", "email", "NVARCHAR", "NO");
        email.columns[3].1 = SqlValue::Int(255);
        let rows = CatalogRows {
            tables: vec![Row::new([("table_name", text("user"))])],
            columns: vec![
                column_row("user", "id", "int", "NO"),
                email,
                column_row("user", "role", "nvarchar", "YES"),
            ],
            keys: vec![
                key_row("user", &pk, "PRIMARY KEY", "id"),
                key_row("user", "UQ_email", "UNIQUE", "email"),
            ],
            checks: vec![Row::new([
                ("table_name", text("user")),
                ("constraint_name", text("CHK_role_ENUM")),
                ("expression", text("([role] IN ('admin','it''s'))")),
            ])],
            foreign_keys: Vec::new(),
        };

        let tables = assemble(&rows, &naming);
        assert_eq!(tables.len(), 1);
        let user = &tables[0];
        assert_eq!(user.primary_column_names(), vec!["id"]);
        assert!(user.columns[0].primary_key_constraint_name.is_none());
        assert_eq!(user.columns[1].length.as_deref(), Some("255"));
        assert!(user.columns[1].is_unique);
        assert!(user.columns[2].is_nullable);
        assert_eq!(
            user.columns[2].enum_values,
            Some(vec!["admin".to_string(), "it's".to_string()])
        );
        assert!(user.checks.is_empty());
    }

    #[test]
    fn test_foreign_keys_group_columns() {
        let fk_row = |column: &str, referenced: &str| {
            Row::new([
                ("table_name", text("post")),
                ("constraint_name", text("FK_author")),
                ("column_name", text(column)),
                ("referenced_schema", SqlValue::Null),
                ("referenced_table_name", text("user")),
                ("referenced_column_name", text(referenced)),
                ("on_delete", text("CASCADE")),
                ("on_update", text("NO ACTION")),
            ])
        };
        let rows = CatalogRows {
            tables: vec![Row::new([("table_name", text("post"))])],
            foreign_keys: vec![fk_row("author_id", "id"), fk_row("author_org", "org")],
            ..CatalogRows::default()
        };
        let tables = assemble(&rows, &DefaultNamingStrategy::new());
        let fk = &tables[0].foreign_keys[0];
        assert_eq!(fk.column_names, vec!["author_id", "author_org"]);
        assert_eq!(fk.referenced_column_names, vec!["id", "org"]);
        assert_eq!(fk.on_delete, Some(ForeignKeyAction::Cascade));
        assert_eq!(fk.on_update, None);
    }

    #[test]
    fn test_strip_parentheses() {
        assert_eq!(strip_parentheses("((0))"), "0");
        assert_eq!(strip_parentheses("(getdate())"), "getdate()");
        assert_eq!(strip_parentheses("(a) + (b)"), "(a) + (b)");
    }

    #[test]
    fn test_enum_check_parsing() {
        assert_eq!(
            enum_check(r#""status" IN ('a','b')"#),
            Some(("status".to_string(), vec!["a".to_string(), "b".to_string()]))
        );
        assert_eq!(
            enum_check("([role]='user' OR [role]='it''s')"),
            Some(("role".to_string(), vec!["user".to_string(), "it's".to_string()]))
        );
        assert!(enum_check("([a]='x' OR [b]='y')").is_none());
        assert!(enum_check("age > 0").is_none());
    }
}
