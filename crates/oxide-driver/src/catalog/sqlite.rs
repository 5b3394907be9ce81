//! SQLite introspection.
//!
//! Columns, indices and foreign keys come from the pragmas. Constraint names,
//! check expressions, enum lists and `AUTOINCREMENT` only exist in the stored
//! `CREATE TABLE` text, which is split into its top-level definitions and
//! read back here.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use oxide_ddl::schema::{
    GeneratedType, GenerationStrategy, Table, TableCheck, TableColumn, TableForeignKey,
    TableIndex, TableUnique,
};
use oxide_ddl::value::SqlValue;

use super::{action, enum_check, mark_unique_columns};
use crate::bookkeeper;
use crate::connection::Row;
use crate::error::Result;
use crate::runner::QueryRunner;

static COLUMN_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([^(]+?)\s*(?:\(\s*(\d+|max)\s*(?:,\s*(\d+)\s*)?\))?\s*$")
        .expect("Invalid column type regex")
});

static INDEX_WHERE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\)\s+WHERE\s+(.+)$").expect("Invalid index regex"));

static COLLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bCOLLATE\s+(\w+)").expect("Invalid collate regex"));

/// What the stored `CREATE TABLE` text says about one table.
#[derive(Debug, Default, PartialEq)]
struct Definition {
    /// Column name to its definition text.
    columns: BTreeMap<String, String>,
    uniques: Vec<(String, Vec<String>)>,
    checks: Vec<(String, String)>,
    foreign_keys: Vec<(String, Vec<String>)>,
}

pub(super) async fn load_tables(
    runner: &QueryRunner,
    filter: Option<&[Table]>,
) -> Result<Vec<Table>> {
    let mut databases: Vec<Option<String>> = match filter {
        Some(tables) => tables.iter().map(|t| t.database.clone()).collect(),
        None => vec![None],
    };
    databases.dedup();

    let mut tables = Vec::new();
    for database in databases {
        let master = runner
            .dialect()
            .escape_path(database.as_deref(), None, "sqlite_master");
        let rows = runner
            .query_rows(format!(
                "SELECT \"name\", \"sql\" FROM {master} WHERE \"type\" = 'table' AND \"name\" NOT LIKE 'sqlite_%' ORDER BY \"name\""
            ))
            .await?;
        for row in rows {
            let (Some(name), Some(sql)) = (row.get_string("name"), row.get_string("sql")) else {
                continue;
            };
            let wanted = filter.is_none_or(|f| {
                f.iter()
                    .any(|t| t.name == name && t.database == database)
            });
            if !wanted {
                continue;
            }
            let mut table = Table::new(name);
            table.database.clone_from(&database);
            load_table(runner, &mut table, &sql).await?;
            tables.push(table);
        }
    }
    Ok(tables)
}

fn pragma(function: &str, table: &Table, argument: &str) -> oxide_ddl::query::Query {
    let mut parameters = vec![SqlValue::Text(argument.to_string())];
    let placeholders = match &table.database {
        Some(database) => {
            parameters.push(SqlValue::Text(database.clone()));
            "?, ?"
        }
        None => "?",
    };
    oxide_ddl::query::Query::with_parameters(
        format!("SELECT * FROM pragma_{function}({placeholders})"),
        parameters,
    )
}

async fn load_table(runner: &QueryRunner, table: &mut Table, sql: &str) -> Result<()> {
    let definition = parse_definition(sql);
    let rows = runner
        .query_rows(pragma("table_xinfo", table, &table.name))
        .await?;

    let mut primary: Vec<(i64, String)> = Vec::new();
    for row in &rows {
        let Some(column) =
            pragma_column(row, &definition, runner.dialect().with_length_column_types())
        else {
            continue;
        };
        let position = row.get_i64("pk").unwrap_or(0);
        if position > 0 {
            primary.push((position, column.name.clone()));
        }
        table.columns.push(column);
    }
    primary.sort();
    for (_, name) in &primary {
        if let Some(column) = table.find_column_mut(name) {
            column.is_primary = true;
        }
    }

    if table.columns.iter().any(|c| c.generated_type.is_some()) {
        let expressions = bookkeeper::generated_columns(runner, table).await?;
        for column in &mut table.columns {
            if let Some(expression) = expressions.get(&column.name) {
                column.as_expression = Some(expression.clone());
            }
        }
    }

    load_indices(runner, table, &definition).await?;
    table.checks = definition
        .checks
        .iter()
        .map(|(name, expression)| TableCheck::new(expression.clone()).named(name.clone()))
        .collect();
    load_foreign_keys(runner, table, &definition).await?;
    mark_unique_columns(table);
    Ok(())
}

fn pragma_column(
    row: &Row,
    definition: &Definition,
    with_length: &[&str],
) -> Option<TableColumn> {
    let name = row.get_string("name")?;
    let declared = row.get_string("type").unwrap_or_default();
    let (column_type, size, scale) = parse_type(&declared);

    let mut column = TableColumn::new(name, column_type);
    if let Some(size) = size {
        if with_length.contains(&column.column_type.as_str()) {
            column.length = Some(size);
        } else {
            column.precision = size.parse().ok();
            column.scale = scale;
        }
    }
    column.is_nullable = row.get_i64("notnull") == Some(0);
    column.default = row.get_string("dflt_value");

    match row.get_i64("hidden") {
        Some(2) => column.generated_type = Some(GeneratedType::Virtual),
        Some(3) => column.generated_type = Some(GeneratedType::Stored),
        _ => {}
    }

    if let Some(text) = definition.columns.get(&column.name) {
        let upper = text.to_ascii_uppercase();
        if upper.contains(" AUTOINCREMENT") {
            column.is_generated = true;
            column.generation_strategy = Some(GenerationStrategy::Increment);
        }
        if let Some(check) = inline_check(text) {
            if let Some((_, values)) = enum_check(&check) {
                column.enum_values = Some(values);
            }
        }
        if let Some(collation) = COLLATE.captures(text).and_then(|c| c.get(1)) {
            column.collation = Some(collation.as_str().to_string());
        }
        if column.generated_type.is_some() {
            column.as_expression = generated_expression(text);
        }
    }
    Some(column)
}

async fn load_indices(runner: &QueryRunner, table: &mut Table, definition: &Definition) -> Result<()> {
    let master = runner
        .dialect()
        .escape_path(table.database.as_deref(), None, "sqlite_master");
    let list = runner
        .query_rows(pragma("index_list", table, &table.name))
        .await?;

    for entry in &list {
        let Some(name) = entry.get_string("name") else {
            continue;
        };
        let origin = entry.get_string("origin").unwrap_or_default();
        if origin == "pk" {
            continue;
        }
        let mut info = runner
            .query_rows(pragma("index_info", table, &name))
            .await?;
        info.sort_by_key(|r| r.get_i64("seqno").unwrap_or(0));
        let columns: Vec<String> = info.iter().filter_map(|r| r.get_string("name")).collect();

        if origin == "u" {
            let named = definition
                .uniques
                .iter()
                .find(|(_, cols)| *cols == columns)
                .map_or_else(|| name.clone(), |(n, _)| n.clone());
            table.uniques.push(TableUnique::new(columns).named(named));
            continue;
        }

        let mut index = TableIndex::new(columns).named(name.clone());
        index.is_unique = entry.get_flag("unique");
        if entry.get_flag("partial") {
            let rows = runner
                .query_rows(oxide_ddl::query::Query::with_parameters(
                    format!("SELECT \"sql\" FROM {master} WHERE \"type\" = 'index' AND \"name\" = ?"),
                    vec![SqlValue::Text(name)],
                ))
                .await?;
            index.where_clause = rows
                .first()
                .and_then(|r| r.get_str("sql"))
                .and_then(|sql| INDEX_WHERE.captures(sql))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string());
        }
        table.indices.push(index);
    }
    table
        .indices
        .sort_by(|a, b| a.name.cmp(&b.name));
    Ok(())
}

async fn load_foreign_keys(
    runner: &QueryRunner,
    table: &mut Table,
    definition: &Definition,
) -> Result<()> {
    let rows = runner
        .query_rows(pragma("foreign_key_list", table, &table.name))
        .await?;

    let mut grouped: BTreeMap<i64, Vec<&Row>> = BTreeMap::new();
    for row in &rows {
        grouped.entry(row.get_i64("id").unwrap_or(0)).or_default().push(row);
    }

    // pragma_foreign_key_list numbers keys in reverse declaration order.
    for group in grouped.values_mut().rev() {
        group.sort_by_key(|r| r.get_i64("seq").unwrap_or(0));
        let Some(first) = group.first() else {
            continue;
        };
        let columns: Vec<String> = group.iter().filter_map(|r| r.get_string("from")).collect();
        let referenced: Vec<String> = group.iter().filter_map(|r| r.get_string("to")).collect();
        let mut foreign_key = TableForeignKey::new(
            columns.clone(),
            first.get_string("table").unwrap_or_default(),
            referenced,
        );
        foreign_key.name = definition
            .foreign_keys
            .iter()
            .find(|(_, cols)| *cols == columns)
            .map(|(n, _)| n.clone());
        foreign_key.on_delete = action(first.get_str("on_delete"));
        foreign_key.on_update = action(first.get_str("on_update"));
        table.foreign_keys.push(foreign_key);
    }
    Ok(())
}

// ----- CREATE TABLE text -----

/// Splits `declared` (`varchar(255)`, `numeric(10,2)`) into the lowercase
/// type, its first size argument and its scale.
fn parse_type(declared: &str) -> (String, Option<String>, Option<u32>) {
    let Some(captures) = COLUMN_TYPE.captures(declared) else {
        return (declared.to_ascii_lowercase(), None, None);
    };
    let base = captures
        .get(1)
        .map_or_else(String::new, |m| m.as_str().to_ascii_lowercase());
    let size = captures.get(2).map(|m| m.as_str().to_string());
    let scale = captures.get(3).and_then(|m| m.as_str().parse().ok());
    (base, size, scale)
}

fn parse_definition(sql: &str) -> Definition {
    let mut definition = Definition::default();
    for part in split_definitions(sql) {
        let trimmed = part.trim();
        let upper = trimmed.to_ascii_uppercase();
        if let Some(rest) = upper.strip_prefix("CONSTRAINT ") {
            let offset = trimmed.len() - rest.len();
            let (name, remainder) = take_identifier(&trimmed[offset..]);
            let remainder = remainder.trim_start();
            let keyword = remainder.to_ascii_uppercase();
            if keyword.starts_with("UNIQUE") {
                definition
                    .uniques
                    .push((name, identifier_list(&remainder["UNIQUE".len()..])));
            } else if keyword.starts_with("CHECK") {
                if let Some(expression) = parenthesized(&remainder["CHECK".len()..]) {
                    definition.checks.push((name, expression));
                }
            } else if keyword.starts_with("FOREIGN KEY") {
                definition
                    .foreign_keys
                    .push((name, identifier_list(&remainder["FOREIGN KEY".len()..])));
            }
        } else if !upper.starts_with("PRIMARY KEY")
            && !upper.starts_with("UNIQUE")
            && !upper.starts_with("CHECK")
            && !upper.starts_with("FOREIGN KEY")
        {
            let (name, _) = take_identifier(trimmed);
            definition.columns.insert(name, trimmed.to_string());
        }
    }
    definition
}

/// Top-level comma-separated parts between the outer parentheses of a
/// `CREATE TABLE` statement.
fn split_definitions(sql: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0_u32;
    let mut quote: Option<char> = None;
    let mut started = false;

    for ch in sql.chars() {
        if let Some(q) = quote {
            if started {
                current.push(ch);
            }
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                if started {
                    current.push(ch);
                }
            }
            '(' => {
                depth += 1;
                if depth == 1 && !started {
                    started = true;
                    continue;
                }
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && started {
                    parts.push(std::mem::take(&mut current));
                    break;
                }
                current.push(ch);
            }
            ',' if depth == 1 && started => parts.push(std::mem::take(&mut current)),
            _ if started => current.push(ch),
            _ => {}
        }
    }
    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Reads a leading identifier, quoted or bare, and returns it with the rest.
fn take_identifier(text: &str) -> (String, &str) {
    let text = text.trim_start();
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, open @ ('"' | '`' | '['))) => {
            let close = if open == '[' { ']' } else { open };
            let mut name = String::new();
            let mut iter = text[1..].char_indices().peekable();
            while let Some((i, ch)) = iter.next() {
                if ch == close {
                    if close != ']' && iter.peek().is_some_and(|(_, c)| *c == close) {
                        name.push(ch);
                        iter.next();
                        continue;
                    }
                    return (name, &text[i + 2..]);
                }
                name.push(ch);
            }
            (name, "")
        }
        _ => {
            let end = text
                .find(|c: char| c.is_whitespace() || c == '(')
                .unwrap_or(text.len());
            (text[..end].to_string(), &text[end..])
        }
    }
}

/// Identifiers of the first parenthesized list in `text`.
fn identifier_list(text: &str) -> Vec<String> {
    parenthesized(text)
        .map(|inner| {
            inner
                .split(',')
                .map(|part| take_identifier(part).0)
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Contents of the first balanced parenthesized group in `text`.
fn parenthesized(text: &str) -> Option<String> {
    let start = text.find('(')?;
    let mut depth = 0_u32;
    let mut quote: Option<char> = None;
    for (i, ch) in text[start..].char_indices() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start + 1..start + i].trim().to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Expression of an inline column `CHECK`.
fn inline_check(column_definition: &str) -> Option<String> {
    let position = column_definition.to_ascii_uppercase().find(" CHECK")?;
    parenthesized(&column_definition[position + " CHECK".len()..])
}

/// Expression of a generated column definition (`AS (expr)`).
fn generated_expression(column_definition: &str) -> Option<String> {
    let upper = column_definition.to_ascii_uppercase();
    let position = upper.find(" AS (").or_else(|| upper.find(" AS("))?;
    parenthesized(&column_definition[position + " AS".len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_SQL: &str = r#"CREATE TABLE "user" ("id" integer PRIMARY KEY AUTOINCREMENT NOT NULL, "email" varchar(255) NOT NULL, "role" varchar CHECK( "role" IN ('admin','user') ) NOT NULL, "full" varchar AS ("email" || ',(x)') VIRTUAL, CONSTRAINT "UQ_email" UNIQUE ("email"), CONSTRAINT "CHK_age" CHECK ("id" > (0)), CONSTRAINT "FK_org" FOREIGN KEY ("org_id", "org_kind") REFERENCES "org" ("id", "kind"))"#;

    #[test]
    fn test_split_definitions_respects_nesting() {
        let parts = split_definitions(USER_SQL);
        assert_eq!(parts.len(), 7);
        assert!(parts[3].contains(",(x)"));
        assert!(parts[5].starts_with("CONSTRAINT \"CHK_age\""));
    }

    #[test]
    fn test_parse_definition() {
        let definition = parse_definition(USER_SQL);
        assert_eq!(definition.columns.len(), 4);
        assert!(definition.columns["id"].contains("AUTOINCREMENT"));
        assert_eq!(
            definition.uniques,
            vec![("UQ_email".to_string(), vec!["email".to_string()])]
        );
        assert_eq!(
            definition.checks,
            vec![("CHK_age".to_string(), "\"id\" > (0)".to_string())]
        );
        assert_eq!(
            definition.foreign_keys,
            vec![(
                "FK_org".to_string(),
                vec!["org_id".to_string(), "org_kind".to_string()]
            )]
        );
    }

    #[test]
    fn test_column_text_helpers() {
        let definition = parse_definition(USER_SQL);
        let role = &definition.columns["role"];
        assert_eq!(
            inline_check(role).and_then(|c| enum_check(&c)),
            Some((
                "role".to_string(),
                vec!["admin".to_string(), "user".to_string()]
            ))
        );
        assert_eq!(
            generated_expression(&definition.columns["full"]).as_deref(),
            Some("\"email\" || ',(x)'")
        );
    }

    #[test]
    fn test_parse_type() {
        assert_eq!(
            parse_type("varchar(255)"),
            ("varchar".to_string(), Some("255".to_string()), None)
        );
        assert_eq!(
            parse_type("numeric(10, 2)"),
            ("numeric".to_string(), Some("10".to_string()), Some(2))
        );
        assert_eq!(parse_type("BIGINT"), ("bigint".to_string(), None, None));
    }

    #[test]
    fn test_take_identifier_unescapes_quotes() {
        assert_eq!(take_identifier(r#""a""b" rest"#), ("a\"b".to_string(), " rest"));
        assert_eq!(take_identifier("plain int"), ("plain".to_string(), " int"));
    }
}
