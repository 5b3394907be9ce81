//! Planning helpers shared by the dialects.

use crate::error::{DdlError, Result};
use crate::metadata;
use crate::query::SqlInMemory;
use crate::schema::{Table, TableCheck, TableColumn, TableForeignKey, TableIndex, TableUnique};

use super::{BuildContext, SchemaDialect};

/// Kind of object a rename applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConstraintKind {
    PrimaryKey,
    Unique,
    Check,
    ForeignKey,
    Index,
}

/// An auto-named object whose derived name changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConstraintRename {
    pub kind: ConstraintKind,
    pub old: String,
    pub new: String,
}

impl ConstraintRename {
    /// The rename undoing this one.
    pub(crate) fn reversed(&self) -> Self {
        Self {
            kind: self.kind,
            old: self.new.clone(),
            new: self.old.clone(),
        }
    }
}

pub(crate) fn require_column<'t>(table: &'t Table, name: &str) -> Result<&'t TableColumn> {
    table
        .find_column(name)
        .ok_or_else(|| DdlError::ColumnNotFound {
            table: table.name.clone(),
            column: name.to_string(),
        })
}

pub(crate) fn quoted_columns(dialect: &dyn SchemaDialect, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `"col" IN ('a','b')` for enum columns.
pub(crate) fn enum_expression(dialect: &dyn SchemaDialect, column: &TableColumn) -> Option<String> {
    column.enum_values.as_ref().map(|values| {
        let list = values
            .iter()
            .map(|v| string_literal(v))
            .collect::<Vec<_>>()
            .join(",");
        format!("{} IN ({list})", dialect.quote_identifier(&column.name))
    })
}

pub(crate) fn named_index(ctx: &BuildContext<'_>, table: &Table, index: &TableIndex) -> TableIndex {
    let mut index = index.clone();
    if index.name.is_none() {
        index.name = Some(ctx.naming.index_name(
            &table.name,
            &index.column_names,
            index.where_clause.as_deref(),
        ));
    }
    index
}

pub(crate) fn named_unique(ctx: &BuildContext<'_>, table: &Table, unique: &TableUnique) -> TableUnique {
    let mut unique = unique.clone();
    if unique.name.is_none() {
        unique.name = Some(
            ctx.naming
                .unique_constraint_name(&table.name, &unique.column_names),
        );
    }
    unique
}

pub(crate) fn named_check(ctx: &BuildContext<'_>, table: &Table, check: &TableCheck) -> TableCheck {
    let mut check = check.clone();
    if check.name.is_none() {
        check.name = Some(
            ctx.naming
                .check_constraint_name(&table.name, &check.expression, false),
        );
    }
    check
}

pub(crate) fn named_foreign_key(
    ctx: &BuildContext<'_>,
    table: &Table,
    foreign_key: &TableForeignKey,
) -> TableForeignKey {
    let mut foreign_key = foreign_key.clone();
    if foreign_key.name.is_none() {
        foreign_key.name = Some(ctx.naming.foreign_key_name(
            &table.name,
            &foreign_key.column_names,
            &foreign_key.referenced_path(),
            &foreign_key.referenced_column_names,
        ));
    }
    foreign_key
}

/// Primary key name: the user-supplied one or the derived one.
pub(crate) fn primary_key_name(ctx: &BuildContext<'_>, table: &Table, columns: &[String]) -> String {
    table.primary_key_constraint_name().map_or_else(
        || ctx.naming.primary_key_name(&table.name, columns),
        str::to_string,
    )
}

/// Returns a copy of `table` with single-column `is_unique` flags turned into
/// unique constraints and every constraint and index named.
pub(crate) fn with_derived_names(ctx: &BuildContext<'_>, table: &Table) -> Table {
    let mut next = table.clone();
    for column in &table.columns {
        if !column.is_unique {
            continue;
        }
        let exists = next
            .uniques
            .iter()
            .any(|u| u.column_names.len() == 1 && u.column_names[0] == column.name);
        if !exists {
            next.uniques.push(TableUnique::new([column.name.clone()]));
        }
    }
    next.uniques = next
        .uniques
        .iter()
        .map(|u| named_unique(ctx, table, u))
        .collect();
    next.checks = next
        .checks
        .iter()
        .map(|c| named_check(ctx, table, c))
        .collect();
    next.foreign_keys = next
        .foreign_keys
        .iter()
        .map(|f| named_foreign_key(ctx, table, f))
        .collect();
    next.indices = next
        .indices
        .iter()
        .map(|i| named_index(ctx, table, i))
        .collect();
    mark_unique_columns(&mut next);
    next
}

/// Sets `is_unique` exactly on columns covered by a single-column unique.
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

fn not_found(kind: &'static str, table: &Table, name: &str) -> DdlError {
    DdlError::ConstraintNotFound {
        kind,
        table: table.name.clone(),
        name: name.to_string(),
    }
}

pub(crate) fn take_index(table: &mut Table, name: &str) -> Result<TableIndex> {
    let pos = table
        .indices
        .iter()
        .position(|i| i.name.as_deref() == Some(name))
        .ok_or_else(|| not_found("Index", table, name))?;
    Ok(table.indices.remove(pos))
}

pub(crate) fn take_unique(table: &mut Table, name: &str) -> Result<TableUnique> {
    let pos = table
        .uniques
        .iter()
        .position(|u| u.name.as_deref() == Some(name))
        .ok_or_else(|| not_found("Unique constraint", table, name))?;
    let unique = table.uniques.remove(pos);
    mark_unique_columns(table);
    Ok(unique)
}

pub(crate) fn take_check(table: &mut Table, name: &str) -> Result<TableCheck> {
    let pos = table
        .checks
        .iter()
        .position(|c| c.name.as_deref() == Some(name))
        .ok_or_else(|| not_found("Check constraint", table, name))?;
    Ok(table.checks.remove(pos))
}

pub(crate) fn take_foreign_key(table: &mut Table, name: &str) -> Result<TableForeignKey> {
    let pos = table
        .foreign_keys
        .iter()
        .position(|f| f.name.as_deref() == Some(name))
        .ok_or_else(|| not_found("Foreign key", table, name))?;
    Ok(table.foreign_keys.remove(pos))
}

fn constraint_name(name: Option<&String>) -> &str {
    name.map_or("", String::as_str)
}

pub(crate) fn unique_clause(dialect: &dyn SchemaDialect, unique: &TableUnique) -> String {
    format!(
        "CONSTRAINT {} UNIQUE ({})",
        dialect.quote_identifier(constraint_name(unique.name.as_ref())),
        quoted_columns(dialect, &unique.column_names)
    )
}

pub(crate) fn check_clause(dialect: &dyn SchemaDialect, check: &TableCheck) -> String {
    format!(
        "CONSTRAINT {} CHECK ({})",
        dialect.quote_identifier(constraint_name(check.name.as_ref())),
        check.expression
    )
}

pub(crate) fn foreign_key_clause(
    dialect: &dyn SchemaDialect,
    foreign_key: &TableForeignKey,
    allow_on_update: bool,
) -> Result<String> {
    let mut clause = format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        dialect.quote_identifier(constraint_name(foreign_key.name.as_ref())),
        quoted_columns(dialect, &foreign_key.column_names),
        dialect.escape_path(
            foreign_key.referenced_database.as_deref(),
            foreign_key.referenced_schema.as_deref(),
            &foreign_key.referenced_table_name,
        ),
        quoted_columns(dialect, &foreign_key.referenced_column_names)
    );
    if let Some(action) = foreign_key.on_delete {
        clause.push_str(" ON DELETE ");
        clause.push_str(action.to_sql());
    }
    if let Some(action) = foreign_key.on_update {
        if !allow_on_update {
            return Err(DdlError::unsupported(
                dialect.name(),
                "ON UPDATE actions on foreign keys",
            ));
        }
        clause.push_str(" ON UPDATE ");
        clause.push_str(action.to_sql());
    }
    if let Some(deferrable) = foreign_key.deferrable {
        clause.push_str(" DEFERRABLE ");
        clause.push_str(deferrable.to_sql());
    }
    Ok(clause)
}

/// Bookkeeping statements for computed columns that appear, disappear or
/// change expression between `old` and `new`.
pub(crate) fn generated_column_changes(
    ctx: &BuildContext<'_>,
    dialect: &dyn SchemaDialect,
    old: Option<&Table>,
    new: Option<&Table>,
) -> SqlInMemory {
    let computed = |table: Option<&Table>| -> Vec<(String, String)> {
        table
            .map(|t| {
                t.columns
                    .iter()
                    .filter(|c| c.generated_type.is_some())
                    .filter_map(|c| Some((c.name.clone(), c.as_expression.clone()?)))
                    .collect()
            })
            .unwrap_or_default()
    };
    let before = computed(old);
    let after = computed(new);
    let same_owner = matches!((old, new), (Some(o), Some(n)) if o.path() == n.path());
    let mut sql = SqlInMemory::new();

    if let Some(old) = old {
        for (name, expression) in &before {
            if same_owner && after.iter().any(|(n, e)| n == name && e == expression) {
                continue;
            }
            let row = metadata::generated_column_row(old, name, Some(expression));
            sql.push(
                metadata::delete_row(dialect, ctx.metadata, &row),
                metadata::insert_row(dialect, ctx.metadata, &row),
            );
        }
    }
    if let Some(new) = new {
        for (name, expression) in &after {
            if same_owner && before.iter().any(|(n, e)| n == name && e == expression) {
                continue;
            }
            let row = metadata::generated_column_row(new, name, Some(expression));
            sql.push(
                metadata::insert_row(dialect, ctx.metadata, &row),
                metadata::delete_row(dialect, ctx.metadata, &row),
            );
        }
    }
    sql
}

/// Renames a column in place, including every constraint column list.
pub(crate) fn rename_column_in(table: &mut Table, old: &str, new: &str) {
    let rename = |names: &mut Vec<String>| {
        for name in names.iter_mut() {
            if name == old {
                *name = new.to_string();
            }
        }
    };
    if let Some(column) = table.find_column_mut(old) {
        column.name = new.to_string();
    }
    for index in &mut table.indices {
        rename(&mut index.column_names);
    }
    for unique in &mut table.uniques {
        rename(&mut unique.column_names);
    }
    for check in &mut table.checks {
        rename(&mut check.column_names);
    }
    for foreign_key in &mut table.foreign_keys {
        rename(&mut foreign_key.column_names);
    }
}

/// Recomputes the names of auto-named objects after `new` diverged from `old`
/// by table name or column names. Objects whose current name differs from the
/// name derived for `old` were named by the user and keep it.
///
/// Constraint lists of `old` and `new` must be index-aligned.
pub(crate) fn rename_auto_named(
    ctx: &BuildContext<'_>,
    old: &Table,
    new: &mut Table,
) -> Vec<ConstraintRename> {
    let naming = ctx.naming;
    let mut renames = Vec::new();
    let mut record = |kind, current: &Option<String>, derived_old: String, derived_new: String| {
        if current.as_deref() == Some(derived_old.as_str()) && derived_old != derived_new {
            renames.push(ConstraintRename {
                kind,
                old: derived_old,
                new: derived_new.clone(),
            });
            Some(derived_new)
        } else {
            None
        }
    };

    let old_pk = old.primary_column_names();
    if !old_pk.is_empty() && old.primary_key_constraint_name().is_none() {
        let derived_old = naming.primary_key_name(&old.name, &old_pk);
        let derived_new = naming.primary_key_name(&new.name, &new.primary_column_names());
        let _ = record(
            ConstraintKind::PrimaryKey,
            &Some(derived_old.clone()),
            derived_old,
            derived_new,
        );
    }

    for (before, after) in old.uniques.iter().zip(new.uniques.iter_mut()) {
        if let Some(name) = record(
            ConstraintKind::Unique,
            &before.name,
            naming.unique_constraint_name(&old.name, &before.column_names),
            naming.unique_constraint_name(&new.name, &after.column_names),
        ) {
            after.name = Some(name);
        }
    }
    for (before, after) in old.checks.iter().zip(new.checks.iter_mut()) {
        if let Some(name) = record(
            ConstraintKind::Check,
            &before.name,
            naming.check_constraint_name(&old.name, &before.expression, false),
            naming.check_constraint_name(&new.name, &after.expression, false),
        ) {
            after.name = Some(name);
        }
    }
    for (before, after) in old.foreign_keys.iter().zip(new.foreign_keys.iter_mut()) {
        if let Some(name) = record(
            ConstraintKind::ForeignKey,
            &before.name,
            naming.foreign_key_name(
                &old.name,
                &before.column_names,
                &before.referenced_path(),
                &before.referenced_column_names,
            ),
            naming.foreign_key_name(
                &new.name,
                &after.column_names,
                &after.referenced_path(),
                &after.referenced_column_names,
            ),
        ) {
            after.name = Some(name);
        }
    }
    for (before, after) in old.indices.iter().zip(new.indices.iter_mut()) {
        if let Some(name) = record(
            ConstraintKind::Index,
            &before.name,
            naming.index_name(
                &old.name,
                &before.column_names,
                before.where_clause.as_deref(),
            ),
            naming.index_name(&new.name, &after.column_names, after.where_clause.as_deref()),
        ) {
            after.name = Some(name);
        }
    }
    renames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataTable;
    use crate::naming::{DefaultNamingStrategy, NamingStrategy};

    fn ctx_parts() -> (DefaultNamingStrategy, MetadataTable) {
        (DefaultNamingStrategy::new(), MetadataTable::default())
    }

    #[test]
    fn test_derived_names_merge_unique_flags() {
        let (naming, meta) = ctx_parts();
        let ctx = BuildContext::new(&naming, &meta);
        let table = Table::new("user")
            .column(TableColumn::new("id", "integer").primary())
            .column(TableColumn::new("email", "varchar").unique())
            .unique(TableUnique::new(["email"]));
        let named = with_derived_names(&ctx, &table);
        assert_eq!(named.uniques.len(), 1);
        assert!(named.uniques[0].name.as_deref().is_some_and(|n| n.starts_with("UQ_")));
        assert!(named.find_column("email").is_some_and(|c| c.is_unique));
    }

    #[test]
    fn test_rename_keeps_user_names() {
        let (naming, meta) = ctx_parts();
        let ctx = BuildContext::new(&naming, &meta);
        let old = with_derived_names(
            &ctx,
            &Table::new("user")
                .column(TableColumn::new("id", "integer").primary())
                .column(TableColumn::new("email", "varchar"))
                .column(TableColumn::new("nick", "varchar"))
                .unique(TableUnique::new(["email"]))
                .unique(TableUnique::new(["nick"]).named("my_nick_key")),
        );
        let mut new = old.clone();
        new.name = "account".into();
        let renames = rename_auto_named(&ctx, &old, &mut new);

        let kinds: Vec<ConstraintKind> = renames.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, [ConstraintKind::PrimaryKey, ConstraintKind::Unique]);
        assert_eq!(new.uniques[1].name.as_deref(), Some("my_nick_key"));
        assert_eq!(
            new.uniques[0].name,
            Some(naming.unique_constraint_name("account", &["email".to_string()]))
        );
    }

    #[test]
    fn test_rename_column_in_updates_constraints() {
        let mut table = Table::new("t")
            .column(TableColumn::new("a", "int"))
            .index(TableIndex::new(["a"]))
            .unique(TableUnique::new(["a"]));
        rename_column_in(&mut table, "a", "b");
        assert!(table.find_column("b").is_some());
        assert_eq!(table.indices[0].column_names, ["b"]);
        assert_eq!(table.uniques[0].column_names, ["b"]);
    }

    #[test]
    fn test_missing_constraint() {
        let mut table = Table::new("t");
        let err = take_check(&mut table, "nope").unwrap_err();
        assert!(matches!(err, DdlError::ConstraintNotFound { kind: "Check constraint", .. }));
    }
}
