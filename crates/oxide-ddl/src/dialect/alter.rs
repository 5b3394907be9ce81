//! In-place `ALTER TABLE` planning.
//!
//! SQL Server and Oracle change tables without rebuilding them. They share the
//! planning below and differ only in the handful of statements exposed by
//! [`InPlaceAlter`].

use crate::error::{DdlError, Result};
use crate::query::{Query, SqlInMemory};
use crate::schema::{Table, TableColumn, TableUnique};

use super::common::{self, ConstraintRename};
use super::{BuildContext, SchemaChange, SchemaDialect};

/// Parts of a column definition to render.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnSql {
    pub enum_check: bool,
    pub identity: bool,
    pub default: bool,
}

impl ColumnSql {
    pub(crate) const FULL: Self = Self {
        enum_check: true,
        identity: true,
        default: true,
    };

    /// Column re-added after a drop; its named constraints follow separately.
    pub(crate) const BARE: Self = Self {
        enum_check: false,
        identity: true,
        default: false,
    };

    pub(crate) const ALTER: Self = Self {
        enum_check: false,
        identity: false,
        default: false,
    };
}

/// A named constraint owned by a single column and rendered inline with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnConstraint {
    pub name: String,
    pub clause: String,
}

/// Statements that differ between in-place engines.
pub(crate) trait InPlaceAlter: SchemaDialect {
    /// Column definition as used in `CREATE TABLE` and `ADD`.
    fn column_definition(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        column: &TableColumn,
        parts: ColumnSql,
    ) -> String;

    /// Named constraints the column definition creates inline.
    fn column_constraints(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        column: &TableColumn,
    ) -> Vec<ColumnConstraint> {
        let _ = (ctx, table, column);
        Vec::new()
    }

    fn rename_table_sql(&self, table: &Table, new_name: &str) -> Query;

    fn rename_column_sql(&self, table: &Table, old: &str, new: &str) -> Query;

    /// Renames a constraint or index of `table`.
    fn rename_object_sql(&self, table: &Table, rename: &ConstraintRename) -> Query;

    /// Changes type, nullability and (if covered) default of `old` to `new`.
    fn modify_column_sql(
        &self,
        ctx: &BuildContext<'_>,
        table: &Table,
        old: &TableColumn,
        new: &TableColumn,
    ) -> Query;

    /// Whether [`Self::modify_column_sql`] also changes the default.
    fn modify_covers_default(&self) -> bool;
}

fn add_constraint(dialect: &dyn SchemaDialect, table: &Table, clause: &str) -> Query {
    Query::new(format!("ALTER TABLE {} ADD {clause}", dialect.table_name(table)))
}

fn drop_constraint(dialect: &dyn SchemaDialect, table: &Table, name: &str) -> Query {
    Query::new(format!(
        "ALTER TABLE {} DROP CONSTRAINT {}",
        dialect.table_name(table),
        dialect.quote_identifier(name)
    ))
}

fn primary_key_clause(dialect: &dyn SchemaDialect, name: &str, columns: &[String]) -> String {
    format!(
        "CONSTRAINT {} PRIMARY KEY ({})",
        dialect.quote_identifier(name),
        common::quoted_columns(dialect, columns)
    )
}

fn add_primary_key(
    dialect: &dyn SchemaDialect,
    ctx: &BuildContext<'_>,
    table: &Table,
    columns: &[String],
    sql: &mut SqlInMemory,
) {
    let name = common::primary_key_name(ctx, table, columns);
    sql.push(
        add_constraint(dialect, table, &primary_key_clause(dialect, &name, columns)),
        drop_constraint(dialect, table, &name),
    );
}

fn drop_primary_key_sql(
    dialect: &dyn SchemaDialect,
    ctx: &BuildContext<'_>,
    table: &Table,
    columns: &[String],
    sql: &mut SqlInMemory,
) {
    let name = common::primary_key_name(ctx, table, columns);
    sql.push(
        drop_constraint(dialect, table, &name),
        add_constraint(dialect, table, &primary_key_clause(dialect, &name, columns)),
    );
}

pub(crate) fn create_table_sql<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    ctx: &BuildContext<'_>,
    table: &Table,
    include_foreign_keys: bool,
) -> Result<Query> {
    let d = dialect.as_dyn();
    let mut parts: Vec<String> = table
        .columns
        .iter()
        .map(|c| dialect.column_definition(ctx, table, c, ColumnSql::FULL))
        .collect();
    parts.extend(table.uniques.iter().map(|u| common::unique_clause(d, u)));
    parts.extend(table.checks.iter().map(|c| common::check_clause(d, c)));
    if include_foreign_keys {
        for foreign_key in &table.foreign_keys {
            parts.push(dialect.foreign_key_clause(foreign_key)?);
        }
    }
    let primary = table.primary_column_names();
    if !primary.is_empty() {
        let name = common::primary_key_name(ctx, table, &primary);
        parts.push(primary_key_clause(d, &name, &primary));
    }
    Ok(Query::new(format!(
        "CREATE TABLE {} ({})",
        dialect.table_name(table),
        parts.join(", ")
    )))
}

pub(crate) fn create_table<D: InPlaceAlter + ?Sized>(
    dialect: &D,
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
    sql.push(
        create_table_sql(dialect, ctx, &named, true)?,
        Query::new(format!("DROP TABLE {}", dialect.table_name(&named))),
    );
    for index in &named.indices {
        sql.push(
            dialect.create_index_sql(&named, index)?,
            dialect.drop_index_sql(&named, index),
        );
    }
    sql.extend(common::generated_column_changes(
        ctx,
        dialect.as_dyn(),
        None,
        Some(&named),
    ));
    named.just_created = true;
    Ok(SchemaChange::new(sql, named))
}

pub(crate) fn drop_table<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    ctx: &BuildContext<'_>,
    table: &Table,
    drop_foreign_keys: bool,
    drop_indices: bool,
) -> Result<SqlInMemory> {
    let d = dialect.as_dyn();
    let mut sql = common::generated_column_changes(ctx, d, Some(table), None);
    if drop_foreign_keys {
        for foreign_key in &table.foreign_keys {
            if let Some(name) = &foreign_key.name {
                sql.push_up(drop_constraint(d, table, name));
            }
        }
    }
    if drop_indices {
        for index in &table.indices {
            sql.push(
                dialect.drop_index_sql(table, index),
                dialect.create_index_sql(table, index)?,
            );
        }
    }
    sql.push(
        Query::new(format!("DROP TABLE {}", dialect.table_name(table))),
        create_table_sql(dialect, ctx, table, drop_foreign_keys)?,
    );
    Ok(sql)
}

/// Column constraints present before and not after, and the other way round.
fn column_constraint_diff<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    ctx: &BuildContext<'_>,
    old: (&Table, &TableColumn),
    new: (&Table, &TableColumn),
) -> (Vec<ColumnConstraint>, Vec<ColumnConstraint>) {
    let before = dialect.column_constraints(ctx, old.0, old.1);
    let after = dialect.column_constraints(ctx, new.0, new.1);
    let stale = before.iter().filter(|c| !after.contains(c)).cloned().collect();
    let fresh = after.iter().filter(|c| !before.contains(c)).cloned().collect();
    (stale, fresh)
}

pub(crate) fn rename_table<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    ctx: &BuildContext<'_>,
    table: &Table,
    new_name: &str,
) -> Result<SchemaChange> {
    let d = dialect.as_dyn();
    let mut next = table.clone();
    next.name = new_name.to_string();

    let mut stale_all = Vec::new();
    let mut fresh_all = Vec::new();
    for (before, after) in table.columns.iter().zip(&next.columns) {
        let (stale, fresh) = column_constraint_diff(dialect, ctx, (table, before), (&next, after));
        stale_all.extend(stale);
        fresh_all.extend(fresh);
    }

    let mut sql = SqlInMemory::new();
    for constraint in &stale_all {
        sql.push(
            drop_constraint(d, table, &constraint.name),
            add_constraint(d, table, &constraint.clause),
        );
    }
    sql.push(
        dialect.rename_table_sql(table, new_name),
        dialect.rename_table_sql(&next, &table.name),
    );
    for rename in common::rename_auto_named(ctx, table, &mut next) {
        sql.push(
            dialect.rename_object_sql(&next, &rename),
            dialect.rename_object_sql(&next, &rename.reversed()),
        );
    }
    for constraint in &fresh_all {
        sql.push(
            add_constraint(d, &next, &constraint.clause),
            drop_constraint(d, &next, &constraint.name),
        );
    }
    sql.extend(common::generated_column_changes(ctx, d, Some(table), Some(&next)));
    Ok(SchemaChange::new(sql, next))
}

pub(crate) fn add_columns<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    ctx: &BuildContext<'_>,
    table: &Table,
    columns: &[TableColumn],
) -> Result<SchemaChange> {
    let d = dialect.as_dyn();
    let mut next = table.clone();
    let mut sql = SqlInMemory::new();

    for column in columns {
        if next.find_column(&column.name).is_some() {
            return Err(DdlError::ColumnExists {
                table: table.name.clone(),
                column: column.name.clone(),
            });
        }
        sql.push(
            Query::new(format!(
                "ALTER TABLE {} ADD {}",
                dialect.table_name(&next),
                dialect.column_definition(ctx, &next, column, ColumnSql::FULL)
            )),
            Query::new(format!(
                "ALTER TABLE {} DROP COLUMN {}",
                dialect.table_name(&next),
                dialect.quote_identifier(&column.name)
            )),
        );
        for constraint in dialect.column_constraints(ctx, &next, column) {
            sql.push_down(drop_constraint(d, &next, &constraint.name));
        }

        let previous = next.clone();
        let previous_primary = previous.primary_column_names();
        let mut added = column.clone();
        added.is_unique = false;
        next.columns.push(added);

        if column.is_primary {
            if !previous_primary.is_empty() {
                drop_primary_key_sql(d, ctx, &previous, &previous_primary, &mut sql);
            }
            add_primary_key(d, ctx, &next, &next.primary_column_names(), &mut sql);
        }
        if column.is_unique {
            let unique = common::named_unique(ctx, &next, &TableUnique::new([column.name.clone()]));
            sql.push(
                add_constraint(d, &next, &common::unique_clause(d, &unique)),
                drop_constraint(d, &next, unique.name.as_deref().unwrap_or_default()),
            );
            next.uniques.push(unique);
        }
    }

    common::mark_unique_columns(&mut next);
    sql.extend(common::generated_column_changes(ctx, d, Some(table), Some(&next)));
    Ok(SchemaChange::new(sql, next))
}

pub(crate) fn drop_columns<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    ctx: &BuildContext<'_>,
    table: &Table,
    columns: &[String],
) -> Result<SchemaChange> {
    let d = dialect.as_dyn();
    let mut next = table.clone();
    let mut sql = SqlInMemory::new();

    for name in columns {
        let column = common::require_column(&next, name)?.clone();
        let covers = |names: &[String]| names.iter().any(|n| n == name);

        if column.is_primary {
            let primary = next.primary_column_names();
            drop_primary_key_sql(d, ctx, &next, &primary, &mut sql);
            let remaining: Vec<String> = primary.into_iter().filter(|c| c != name).collect();
            if !remaining.is_empty() {
                add_primary_key(d, ctx, &next, &remaining, &mut sql);
            }
        }
        for index in next.indices.iter().filter(|i| covers(&i.column_names)) {
            sql.push(
                dialect.drop_index_sql(&next, index),
                dialect.create_index_sql(&next, index)?,
            );
        }
        for unique in next.uniques.iter().filter(|u| covers(&u.column_names)) {
            sql.push(
                drop_constraint(d, &next, unique.name.as_deref().unwrap_or_default()),
                add_constraint(d, &next, &common::unique_clause(d, unique)),
            );
        }
        for check in next.checks.iter().filter(|c| covers(&c.column_names)) {
            sql.push(
                drop_constraint(d, &next, check.name.as_deref().unwrap_or_default()),
                add_constraint(d, &next, &common::check_clause(d, check)),
            );
        }
        for foreign_key in next.foreign_keys.iter().filter(|f| covers(&f.column_names)) {
            sql.push(
                drop_constraint(d, &next, foreign_key.name.as_deref().unwrap_or_default()),
                add_constraint(d, &next, &dialect.foreign_key_clause(foreign_key)?),
            );
        }
        for constraint in dialect.column_constraints(ctx, &next, &column) {
            sql.push(
                drop_constraint(d, &next, &constraint.name),
                add_constraint(d, &next, &constraint.clause),
            );
        }
        sql.push(
            Query::new(format!(
                "ALTER TABLE {} DROP COLUMN {}",
                dialect.table_name(&next),
                dialect.quote_identifier(name)
            )),
            Query::new(format!(
                "ALTER TABLE {} ADD {}",
                dialect.table_name(&next),
                dialect.column_definition(ctx, &next, &column, ColumnSql::BARE)
            )),
        );

        next.indices.retain(|i| !covers(&i.column_names));
        next.uniques.retain(|u| !covers(&u.column_names));
        next.checks.retain(|c| !covers(&c.column_names));
        next.foreign_keys.retain(|f| !covers(&f.column_names));
        next.columns.retain(|c| c.name != *name);
    }

    common::mark_unique_columns(&mut next);
    sql.extend(common::generated_column_changes(ctx, d, Some(table), Some(&next)));
    Ok(SchemaChange::new(sql, next))
}

pub(crate) fn change_columns<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    ctx: &BuildContext<'_>,
    table: &Table,
    changes: &[(String, TableColumn)],
) -> Result<SchemaChange> {
    let d = dialect.as_dyn();
    let mut next = table.clone();
    let mut sql = SqlInMemory::new();

    for (old_name, new_column) in changes {
        let old_column = common::require_column(&next, old_name)?.clone();

        if old_column.requires_replace(new_column) {
            let dropped = drop_columns(dialect, ctx, &next, std::slice::from_ref(old_name))?;
            let added = add_columns(dialect, ctx, &dropped.table, std::slice::from_ref(new_column))?;
            sql.extend(dropped.sql);
            sql.extend(added.sql);
            next = added.table;
            continue;
        }

        let before = next.clone();
        let (stale, fresh) =
            column_constraint_diff(dialect, ctx, (&before, &old_column), (&before, new_column));
        for constraint in &stale {
            sql.push(
                drop_constraint(d, &before, &constraint.name),
                add_constraint(d, &before, &constraint.clause),
            );
        }

        if new_column.name != old_column.name {
            if next.find_column(&new_column.name).is_some() {
                return Err(DdlError::ColumnExists {
                    table: table.name.clone(),
                    column: new_column.name.clone(),
                });
            }
            sql.push(
                dialect.rename_column_sql(&next, old_name, &new_column.name),
                dialect.rename_column_sql(&next, &new_column.name, old_name),
            );
            common::rename_column_in(&mut next, old_name, &new_column.name);
            for rename in common::rename_auto_named(ctx, &before, &mut next) {
                sql.push(
                    dialect.rename_object_sql(&next, &rename),
                    dialect.rename_object_sql(&next, &rename.reversed()),
                );
            }
        }

        if old_column.attributes_changed(new_column, dialect.modify_covers_default()) {
            let mut current = old_column.clone();
            current.name.clone_from(&new_column.name);
            sql.push(
                dialect.modify_column_sql(ctx, &next, &current, new_column),
                dialect.modify_column_sql(ctx, &next, new_column, &current),
            );
        }

        for constraint in &fresh {
            sql.push(
                add_constraint(d, &next, &constraint.clause),
                drop_constraint(d, &next, &constraint.name),
            );
        }

        if new_column.is_primary != old_column.is_primary {
            let primary = next.primary_column_names();
            if !primary.is_empty() {
                drop_primary_key_sql(d, ctx, &next, &primary, &mut sql);
            }
            if let Some(column) = next.find_column_mut(&new_column.name) {
                column.is_primary = new_column.is_primary;
            }
            let primary = next.primary_column_names();
            if !primary.is_empty() {
                add_primary_key(d, ctx, &next, &primary, &mut sql);
            }
        }

        if new_column.is_unique != old_column.is_unique {
            if new_column.is_unique {
                let unique =
                    common::named_unique(ctx, &next, &TableUnique::new([new_column.name.clone()]));
                sql.push(
                    add_constraint(d, &next, &common::unique_clause(d, &unique)),
                    drop_constraint(d, &next, unique.name.as_deref().unwrap_or_default()),
                );
                next.uniques.push(unique);
            } else if let Some(unique) = next
                .uniques
                .iter()
                .find(|u| u.column_names.len() == 1 && u.column_names[0] == new_column.name)
                .cloned()
            {
                let name = unique.name.clone().unwrap_or_default();
                sql.push(
                    drop_constraint(d, &next, &name),
                    add_constraint(d, &next, &common::unique_clause(d, &unique)),
                );
                common::take_unique(&mut next, &name)?;
            }
        }

        if let Some(column) = next.find_column_mut(&new_column.name) {
            *column = new_column.clone();
        }
        common::mark_unique_columns(&mut next);
        sql.extend(common::generated_column_changes(ctx, d, Some(&before), Some(&next)));
    }

    Ok(SchemaChange::new(sql, next))
}

fn require_columns(table: &Table, columns: &[String]) -> Result<()> {
    for column in columns {
        common::require_column(table, column)?;
    }
    Ok(())
}

pub(crate) fn create_primary_key<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    ctx: &BuildContext<'_>,
    table: &Table,
    columns: &[String],
    name: Option<&str>,
) -> Result<SchemaChange> {
    if !table.primary_column_names().is_empty() {
        return Err(DdlError::PrimaryKeyExists(table.name.clone()));
    }
    require_columns(table, columns)?;
    let mut next = table.clone();
    for column in &mut next.columns {
        if columns.contains(&column.name) {
            column.is_primary = true;
            column.primary_key_constraint_name = name.map(str::to_string);
        }
    }
    let mut sql = SqlInMemory::new();
    add_primary_key(dialect.as_dyn(), ctx, &next, columns, &mut sql);
    Ok(SchemaChange::new(sql, next))
}

pub(crate) fn update_primary_keys<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    ctx: &BuildContext<'_>,
    table: &Table,
    columns: &[String],
) -> Result<SchemaChange> {
    require_columns(table, columns)?;
    let d = dialect.as_dyn();
    let mut sql = SqlInMemory::new();
    let current = table.primary_column_names();
    if !current.is_empty() {
        drop_primary_key_sql(d, ctx, table, &current, &mut sql);
    }
    let mut next = table.clone();
    for column in &mut next.columns {
        column.is_primary = columns.contains(&column.name);
    }
    if !columns.is_empty() {
        add_primary_key(d, ctx, &next, columns, &mut sql);
    }
    Ok(SchemaChange::new(sql, next))
}

pub(crate) fn drop_primary_key<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    ctx: &BuildContext<'_>,
    table: &Table,
) -> Result<SchemaChange> {
    let current = table.primary_column_names();
    if current.is_empty() {
        return Err(DdlError::PrimaryKeyNotFound(table.name.clone()));
    }
    let mut sql = SqlInMemory::new();
    drop_primary_key_sql(dialect.as_dyn(), ctx, table, &current, &mut sql);
    let mut next = table.clone();
    for column in &mut next.columns {
        column.is_primary = false;
        column.primary_key_constraint_name = None;
    }
    Ok(SchemaChange::new(sql, next))
}

pub(crate) fn create_unique_constraints<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    ctx: &BuildContext<'_>,
    table: &Table,
    uniques: &[TableUnique],
) -> Result<SchemaChange> {
    let d = dialect.as_dyn();
    let mut next = table.clone();
    let mut sql = SqlInMemory::new();
    for unique in uniques {
        require_columns(table, &unique.column_names)?;
        let unique = common::named_unique(ctx, table, unique);
        sql.push(
            add_constraint(d, table, &common::unique_clause(d, &unique)),
            drop_constraint(d, table, unique.name.as_deref().unwrap_or_default()),
        );
        next.uniques.push(unique);
    }
    common::mark_unique_columns(&mut next);
    Ok(SchemaChange::new(sql, next))
}

pub(crate) fn drop_unique_constraints<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    table: &Table,
    names: &[String],
) -> Result<SchemaChange> {
    let d = dialect.as_dyn();
    let mut next = table.clone();
    let mut sql = SqlInMemory::new();
    for name in names {
        let unique = common::take_unique(&mut next, name)?;
        sql.push(
            drop_constraint(d, table, name),
            add_constraint(d, table, &common::unique_clause(d, &unique)),
        );
    }
    Ok(SchemaChange::new(sql, next))
}

pub(crate) fn create_check_constraints<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    ctx: &BuildContext<'_>,
    table: &Table,
    checks: &[crate::schema::TableCheck],
) -> Result<SchemaChange> {
    let d = dialect.as_dyn();
    let mut next = table.clone();
    let mut sql = SqlInMemory::new();
    for check in checks {
        let check = common::named_check(ctx, table, check);
        sql.push(
            add_constraint(d, table, &common::check_clause(d, &check)),
            drop_constraint(d, table, check.name.as_deref().unwrap_or_default()),
        );
        next.checks.push(check);
    }
    Ok(SchemaChange::new(sql, next))
}

pub(crate) fn drop_check_constraints<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    table: &Table,
    names: &[String],
) -> Result<SchemaChange> {
    let d = dialect.as_dyn();
    let mut next = table.clone();
    let mut sql = SqlInMemory::new();
    for name in names {
        let check = common::take_check(&mut next, name)?;
        sql.push(
            drop_constraint(d, table, name),
            add_constraint(d, table, &common::check_clause(d, &check)),
        );
    }
    Ok(SchemaChange::new(sql, next))
}

pub(crate) fn create_foreign_keys<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    ctx: &BuildContext<'_>,
    table: &Table,
    foreign_keys: &[crate::schema::TableForeignKey],
) -> Result<SchemaChange> {
    let d = dialect.as_dyn();
    let mut next = table.clone();
    let mut sql = SqlInMemory::new();
    for foreign_key in foreign_keys {
        require_columns(table, &foreign_key.column_names)?;
        let foreign_key = common::named_foreign_key(ctx, table, foreign_key);
        sql.push(
            add_constraint(d, table, &dialect.foreign_key_clause(&foreign_key)?),
            drop_constraint(d, table, foreign_key.name.as_deref().unwrap_or_default()),
        );
        next.foreign_keys.push(foreign_key);
    }
    Ok(SchemaChange::new(sql, next))
}

pub(crate) fn drop_foreign_keys<D: InPlaceAlter + ?Sized>(
    dialect: &D,
    table: &Table,
    names: &[String],
) -> Result<SchemaChange> {
    let d = dialect.as_dyn();
    let mut next = table.clone();
    let mut sql = SqlInMemory::new();
    for name in names {
        let foreign_key = common::take_foreign_key(&mut next, name)?;
        sql.push(
            drop_constraint(d, table, name),
            add_constraint(d, table, &dialect.foreign_key_clause(&foreign_key)?),
        );
    }
    Ok(SchemaChange::new(sql, next))
}

/// `ALTER TABLE .. DROP CONSTRAINT` for every foreign key of `tables`.
pub(crate) fn drop_all_foreign_keys(dialect: &dyn SchemaDialect, tables: &[Table]) -> Vec<Query> {
    tables
        .iter()
        .flat_map(|table| {
            table
                .foreign_keys
                .iter()
                .filter_map(|f| f.name.as_deref())
                .map(|name| drop_constraint(dialect, table, name))
        })
        .collect()
}
