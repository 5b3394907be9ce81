//! Schema operations of the query runner.
//!
//! Each table operation reads the runner's cached snapshot, asks the dialect
//! for a plan, executes and journals it, and then swaps the snapshot for the
//! one the plan produced. A plan that cannot be built leaves the cache
//! untouched; a failed execution drops the snapshot so the next access reads
//! the catalog again.

use tracing::{debug, info, warn};

use oxide_ddl::cache;
use oxide_ddl::dialect::{BuildContext, DatabaseType, SchemaChange, SchemaDialect};
use oxide_ddl::metadata;
use oxide_ddl::query::SqlInMemory;
use oxide_ddl::schema::{
    Table, TableCheck, TableColumn, TableExclusion, TableForeignKey, TableIndex, TableUnique, View,
};

use super::QueryRunner;
use crate::bookkeeper;
use crate::catalog;
use crate::error::{DriverError, Result};

impl QueryRunner {
    /// Splits a dotted name into a table reference for this dialect.
    ///
    /// SQLite reads `a.b` as attached database `a`; the other engines read
    /// it as schema `a`, and `a.b.c` as database, schema and name.
    #[must_use]
    pub fn table_ref(&self, path: &str) -> Table {
        let parts: Vec<&str> = path.split('.').collect();
        let mut table = Table::new(*parts.last().unwrap_or(&path));
        match (self.dialect.database_type(), parts.as_slice()) {
            (DatabaseType::Sqlite, [database, _]) => table.database = Some((*database).into()),
            (_, [schema, _]) => table.schema = Some((*schema).into()),
            (_, [database, schema, _]) => {
                table.database = Some((*database).into());
                table.schema = Some((*schema).into());
            }
            _ => {}
        }
        table
    }

    fn view_ref(&self, path: &str) -> View {
        let table = self.table_ref(path);
        View {
            database: table.database,
            schema: table.schema,
            name: table.name,
            ..View::default()
        }
    }

    async fn exists(&self, query: oxide_ddl::query::Query) -> Result<bool> {
        Ok(!self.query_rows(query).await?.is_empty())
    }

    // ----- introspection -----

    /// Whether the database exists.
    pub async fn has_database(&self, database: &str) -> Result<bool> {
        self.exists(self.dialect.has_database_query(database)?).await
    }

    /// Whether the schema exists.
    pub async fn has_schema(&self, schema: &str) -> Result<bool> {
        self.exists(self.dialect.has_schema_query(schema)?).await
    }

    /// Whether the table exists.
    pub async fn has_table(&self, table: &str) -> Result<bool> {
        self.exists(self.dialect.has_table_query(&self.table_ref(table)))
            .await
    }

    /// Whether the table has the column.
    pub async fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        self.exists(self.dialect.has_column_query(&self.table_ref(table), column))
            .await
    }

    /// Reads one table from the catalog and caches it.
    pub async fn get_table(&self, table: &str) -> Result<Option<Table>> {
        let reference = self.table_ref(table);
        let loaded = catalog::load_tables(self, Some(&[reference]), true).await?;
        let found = loaded.into_iter().next();
        if let Some(found) = &found {
            self.cache_table(Some(table), found.clone()).await;
        }
        Ok(found)
    }

    /// Reads every user table from the catalog and caches them. The
    /// bookkeeping and cache tables are left out.
    pub async fn get_tables(&self) -> Result<Vec<Table>> {
        let tables = catalog::load_tables(self, None, false).await?;
        for table in &tables {
            self.cache_table(None, table.clone()).await;
        }
        Ok(tables)
    }

    /// Cached snapshot of a table, read from the catalog on a miss.
    pub async fn get_cached_table(&self, table: &str) -> Result<Table> {
        if let Some(cached) = self.cached_table(table).await {
            return Ok(cached);
        }
        self.get_table(table)
            .await?
            .ok_or_else(|| DriverError::not_found("Table", table))
    }

    /// Reads one recorded view.
    pub async fn get_view(&self, view: &str) -> Result<Option<View>> {
        if let Some(cached) = self.cached_view(view).await {
            return Ok(Some(cached));
        }
        let reference = self.view_ref(view);
        let found = self
            .get_views()
            .await?
            .into_iter()
            .find(|v| v.name == reference.name && v.schema == reference.schema);
        Ok(found)
    }

    /// Reads every recorded view that still exists.
    pub async fn get_views(&self) -> Result<Vec<View>> {
        let views = bookkeeper::load_views(self).await?;
        for view in &views {
            self.cache_view(view.clone()).await;
        }
        Ok(views)
    }

    // ----- databases and schemas -----

    /// Creates a database. A no-op on SQLite.
    pub async fn create_database(&self, database: &str, if_not_exists: bool) -> Result<()> {
        let plan = self.dialect.create_database(database, if_not_exists)?;
        self.execute_plan(plan).await
    }

    /// Drops a database. A no-op on SQLite.
    pub async fn drop_database(&self, database: &str, if_exists: bool) -> Result<()> {
        let plan = self.dialect.drop_database(database, if_exists)?;
        self.execute_plan(plan).await
    }

    /// Creates a schema.
    pub async fn create_schema(&self, schema: &str, if_not_exists: bool) -> Result<()> {
        let plan = self.dialect.create_schema(schema, if_not_exists)?;
        self.execute_plan(plan).await
    }

    /// Drops a schema.
    pub async fn drop_schema(&self, schema: &str, if_exists: bool, cascade: bool) -> Result<()> {
        let plan = self.dialect.drop_schema(schema, if_exists, cascade)?;
        self.execute_plan(plan).await
    }

    // ----- tables -----

    /// Creates a table. With `if_not_exists` an existing table is left alone
    /// and nothing is executed or journaled.
    pub async fn create_table(
        &self,
        table: Table,
        if_not_exists: bool,
        create_foreign_keys: bool,
        create_indices: bool,
    ) -> Result<()> {
        if if_not_exists && self.has_table(&table.path()).await? {
            debug!(table = %table.path(), "Table exists, skipping create");
            return Ok(());
        }
        let change = {
            let ctx = self.build_context();
            self.dialect
                .create_table(&ctx, &table, create_foreign_keys, create_indices)?
        };
        self.apply(None, change).await
    }

    /// Drops a table. With `if_exists` a missing table is not an error.
    pub async fn drop_table(
        &self,
        table: &str,
        if_exists: bool,
        drop_foreign_keys: bool,
        drop_indices: bool,
    ) -> Result<()> {
        if if_exists && !self.has_table(table).await? {
            return Ok(());
        }
        let current = self.get_cached_table(table).await?;
        let plan = {
            let ctx = self.build_context();
            self.dialect
                .drop_table(&ctx, &current, drop_foreign_keys, drop_indices)?
        };
        self.ensure_metadata_for(&plan).await?;
        self.execute_plan(plan).await?;
        self.forget_table(table).await;
        self.forget_table(&current.path()).await;
        Ok(())
    }

    /// Renames a table together with its auto-named constraints.
    pub async fn rename_table(&self, table: &str, new_name: &str) -> Result<()> {
        self.alter(table, |d, ctx, t| d.rename_table(ctx, t, new_name))
            .await
    }

    /// Empties a table. Not journaled.
    pub async fn clear_table(&self, table: &str) -> Result<()> {
        self.query(self.dialect.clear_table(&self.table_ref(table)))
            .await?;
        Ok(())
    }

    /// Drops every table and view in the database, bookkeeping included.
    ///
    /// Foreign key enforcement is switched off around the drops on engines
    /// that need it. The drops run in one transaction; a failure rolls it
    /// back and is returned. Not journaled.
    pub async fn clear_database(&self) -> Result<()> {
        let tables = catalog::load_tables(self, None, true).await?;
        let views = catalog::load_view_names(self).await?;
        let statements = {
            let ctx = self.build_context();
            self.dialect.clear_database(&ctx, &tables, &views)?
        };
        info!(
            tables = tables.len(),
            views = views.len(),
            "Clearing database"
        );

        if let Some(off) = self.dialect.foreign_key_checks_sql(false) {
            self.query(off).await?;
        }
        let outcome = self.run_statements(&statements).await;
        if let Some(on) = self.dialect.foreign_key_checks_sql(true) {
            if let Err(e) = self.query(on).await {
                if outcome.is_ok() {
                    return Err(e);
                }
                warn!(error = %e, "Failed to re-enable foreign key checks");
            }
        }
        self.invalidate_cache().await;
        outcome
    }

    // ----- columns -----

    /// Adds a column.
    pub async fn add_column(&self, table: &str, column: TableColumn) -> Result<()> {
        self.add_columns(table, vec![column]).await
    }

    /// Adds columns.
    pub async fn add_columns(&self, table: &str, columns: Vec<TableColumn>) -> Result<()> {
        self.alter(table, |d, ctx, t| d.add_columns(ctx, t, &columns))
            .await
    }

    /// Renames a column.
    pub async fn rename_column(&self, table: &str, old_name: &str, new_name: &str) -> Result<()> {
        self.alter(table, |d, ctx, t| d.rename_column(ctx, t, old_name, new_name))
            .await
    }

    /// Changes a column to a new definition.
    pub async fn change_column(&self, table: &str, column: &str, new: TableColumn) -> Result<()> {
        self.change_columns(table, vec![(column.to_string(), new)])
            .await
    }

    /// Changes columns; each pair is `(current name, new definition)`.
    pub async fn change_columns(
        &self,
        table: &str,
        changes: Vec<(String, TableColumn)>,
    ) -> Result<()> {
        self.alter(table, |d, ctx, t| d.change_columns(ctx, t, &changes))
            .await
    }

    /// Drops a column.
    pub async fn drop_column(&self, table: &str, column: &str) -> Result<()> {
        self.drop_columns(table, vec![column.to_string()]).await
    }

    /// Drops columns.
    pub async fn drop_columns(&self, table: &str, columns: Vec<String>) -> Result<()> {
        self.alter(table, |d, ctx, t| d.drop_columns(ctx, t, &columns))
            .await
    }

    // ----- keys and constraints -----

    /// Creates the primary key.
    pub async fn create_primary_key(
        &self,
        table: &str,
        columns: Vec<String>,
        name: Option<&str>,
    ) -> Result<()> {
        self.alter(table, |d, ctx, t| d.create_primary_key(ctx, t, &columns, name))
            .await
    }

    /// Replaces the primary key columns.
    pub async fn update_primary_keys(&self, table: &str, columns: Vec<String>) -> Result<()> {
        self.alter(table, |d, ctx, t| d.update_primary_keys(ctx, t, &columns))
            .await
    }

    /// Drops the primary key.
    pub async fn drop_primary_key(&self, table: &str) -> Result<()> {
        self.alter(table, |d, ctx, t| d.drop_primary_key(ctx, t))
            .await
    }

    /// Creates a unique constraint.
    pub async fn create_unique_constraint(&self, table: &str, unique: TableUnique) -> Result<()> {
        self.create_unique_constraints(table, vec![unique]).await
    }

    /// Creates unique constraints.
    pub async fn create_unique_constraints(
        &self,
        table: &str,
        uniques: Vec<TableUnique>,
    ) -> Result<()> {
        self.alter(table, |d, ctx, t| d.create_unique_constraints(ctx, t, &uniques))
            .await
    }

    /// Drops a unique constraint by name.
    pub async fn drop_unique_constraint(&self, table: &str, name: &str) -> Result<()> {
        self.drop_unique_constraints(table, vec![name.to_string()])
            .await
    }

    /// Drops unique constraints by name.
    pub async fn drop_unique_constraints(&self, table: &str, names: Vec<String>) -> Result<()> {
        self.alter(table, |d, ctx, t| d.drop_unique_constraints(ctx, t, &names))
            .await
    }

    /// Creates a check constraint.
    pub async fn create_check_constraint(&self, table: &str, check: TableCheck) -> Result<()> {
        self.create_check_constraints(table, vec![check]).await
    }

    /// Creates check constraints.
    pub async fn create_check_constraints(
        &self,
        table: &str,
        checks: Vec<TableCheck>,
    ) -> Result<()> {
        self.alter(table, |d, ctx, t| d.create_check_constraints(ctx, t, &checks))
            .await
    }

    /// Drops a check constraint by name.
    pub async fn drop_check_constraint(&self, table: &str, name: &str) -> Result<()> {
        self.drop_check_constraints(table, vec![name.to_string()])
            .await
    }

    /// Drops check constraints by name.
    pub async fn drop_check_constraints(&self, table: &str, names: Vec<String>) -> Result<()> {
        self.alter(table, |d, ctx, t| d.drop_check_constraints(ctx, t, &names))
            .await
    }

    /// Exclusion constraints are rejected by every supported engine.
    pub async fn create_exclusion_constraint(
        &self,
        table: &str,
        exclusion: TableExclusion,
    ) -> Result<()> {
        let reference = self.table_ref(table);
        let change = {
            let ctx = self.build_context();
            self.dialect
                .create_exclusion_constraints(&ctx, &reference, &[exclusion])?
        };
        self.apply(Some(table), change).await
    }

    /// Creates a foreign key.
    pub async fn create_foreign_key(
        &self,
        table: &str,
        foreign_key: TableForeignKey,
    ) -> Result<()> {
        self.create_foreign_keys(table, vec![foreign_key]).await
    }

    /// Creates foreign keys.
    pub async fn create_foreign_keys(
        &self,
        table: &str,
        foreign_keys: Vec<TableForeignKey>,
    ) -> Result<()> {
        self.alter(table, |d, ctx, t| d.create_foreign_keys(ctx, t, &foreign_keys))
            .await
    }

    /// Drops a foreign key by name.
    pub async fn drop_foreign_key(&self, table: &str, name: &str) -> Result<()> {
        self.drop_foreign_keys(table, vec![name.to_string()]).await
    }

    /// Drops foreign keys by name.
    pub async fn drop_foreign_keys(&self, table: &str, names: Vec<String>) -> Result<()> {
        self.alter(table, |d, ctx, t| d.drop_foreign_keys(ctx, t, &names))
            .await
    }

    // ----- indices -----

    /// Creates an index.
    pub async fn create_index(&self, table: &str, index: TableIndex) -> Result<()> {
        self.create_indices(table, vec![index]).await
    }

    /// Creates indices.
    pub async fn create_indices(&self, table: &str, indices: Vec<TableIndex>) -> Result<()> {
        self.alter(table, |d, ctx, t| d.create_indices(ctx, t, &indices))
            .await
    }

    /// Drops an index by name.
    pub async fn drop_index(&self, table: &str, name: &str) -> Result<()> {
        self.drop_indices(table, vec![name.to_string()]).await
    }

    /// Drops indices by name.
    pub async fn drop_indices(&self, table: &str, names: Vec<String>) -> Result<()> {
        self.alter(table, |d, ctx, t| d.drop_indices(ctx, t, &names))
            .await
    }

    // ----- views -----

    /// Creates a view and records its definition.
    pub async fn create_view(&self, view: View) -> Result<()> {
        let plan = {
            let ctx = self.build_context();
            self.dialect.create_view(&ctx, &view)?
        };
        self.ensure_metadata_for(&plan).await?;
        self.execute_plan(plan).await?;
        self.cache_view(view).await;
        Ok(())
    }

    /// Drops a recorded view.
    pub async fn drop_view(&self, view: &str) -> Result<()> {
        let current = self
            .get_view(view)
            .await?
            .ok_or_else(|| DriverError::not_found("View", view))?;
        let plan = {
            let ctx = self.build_context();
            self.dialect.drop_view(&ctx, &current)?
        };
        self.execute_plan(plan).await?;
        self.forget_view(&current.path()).await;
        Ok(())
    }

    // ----- internal tables -----

    /// Creates the bookkeeping table when it does not exist.
    ///
    /// In SQL-memory mode the table counts as present until the journal is
    /// reset or memory mode ends.
    pub async fn create_metadata_table(&self) -> Result<()> {
        let definition = metadata::definition(self.dialect, self.metadata_table());
        if !self.has_table(&definition.path()).await? {
            let change = {
                let ctx = self.build_context();
                self.dialect.create_table(&ctx, &definition, false, false)?
            };
            self.execute_plan(change.sql).await?;
            info!(table = %definition.path(), "Created metadata table");
        }
        self.set_metadata_ready(true).await;
        Ok(())
    }

    /// Creates the query-result cache table when it does not exist.
    pub async fn create_cache_table(&self) -> Result<()> {
        let options = self.manager().options();
        let definition = cache::definition(
            self.dialect,
            options.schema.as_deref(),
            &options.cache_table_name,
        );
        self.create_table(definition, true, false, false).await
    }

    /// Creates the bookkeeping table first when `plan` writes to it.
    async fn ensure_metadata_for(&self, plan: &SqlInMemory) -> Result<()> {
        if self.is_metadata_ready().await {
            return Ok(());
        }
        let escaped = self.metadata_table().escaped(self.dialect);
        if plan.up.iter().any(|q| q.text.contains(&escaped)) {
            self.create_metadata_table().await?;
        }
        Ok(())
    }

    /// Plans a change against the cached snapshot of `table`, executes it
    /// and swaps the snapshot.
    async fn alter<F>(&self, table: &str, plan: F) -> Result<()>
    where
        F: FnOnce(
            &dyn SchemaDialect,
            &BuildContext<'_>,
            &Table,
        ) -> oxide_ddl::error::Result<SchemaChange>,
    {
        let current = self.get_cached_table(table).await?;
        let change = {
            let ctx = self.build_context();
            plan(self.dialect, &ctx, &current)?
        };
        self.apply(Some(&current.path()), change).await
    }

    async fn apply(&self, previous: Option<&str>, change: SchemaChange) -> Result<()> {
        self.ensure_metadata_for(&change.sql).await?;
        if let Err(e) = self.execute_plan(change.sql).await {
            // Engines without transactional DDL may have applied part of it.
            if let Some(previous) = previous {
                self.forget_table(previous).await;
            }
            return Err(e);
        }
        self.cache_table(previous, change.table).await;
        Ok(())
    }
}
