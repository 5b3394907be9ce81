//! Reads of the bookkeeping table.
//!
//! Writes are part of the dialect plans; this module only reads back view
//! definitions and computed-column expressions.

use std::collections::HashMap;

use oxide_ddl::metadata::{self, MetadataKind};
use oxide_ddl::schema::{table_path, Table, View};

use crate::error::Result;
use crate::runner::QueryRunner;

/// Whether the bookkeeping table exists.
pub async fn exists(runner: &QueryRunner) -> Result<bool> {
    let location = runner.metadata_table();
    runner
        .has_table(&table_path(
            location.database.as_deref(),
            location.schema.as_deref(),
            &location.name,
        ))
        .await
}

/// Recorded views whose backing object still exists. Empty when the
/// bookkeeping table was never created.
pub async fn load_views(runner: &QueryRunner) -> Result<Vec<View>> {
    if !exists(runner).await? {
        return Ok(Vec::new());
    }
    let rows = runner
        .query_rows(runner.dialect().views_query(runner.metadata_table()))
        .await?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            Some(View {
                database: row.get_string("database"),
                schema: row.get_string("schema"),
                name: row.get_string("name")?,
                expression: row.get_string("value").unwrap_or_default(),
                materialized: row.get_str("type").and_then(MetadataKind::parse)
                    == Some(MetadataKind::MaterializedView),
            })
        })
        .collect())
}

/// Recorded expressions of the computed columns of `table`, by column name.
pub async fn generated_columns(
    runner: &QueryRunner,
    table: &Table,
) -> Result<HashMap<String, String>> {
    if !exists(runner).await? {
        return Ok(HashMap::new());
    }
    let query = metadata::select_generated_columns(runner.dialect(), runner.metadata_table(), table);
    let rows = runner.query_rows(query).await?;
    Ok(rows
        .iter()
        .filter_map(|row| Some((row.get_string("name")?, row.get_string("value")?)))
        .collect())
}
