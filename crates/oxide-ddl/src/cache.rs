//! Shape of the query-result cache table.
//!
//! Only the DDL lives here; reading and writing entries belongs to whichever
//! cache provider owns the table.

use crate::dialect::SchemaDialect;
use crate::schema::{GenerationStrategy, Table};

/// Default name of the cache table.
pub const DEFAULT_CACHE_TABLE: &str = "query_result_cache";

/// Table definition of the cache table in the given dialect.
#[must_use]
pub fn definition(dialect: &dyn SchemaDialect, schema: Option<&str>, name: &str) -> Table {
    let types = dialect.mapped_types();
    let mut table = Table::new(name)
        .column(
            types
                .cache_id
                .column("id")
                .primary()
                .generated(GenerationStrategy::Increment),
        )
        .column(types.cache_identifier.column("identifier").nullable())
        .column(types.cache_time.column("time"))
        .column(types.cache_duration.column("duration"))
        .column(types.cache_query.column("query"))
        .column(types.cache_result.column("result"));
    table.schema = schema.map(str::to_string);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DatabaseType;

    #[test]
    fn test_cache_columns() {
        let table = definition(DatabaseType::Sqlite.dialect(), None, DEFAULT_CACHE_TABLE);
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "identifier", "time", "duration", "query", "result"]);
        assert!(table.columns[0].is_primary && table.columns[0].is_increment());
        assert!(table.columns[1].is_nullable);
        assert!(table.columns[2..].iter().all(|c| !c.is_nullable));
    }

    #[test]
    fn test_cache_types_per_dialect() {
        let mssql = definition(DatabaseType::SqlServer.dialect(), Some("dbo"), "cache");
        assert_eq!(mssql.columns[4].column_type, "nvarchar");
        assert_eq!(mssql.columns[4].length.as_deref(), Some("MAX"));
        assert_eq!(mssql.path(), "dbo.cache");

        let oracle = definition(DatabaseType::Oracle.dialect(), None, "cache");
        assert_eq!(oracle.columns[5].column_type, "clob");
        assert_eq!(oracle.columns[0].column_type, "number");
    }
}
