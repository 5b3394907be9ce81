//! SQL Server catalog queries over `sys.*`.

use oxide_ddl::query::Query;
use oxide_ddl::schema::Table;
use oxide_ddl::value::SqlValue;

use super::CatalogQueries;

const TABLES: &str = "SELECT t.name AS table_name \
     FROM sys.tables t \
     JOIN sys.schemas s ON t.schema_id = s.schema_id \
     WHERE {filter} \
     ORDER BY t.name";

const COLUMNS: &str = "SELECT t.name AS table_name, c.name AS column_name, ty.name AS data_type, \
     CASE WHEN ty.name IN ('char', 'varchar', 'binary', 'varbinary') THEN c.max_length \
          WHEN ty.name IN ('nchar', 'nvarchar') AND c.max_length > 0 THEN c.max_length / 2 \
          WHEN ty.name IN ('nchar', 'nvarchar') THEN c.max_length \
          ELSE NULL END AS length, \
     CASE WHEN ty.name IN ('decimal', 'numeric') THEN CAST(c.precision AS INT) ELSE NULL END AS precision, \
     CASE WHEN ty.name IN ('decimal', 'numeric') THEN CAST(c.scale AS INT) ELSE NULL END AS scale, \
     CAST(c.is_nullable AS INT) AS is_nullable, \
     dc.definition AS default_value, \
     CAST(c.is_identity AS INT) AS is_identity, \
     CASE WHEN cc.object_id IS NULL THEN NULL WHEN cc.is_persisted = 1 THEN 'STORED' ELSE 'VIRTUAL' END AS generated_kind, \
     cc.definition AS expression \
     FROM sys.columns c \
     JOIN sys.tables t ON c.object_id = t.object_id \
     JOIN sys.schemas s ON t.schema_id = s.schema_id \
     JOIN sys.types ty ON c.user_type_id = ty.user_type_id \
     LEFT JOIN sys.default_constraints dc ON dc.parent_object_id = c.object_id AND dc.parent_column_id = c.column_id \
     LEFT JOIN sys.computed_columns cc ON cc.object_id = c.object_id AND cc.column_id = c.column_id \
     WHERE {filter} \
     ORDER BY t.name, c.column_id";

const KEYS: &str = "SELECT t.name AS table_name, i.name AS constraint_name, \
     CASE WHEN i.is_primary_key = 1 THEN 'PRIMARY KEY' \
          WHEN i.is_unique_constraint = 1 THEN 'UNIQUE' \
          ELSE 'INDEX' END AS constraint_type, \
     c.name AS column_name, CAST(i.is_unique AS INT) AS is_unique, \
     i.filter_definition AS where_clause \
     FROM sys.indexes i \
     JOIN sys.tables t ON i.object_id = t.object_id \
     JOIN sys.schemas s ON t.schema_id = s.schema_id \
     JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
     JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
     WHERE i.name IS NOT NULL AND ic.is_included_column = 0 AND {filter} \
     ORDER BY t.name, i.name, ic.key_ordinal";

const CHECKS: &str = "SELECT t.name AS table_name, cc.name AS constraint_name, \
     col.name AS column_name, cc.definition AS expression \
     FROM sys.check_constraints cc \
     JOIN sys.tables t ON cc.parent_object_id = t.object_id \
     JOIN sys.schemas s ON t.schema_id = s.schema_id \
     LEFT JOIN sys.columns col ON col.object_id = cc.parent_object_id AND col.column_id = cc.parent_column_id \
     WHERE {filter} \
     ORDER BY t.name, cc.name";

const FOREIGN_KEYS: &str = "SELECT t.name AS table_name, fk.name AS constraint_name, \
     pc.name AS column_name, rs.name AS referenced_schema, rt.name AS referenced_table_name, \
     rc.name AS referenced_column_name, \
     REPLACE(fk.delete_referential_action_desc, '_', ' ') AS on_delete, \
     REPLACE(fk.update_referential_action_desc, '_', ' ') AS on_update \
     FROM sys.foreign_keys fk \
     JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id \
     JOIN sys.tables t ON fk.parent_object_id = t.object_id \
     JOIN sys.schemas s ON t.schema_id = s.schema_id \
     JOIN sys.columns pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id \
     JOIN sys.tables rt ON fk.referenced_object_id = rt.object_id \
     JOIN sys.schemas rs ON rt.schema_id = rs.schema_id \
     JOIN sys.columns rc ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id \
     WHERE {filter} \
     ORDER BY t.name, fk.name, fkc.constraint_column_id";

/// Catalog queries for the tables in `filter`, or for every table of
/// `schema` (the session's default schema when `None`).
pub(super) fn queries(schema: Option<&str>, filter: Option<&[Table]>) -> CatalogQueries {
    let (condition, parameters) = condition(schema, filter);
    let build = |template: &str| {
        Query::with_parameters(template.replace("{filter}", &condition), parameters.clone())
    };
    CatalogQueries {
        tables: build(TABLES),
        columns: build(COLUMNS),
        keys: build(KEYS),
        checks: build(CHECKS),
        foreign_keys: build(FOREIGN_KEYS),
    }
}

fn condition(schema: Option<&str>, filter: Option<&[Table]>) -> (String, Vec<SqlValue>) {
    let mut parameters = Vec::new();
    let Some(tables) = filter else {
        let clause = schema_clause(schema, &mut parameters);
        return (clause, parameters);
    };
    if tables.is_empty() {
        return (String::from("1 = 0"), parameters);
    }

    let conditions: Vec<String> = tables
        .iter()
        .map(|table| {
            let schema = schema_clause(table.schema.as_deref().or(schema), &mut parameters);
            parameters.push(SqlValue::Text(table.name.clone()));
            format!("({schema} AND t.name = @{})", parameters.len() - 1)
        })
        .collect();
    (format!("({})", conditions.join(" OR ")), parameters)
}

fn schema_clause(schema: Option<&str>, parameters: &mut Vec<SqlValue>) -> String {
    match schema {
        Some(schema) => {
            parameters.push(SqlValue::Text(schema.to_string()));
            format!("s.name = @{}", parameters.len() - 1)
        }
        None => String::from("s.name = SCHEMA_NAME()"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_binds_schema_and_name() {
        let filter = [Table::new("user").in_schema("app"), Table::new("post")];
        let queries = queries(None, Some(&filter[..]));
        assert!(queries.tables.text.contains(
            "((s.name = @0 AND t.name = @1) OR (s.name = SCHEMA_NAME() AND t.name = @2))"
        ));
        assert_eq!(
            queries.columns.parameters,
            vec![
                SqlValue::Text("app".into()),
                SqlValue::Text("user".into()),
                SqlValue::Text("post".into()),
            ]
        );
    }

    #[test]
    fn test_unfiltered_uses_default_schema() {
        let queries = queries(Some("dbo"), None);
        assert!(queries.keys.text.contains("AND s.name = @0"));
        assert!(!queries.keys.text.contains("{filter}"));
        assert_eq!(queries.keys.parameters, vec![SqlValue::Text("dbo".into())]);
    }
}
