//! Oracle catalog queries over the `USER_*` dictionary views.

use oxide_ddl::query::Query;
use oxide_ddl::schema::Table;
use oxide_ddl::value::SqlValue;

use super::CatalogQueries;

/// Catalog queries for the tables in `filter`, or for every table owned by
/// the current user.
pub(super) fn queries(filter: Option<&[Table]>) -> CatalogQueries {
    let names = filter.map(|tables| tables.iter().map(|t| t.name.clone()).collect());
    let builder = Builder::new(names);

    let tables = builder.query(
        "SELECT t.\"TABLE_NAME\" AS \"table_name\" FROM \"USER_TABLES\" t \
         WHERE {t} ORDER BY t.\"TABLE_NAME\"",
    );

    let columns = builder.query(
        "SELECT c.\"TABLE_NAME\" AS \"table_name\", c.\"COLUMN_NAME\" AS \"column_name\", \
         c.\"DATA_TYPE\" AS \"data_type\", \
         CASE WHEN c.\"DATA_TYPE\" IN ('CHAR', 'NCHAR', 'VARCHAR2', 'NVARCHAR2', 'RAW') \
              THEN c.\"CHAR_LENGTH\" END AS \"length\", \
         c.\"DATA_PRECISION\" AS \"precision\", c.\"DATA_SCALE\" AS \"scale\", \
         CASE WHEN c.\"NULLABLE\" = 'Y' THEN 1 ELSE 0 END AS \"is_nullable\", \
         c.\"DATA_DEFAULT\" AS \"default_value\", \
         CASE WHEN c.\"IDENTITY_COLUMN\" = 'YES' THEN 1 ELSE 0 END AS \"is_identity\", \
         CASE WHEN c.\"VIRTUAL_COLUMN\" = 'YES' THEN 'VIRTUAL' END AS \"generated_kind\", \
         NULL AS \"expression\" \
         FROM \"USER_TAB_COLS\" c \
         WHERE c.\"HIDDEN_COLUMN\" = 'NO' AND {c} \
         ORDER BY c.\"TABLE_NAME\", c.\"COLUMN_ID\"",
    );

    let keys = builder.query(
        "SELECT c.\"TABLE_NAME\" AS \"table_name\", c.\"CONSTRAINT_NAME\" AS \"constraint_name\", \
         CASE c.\"CONSTRAINT_TYPE\" WHEN 'P' THEN 'PRIMARY KEY' ELSE 'UNIQUE' END AS \"constraint_type\", \
         cc.\"COLUMN_NAME\" AS \"column_name\", 1 AS \"is_unique\", NULL AS \"where_clause\", \
         cc.\"POSITION\" AS \"position\" \
         FROM \"USER_CONSTRAINTS\" c \
         JOIN \"USER_CONS_COLUMNS\" cc ON cc.\"CONSTRAINT_NAME\" = c.\"CONSTRAINT_NAME\" \
         WHERE c.\"CONSTRAINT_TYPE\" IN ('P', 'U') AND {c} \
         UNION ALL \
         SELECT i.\"TABLE_NAME\", i.\"INDEX_NAME\", 'INDEX', ic.\"COLUMN_NAME\", \
         CASE WHEN i.\"UNIQUENESS\" = 'UNIQUE' THEN 1 ELSE 0 END, NULL, ic.\"COLUMN_POSITION\" \
         FROM \"USER_INDEXES\" i \
         JOIN \"USER_IND_COLUMNS\" ic ON ic.\"INDEX_NAME\" = i.\"INDEX_NAME\" \
         WHERE i.\"GENERATED\" = 'N' AND {i} \
         AND NOT EXISTS (SELECT 1 FROM \"USER_CONSTRAINTS\" k \
             WHERE k.\"INDEX_NAME\" = i.\"INDEX_NAME\" AND k.\"CONSTRAINT_TYPE\" IN ('P', 'U')) \
         ORDER BY 1, 2, 7",
    );

    let checks = builder.query(
        "SELECT c.\"TABLE_NAME\" AS \"table_name\", c.\"CONSTRAINT_NAME\" AS \"constraint_name\", \
         NULL AS \"column_name\", c.\"SEARCH_CONDITION_VC\" AS \"expression\" \
         FROM \"USER_CONSTRAINTS\" c \
         WHERE c.\"CONSTRAINT_TYPE\" = 'C' AND {c} \
         ORDER BY c.\"TABLE_NAME\", c.\"CONSTRAINT_NAME\"",
    );

    let foreign_keys = builder.query(
        "SELECT c.\"TABLE_NAME\" AS \"table_name\", c.\"CONSTRAINT_NAME\" AS \"constraint_name\", \
         cc.\"COLUMN_NAME\" AS \"column_name\", NULL AS \"referenced_schema\", \
         rc.\"TABLE_NAME\" AS \"referenced_table_name\", rcc.\"COLUMN_NAME\" AS \"referenced_column_name\", \
         c.\"DELETE_RULE\" AS \"on_delete\", NULL AS \"on_update\" \
         FROM \"USER_CONSTRAINTS\" c \
         JOIN \"USER_CONS_COLUMNS\" cc ON cc.\"CONSTRAINT_NAME\" = c.\"CONSTRAINT_NAME\" \
         JOIN \"USER_CONSTRAINTS\" rc ON rc.\"CONSTRAINT_NAME\" = c.\"R_CONSTRAINT_NAME\" \
         JOIN \"USER_CONS_COLUMNS\" rcc ON rcc.\"CONSTRAINT_NAME\" = rc.\"CONSTRAINT_NAME\" \
              AND rcc.\"POSITION\" = cc.\"POSITION\" \
         WHERE c.\"CONSTRAINT_TYPE\" = 'R' AND {c} \
         ORDER BY c.\"TABLE_NAME\", c.\"CONSTRAINT_NAME\", cc.\"POSITION\"",
    );

    CatalogQueries {
        tables,
        columns,
        keys,
        checks,
        foreign_keys,
    }
}

/// Fills `{alias}` markers with a `TABLE_NAME` filter, numbering the `:N`
/// placeholders per query.
struct Builder {
    names: Option<Vec<String>>,
}

impl Builder {
    const fn new(names: Option<Vec<String>>) -> Self {
        Self { names }
    }

    fn query(&self, template: &str) -> Query {
        let mut text = template.to_string();
        let mut parameters = Vec::new();
        for alias in ["t", "c", "i"] {
            let marker = format!("{{{alias}}}");
            if !text.contains(&marker) {
                continue;
            }
            let condition = match &self.names {
                None => String::from("1 = 1"),
                Some(names) if names.is_empty() => String::from("1 = 0"),
                Some(names) => {
                    let placeholders: Vec<String> = names
                        .iter()
                        .map(|name| {
                            parameters.push(SqlValue::Text(name.clone()));
                            format!(":{}", parameters.len())
                        })
                        .collect();
                    format!("{alias}.\"TABLE_NAME\" IN ({})", placeholders.join(", "))
                }
            };
            text = text.replace(&marker, &condition);
        }
        Query::with_parameters(text, parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_numbers_placeholders_per_query() {
        let filter = [Table::new("USER"), Table::new("POST")];
        let queries = queries(Some(&filter[..]));
        assert!(queries.tables.text.contains("t.\"TABLE_NAME\" IN (:1, :2)"));
        assert!(queries.keys.text.contains("c.\"TABLE_NAME\" IN (:1, :2)"));
        assert!(queries.keys.text.contains("i.\"TABLE_NAME\" IN (:3, :4)"));
        assert_eq!(queries.keys.parameters.len(), 4);
        assert_eq!(queries.checks.parameters.len(), 2);
    }

    #[test]
    fn test_unfiltered_reads_everything() {
        let queries = queries(None);
        assert!(queries.columns.text.contains("'NO' AND 1 = 1"));
        assert!(queries.columns.parameters.is_empty());
    }
}
