//! Planner behavior shared by every dialect.
//!
//! Each test plans an operation and its inverse against the same snapshot and
//! checks that the snapshot comes back unchanged.

mod common;

use common::{cols, created, texts, user_table, with_ctx, DATABASES};
use oxide_ddl::prelude::*;

fn unique_on<'t>(table: &'t Table, column: &str) -> Option<&'t TableUnique> {
    table
        .uniques
        .iter()
        .find(|u| u.column_names == [column.to_string()])
}

#[test]
fn test_add_then_drop_column_restores_snapshot() {
    for database in DATABASES {
        let original = created(database, &user_table());
        let restored = with_ctx(|ctx| {
            let dialect = database.dialect();
            let added = dialect
                .add_columns(ctx, &original, &[TableColumn::new("bio", "text").nullable()])
                .unwrap();
            assert_eq!(added.table.columns.len(), 4, "{database:?}");
            assert_eq!(added.table.primary_column_names(), ["id"], "{database:?}");
            assert!(unique_on(&added.table, "email").is_some(), "{database:?}");
            assert!(!added.sql.down.is_empty(), "{database:?}");
            dialect
                .drop_columns(ctx, &added.table, &cols(&["bio"]))
                .unwrap()
                .table
        });
        assert_eq!(restored, original, "{database:?}");
    }
}

#[test]
fn test_adding_existing_column_is_rejected() {
    for database in DATABASES {
        let original = created(database, &user_table());
        let result = with_ctx(|ctx| {
            database
                .dialect()
                .add_columns(ctx, &original, &[TableColumn::new("age", "int")])
        });
        assert!(
            matches!(result, Err(DdlError::ColumnExists { .. })),
            "{database:?}"
        );
    }
}

#[test]
fn test_unique_flag_becomes_named_constraint() {
    let naming = DefaultNamingStrategy::new();
    for database in DATABASES {
        let table = created(database, &user_table());
        let unique = unique_on(&table, "email").unwrap();
        assert_eq!(
            unique.name,
            Some(naming.unique_constraint_name("user", &cols(&["email"]))),
            "{database:?}"
        );
        assert!(table.find_column("email").unwrap().is_unique);
    }
}

#[test]
fn test_rename_table_regenerates_auto_names_only() {
    let naming = DefaultNamingStrategy::new();
    for database in DATABASES {
        let table = user_table()
            .unique(TableUnique::new(["age"]).named("UQ_user_age"))
            .index(TableIndex::new(["age"]));
        let original = created(database, &table);

        let back = with_ctx(|ctx| {
            let dialect = database.dialect();
            let renamed = dialect.rename_table(ctx, &original, "member").unwrap().table;
            assert_eq!(renamed.name, "member");
            assert_eq!(
                unique_on(&renamed, "email").and_then(|u| u.name.clone()),
                Some(naming.unique_constraint_name("member", &cols(&["email"]))),
                "{database:?}"
            );
            assert_eq!(
                unique_on(&renamed, "age").and_then(|u| u.name.as_deref()),
                Some("UQ_user_age"),
                "{database:?}"
            );
            assert_eq!(
                renamed.indices[0].name,
                Some(naming.index_name("member", &cols(&["age"]), None)),
                "{database:?}"
            );
            dialect.rename_table(ctx, &renamed, "user").unwrap().table
        });
        assert_eq!(back, original, "{database:?}");
    }
}

#[test]
fn test_index_create_and_drop_are_inverse() {
    for database in DATABASES {
        let original = created(database, &user_table());
        with_ctx(|ctx| {
            let dialect = database.dialect();
            let indexed = dialect
                .create_indices(ctx, &original, &[TableIndex::new(["age"])])
                .unwrap();
            let name = indexed.table.indices[0].name.clone().unwrap();
            let dropped = dialect
                .drop_indices(ctx, &indexed.table, &[name])
                .unwrap();
            assert_eq!(texts(&indexed.sql.up), texts(&dropped.sql.down), "{database:?}");
            assert_eq!(texts(&indexed.sql.down), texts(&dropped.sql.up), "{database:?}");
            assert_eq!(dropped.table, original, "{database:?}");
        });
    }
}

#[test]
fn test_drop_table_down_recreates_table() {
    for database in DATABASES {
        let table = created(database, &user_table());
        with_ctx(|ctx| {
            let dialect = database.dialect();
            let create = dialect.create_table(ctx, &table, true, true).unwrap();
            let drop = dialect.drop_table(ctx, &table, true, true).unwrap();
            let recreate = drop.down_in_execution_order();
            assert_eq!(
                recreate.last().map(|q| q.text.clone()),
                create.sql.up.first().map(|q| q.text.clone()),
                "{database:?}"
            );
        });
    }
}

#[test]
fn test_missing_constraints_are_reported() {
    for database in DATABASES {
        let table = created(database, &user_table());
        with_ctx(|ctx| {
            let dialect = database.dialect();
            let missing = [String::from("UQ_missing")];
            assert!(matches!(
                dialect.drop_unique_constraints(ctx, &table, &missing),
                Err(DdlError::ConstraintNotFound { .. })
            ));
            assert!(matches!(
                dialect.drop_indices(ctx, &table, &missing),
                Err(DdlError::ConstraintNotFound { .. })
            ));
            assert!(matches!(
                dialect.create_primary_key(ctx, &table, &cols(&["age"]), None),
                Err(DdlError::PrimaryKeyExists(_))
            ));
        });
    }
}

#[test]
fn test_views_record_bookkeeping_rows() {
    let view = View::new("adults", "SELECT * FROM user WHERE age >= 18");
    for database in DATABASES {
        with_ctx(|ctx| {
            let dialect = database.dialect();
            let create = dialect.create_view(ctx, &view).unwrap();
            let drop = dialect.drop_view(ctx, &view).unwrap();
            assert_eq!(create.up.len(), 2);
            assert!(create.up[0].text.starts_with("CREATE VIEW"));
            assert!(create.up[1].text.starts_with("INSERT INTO"));
            assert!(drop.up[0].text.starts_with("DELETE FROM"));
            assert!(drop.up[1].text.starts_with("DROP VIEW"));
        });
    }
}

#[test]
fn test_materialized_views_only_on_oracle() {
    let view = View::new("totals", "SELECT 1 FROM dual").materialized();
    for database in DATABASES {
        let result = with_ctx(|ctx| database.dialect().create_view(ctx, &view));
        match database {
            DatabaseType::Oracle => assert!(result.is_ok()),
            _ => assert!(matches!(result, Err(DdlError::Unsupported { .. }))),
        }
    }
}
