#![allow(dead_code)]

use oxide_ddl::prelude::*;

pub const DATABASES: [DatabaseType; 3] = [
    DatabaseType::Sqlite,
    DatabaseType::SqlServer,
    DatabaseType::Oracle,
];

/// Runs `f` with the default naming strategy and bookkeeping location.
pub fn with_ctx<R>(f: impl FnOnce(&BuildContext<'_>) -> R) -> R {
    let naming = DefaultNamingStrategy::new();
    let metadata = MetadataTable::default();
    f(&BuildContext::new(&naming, &metadata))
}

pub fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

pub fn texts(queries: &[Query]) -> Vec<String> {
    queries.iter().map(|q| q.text.clone()).collect()
}

/// `user(id uuid primary key, email varchar unique, age int)`.
pub fn user_table() -> Table {
    Table::new("user")
        .column(TableColumn::new("id", "uuid").length("36").primary())
        .column(TableColumn::new("email", "varchar").length("255").unique())
        .column(TableColumn::new("age", "int"))
}

/// Creates `table` on `database` and returns the named snapshot.
pub fn created(database: DatabaseType, table: &Table) -> Table {
    with_ctx(|ctx| {
        database
            .dialect()
            .create_table(ctx, table, true, true)
            .unwrap_or_else(|e| panic!("{database:?}: create failed: {e}"))
            .table
    })
}
