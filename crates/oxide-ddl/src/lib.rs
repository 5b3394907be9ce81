//! Dialect-aware schema model and reversible DDL generation.
//!
//! `oxide-ddl` is the synchronous half of the schema layer. It knows nothing
//! about connections; every operation returns the statements to run together
//! with the statements that undo them.
//!
//! - **Values** - [`value::SqlValue`] on the wire, [`value::ColumnValue`] in the
//!   application, converted per dialect by [`types`]
//! - **Schema** - [`schema::Table`], columns, constraints, indices and views
//! - **Naming** - deterministic constraint and index names
//! - **Dialects** - SQLite, SQL Server and Oracle planners behind
//!   [`dialect::SchemaDialect`]
//! - **Bookkeeping** - the metadata table recording views and computed columns,
//!   and the query-result cache table
//!
//! # Example
//!
//! ```rust
//! use oxide_ddl::prelude::*;
//!
//! let naming = DefaultNamingStrategy::new();
//! let metadata = MetadataTable::default();
//! let ctx = BuildContext::new(&naming, &metadata);
//!
//! let table = Table::new("user")
//!     .column(TableColumn::new("id", "integer").primary())
//!     .column(TableColumn::new("name", "varchar").nullable());
//!
//! let change = DatabaseType::Sqlite
//!     .dialect()
//!     .create_table(&ctx, &table, true, true)
//!     .unwrap();
//! assert_eq!(
//!     change.sql.up[0].text,
//!     r#"CREATE TABLE "user" ("id" integer PRIMARY KEY NOT NULL, "name" varchar)"#
//! );
//! assert_eq!(change.sql.down[0].text, r#"DROP TABLE "user""#);
//! ```

pub mod cache;
pub mod defend;
pub mod dialect;
pub mod error;
pub mod metadata;
pub mod naming;
pub mod query;
pub mod schema;
pub mod types;
pub mod value;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::defend::{DefendRules, PlaceholderStyle, Rewrite, Suppression};
    pub use crate::dialect::{
        BuildContext, DatabaseType, IsolationLevel, OracleDialect, SchemaChange,
        SchemaDialect, SqlServerDialect, SqliteDialect,
    };
    pub use crate::error::{DdlError, Result};
    pub use crate::metadata::{MetadataKind, MetadataRow, MetadataTable};
    pub use crate::naming::{DefaultNamingStrategy, NamingStrategy};
    pub use crate::query::{Query, SqlInMemory};
    pub use crate::schema::{
        Deferrable, ForeignKeyAction, GeneratedType, GenerationStrategy, Table, TableCheck,
        TableColumn, TableExclusion, TableForeignKey, TableIndex, TableUnique, View,
    };
    pub use crate::types::{ColumnKind, ColumnTypeDescriptor, HostType, ValueTransformer};
    pub use crate::value::{ColumnValue, SqlValue, ToSqlValue};
}
