//! Connections, query runners and schema operations over `oxide-ddl`.
//!
//! `oxide-driver` is the asynchronous half of the schema layer:
//!
//! - **Manager** - [`manager::ConnectionManager`] owns a master pool and
//!   optional replica pools, and hands out runners
//! - **Runner** - [`runner::QueryRunner`] holds one connection and runs
//!   queries, nested transactions and schema operations on it
//! - **Journal** - every schema operation is recorded as up/down SQL and can
//!   be collected without executing (SQL-memory mode)
//! - **Catalog** - tables and views are read back from the database and
//!   cached per runner
//! - **Backends** - sqlx-backed SQLite out of the box; other engines plug in
//!   through [`connection::Backend`]
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use oxide_driver::prelude::*;
//! use oxide_ddl::prelude::{Table, TableColumn};
//!
//! # async fn run() -> oxide_driver::Result<()> {
//! let manager = Arc::new(ConnectionManager::sqlite(DataSourceOptions::sqlite(
//!     "sqlite::memory:",
//! )));
//! manager.connect().await?;
//!
//! let runner = manager.create_query_runner(ReplicationMode::Master);
//! runner
//!     .create_table(
//!         Table::new("user").column(TableColumn::new("id", "integer").primary()),
//!         true,
//!         true,
//!         true,
//!     )
//!     .await?;
//! assert!(runner.has_table("user").await?);
//! runner.release().await?;
//! # Ok(())
//! # }
//! ```

pub mod bookkeeper;
pub mod catalog;
pub mod config;
pub mod connection;
pub mod error;
pub mod manager;
pub mod runner;
pub mod sqlite;

pub use error::{DriverError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{Credentials, DataSourceOptions, ReplicationMode, ReplicationOptions};
    pub use crate::connection::{
        Backend, BoxFuture, Connection, ConnectionPool, QueryResult, Row,
    };
    pub use crate::error::{DriverError, Result};
    pub use crate::manager::ConnectionManager;
    pub use crate::runner::{QueryRunner, TransactionSubscriber};
    pub use crate::sqlite::SqliteBackend;
}
