//! Master/replica pool management.

use std::sync::Arc;

use rand::RngExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use oxide_ddl::dialect::SchemaDialect;

use crate::config::{DataSourceOptions, ReplicationMode};
use crate::connection::{Backend, Connection, ConnectionPool};
use crate::error::{DriverError, Result};
use crate::runner::QueryRunner;
use crate::sqlite::SqliteBackend;

struct Pools {
    master: Arc<dyn ConnectionPool>,
    slaves: Vec<Arc<dyn ConnectionPool>>,
}

#[derive(Debug, Clone, Default)]
struct Discovered {
    database: Option<String>,
    schema: Option<String>,
}

/// Owns the pools of one data source and hands out connections and runners.
pub struct ConnectionManager {
    options: DataSourceOptions,
    backend: Arc<dyn Backend>,
    dialect: &'static dyn SchemaDialect,
    pools: RwLock<Option<Pools>>,
    discovered: RwLock<Discovered>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("database_type", &self.options.database_type)
            .field("dialect", &self.dialect.name())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Creates a manager that opens pools through `backend`.
    #[must_use]
    pub fn new(options: DataSourceOptions, backend: Arc<dyn Backend>) -> Self {
        let dialect = options.database_type.dialect();
        let discovered = Discovered {
            database: options.database.clone(),
            schema: options.schema.clone(),
        };
        Self {
            options,
            backend,
            dialect,
            pools: RwLock::new(None),
            discovered: RwLock::new(discovered),
        }
    }

    /// Creates a manager backed by sqlx SQLite pools.
    #[must_use]
    pub fn sqlite(options: DataSourceOptions) -> Self {
        Self::new(options, Arc::new(SqliteBackend::new()))
    }

    /// Data source options.
    #[must_use]
    pub const fn options(&self) -> &DataSourceOptions {
        &self.options
    }

    /// Dialect of the data source.
    #[must_use]
    pub fn dialect(&self) -> &'static dyn SchemaDialect {
        self.dialect
    }

    /// Configured or discovered database name.
    pub async fn database(&self) -> Option<String> {
        self.discovered.read().await.database.clone()
    }

    /// Configured or discovered schema name.
    pub async fn schema(&self) -> Option<String> {
        self.discovered.read().await.schema.clone()
    }

    /// Whether pools are open.
    pub async fn is_connected(&self) -> bool {
        self.pools.read().await.is_some()
    }

    /// Opens the master pool and one pool per replica. Reuses open pools.
    ///
    /// Nothing stays open when a pool fails to open or discovery fails; the
    /// next call starts over.
    pub async fn connect(&self) -> Result<()> {
        self.options.validate()?;
        if self.is_connected().await {
            return Ok(());
        }

        let master_credentials = self.options.master_credentials()?;
        let master = self
            .backend
            .open(&master_credentials, &self.options)
            .await?;
        let mut opened = vec![master.clone()];
        for credentials in self.options.slave_credentials() {
            match self.backend.open(&credentials, &self.options).await {
                Ok(slave) => opened.push(slave),
                Err(e) => {
                    close_quietly(&opened).await;
                    return Err(e);
                }
            }
        }
        if let Err(e) = self.discover(&master).await {
            close_quietly(&opened).await;
            return Err(e);
        }

        let mut pools = self.pools.write().await;
        if pools.is_some() {
            // Lost a race against another connect; keep the first pools.
            drop(pools);
            close_quietly(&opened).await;
            return Ok(());
        }
        let slaves = opened.split_off(1);
        info!(
            dialect = self.dialect.name(),
            replicas = slaves.len(),
            "Connected to data source"
        );
        *pools = Some(Pools { master, slaves });
        Ok(())
    }

    async fn discover(&self, master: &Arc<dyn ConnectionPool>) -> Result<()> {
        let known = self.discovered.read().await.clone();
        if known.database.is_some() && known.schema.is_some() {
            return Ok(());
        }

        let mut connection = master.acquire().await?;
        let result = connection
            .execute(&self.dialect.current_database_query())
            .await;
        connection.release().await?;
        let Some(row) = result?.records.into_iter().next() else {
            return Ok(());
        };

        let mut discovered = self.discovered.write().await;
        if discovered.database.is_none() {
            discovered.database = row.get_string("database").filter(|s| !s.is_empty());
        }
        if discovered.schema.is_none() {
            discovered.schema = row.get_string("schema").filter(|s| !s.is_empty());
        }
        debug!(
            database = ?discovered.database,
            schema = ?discovered.schema,
            "Discovered current database"
        );
        Ok(())
    }

    /// Leases a connection from the master pool.
    pub async fn obtain_master_connection(&self) -> Result<Box<dyn Connection>> {
        let pool = {
            let pools = self.pools.read().await;
            pools
                .as_ref()
                .map(|p| p.master.clone())
                .ok_or(DriverError::NotConnected)?
        };
        pool.acquire().await
    }

    /// Leases a connection from a random replica, or from the master when
    /// no replica is configured.
    pub async fn obtain_slave_connection(&self) -> Result<Box<dyn Connection>> {
        let pool = {
            let pools = self.pools.read().await;
            let pools = pools.as_ref().ok_or(DriverError::NotConnected)?;
            if pools.slaves.is_empty() {
                pools.master.clone()
            } else {
                let index = rand::rng().random_range(0..pools.slaves.len());
                pools.slaves[index].clone()
            }
        };
        pool.acquire().await
    }

    /// Leases a connection for the given mode.
    pub async fn obtain_connection(&self, mode: ReplicationMode) -> Result<Box<dyn Connection>> {
        match mode {
            ReplicationMode::Master => self.obtain_master_connection().await,
            ReplicationMode::Slave => self.obtain_slave_connection().await,
        }
    }

    /// Closes every pool. Closing an already closed manager succeeds.
    pub async fn disconnect(&self) -> Result<()> {
        let Some(pools) = self.pools.write().await.take() else {
            return Ok(());
        };
        let mut errors = Vec::new();
        for pool in std::iter::once(&pools.master).chain(&pools.slaves) {
            if let Err(e) = pool.close().await {
                warn!(error = %e, "Failed to close pool");
                errors.push(e);
            }
        }
        info!(dialect = self.dialect.name(), "Disconnected from data source");
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(DriverError::Multiple(errors)),
        }
    }

    /// Creates a query runner bound to this manager.
    #[must_use]
    pub fn create_query_runner(self: &Arc<Self>, mode: ReplicationMode) -> QueryRunner {
        QueryRunner::new(Arc::clone(self), mode)
    }
}

async fn close_quietly(pools: &[Arc<dyn ConnectionPool>]) {
    for pool in pools {
        if let Err(e) = pool.close().await {
            warn!(error = %e, "Failed to close pool");
        }
    }
}

#[cfg(test)]
mod tests {
    use oxide_ddl::dialect::DatabaseType;

    use super::*;

    #[test]
    fn test_configured_names_win_over_discovery() {
        let mut options = DataSourceOptions::new(DatabaseType::SqlServer, "mssql://db");
        options.database = Some("shop".into());
        options.schema = Some("sales".into());
        let manager = ConnectionManager::sqlite(options);

        tokio_test::block_on(async {
            assert_eq!(manager.database().await.as_deref(), Some("shop"));
            assert_eq!(manager.schema().await.as_deref(), Some("sales"));
            assert!(!manager.is_connected().await);
        });
        assert_eq!(manager.dialect().database_type(), DatabaseType::SqlServer);
    }

    #[test]
    fn test_sqlite_connect_and_disconnect() {
        let manager = ConnectionManager::sqlite(DataSourceOptions::sqlite("sqlite::memory:"));
        tokio_test::block_on(async {
            manager.connect().await.unwrap();
            assert!(manager.is_connected().await);
            // Reconnecting reuses the open pools.
            manager.connect().await.unwrap();
            manager.obtain_slave_connection().await.unwrap().release().await.unwrap();
            manager.disconnect().await.unwrap();
            assert!(!manager.is_connected().await);
        });
    }
}
