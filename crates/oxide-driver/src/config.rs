//! Data source configuration.
//!
//! Options are plain serde structs so they can be loaded from a JSON file or
//! built in code.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use oxide_ddl::cache::DEFAULT_CACHE_TABLE;
use oxide_ddl::dialect::DatabaseType;
use oxide_ddl::metadata::{MetadataTable, DEFAULT_METADATA_TABLE};

use crate::error::{DriverError, Result};

/// Where to reach one database server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Connection URL (`sqlite::memory:`, `sqlite://app.db`, `mssql://…`).
    pub url: String,
}

impl Credentials {
    /// Credentials for a URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Master/replica setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationOptions {
    /// Server receiving writes.
    pub master: Credentials,
    /// Read replicas.
    #[serde(default)]
    pub slaves: Vec<Credentials>,
}

/// Which pool a query runner draws its connection from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationMode {
    /// The write server.
    #[default]
    Master,
    /// A read replica, falling back to the master when none is configured.
    Slave,
}

fn default_pool_size() -> u32 {
    10
}

fn default_metadata_table() -> String {
    DEFAULT_METADATA_TABLE.to_string()
}

fn default_cache_table() -> String {
    DEFAULT_CACHE_TABLE.to_string()
}

/// Everything needed to open and use a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceOptions {
    /// Engine behind the data source.
    pub database_type: DatabaseType,
    /// Connection URL when not replicated.
    #[serde(default)]
    pub url: Option<String>,
    /// Master/replica setup; takes precedence over `url`.
    #[serde(default)]
    pub replication: Option<ReplicationOptions>,
    /// Database name; discovered on connect when absent.
    #[serde(default)]
    pub database: Option<String>,
    /// Schema name; discovered on connect when absent.
    #[serde(default)]
    pub schema: Option<String>,
    /// Connections per pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Queries slower than this are logged as slow.
    #[serde(default)]
    pub max_query_execution_time_ms: Option<u64>,
    /// Run sessions in UTC.
    #[serde(default)]
    pub use_utc: bool,
    /// Name of the bookkeeping table.
    #[serde(default = "default_metadata_table")]
    pub metadata_table_name: String,
    /// Name of the query-result cache table.
    #[serde(default = "default_cache_table")]
    pub cache_table_name: String,
}

impl DataSourceOptions {
    /// Options for a single server of the given engine.
    #[must_use]
    pub fn new(database_type: DatabaseType, url: impl Into<String>) -> Self {
        Self {
            database_type,
            url: Some(url.into()),
            replication: None,
            database: None,
            schema: None,
            pool_size: default_pool_size(),
            max_query_execution_time_ms: None,
            use_utc: false,
            metadata_table_name: default_metadata_table(),
            cache_table_name: default_cache_table(),
        }
    }

    /// Options for a SQLite database.
    #[must_use]
    pub fn sqlite(url: impl Into<String>) -> Self {
        Self::new(DatabaseType::Sqlite, url)
    }

    /// Loads options from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&text)?;
        options.validate()?;
        Ok(options)
    }

    /// Sets the replication setup.
    #[must_use]
    pub fn replication(mut self, master: Credentials, slaves: Vec<Credentials>) -> Self {
        self.replication = Some(ReplicationOptions { master, slaves });
        self
    }

    /// Sets the pool size.
    #[must_use]
    pub const fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    /// Sets the slow-query threshold.
    #[must_use]
    pub const fn max_query_execution_time(mut self, millis: u64) -> Self {
        self.max_query_execution_time_ms = Some(millis);
        self
    }

    /// Runs sessions in UTC.
    #[must_use]
    pub const fn use_utc(mut self, enabled: bool) -> Self {
        self.use_utc = enabled;
        self
    }

    /// Checks that a server is configured and the pool can hold a connection.
    pub fn validate(&self) -> Result<()> {
        if self.url.is_none() && self.replication.is_none() {
            return Err(DriverError::InvalidConfig(
                "either `url` or `replication` must be set".into(),
            ));
        }
        if self.pool_size == 0 {
            return Err(DriverError::InvalidConfig(
                "`pool_size` must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Credentials of the write server.
    pub fn master_credentials(&self) -> Result<Credentials> {
        match (&self.replication, &self.url) {
            (Some(replication), _) => Ok(replication.master.clone()),
            (None, Some(url)) => Ok(Credentials::new(url.clone())),
            (None, None) => Err(DriverError::InvalidConfig(
                "no master server configured".into(),
            )),
        }
    }

    /// Credentials of the read replicas.
    #[must_use]
    pub fn slave_credentials(&self) -> Vec<Credentials> {
        self.replication
            .as_ref()
            .map(|r| r.slaves.clone())
            .unwrap_or_default()
    }

    /// Slow-query threshold.
    #[must_use]
    pub fn slow_query_threshold(&self) -> Option<Duration> {
        self.max_query_execution_time_ms.map(Duration::from_millis)
    }

    /// Location of the bookkeeping table.
    #[must_use]
    pub fn metadata_table(&self) -> MetadataTable {
        MetadataTable {
            database: self.database.clone(),
            schema: self.schema.clone(),
            name: self.metadata_table_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let options: DataSourceOptions =
            serde_json::from_str(r#"{"database_type": "sqlite", "url": "sqlite::memory:"}"#)
                .unwrap();
        assert_eq!(options.pool_size, 10);
        assert_eq!(options.metadata_table_name, DEFAULT_METADATA_TABLE);
        assert_eq!(options.cache_table_name, "query_result_cache");
        assert!(options.validate().is_ok());
        assert!(options.slow_query_threshold().is_none());
    }

    #[test]
    fn test_replication_takes_precedence() {
        let options = DataSourceOptions::new(DatabaseType::SqlServer, "mssql://a")
            .replication(
                Credentials::new("mssql://master"),
                vec![Credentials::new("mssql://replica")],
            );
        assert_eq!(options.master_credentials().unwrap().url, "mssql://master");
        assert_eq!(options.slave_credentials().len(), 1);
    }

    #[test]
    fn test_missing_server_is_invalid() {
        let mut options = DataSourceOptions::sqlite("sqlite::memory:");
        options.url = None;
        assert!(matches!(
            options.validate(),
            Err(DriverError::InvalidConfig(_))
        ));
        assert!(DataSourceOptions::sqlite("x").pool_size(0).validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ormconfig.json");
        std::fs::write(
            &path,
            r#"{"database_type": "mssql", "url": "mssql://db", "max_query_execution_time_ms": 250}"#,
        )
        .unwrap();
        let options = DataSourceOptions::from_file(&path).unwrap();
        assert_eq!(options.database_type, DatabaseType::SqlServer);
        assert_eq!(
            options.slow_query_threshold(),
            Some(Duration::from_millis(250))
        );
    }
}
