#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use oxide_ddl::prelude::*;
use oxide_driver::prelude::*;

/// Connected manager over a private in-memory SQLite database.
pub async fn sqlite_manager() -> Arc<ConnectionManager> {
    let manager = Arc::new(ConnectionManager::sqlite(DataSourceOptions::sqlite(
        "sqlite::memory:",
    )));
    manager
        .connect()
        .await
        .unwrap_or_else(|e| panic!("Failed to connect: {e}"));
    manager
}

/// Master runner over a private in-memory SQLite database.
pub async fn sqlite_runner() -> QueryRunner {
    sqlite_manager()
        .await
        .create_query_runner(ReplicationMode::Master)
}

/// `user(id uuid primary key, email varchar unique, age int)`.
pub fn user_table() -> Table {
    Table::new("user")
        .column(TableColumn::new("id", "uuid").length("36").primary())
        .column(TableColumn::new("email", "varchar").length("255").unique())
        .column(TableColumn::new("age", "int"))
}

pub fn column_names(table: &Table) -> Vec<&str> {
    table.columns.iter().map(|c| c.name.as_str()).collect()
}

pub async fn count(runner: &QueryRunner, table: &str) -> i64 {
    runner
        .query_rows(format!("SELECT COUNT(*) AS \"count\" FROM \"{table}\""))
        .await
        .unwrap()[0]
        .get_i64("count")
        .unwrap()
}

// ----- scripted fake backend -----

/// Statement log and canned answers shared by every fake pool and
/// connection of one backend.
#[derive(Default)]
pub struct Script {
    statements: Mutex<Vec<String>>,
    acquired: Mutex<Vec<String>>,
    failures: Mutex<Vec<(String, String)>>,
    answers: Mutex<Vec<(String, Vec<Row>)>>,
    refused: Mutex<Vec<String>>,
    closed: Mutex<Vec<String>>,
}

impl Script {
    /// Statements containing `needle` fail with the native `code`.
    pub fn fail_on(&self, needle: &str, code: &str) {
        self.failures
            .lock()
            .unwrap()
            .push((needle.to_string(), code.to_string()));
    }

    /// Statements containing `needle` return `rows`.
    pub fn answer(&self, needle: &str, rows: Vec<Row>) {
        self.answers
            .lock()
            .unwrap()
            .push((needle.to_string(), rows));
    }

    /// Opening a pool for a URL containing `needle` fails.
    pub fn refuse_open(&self, needle: &str) {
        self.refused.lock().unwrap().push(needle.to_string());
    }

    pub fn forget_failures(&self) {
        self.failures.lock().unwrap().clear();
        self.refused.lock().unwrap().clear();
    }

    /// URL of every closed pool, in order.
    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().unwrap().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    /// URL of the pool behind every acquired connection, in order.
    pub fn acquired(&self) -> Vec<String> {
        self.acquired.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.statements.lock().unwrap().clear();
        self.acquired.lock().unwrap().clear();
    }

    fn run(&self, query: &Query) -> oxide_driver::Result<QueryResult> {
        self.statements.lock().unwrap().push(query.text.clone());
        let failure = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| query.text.contains(needle.as_str()))
            .map(|(_, code)| code.clone());
        if let Some(code) = failure {
            return Err(DriverError::Database {
                code: Some(code),
                message: String::from("scripted failure"),
            });
        }
        let rows = self
            .answers
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| query.text.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone());
        Ok(rows.map_or_else(|| QueryResult::affected(0), QueryResult::rows))
    }
}

pub struct FakeBackend {
    pub script: Arc<Script>,
    pub acquire_delay: Duration,
}

impl FakeBackend {
    pub fn new(script: Arc<Script>) -> Self {
        Self {
            script,
            acquire_delay: Duration::ZERO,
        }
    }
}

impl Backend for FakeBackend {
    fn open<'a>(
        &'a self,
        credentials: &'a Credentials,
        _options: &'a DataSourceOptions,
    ) -> BoxFuture<'a, oxide_driver::Result<Arc<dyn ConnectionPool>>> {
        Box::pin(async move {
            let refused = self
                .script
                .refused
                .lock()
                .unwrap()
                .iter()
                .any(|needle| credentials.url.contains(needle.as_str()));
            if refused {
                return Err(DriverError::Database {
                    code: None,
                    message: format!("cannot reach {}", credentials.url),
                });
            }
            Ok(Arc::new(FakePool {
                script: Arc::clone(&self.script),
                url: credentials.url.clone(),
                delay: self.acquire_delay,
            }) as Arc<dyn ConnectionPool>)
        })
    }
}

struct FakePool {
    script: Arc<Script>,
    url: String,
    delay: Duration,
}

impl ConnectionPool for FakePool {
    fn acquire(&self) -> BoxFuture<'_, oxide_driver::Result<Box<dyn Connection>>> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.script.acquired.lock().unwrap().push(self.url.clone());
            Ok(Box::new(FakeConnection {
                script: Arc::clone(&self.script),
            }) as Box<dyn Connection>)
        })
    }

    fn close(&self) -> BoxFuture<'_, oxide_driver::Result<()>> {
        Box::pin(async move {
            self.script.closed.lock().unwrap().push(self.url.clone());
            Ok(())
        })
    }
}

struct FakeConnection {
    script: Arc<Script>,
}

impl Connection for FakeConnection {
    fn execute<'a>(
        &'a mut self,
        query: &'a Query,
    ) -> BoxFuture<'a, oxide_driver::Result<QueryResult>> {
        Box::pin(async move { self.script.run(query) })
    }

    fn release(self: Box<Self>) -> BoxFuture<'static, oxide_driver::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Manager for `options` over a fake backend, not yet connected.
pub fn fake_manager(options: DataSourceOptions, backend: FakeBackend) -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::new(options, Arc::new(backend)))
}

/// Connected SQL Server manager over a fake backend; the script is cleared
/// after connecting.
pub async fn fake_sqlserver(script: &Arc<Script>) -> Arc<ConnectionManager> {
    let manager = fake_manager(
        DataSourceOptions::new(DatabaseType::SqlServer, "mssql://master"),
        FakeBackend::new(Arc::clone(script)),
    );
    manager.connect().await.unwrap();
    script.clear();
    manager
}
