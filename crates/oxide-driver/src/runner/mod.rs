//! The query runner: one logical connection, its transactions, its journal
//! and its view of the schema.
//!
//! A runner leases a single connection on first use and runs every statement
//! through it, one at a time. Schema operations plan their statements with
//! the dialect, execute the forward half and record both halves in the
//! journal. In SQL-memory mode nothing is executed; statements are only
//! recorded.

mod schema;
mod transaction;

pub use transaction::TransactionSubscriber;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture as SharedSource, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use oxide_ddl::dialect::{BuildContext, SchemaDialect};
use oxide_ddl::metadata::MetadataTable;
use oxide_ddl::naming::{DefaultNamingStrategy, NamingStrategy};
use oxide_ddl::query::{Query, SqlInMemory};
use oxide_ddl::schema::{Table, View};

use crate::config::ReplicationMode;
use crate::connection::{Connection, QueryResult, Row};
use crate::error::{DriverError, Result};
use crate::manager::ConnectionManager;

type SharedConnection = Arc<Mutex<Box<dyn Connection>>>;

type PendingConnection =
    Shared<SharedSource<'static, std::result::Result<SharedConnection, Arc<DriverError>>>>;

#[derive(Default)]
struct RunnerState {
    released: bool,
    depth: u32,
    active: bool,
    sql_memory: bool,
    journal: SqlInMemory,
    tables: HashMap<String, Table>,
    views: HashMap<String, View>,
    metadata_ready: bool,
    connection: Option<SharedConnection>,
    connecting: Option<PendingConnection>,
}

/// Executes statements and schema operations over one leased connection.
pub struct QueryRunner {
    manager: Arc<ConnectionManager>,
    mode: ReplicationMode,
    dialect: &'static dyn SchemaDialect,
    naming: Arc<dyn NamingStrategy>,
    metadata: MetadataTable,
    slow_query_threshold: Option<Duration>,
    subscribers: Vec<Arc<dyn TransactionSubscriber>>,
    state: Mutex<RunnerState>,
    /// Held across each transaction boundary statement and its depth change.
    transaction: Mutex<()>,
}

impl std::fmt::Debug for QueryRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRunner")
            .field("dialect", &self.dialect.name())
            .field("mode", &self.mode)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl QueryRunner {
    /// Creates a runner. Nothing is leased until the first statement.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>, mode: ReplicationMode) -> Self {
        let options = manager.options();
        let metadata = options.metadata_table();
        let slow_query_threshold = options.slow_query_threshold();
        Self {
            dialect: manager.dialect(),
            manager,
            mode,
            naming: Arc::new(DefaultNamingStrategy::new()),
            metadata,
            slow_query_threshold,
            subscribers: Vec::new(),
            state: Mutex::new(RunnerState::default()),
            transaction: Mutex::new(()),
        }
    }

    /// Replaces the naming strategy.
    #[must_use]
    pub fn with_naming_strategy(mut self, naming: Arc<dyn NamingStrategy>) -> Self {
        self.naming = naming;
        self
    }

    /// Registers a transaction lifecycle subscriber.
    #[must_use]
    pub fn with_subscriber(mut self, subscriber: Arc<dyn TransactionSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Dialect of the runner.
    #[must_use]
    pub fn dialect(&self) -> &'static dyn SchemaDialect {
        self.dialect
    }

    /// Replication mode the connection is leased with.
    #[must_use]
    pub const fn mode(&self) -> ReplicationMode {
        self.mode
    }

    /// Manager the runner leases from.
    #[must_use]
    pub const fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Location of the bookkeeping table.
    #[must_use]
    pub const fn metadata_table(&self) -> &MetadataTable {
        &self.metadata
    }

    /// Naming strategy used for derived constraint names.
    #[must_use]
    pub fn naming(&self) -> &dyn NamingStrategy {
        self.naming.as_ref()
    }

    pub(crate) fn build_context(&self) -> BuildContext<'_> {
        BuildContext::new(self.naming.as_ref(), &self.metadata)
    }

    /// Whether `release()` was called.
    pub async fn is_released(&self) -> bool {
        self.state.lock().await.released
    }

    /// Leases the connection, or returns the one already leased.
    ///
    /// Concurrent callers share one attempt. A failed attempt is reported to
    /// every waiter and the next call tries again.
    pub async fn connect(&self) -> Result<()> {
        self.connection().await.map(|_| ())
    }

    async fn connection(&self) -> Result<SharedConnection> {
        let pending = {
            let mut state = self.state.lock().await;
            if state.released {
                return Err(DriverError::RunnerReleased);
            }
            if let Some(connection) = &state.connection {
                return Ok(Arc::clone(connection));
            }
            state
                .connecting
                .get_or_insert_with(|| {
                    let manager = Arc::clone(&self.manager);
                    let mode = self.mode;
                    async move {
                        manager
                            .obtain_connection(mode)
                            .await
                            .map(|c| Arc::new(Mutex::new(c)))
                            .map_err(Arc::new)
                    }
                    .boxed()
                    .shared()
                })
                .clone()
        };

        let outcome = pending.await;
        let mut state = self.state.lock().await;
        state.connecting = None;
        match outcome {
            Ok(connection) => Ok(Arc::clone(state.connection.get_or_insert(connection))),
            Err(e) => Err(DriverError::ConnectionFailed(e)),
        }
    }

    /// Runs one statement.
    ///
    /// The dialect's rewrites are applied first. Failures matching one of
    /// the dialect's suppressions come back as an empty result; every other
    /// failure is wrapped in [`DriverError::QueryFailed`].
    pub async fn query(&self, query: impl Into<Query>) -> Result<QueryResult> {
        let rules = self.dialect.defend_rules();
        let query = rules.rewrite(query.into());
        let connection = self.connection().await?;

        let started = Instant::now();
        let outcome = {
            let mut connection = connection.lock().await;
            connection.execute(&query).await
        };
        let elapsed = started.elapsed();
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        debug!(sql = %query, duration_ms, "Executed query");
        if self.slow_query_threshold.is_some_and(|max| elapsed > max) {
            warn!(sql = %query.text, duration_ms, "Query is slow");
        }

        match outcome {
            Ok(result) => Ok(result),
            Err(error) => {
                let suppressed = error
                    .code()
                    .and_then(|code| rules.suppression(&query.text, code));
                if let Some(suppression) = suppressed {
                    debug!(
                        sql = %query.text,
                        code = suppression.code,
                        reason = suppression.reason,
                        "Suppressed error"
                    );
                    return Ok(QueryResult::default());
                }
                error!(sql = %query, error = %error, "Query failed");
                Err(DriverError::QueryFailed {
                    query: query.text,
                    parameters: query.parameters,
                    source: Box::new(error),
                })
            }
        }
    }

    /// Runs one statement and returns its rows.
    pub async fn query_rows(&self, query: impl Into<Query>) -> Result<Vec<Row>> {
        Ok(self.query(query).await?.records)
    }

    /// Streaming is not available on any backend in this crate.
    pub async fn stream(
        &self,
        query: impl Into<Query>,
    ) -> Result<futures::stream::BoxStream<'static, Result<Row>>> {
        let _ = query.into();
        if self.is_released().await {
            return Err(DriverError::RunnerReleased);
        }
        Err(DriverError::unsupported(
            self.dialect.name(),
            "streaming query results",
        ))
    }

    /// Returns the connection to its pool. Later statements fail with
    /// [`DriverError::RunnerReleased`].
    pub async fn release(&self) -> Result<()> {
        let connection = {
            let mut state = self.state.lock().await;
            if state.released {
                return Ok(());
            }
            state.released = true;
            state.tables.clear();
            state.views.clear();
            state.connecting = None;
            state.connection.take()
        };
        let Some(connection) = connection else {
            return Ok(());
        };
        match Arc::try_unwrap(connection) {
            Ok(connection) => connection.into_inner().release().await,
            // A statement still holds it; the lease ends when it finishes.
            Err(_) => Ok(()),
        }
    }

    // ----- journal -----

    /// Records statements instead of executing them. Cached snapshots are
    /// dropped on entering and leaving this mode.
    pub async fn enable_sql_memory(&self) {
        let mut state = self.state.lock().await;
        state.sql_memory = true;
        state.journal = SqlInMemory::new();
        state.tables.clear();
        state.views.clear();
        state.metadata_ready = false;
    }

    /// Executes statements again and forgets the journal.
    pub async fn disable_sql_memory(&self) {
        let mut state = self.state.lock().await;
        state.sql_memory = false;
        state.journal = SqlInMemory::new();
        state.tables.clear();
        state.views.clear();
        state.metadata_ready = false;
    }

    /// Forgets the journal.
    pub async fn clear_sql_memory(&self) {
        let mut state = self.state.lock().await;
        state.journal = SqlInMemory::new();
        if state.sql_memory {
            state.metadata_ready = false;
        }
    }

    /// Whether statements are recorded without being executed.
    pub async fn is_sql_memory(&self) -> bool {
        self.state.lock().await.sql_memory
    }

    /// Journal of every schema operation since the last clear.
    pub async fn get_memory_sql(&self) -> SqlInMemory {
        self.state.lock().await.journal.clone()
    }

    /// Executes the recorded forward statements.
    pub async fn execute_memory_up_sql(&self) -> Result<()> {
        let journal = self.get_memory_sql().await;
        self.replay(journal.up).await
    }

    /// Executes the recorded inverse statements, last operation first.
    pub async fn execute_memory_down_sql(&self) -> Result<()> {
        let journal = self.get_memory_sql().await;
        self.replay(journal.down_in_execution_order()).await
    }

    async fn replay(&self, queries: Vec<Query>) -> Result<()> {
        debug!(statements = queries.len(), "Replaying journal");
        for query in queries {
            self.query(query).await?;
        }
        self.invalidate_cache().await;
        Ok(())
    }

    async fn record(&self, sql: SqlInMemory) {
        self.state.lock().await.journal.extend(sql);
    }

    /// Executes the forward half of a plan and journals both halves.
    ///
    /// Plans with more than one statement run inside a transaction when the
    /// caller has none open. In SQL-memory mode the plan is only recorded.
    pub(crate) async fn execute_plan(&self, sql: SqlInMemory) -> Result<()> {
        if !self.is_sql_memory().await {
            self.run_statements(&sql.up).await?;
        }
        self.record(sql).await;
        Ok(())
    }

    /// Runs statements in order, inside a transaction of the runner's own
    /// when there is more than one and none is open.
    ///
    /// Plans carrying the dialect's foreign-key switches run with enforcement
    /// off: the switches are issued around the transaction and the foreign
    /// keys are checked before it commits.
    pub(crate) async fn run_statements(&self, queries: &[Query]) -> Result<()> {
        let (Some(off), Some(on)) = (
            self.dialect.foreign_key_checks_sql(false),
            self.dialect.foreign_key_checks_sql(true),
        ) else {
            return self.run_atomically(queries, false).await;
        };
        if !queries.iter().any(|q| q.text == off) {
            return self.run_atomically(queries, false).await;
        }
        let body: Vec<Query> = queries
            .iter()
            .filter(|q| q.text != off && q.text != on)
            .cloned()
            .collect();

        let enforced = self.foreign_keys_enforced().await?;
        if !enforced {
            return self.run_atomically(&body, false).await;
        }
        if self.is_transaction_active().await {
            return Err(DriverError::unsupported(
                self.dialect.name(),
                "rebuilding a table inside an open transaction while foreign keys are \
                 enforced; switch enforcement off before starting the transaction",
            ));
        }

        self.query(off).await?;
        let outcome = self.run_atomically(&body, true).await;
        if let Err(e) = self.query(on).await {
            if outcome.is_ok() {
                return Err(e);
            }
            warn!(error = %e, "Failed to re-enable foreign key checks");
        }
        outcome
    }

    async fn run_atomically(&self, queries: &[Query], check_foreign_keys: bool) -> Result<()> {
        let own_transaction = (check_foreign_keys || queries.len() > 1)
            && !self.is_transaction_active().await;
        if own_transaction {
            self.start_transaction(None).await?;
        }
        let mut outcome = Ok(());
        for query in queries {
            if let Err(e) = self.query(query.clone()).await {
                outcome = Err(e);
                break;
            }
        }
        if check_foreign_keys && outcome.is_ok() {
            outcome = self.check_foreign_keys().await;
        }
        if own_transaction {
            if outcome.is_ok() {
                self.commit_transaction().await?;
            } else if let Err(rollback) = self.rollback_transaction().await {
                warn!(error = %rollback, "Rollback after failed statement also failed");
            }
        }
        outcome
    }

    async fn foreign_keys_enforced(&self) -> Result<bool> {
        let Some(query) = self.dialect.foreign_keys_enabled_query() else {
            return Ok(true);
        };
        let rows = self.query_rows(query).await?;
        Ok(rows.first().is_some_and(|row| row.get_flag("foreign_keys")))
    }

    async fn check_foreign_keys(&self) -> Result<()> {
        let Some(query) = self.dialect.foreign_key_violations_query() else {
            return Ok(());
        };
        let violations = self.query_rows(query).await?;
        match violations.first() {
            None => Ok(()),
            Some(row) => Err(DriverError::ForeignKeyViolation {
                table: row.get_string("table").unwrap_or_default(),
                rows: violations.len(),
            }),
        }
    }

    // ----- schema cache -----

    pub(crate) async fn cached_table(&self, path: &str) -> Option<Table> {
        self.state.lock().await.tables.get(path).cloned()
    }

    pub(crate) async fn cache_table(&self, previous_path: Option<&str>, table: Table) {
        let mut state = self.state.lock().await;
        if let Some(previous) = previous_path {
            state.tables.remove(previous);
        }
        state.tables.insert(table.path(), table);
    }

    pub(crate) async fn forget_table(&self, path: &str) {
        self.state.lock().await.tables.remove(path);
    }

    pub(crate) async fn cache_view(&self, view: View) {
        self.state.lock().await.views.insert(view.path(), view);
    }

    pub(crate) async fn forget_view(&self, path: &str) {
        self.state.lock().await.views.remove(path);
    }

    pub(crate) async fn cached_view(&self, path: &str) -> Option<View> {
        self.state.lock().await.views.get(path).cloned()
    }

    pub(crate) async fn is_metadata_ready(&self) -> bool {
        self.state.lock().await.metadata_ready
    }

    pub(crate) async fn set_metadata_ready(&self, ready: bool) {
        self.state.lock().await.metadata_ready = ready;
    }

    /// Drops every cached table and view; the next access reads the catalog.
    pub async fn invalidate_cache(&self) {
        let mut state = self.state.lock().await;
        state.tables.clear();
        state.views.clear();
        state.metadata_ready = false;
    }
}
