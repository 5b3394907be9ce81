//! Transactions and savepoints.
//!
//! Depth 0 means no transaction. Going from 0 to 1 issues the dialect's
//! `BEGIN`; every deeper level is a savepoint named `typeorm_<depth>`, so
//! nested calls stack instead of failing. Each boundary holds the runner's
//! transaction lock from reading the depth until the depth is updated, so
//! concurrent starts on one runner stack as well.

use tracing::debug;

use oxide_ddl::dialect::IsolationLevel;

use super::QueryRunner;
use crate::error::{DriverError, Result};

/// Observes transaction boundaries of a runner. Every hook defaults to a
/// no-op.
pub trait TransactionSubscriber: Send + Sync {
    /// Called before a transaction or savepoint is opened.
    fn before_transaction_start(&self, depth: u32) {
        let _ = depth;
    }

    /// Called after a transaction or savepoint was opened.
    fn after_transaction_start(&self, depth: u32) {
        let _ = depth;
    }

    /// Called before a commit or savepoint release.
    fn before_transaction_commit(&self, depth: u32) {
        let _ = depth;
    }

    /// Called after a commit or savepoint release.
    fn after_transaction_commit(&self, depth: u32) {
        let _ = depth;
    }

    /// Called before a rollback.
    fn before_transaction_rollback(&self, depth: u32) {
        let _ = depth;
    }

    /// Called after a rollback.
    fn after_transaction_rollback(&self, depth: u32) {
        let _ = depth;
    }
}

fn savepoint_name(depth: u32) -> String {
    format!("typeorm_{depth}")
}

impl QueryRunner {
    /// Whether a transaction is open.
    pub async fn is_transaction_active(&self) -> bool {
        self.state.lock().await.active
    }

    /// Current nesting depth; 0 outside a transaction.
    pub async fn transaction_depth(&self) -> u32 {
        self.state.lock().await.depth
    }

    /// Opens a transaction, or a savepoint when one is already open.
    pub async fn start_transaction(&self, isolation: Option<IsolationLevel>) -> Result<()> {
        if let Some(level) = isolation {
            if !self.dialect.supported_isolation_levels().contains(&level) {
                return Err(DriverError::UnsupportedIsolationLevel {
                    dialect: self.dialect.name(),
                    level,
                });
            }
        }

        let _boundary = self.transaction.lock().await;
        let depth = self.transaction_depth().await;
        for subscriber in &self.subscribers {
            subscriber.before_transaction_start(depth);
        }

        if depth == 0 {
            for statement in self.dialect.begin_transaction_sql(isolation) {
                self.query(statement).await?;
            }
        } else {
            self.query(self.dialect.savepoint_sql(&savepoint_name(depth)))
                .await?;
        }

        let depth = {
            let mut state = self.state.lock().await;
            state.depth += 1;
            state.active = true;
            state.depth
        };
        debug!(depth, "Transaction started");
        for subscriber in &self.subscribers {
            subscriber.after_transaction_start(depth);
        }
        Ok(())
    }

    /// Commits the transaction, or releases the innermost savepoint.
    pub async fn commit_transaction(&self) -> Result<()> {
        let _boundary = self.transaction.lock().await;
        let depth = self.open_depth().await?;
        for subscriber in &self.subscribers {
            subscriber.before_transaction_commit(depth);
        }

        if depth > 1 {
            if let Some(release) = self
                .dialect
                .release_savepoint_sql(&savepoint_name(depth - 1))
            {
                self.query(release).await?;
            }
        } else {
            self.query(self.dialect.commit_sql()).await?;
        }

        let depth = self.close_level().await;
        debug!(depth, "Transaction committed");
        for subscriber in &self.subscribers {
            subscriber.after_transaction_commit(depth);
        }
        Ok(())
    }

    /// Rolls back the transaction, or back to the innermost savepoint.
    pub async fn rollback_transaction(&self) -> Result<()> {
        let _boundary = self.transaction.lock().await;
        let depth = self.open_depth().await?;
        for subscriber in &self.subscribers {
            subscriber.before_transaction_rollback(depth);
        }

        if depth > 1 {
            self.query(
                self.dialect
                    .rollback_to_savepoint_sql(&savepoint_name(depth - 1)),
            )
            .await?;
        } else {
            self.query(self.dialect.rollback_sql()).await?;
        }

        let depth = self.close_level().await;
        debug!(depth, "Transaction rolled back");
        for subscriber in &self.subscribers {
            subscriber.after_transaction_rollback(depth);
        }
        Ok(())
    }

    async fn open_depth(&self) -> Result<u32> {
        let state = self.state.lock().await;
        if state.released {
            return Err(DriverError::RunnerReleased);
        }
        if !state.active || state.depth == 0 {
            return Err(DriverError::TransactionNotStarted);
        }
        Ok(state.depth)
    }

    async fn close_level(&self) -> u32 {
        let mut state = self.state.lock().await;
        state.depth = state.depth.saturating_sub(1);
        state.active = state.depth > 0;
        state.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_savepoint_names() {
        assert_eq!(savepoint_name(1), "typeorm_1");
        assert_eq!(savepoint_name(12), "typeorm_12");
    }
}
