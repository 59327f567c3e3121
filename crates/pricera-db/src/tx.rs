//! # Transaction Management
//!
//! One top-level transaction per logical unit of work, carried in an
//! explicit per-call-chain context.
//!
//! ## Why a Context Value, Not a Flag
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Transaction Context Lifecycle                        │
//! │                                                                         │
//! │  let mut tx = TxContext::new();        inactive, no connection         │
//! │       │                                                                 │
//! │  db.begin_transaction(&mut tx)         acquires connection, BEGIN      │
//! │       │                                (fails: TransactionAlreadyActive│
//! │       │                                 if tx is already active)       │
//! │       ▼                                                                 │
//! │  repo.create(draft, Some(&mut tx))     every call shares the handle    │
//! │  repo.update(id, patch, Some(&mut tx)) strictly ordered on it          │
//! │       │                                                                 │
//! │       ├── db.commit_transaction(&mut tx)    COMMIT, release, clear     │
//! │       └── db.rollback_transaction(&mut tx)  best-effort, ALWAYS clears │
//! │                                                                         │
//! │  A TxContext is scoped to ONE call chain. It is never shared between   │
//! │  concurrently-running tasks and never stored globally - concurrent     │
//! │  requests each carry their own context, so they cannot corrupt each    │
//! │  other's transaction visibility.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `run_in_transaction` is the only sanctioned way to group multiple
//! repository calls atomically.

use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection};
use tracing::{debug, error, warn};

use crate::error::{DbError, DbResult};
use crate::pool::Database;

// =============================================================================
// TxContext
// =============================================================================

/// Per-call-chain transaction state: `{active, handle}`.
///
/// At most one transaction can be active per context; beginning a second
/// one fails. Committed or rolled back exactly once.
#[derive(Debug, Default)]
pub struct TxContext {
    conn: Option<PoolConnection<Sqlite>>,
    active: bool,
}

impl TxContext {
    /// Creates an inactive context. Costs nothing until `begin`.
    pub fn new() -> Self {
        TxContext {
            conn: None,
            active: false,
        }
    }

    /// Whether a transaction is currently active on this context.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The live transaction connection.
    pub(crate) fn conn_mut(&mut self) -> DbResult<&mut SqliteConnection> {
        if !self.active {
            return Err(DbError::NoActiveTransaction);
        }
        self.conn
            .as_mut()
            .map(|c| c.as_mut())
            .ok_or(DbError::NoActiveTransaction)
    }

    fn clear(&mut self) -> Option<PoolConnection<Sqlite>> {
        self.active = false;
        self.conn.take()
    }
}

impl Drop for TxContext {
    /// An abandoned active context must not leave the transaction open.
    ///
    /// We cannot await in `drop`, so the rollback is queued on the runtime
    /// when one is available; the connection is released either way.
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        warn!("transaction context dropped while active; rolling back");
        if let Some(mut conn) = self.clear() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = sqlx::query("ROLLBACK").execute(conn.as_mut()).await {
                        error!(error = %e, "rollback of abandoned transaction failed");
                    }
                });
            }
        }
    }
}

// =============================================================================
// Transaction operations
// =============================================================================

impl Database {
    /// Begins a transaction on the given context.
    ///
    /// ## Errors
    /// * `TransactionAlreadyActive` - the context already holds one;
    ///   nested transactions are forbidden
    /// * `PoolExhausted` - no connection available within the acquire timeout
    pub async fn begin_transaction(&self, ctx: &mut TxContext) -> DbResult<()> {
        if ctx.is_active() {
            return Err(DbError::TransactionAlreadyActive);
        }

        let mut conn = self.pool().acquire().await.map_err(DbError::from)?;

        // IMMEDIATE takes the write lock up front so the transaction cannot
        // be starved into a late SQLITE_BUSY at commit time.
        sqlx::query("BEGIN IMMEDIATE").execute(conn.as_mut()).await?;

        ctx.conn = Some(conn);
        ctx.active = true;

        debug!("transaction started");
        Ok(())
    }

    /// Commits the active transaction and clears the context.
    ///
    /// On commit failure the transaction is rolled back (best-effort)
    /// before the error is propagated, so the context never stays active.
    pub async fn commit_transaction(&self, ctx: &mut TxContext) -> DbResult<()> {
        if !ctx.is_active() {
            return Err(DbError::NoActiveTransaction);
        }

        let result = match ctx.conn_mut() {
            Ok(conn) => sqlx::query("COMMIT").execute(conn).await,
            Err(e) => return Err(e),
        };

        match result {
            Ok(_) => {
                ctx.clear();
                debug!("transaction committed");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "commit failed, rolling back");
                self.rollback_transaction(ctx).await?;
                Err(e.into())
            }
        }
    }

    /// Rolls the active transaction back, best-effort.
    ///
    /// Secondary errors from the rollback call itself are logged and
    /// swallowed; the context is ALWAYS cleared so the engine never gets
    /// stuck believing a transaction is active when the handle is gone.
    pub async fn rollback_transaction(&self, ctx: &mut TxContext) -> DbResult<()> {
        if !ctx.is_active() {
            return Err(DbError::NoActiveTransaction);
        }

        if let Ok(conn) = ctx.conn_mut() {
            if let Err(e) = sqlx::query("ROLLBACK").execute(conn).await {
                error!(error = %e, "rollback failed");
            } else {
                debug!("transaction rolled back");
            }
        }

        ctx.clear();
        Ok(())
    }

    /// Begins a transaction, runs `op`, commits on success, rolls back and
    /// re-throws on any failure.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let (country, company) = db
    ///     .run_in_transaction(|tx| {
    ///         Box::pin(async move {
    ///             let country = db.countries().create(country_draft, Some(tx)).await?;
    ///             let company = db.companies().create(company_draft, Some(tx)).await?;
    ///             Ok((country, company))
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn run_in_transaction<T, F>(&self, op: F) -> DbResult<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut TxContext) -> BoxFuture<'c, DbResult<T>> + Send,
    {
        let mut ctx = TxContext::new();
        self.begin_transaction(&mut ctx).await?;

        match op(&mut ctx).await {
            Ok(value) => {
                self.commit_transaction(&mut ctx).await?;
                Ok(value)
            }
            Err(e) => {
                // Rollback errors are already swallowed inside; the only
                // error worth the caller's attention is the original one.
                let _ = self.rollback_transaction(&mut ctx).await;
                Err(e)
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_double_begin_fails() {
        let db = test_db().await;
        let mut tx = TxContext::new();

        db.begin_transaction(&mut tx).await.unwrap();
        let err = db.begin_transaction(&mut tx).await.unwrap_err();
        assert!(matches!(err, DbError::TransactionAlreadyActive));

        db.rollback_transaction(&mut tx).await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_without_begin_fails() {
        let db = test_db().await;
        let mut tx = TxContext::new();

        assert!(matches!(
            db.commit_transaction(&mut tx).await.unwrap_err(),
            DbError::NoActiveTransaction
        ));
        assert!(matches!(
            db.rollback_transaction(&mut tx).await.unwrap_err(),
            DbError::NoActiveTransaction
        ));
    }

    #[tokio::test]
    async fn test_rollback_clears_context() {
        let db = test_db().await;
        let mut tx = TxContext::new();

        db.begin_transaction(&mut tx).await.unwrap();
        assert!(tx.is_active());

        db.rollback_transaction(&mut tx).await.unwrap();
        assert!(!tx.is_active());

        // Context is reusable after clearing
        db.begin_transaction(&mut tx).await.unwrap();
        db.commit_transaction(&mut tx).await.unwrap();
        assert!(!tx.is_active());
    }

    #[tokio::test]
    async fn test_run_in_transaction_commits_on_ok() {
        let db = test_db().await;

        db.run_in_transaction(|tx| {
            Box::pin(async move {
                sqlx::query("CREATE TABLE tx_probe (n INTEGER)")
                    .execute(tx.conn_mut()?)
                    .await?;
                sqlx::query("INSERT INTO tx_probe (n) VALUES (1)")
                    .execute(tx.conn_mut()?)
                    .await?;
                Ok(())
            })
        })
        .await
        .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tx_probe")
            .fetch_one(conn.as_mut())
            .await
            .unwrap();
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn test_run_in_transaction_rolls_back_on_err() {
        let db = test_db().await;

        let mut conn = db.pool().acquire().await.unwrap();
        sqlx::query("CREATE TABLE tx_probe (n INTEGER)")
            .execute(conn.as_mut())
            .await
            .unwrap();
        drop(conn);

        let result: DbResult<()> = db
            .run_in_transaction(|tx| {
                Box::pin(async move {
                    sqlx::query("INSERT INTO tx_probe (n) VALUES (1)")
                        .execute(tx.conn_mut()?)
                        .await?;
                    Err(DbError::Internal("boom".to_string()))
                })
            })
            .await;
        assert!(result.is_err());

        let mut conn = db.pool().acquire().await.unwrap();
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tx_probe")
            .fetch_one(conn.as_mut())
            .await
            .unwrap();
        assert_eq!(n, 0, "insert must have been rolled back");
    }
}
