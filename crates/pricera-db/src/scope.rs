//! # Connection Scope
//!
//! Decides, for every repository call, which connection to use.
//!
//! ## Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Scope Resolution                                     │
//! │                                                                         │
//! │  repo.find(id, tx)                                                     │
//! │        │                                                                │
//! │        ├── tx = Some(ctx), ctx active   ──► Scope::Ambient             │
//! │        │                                    (the caller's transaction  │
//! │        │                                     handle, shared & ordered) │
//! │        │                                                                │
//! │        ├── tx = Some(ctx), ctx INACTIVE ──► Err(NoActiveTransaction)   │
//! │        │                                    (a call that expected a    │
//! │        │                                     transaction is NEVER      │
//! │        │                                     silently given the pool)  │
//! │        │                                                                │
//! │        └── tx = None                    ──► Scope::Fresh               │
//! │                                             (pooled connection for     │
//! │                                              this one call)            │
//! │                                                                         │
//! │  Operations that share one transaction therefore never open a second   │
//! │  connection behind the caller's back.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::tx::TxContext;

/// The connection a single repository call runs on.
pub(crate) enum Scope<'a> {
    /// The caller's active transaction handle.
    Ambient(&'a mut SqliteConnection),
    /// A pooled connection acquired for this call, released on drop.
    Fresh(PoolConnection<Sqlite>),
}

impl Scope<'_> {
    /// The resolved connection.
    pub(crate) fn conn(&mut self) -> &mut SqliteConnection {
        match self {
            Scope::Ambient(conn) => conn,
            Scope::Fresh(conn) => conn.as_mut(),
        }
    }
}

impl Database {
    /// Resolves the scope for one repository call.
    ///
    /// ## Errors
    /// * `NoActiveTransaction` - a context was passed but holds no active
    ///   transaction
    /// * `PoolExhausted` - no pooled connection within the acquire timeout
    pub(crate) async fn scope<'a>(
        &self,
        tx: Option<&'a mut TxContext>,
    ) -> DbResult<Scope<'a>> {
        match tx {
            Some(ctx) => Ok(Scope::Ambient(ctx.conn_mut()?)),
            None => {
                let conn = self.pool().acquire().await.map_err(DbError::from)?;
                Ok(Scope::Fresh(conn))
            }
        }
    }
}
