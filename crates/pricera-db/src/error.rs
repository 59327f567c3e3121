//! # Database Error Types
//!
//! Error taxonomy of the engine.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  "absence"            → Ok(None) / empty Vec, NEVER an error           │
//! │                                                                         │
//! │  DataControl rejected → DbError::Validation (all rules, one message)   │
//! │  unique race at store → DbError::UniqueViolation (retryable)           │
//! │  caller tx bug        → TransactionAlreadyActive / NoActiveTransaction │
//! │  infrastructure       → PoolExhausted / ConnectionFailed / Query       │
//! │                         propagated unchanged, never retried here       │
//! │                                                                         │
//! │  Callers can therefore always distinguish "business rule failed"       │
//! │  from "infrastructure failed".                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use pricera_core::Violations;
use thiserror::Error;

/// Result alias used across the crate.
pub type DbResult<T> = Result<T, DbError>;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// DataControl rejected the row before any write.
    ///
    /// Carries the full list of violated rules; the message concatenates
    /// all of them, never just the first.
    #[error("validation failed: {0}")]
    Validation(Violations),

    /// A declared-unique column collided at the store level.
    ///
    /// ## When This Occurs
    /// Two concurrent creates racing past the guid generator's
    /// check-then-insert gap. The caller should retry with a fresh
    /// identifier.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// `begin` was called while a transaction is already active on this
    /// context. A programming error in the caller, not a data problem.
    #[error("transaction already active")]
    TransactionAlreadyActive,

    /// `commit`/`rollback` was called with no active transaction, or a
    /// repository call passed an inactive context where it expected an
    /// ambient transaction.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// No pooled connection became available within the acquire timeout.
    /// Surfaced to the caller; retry policy is theirs.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Database connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Schema synchronization failed.
    #[error("schema synchronization failed: {0}")]
    SchemaFailed(String),

    /// A caller-supplied attribute/column name is not a plain identifier.
    /// Query shaping is caller-driven, but names are never interpolated
    /// into SQL unchecked.
    #[error("invalid attribute name: {0:?}")]
    InvalidAttribute(String),

    /// Internal engine invariant broken (e.g. a row vanished between
    /// insert and re-fetch on the same connection).
    #[error("internal database error: {0}")]
    Internal(String),

    /// Any other store-level failure, propagated unchanged.
    #[error("query failed: {0}")]
    Query(sqlx::Error),
}

impl DbError {
    /// Wraps an aggregated validation failure.
    pub fn validation(violations: Violations) -> Self {
        DbError::Validation(violations)
    }

    /// True for errors a caller may meaningfully retry with a fresh
    /// identifier (see the guid generator's documented race).
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, DbError::UniqueViolation(_))
    }
}

impl From<sqlx::Error> for DbError {
    /// Categorizes store-level errors without flattening the taxonomy:
    /// pool timeouts and unique-constraint hits get their own variants,
    /// everything else stays a raw `Query` error.
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DbError::UniqueViolation(db.message().to_string())
            }
            other => DbError::Query(other),
        }
    }
}
