//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  DbConfig::from_env() / DbConfig::new(path)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← pool + optional schema synchronization  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │  (max_connections)        │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │                           │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       │ Only ever reached through Scope / TxContext                    │
//! │       ▼                                                                 │
//! │  Repositories (accounts, companies, countries, profils, users)        │
//! │                                                                         │
//! │  Exhaustion (no connection within acquire_timeout) surfaces as         │
//! │  PoolExhausted to the caller - the engine never retries it.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled for:
//! - Better concurrent read performance
//! - Readers don't block writers, writers don't block readers
//! - Better crash recovery

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::account::AccountRepository;
use crate::repository::company::CompanyRepository;
use crate::repository::country::CountryRepository;
use crate::repository::profil::ProfilRepository;
use crate::repository::user::UserRepository;
use crate::schema::{self, SchemaMode};

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/pricera/pricera.db")
///     .max_connections(20)
///     .min_connections(5);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 20
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 5
    pub min_connections: u32,

    /// How long an acquire may wait before failing with `PoolExhausted`.
    /// Default: 60 seconds
    pub acquire_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 seconds
    pub idle_timeout: Duration,

    /// Whether to synchronize the schema on connect.
    /// Default: true
    pub synchronize_schema: bool,

    /// How the schema is synchronized. `Force` is destructive and must be
    /// opted into explicitly; `from_env` requires its own variable for it.
    /// Default: `SchemaMode::Create`
    pub schema_mode: SchemaMode,
}

impl DbConfig {
    /// Creates a configuration with the given database file path.
    /// The file will be created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 20,
            min_connections: 5,
            acquire_timeout: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(10),
            synchronize_schema: true,
            schema_mode: SchemaMode::Create,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Sets the idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets whether to synchronize the schema on connect.
    pub fn synchronize_schema(mut self, sync: bool) -> Self {
        self.synchronize_schema = sync;
        self
    }

    /// Sets the schema synchronization mode.
    pub fn schema_mode(mut self, mode: SchemaMode) -> Self {
        self.schema_mode = mode;
        self
    }

    /// Reads the configuration from the environment, falling back to the
    /// defaults of [`DbConfig::new`] for anything unset.
    ///
    /// ## Variables
    /// - `PRICERA_DB_PATH` - database file path (default `pricera.db`)
    /// - `PRICERA_POOL_MAX` / `PRICERA_POOL_MIN`
    /// - `PRICERA_ACQUIRE_TIMEOUT_MS` / `PRICERA_IDLE_TIMEOUT_MS`
    /// - `PRICERA_SYNC_SCHEMA` - "0"/"false" disables synchronization
    /// - `PRICERA_SYNC_ALTER` - "1"/"true" selects additive alter mode
    /// - `PRICERA_SYNC_FORCE` - "1"/"true" selects DESTRUCTIVE force mode;
    ///   a separate, explicit opt-in that wins over alter
    pub fn from_env() -> Self {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.is_empty())
        }
        fn flag(name: &str) -> Option<bool> {
            var(name).map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
        }

        let mut config = DbConfig::new(
            var("PRICERA_DB_PATH").unwrap_or_else(|| "pricera.db".to_string()),
        );

        if let Some(max) = var("PRICERA_POOL_MAX").and_then(|v| v.parse().ok()) {
            config.max_connections = max;
        }
        if let Some(min) = var("PRICERA_POOL_MIN").and_then(|v| v.parse().ok()) {
            config.min_connections = min;
        }
        if let Some(ms) = var("PRICERA_ACQUIRE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.acquire_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = var("PRICERA_IDLE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.idle_timeout = Duration::from_millis(ms);
        }
        if let Some(sync) = flag("PRICERA_SYNC_SCHEMA") {
            config.synchronize_schema = sync;
        }
        if flag("PRICERA_SYNC_ALTER").unwrap_or(false) {
            config.schema_mode = SchemaMode::Alter;
        }
        if flag("PRICERA_SYNC_FORCE").unwrap_or(false) {
            config.schema_mode = SchemaMode::Force;
        }

        config
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// In-memory SQLite is per-connection, so the pool is pinned to a
    /// single connection to keep every query on the same database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            synchronize_schema: true,
            schema_mode: SchemaMode::Create,
        }
    }
}

// =============================================================================
// Pool statistics
// =============================================================================

/// A snapshot of the pool, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections currently open (in use + idle).
    pub size: u32,
    /// Connections currently idle.
    pub idle: usize,
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Cloning is cheap - the pool itself is shared. Callers only ever receive
/// plain data records from the repositories, never a live connection.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Creates the connection pool and optionally synchronizes the schema.
    ///
    /// SQLite is configured with WAL journaling, NORMAL synchronous and
    /// foreign keys enabled, and the file is created if missing.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "initializing database connection"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        debug!("connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "database pool created"
        );

        let db = Database { pool };

        if config.synchronize_schema {
            db.synchronize_schema(config.schema_mode).await?;
        }

        Ok(db)
    }

    /// Synchronizes the managed tables.
    ///
    /// Automatically called by `new()` unless disabled in the config.
    pub async fn synchronize_schema(&self, mode: SchemaMode) -> DbResult<()> {
        info!(?mode, "synchronizing schema");
        schema::synchronize(&self.pool, mode).await?;
        info!("schema synchronized");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    ///
    /// For advanced queries not covered by repositories. Prefer repository
    /// methods when available.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the account repository.
    pub fn accounts(&self) -> AccountRepository {
        AccountRepository::new(self.clone())
    }

    /// Returns the company repository.
    pub fn companies(&self) -> CompanyRepository {
        CompanyRepository::new(self.clone())
    }

    /// Returns the country repository.
    pub fn countries(&self) -> CountryRepository {
        CountryRepository::new(self.clone())
    }

    /// Returns the profil repository.
    pub fn profils(&self) -> ProfilRepository {
        ProfilRepository::new(self.clone())
    }

    /// Returns the user repository.
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.clone())
    }

    /// A snapshot of pool usage, for diagnostics.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Closes the connection pool. Call on application shutdown; all
    /// repository operations fail afterwards.
    pub async fn close(&self) {
        info!("closing database connection pool");
        self.pool.close().await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
