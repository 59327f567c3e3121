//! # pricera-db: Data-Access Engine for the Pricera Directory
//!
//! This crate provides database access for the Pricera price-directory
//! backend. It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Pricera Data Flow                                 │
//! │                                                                         │
//! │  Caller (API handler, job, test)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    pricera-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌───────────────┐  │   │
//! │  │   │   Database    │   │  Repositories  │   │    Schema     │  │   │
//! │  │   │   (pool.rs)   │   │ (country.rs,   │   │  (schema.rs)  │  │   │
//! │  │   │               │   │  company.rs,   │   │               │  │   │
//! │  │   │ SqlitePool    │◄──│  account.rs,   │   │ Create/Alter/ │  │   │
//! │  │   │ TxContext     │   │  profil.rs,    │   │ Force sync    │  │   │
//! │  │   │ Scope         │   │  user.rs)      │   │               │  │   │
//! │  │   └───────────────┘   └────────────────┘   └───────────────┘  │   │
//! │  │          │                    │                                │   │
//! │  │          │            ┌───────┴────────┐                       │   │
//! │  │          │            │ engine / guid  │  shared query plumbing│   │
//! │  │          │            └────────────────┘  and id generation    │   │
//! │  └──────────┼──────────────────────────────────────────────────── ┘   │
//! │             ▼                                                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │            PRICERA_DB_PATH (WAL, foreign keys on)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`tx`] - Explicit transaction contexts
//! - [`schema`] - Declarative table definitions and synchronization
//! - [`engine`] - Shared query plumbing (identifiers, pagination)
//! - [`guid`] - Guid and short-code generation
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (one per entity)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pricera_db::{Database, DbConfig};
//!
//! // Create database, synchronizing the schema on the way up
//! let db = Database::new(DbConfig::from_env()).await?;
//!
//! // Use repositories
//! let cameroon = db.countries().find_by_attribute("alpha2", "CM", None).await?;
//!
//! // Or join several writes in one transaction
//! let accounts = db
//!     .run_in_transaction(|tx| {
//!         Box::pin(async move {
//!             let company = db.companies().create(company_draft, Some(tx)).await?;
//!             db.accounts()
//!                 .create(AccountDraft { company: Some(company.id), ..Default::default() }, Some(tx))
//!                 .await
//!         })
//!     })
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod engine;
pub mod error;
pub mod guid;
pub mod pool;
pub mod repository;
pub mod schema;
mod scope;
pub mod tx;

// =============================================================================
// Re-exports
// =============================================================================

pub use engine::{Arg, Direction, FindQuery, Join, Page, Paginated};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, PoolStats};
pub use schema::SchemaMode;
pub use tx::TxContext;

// Repository re-exports for convenience
pub use repository::account::AccountRepository;
pub use repository::company::CompanyRepository;
pub use repository::country::CountryRepository;
pub use repository::profil::ProfilRepository;
pub use repository::user::UserRepository;
