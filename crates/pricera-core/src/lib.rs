//! # pricera-core: Pure Validation & Geo Logic for Pricera
//!
//! This crate is the store-free half of the Pricera data-access engine.
//! It contains the entity records, the declarative validation rule tables,
//! and the GeoPoint codec - all as pure logic with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Pricera Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Caller (HTTP controllers, jobs, ...)               │   │
//! │  │          sees plain data records, never store handles           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ pricera-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌───────────┐  ┌──────────┐  │   │
//! │  │   │   types   │  │ validation │  │    geo    │  │  error   │  │   │
//! │  │   │  records  │  │ rule tables│  │ WKT codec │  │Violations│  │   │
//! │  │   │  drafts   │  │ evaluator  │  │ haversine │  │ GeoError │  │   │
//! │  │   └───────────┘  └────────────┘  └───────────┘  └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 pricera-db (Transactional Engine)               │   │
//! │  │        Pool, transactions, guid probing, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entity records and drafts (Account, Company, Country, Profil, User)
//! - [`validation`] - Declarative field rules + the generic evaluator
//! - [`geo`] - GeoPoint WKT codec and haversine distance
//! - [`error`] - Validation and geo error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every check here is deterministic - no store access
//! 2. **One Evaluator**: Entities declare rule tables; a single generic
//!    checker evaluates them, so the rule set is independently testable
//! 3. **Aggregated Failures**: Violations are collected, never short-circuited
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod geo;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{GeoError, ValidationError, Violations};
pub use geo::GeoPoint;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Fixed tenant/application prefix carried by every managed table name
/// (`pca_country`, `pca_company`, ...).
pub const TABLE_PREFIX: &str = "pca";

/// Digit length of generated guids. The floor `10^(GUID_LENGTH-1)` keeps
/// guids visually distinct from small auto-increment primary keys.
pub const GUID_LENGTH: u32 = 6;

/// Length of generated alphanumeric account codes.
pub const CODE_LENGTH: usize = 6;

/// Maximum length of name-like string columns.
pub const MAX_NAME_LEN: usize = 128;

/// Maximum length of code-like string columns.
pub const MAX_CODE_LEN: usize = 128;
