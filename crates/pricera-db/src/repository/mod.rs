//! # Repositories
//!
//! One repository per managed entity, all speaking the same contract.
//!
//! ## Uniform Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Every Repository Exposes                              │
//! │                                                                         │
//! │  find(id)                    one live record by id                      │
//! │  find_by_attribute(a, v)     one live record by any validated column    │
//! │  find_by_string(a, s)        substring match on a text column           │
//! │  find_multiple(a, v)         all live records matching a column         │
//! │  find_all(query)             filtered, ordered, paginated listing       │
//! │  create(draft)               guid derivation → DataControl → INSERT     │
//! │  update(id, patch)           merge → DataControl → UPDATE, None on miss │
//! │  delete(id)                  hard delete, true when a row went          │
//! │    (accounts: soft_delete(id), flags instead of removing)               │
//! │                                                                         │
//! │  Every method takes Option<&mut TxContext>: Some joins the caller's    │
//! │  transaction, None runs on its own pooled connection.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A lookup that matches nothing is an answer, not an error: single finds
//! yield `None`, list finds an empty vec, deletes `false`.
//!
//! Writes re-fetch the row on the same connection and hand back a detached
//! record with the generated columns filled in.

pub mod account;
pub mod company;
pub mod country;
pub mod profil;
pub mod user;

pub use account::AccountRepository;
pub use company::CompanyRepository;
pub use country::CountryRepository;
pub use profil::ProfilRepository;
pub use user::UserRepository;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::engine::{self, Arg};
use crate::error::{DbError, DbResult};
use pricera_core::validation::{self, DataRules, FieldValue};
use pricera_core::{ValidationError, Violations};

/// Timestamp source for `created`/`updated`, in one place.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

/// The store-backed half of DataControl.
///
/// Runs the entity's rule table over the candidate, then re-queries every
/// declared-unique column, excluding `exclude_id` so an update never
/// collides with its own row (creates pass 0). All violations come back in
/// one [`DbError::Validation`].
pub(crate) async fn data_control<T: DataRules>(
    conn: &mut SqliteConnection,
    table: &str,
    candidate: &T,
    exclude_id: i64,
) -> DbResult<()> {
    let mut violations: Violations = validation::check(candidate);

    for rule in T::unique_rules() {
        let value = match candidate.field(rule.field) {
            // Absent optional columns cannot collide
            FieldValue::Missing => continue,
            FieldValue::Text(s) => Arg::Text(s.to_string()),
            FieldValue::Int(i) => Arg::Int(i),
            FieldValue::Bool(b) => Arg::Bool(b),
        };
        let clashes = engine::count_matching(&mut *conn, table, rule.field, value, exclude_id).await?;
        if clashes > 0 {
            violations.push(ValidationError::AlreadyExists {
                field: rule.field.to_string(),
            });
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(DbError::Validation(violations))
    }
}
