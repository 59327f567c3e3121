//! # Identifier Generation
//!
//! Two collision-resistant generators backed by the live table contents.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Guid Generation                                  │
//! │                                                                         │
//! │  candidate = 10^(length-1) + MAX(id) + 1                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT 1 FROM table WHERE guid = candidate ──┐                         │
//! │       │ free                            taken │                         │
//! │       ▼                                       ▼                         │
//! │    return                              candidate += 1, re-probe         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Probing makes the guid unique against rows visible to the current
//! connection; the unique index on `guid` is the final arbiter when two
//! writers race on the same candidate.

use rand::Rng;
use sqlx::SqliteConnection;
use tracing::trace;

use crate::engine::validate_identifier;
use crate::error::DbResult;

/// Alphabet for short account/company codes.
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Derives the next free numeric guid for `table`.
///
/// The floor keeps every guid at exactly `length` digits until the id space
/// outgrows it: an empty 6-digit table starts at 100001. A `seed` is taken
/// as the first probe candidate itself, for callers that already hold one;
/// probing still walks upward from it until a free guid is found.
pub async fn generate_guid(
    conn: &mut SqliteConnection,
    table: &str,
    length: u32,
    seed: Option<i64>,
) -> DbResult<i64> {
    validate_identifier(table)?;

    let mut candidate = match seed {
        Some(base) => base,
        None => {
            let max_id =
                sqlx::query_scalar::<_, i64>(&format!("SELECT COALESCE(MAX(id), 0) FROM {table}"))
                    .fetch_one(&mut *conn)
                    .await?;
            10_i64.pow(length - 1) + max_id + 1
        }
    };

    loop {
        let taken: Option<i64> =
            sqlx::query_scalar(&format!("SELECT 1 FROM {table} WHERE guid = ?"))
                .bind(candidate)
                .fetch_optional(&mut *conn)
                .await?;

        if taken.is_none() {
            trace!(table, guid = candidate, "guid derived");
            return Ok(candidate);
        }
        candidate += 1;
    }
}

/// Draws random codes over `A-Z0-9` until one is absent from `table.code`.
pub async fn generate_unique_code(
    conn: &mut SqliteConnection,
    table: &str,
    length: usize,
) -> DbResult<String> {
    validate_identifier(table)?;

    loop {
        // Scoped so the thread-local RNG is gone before the await
        let code: String = {
            let mut rng = rand::thread_rng();
            (0..length)
                .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
                .collect()
        };

        let taken: Option<i64> =
            sqlx::query_scalar(&format!("SELECT 1 FROM {table} WHERE code = ?"))
                .bind(&code)
                .fetch_optional(&mut *conn)
                .await?;

        if taken.is_none() {
            trace!(table, code = %code, "code drawn");
            return Ok(code);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
