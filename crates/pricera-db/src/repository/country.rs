//! # Country Repository
//!
//! Database operations for countries: ISO alpha-2/alpha-3 codes, dial code,
//! and bilingual display names. Countries are the root of the reference
//! graph - companies point at them.

use tracing::debug;

use crate::engine::{self, Arg, FindQuery, Paginated};
use crate::error::{DbError, DbResult};
use crate::guid;
use crate::pool::Database;
use crate::repository::{data_control, now};
use crate::tx::TxContext;
use pricera_core::{Country, CountryDraft, GUID_LENGTH};

const TABLE: &str = "pca_country";

/// Repository for country database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.countries();
///
/// let cameroon = repo
///     .create(
///         CountryDraft {
///             alpha2: Some("CM".into()),
///             alpha3: Some("CMR".into()),
///             dialcode: Some(237),
///             fr: Some("Cameroun".into()),
///             en: Some("Cameroon".into()),
///             ..Default::default()
///         },
///         None,
///     )
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct CountryRepository {
    db: Database,
}

impl CountryRepository {
    /// Creates a new CountryRepository.
    pub fn new(db: Database) -> Self {
        CountryRepository { db }
    }

    /// One country by id.
    pub async fn find(&self, id: i64, tx: Option<&mut TxContext>) -> DbResult<Option<Country>> {
        self.find_by_attribute("id", id, tx).await
    }

    /// One country by any validated column (`guid`, `alpha2`, ...).
    pub async fn find_by_attribute(
        &self,
        attribute: &str,
        value: impl Into<Arg>,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Option<Country>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_by_attribute(scope.conn(), TABLE, attribute, value.into(), false).await
    }

    /// Countries whose text column contains `needle` (case-insensitive).
    pub async fn find_by_string(
        &self,
        attribute: &str,
        needle: &str,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<Country>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_by_like(scope.conn(), TABLE, attribute, needle, false).await
    }

    /// All countries matching one column exactly.
    pub async fn find_multiple(
        &self,
        attribute: &str,
        value: impl Into<Arg>,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<Country>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_many_by_attribute(scope.conn(), TABLE, attribute, value.into(), false).await
    }

    /// Caller-shaped paginated listing: equality criteria, ordering, and
    /// a page window (defaults: everything, id ascending, 10 per page).
    pub async fn find_all(
        &self,
        query: FindQuery,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Paginated<Country>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_page(scope.conn(), TABLE, false, query).await
    }

    /// Creates a country: derives a guid when the draft carries none, runs
    /// DataControl, inserts, and hands back the stored record.
    pub async fn create(
        &self,
        draft: CountryDraft,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Country> {
        let mut scope = self.db.scope(tx).await?;
        let conn = scope.conn();

        let mut draft = draft;
        if draft.guid.is_none() {
            draft.guid = Some(guid::generate_guid(&mut *conn, TABLE, GUID_LENGTH, None).await?);
        }

        data_control(&mut *conn, TABLE, &draft, 0).await?;

        let stamp = now();
        let done = sqlx::query(
            "INSERT INTO pca_country (guid, alpha2, alpha3, dialcode, fr, en, created, updated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(draft.guid)
        .bind(&draft.alpha2)
        .bind(&draft.alpha3)
        .bind(draft.dialcode)
        .bind(&draft.fr)
        .bind(&draft.en)
        .bind(stamp)
        .bind(stamp)
        .execute(&mut *conn)
        .await?;

        let id = done.last_insert_rowid();
        debug!(id, guid = draft.guid, "country created");

        engine::fetch_by_attribute(&mut *conn, TABLE, "id", Arg::Int(id), false)
            .await?
            .ok_or_else(|| DbError::Internal(format!("country {id} vanished after insert")))
    }

    /// Applies a patch: missing patch fields keep their stored values, and
    /// DataControl sees the merged row (uniqueness excludes the row itself).
    /// `None` when no row carries this id.
    pub async fn update(
        &self,
        id: i64,
        patch: CountryDraft,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Option<Country>> {
        let mut scope = self.db.scope(tx).await?;
        let conn = scope.conn();

        let existing: Country =
            match engine::fetch_by_attribute(&mut *conn, TABLE, "id", Arg::Int(id), false).await? {
                Some(row) => row,
                None => return Ok(None),
            };

        let merged = patch.merged_with(&existing);
        data_control(&mut *conn, TABLE, &merged, id).await?;

        sqlx::query(
            "UPDATE pca_country
             SET guid = ?, alpha2 = ?, alpha3 = ?, dialcode = ?, fr = ?, en = ?, updated = ?
             WHERE id = ?",
        )
        .bind(merged.guid)
        .bind(&merged.alpha2)
        .bind(&merged.alpha3)
        .bind(merged.dialcode)
        .bind(&merged.fr)
        .bind(&merged.en)
        .bind(now())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        debug!(id, "country updated");

        engine::fetch_by_attribute(&mut *conn, TABLE, "id", Arg::Int(id), false)
            .await?
            .ok_or_else(|| DbError::Internal(format!("country {id} vanished after update")))
            .map(Some)
    }

    /// Hard delete. `true` when a row was removed.
    pub async fn delete(&self, id: i64, tx: Option<&mut TxContext>) -> DbResult<bool> {
        let mut scope = self.db.scope(tx).await?;
        let removed = engine::delete_by_id(scope.conn(), TABLE, id).await?;
        if removed {
            debug!(id, "country deleted");
        }
        Ok(removed)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
