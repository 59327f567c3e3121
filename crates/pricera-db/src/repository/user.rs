//! # User Repository
//!
//! Database operations for users. A user hangs off one account and one
//! profil; mobile and email are identity-grade and therefore unique.

use tracing::debug;

use crate::engine::{self, Arg, FindQuery, Paginated};
use crate::error::{DbError, DbResult};
use crate::guid;
use crate::pool::Database;
use crate::repository::{data_control, now};
use crate::tx::TxContext;
use pricera_core::{User, UserDraft, GUID_LENGTH};

const TABLE: &str = "pca_user";

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(db: Database) -> Self {
        UserRepository { db }
    }

    /// One user by id.
    pub async fn find(&self, id: i64, tx: Option<&mut TxContext>) -> DbResult<Option<User>> {
        self.find_by_attribute("id", id, tx).await
    }

    /// One user by any validated column (`guid`, `email`, `mobile`, ...).
    pub async fn find_by_attribute(
        &self,
        attribute: &str,
        value: impl Into<Arg>,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Option<User>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_by_attribute(scope.conn(), TABLE, attribute, value.into(), false).await
    }

    /// Users whose text column contains `needle`.
    pub async fn find_by_string(
        &self,
        attribute: &str,
        needle: &str,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<User>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_by_like(scope.conn(), TABLE, attribute, needle, false).await
    }

    /// All users matching one column exactly (e.g. every user of an
    /// account).
    pub async fn find_multiple(
        &self,
        attribute: &str,
        value: impl Into<Arg>,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<User>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_many_by_attribute(scope.conn(), TABLE, attribute, value.into(), false).await
    }

    /// Caller-shaped paginated listing: equality criteria, ordering, and
    /// a page window (defaults: everything, id ascending, 10 per page).
    pub async fn find_all(
        &self,
        query: FindQuery,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Paginated<User>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_page(scope.conn(), TABLE, false, query).await
    }

    /// Creates a user with a derived guid when the draft carries none.
    pub async fn create(&self, draft: UserDraft, tx: Option<&mut TxContext>) -> DbResult<User> {
        let mut scope = self.db.scope(tx).await?;
        let conn = scope.conn();

        let mut draft = draft;
        if draft.guid.is_none() {
            draft.guid = Some(guid::generate_guid(&mut *conn, TABLE, GUID_LENGTH, None).await?);
        }

        data_control(&mut *conn, TABLE, &draft, 0).await?;

        let stamp = now();
        let done = sqlx::query(
            "INSERT INTO pca_user (guid, name, profil, account, mobile, email, created, updated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(draft.guid)
        .bind(&draft.name)
        .bind(draft.profil)
        .bind(draft.account)
        .bind(draft.mobile)
        .bind(&draft.email)
        .bind(stamp)
        .bind(stamp)
        .execute(&mut *conn)
        .await?;

        let id = done.last_insert_rowid();
        debug!(id, guid = draft.guid, "user created");

        engine::fetch_by_attribute(&mut *conn, TABLE, "id", Arg::Int(id), false)
            .await?
            .ok_or_else(|| DbError::Internal(format!("user {id} vanished after insert")))
    }

    /// Applies a patch over the stored row; DataControl sees the merge.
    /// `None` when no row carries this id.
    pub async fn update(
        &self,
        id: i64,
        patch: UserDraft,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Option<User>> {
        let mut scope = self.db.scope(tx).await?;
        let conn = scope.conn();

        let existing: User =
            match engine::fetch_by_attribute(&mut *conn, TABLE, "id", Arg::Int(id), false).await? {
                Some(row) => row,
                None => return Ok(None),
            };

        let merged = patch.merged_with(&existing);
        data_control(&mut *conn, TABLE, &merged, id).await?;

        sqlx::query(
            "UPDATE pca_user
             SET guid = ?, name = ?, profil = ?, account = ?, mobile = ?, email = ?, updated = ?
             WHERE id = ?",
        )
        .bind(merged.guid)
        .bind(&merged.name)
        .bind(merged.profil)
        .bind(merged.account)
        .bind(merged.mobile)
        .bind(&merged.email)
        .bind(now())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        debug!(id, "user updated");

        engine::fetch_by_attribute(&mut *conn, TABLE, "id", Arg::Int(id), false)
            .await?
            .ok_or_else(|| DbError::Internal(format!("user {id} vanished after update")))
            .map(Some)
    }

    /// Hard delete. `true` when a row was removed.
    pub async fn delete(&self, id: i64, tx: Option<&mut TxContext>) -> DbResult<bool> {
        let mut scope = self.db.scope(tx).await?;
        let removed = engine::delete_by_id(scope.conn(), TABLE, id).await?;
        if removed {
            debug!(id, "user deleted");
        }
        Ok(removed)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
