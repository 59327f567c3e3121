//! # Account Repository
//!
//! Database operations for accounts, the one soft-deletable entity.
//!
//! ## Soft Delete
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Account Lifecycle                                   │
//! │                                                                         │
//! │  create ──► live (deleted = 0) ──► soft_delete() ──► flagged           │
//! │                 ▲                     (deleted = 1, deleted_at set,     │
//! │                 │                      active cleared)                  │
//! │                 │                                                       │
//! │   every find* filters deleted = 0, so a flagged row is invisible       │
//! │   to lookups but keeps its guid and code reserved forever              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `deleted`/`deleted_at` columns are engine-owned: drafts cannot set
//! them, only `soft_delete` does.

use tracing::debug;

use crate::engine::{self, Arg, FindQuery, Paginated};
use crate::error::{DbError, DbResult};
use crate::guid;
use crate::pool::Database;
use crate::repository::{data_control, now};
use crate::tx::TxContext;
use pricera_core::{Account, AccountDraft, CODE_LENGTH, GUID_LENGTH};

const TABLE: &str = "pca_account";

/// Repository for account database operations.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: Database,
}

impl AccountRepository {
    /// Creates a new AccountRepository.
    pub fn new(db: Database) -> Self {
        AccountRepository { db }
    }

    /// One live account by id.
    pub async fn find(&self, id: i64, tx: Option<&mut TxContext>) -> DbResult<Option<Account>> {
        self.find_by_attribute("id", id, tx).await
    }

    /// One live account by any validated column (`guid`, `code`, ...).
    pub async fn find_by_attribute(
        &self,
        attribute: &str,
        value: impl Into<Arg>,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Option<Account>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_by_attribute(scope.conn(), TABLE, attribute, value.into(), true).await
    }

    /// Live accounts whose text column contains `needle`.
    pub async fn find_by_string(
        &self,
        attribute: &str,
        needle: &str,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<Account>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_by_like(scope.conn(), TABLE, attribute, needle, true).await
    }

    /// All live accounts matching one column exactly (e.g. every account of
    /// a company).
    pub async fn find_multiple(
        &self,
        attribute: &str,
        value: impl Into<Arg>,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<Account>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_many_by_attribute(scope.conn(), TABLE, attribute, value.into(), true).await
    }

    /// Caller-shaped paginated listing of live accounts; the total counts
    /// live rows only (defaults: everything, id ascending, 10 per page).
    pub async fn find_all(
        &self,
        query: FindQuery,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Paginated<Account>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_page(scope.conn(), TABLE, true, query).await
    }

    /// Creates an account. Both identifiers are derived when absent: the
    /// numeric guid from the id ceiling, the short code drawn at random
    /// from `A-Z0-9`.
    pub async fn create(
        &self,
        draft: AccountDraft,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Account> {
        let mut scope = self.db.scope(tx).await?;
        let conn = scope.conn();

        let mut draft = draft;
        if draft.guid.is_none() {
            draft.guid = Some(guid::generate_guid(&mut *conn, TABLE, GUID_LENGTH, None).await?);
        }
        if draft.code.is_none() {
            draft.code = Some(guid::generate_unique_code(&mut *conn, TABLE, CODE_LENGTH).await?);
        }

        data_control(&mut *conn, TABLE, &draft, 0).await?;

        let stamp = now();
        let done = sqlx::query(
            "INSERT INTO pca_account
                 (guid, code, company, active, blocked, deleted, last_login, created, updated)
             VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?)",
        )
        .bind(draft.guid)
        .bind(&draft.code)
        .bind(draft.company)
        .bind(draft.active.unwrap_or(false))
        .bind(draft.blocked.unwrap_or(false))
        .bind(draft.last_login)
        .bind(stamp)
        .bind(stamp)
        .execute(&mut *conn)
        .await?;

        let id = done.last_insert_rowid();
        debug!(id, guid = draft.guid, "account created");

        engine::fetch_by_attribute(&mut *conn, TABLE, "id", Arg::Int(id), true)
            .await?
            .ok_or_else(|| DbError::Internal(format!("account {id} vanished after insert")))
    }

    /// Applies a patch over the stored row; DataControl sees the merge.
    /// `None` when no live row carries this id, flagged rows included.
    pub async fn update(
        &self,
        id: i64,
        patch: AccountDraft,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Option<Account>> {
        let mut scope = self.db.scope(tx).await?;
        let conn = scope.conn();

        let existing: Account =
            match engine::fetch_by_attribute(&mut *conn, TABLE, "id", Arg::Int(id), true).await? {
                Some(row) => row,
                None => return Ok(None),
            };

        let merged = patch.merged_with(&existing);
        data_control(&mut *conn, TABLE, &merged, id).await?;

        sqlx::query(
            "UPDATE pca_account
             SET guid = ?, code = ?, company = ?, active = ?, blocked = ?,
                 last_login = ?, updated = ?
             WHERE id = ?",
        )
        .bind(merged.guid)
        .bind(&merged.code)
        .bind(merged.company)
        .bind(merged.active)
        .bind(merged.blocked)
        .bind(merged.last_login)
        .bind(now())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        debug!(id, "account updated");

        engine::fetch_by_attribute(&mut *conn, TABLE, "id", Arg::Int(id), true)
            .await?
            .ok_or_else(|| DbError::Internal(format!("account {id} vanished after update")))
            .map(Some)
    }

    /// Soft delete: flags the row instead of removing it. The guid and code
    /// stay reserved; the account also loses its `active` flag so a later
    /// restore starts deactivated. `true` when a live row was flagged,
    /// `false` when the row is missing or already flagged, so a repeated
    /// call reports `false` instead of failing.
    pub async fn soft_delete(&self, id: i64, tx: Option<&mut TxContext>) -> DbResult<bool> {
        let mut scope = self.db.scope(tx).await?;
        let conn = scope.conn();

        let stamp = now();
        let done = sqlx::query(
            "UPDATE pca_account
             SET deleted = 1, deleted_at = ?, active = 0, updated = ?
             WHERE id = ? AND deleted = 0",
        )
        .bind(stamp)
        .bind(stamp)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        let flagged = done.rows_affected() > 0;
        if flagged {
            debug!(id, "account soft-deleted");
        }
        Ok(flagged)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use pricera_core::{Address, CompanyDraft, CountryDraft, GeoPoint, MetaValue, Metadata};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_company(db: &Database) -> i64 {
        let country = db
            .countries()
            .create(
                CountryDraft {
                    guid: None,
                    alpha2: Some("CM".to_string()),
                    alpha3: Some("CMR".to_string()),
                    dialcode: Some(237),
                    fr: Some("Cameroun".to_string()),
                    en: Some("Cameroon".to_string()),
                },
                None,
            )
            .await
            .unwrap()
            .id;

        db.companies()
            .create(
                CompanyDraft {
                    guid: None,
                    name: Some("Pricera SARL".to_string()),
                    point: Some(GeoPoint::new(4.05, 9.7).unwrap()),
                    code: None,
                    country: Some(country),
                    address: Some(Address {
                        city: Some("Douala".to_string()),
                        location: Some("Akwa".to_string()),
                        district: Some("Wouri".to_string()),
                    }),
                    metadata: Some(Metadata {
                        domaine: Some(MetaValue::One("commerce".to_string())),
                        sector: Some(MetaValue::One("retail".to_string())),
                        speciality: Some(MetaValue::One("electronics".to_string())),
                    }),
                },
                None,
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_create_derives_guid_and_code() {
        let db = test_db().await;
        let company = seed_company(&db).await;

        let account = db
            .accounts()
            .create(AccountDraft { company: Some(company), ..Default::default() }, None)
            .await
            .unwrap();

        assert_eq!(account.guid, 100001);
        assert_eq!(account.code.len(), CODE_LENGTH);
        assert!(!account.active);
        assert!(!account.blocked);
        assert!(!account.deleted);
        assert!(account.deleted_at.is_none());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_but_keeps_row() {
        let db = test_db().await;
        let company = seed_company(&db).await;
        let repo = db.accounts();

        let account = repo
            .create(
                AccountDraft {
                    company: Some(company),
                    active: Some(true),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        assert!(repo.soft_delete(account.id, None).await.unwrap());
        // A second pass finds nothing left to flag.
        assert!(!repo.soft_delete(account.id, None).await.unwrap());

        // Invisible to every lookup
        assert!(repo.find(account.id, None).await.unwrap().is_none());
        assert!(repo
            .find_by_attribute("code", account.code.clone(), None)
            .await
            .unwrap()
            .is_none());
        let page = repo.find_all(FindQuery::default(), None).await.unwrap();
        assert_eq!(page.total, 0);

        // But the row is still physically there, flagged and deactivated
        let mut conn = db.pool().acquire().await.unwrap();
        let (deleted, active): (bool, bool) =
            sqlx::query_as("SELECT deleted, active FROM pca_account WHERE id = ?")
                .bind(account.id)
                .fetch_one(conn.as_mut())
                .await
                .unwrap();
        assert!(deleted);
        assert!(!active, "soft delete clears the active flag");
    }

    #[tokio::test]
    async fn test_soft_deleted_code_stays_reserved() {
        let db = test_db().await;
        let company = seed_company(&db).await;
        let repo = db.accounts();

        let account = repo
            .create(AccountDraft { company: Some(company), ..Default::default() }, None)
            .await
            .unwrap();
        let code = account.code.clone();
        assert!(repo.soft_delete(account.id, None).await.unwrap());

        // An explicit attempt to reuse the flagged row's code must fail:
        // uniqueness looks at all rows, live or not.
        let err = repo
            .create(
                AccountDraft {
                    company: Some(company),
                    code: Some(code),
                    ..Default::default()
                },
                None,
            )
            .await
            .err()
            .unwrap();
        match err {
            DbError::Validation(v) => assert!(v.to_string().contains("code already exists")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_refuses_soft_deleted_row() {
        let db = test_db().await;
        let company = seed_company(&db).await;
        let repo = db.accounts();

        let account = repo
            .create(AccountDraft { company: Some(company), ..Default::default() }, None)
            .await
            .unwrap();
        repo.soft_delete(account.id, None).await.unwrap();

        let patched = repo
            .update(
                account.id,
                AccountDraft { blocked: Some(true), ..Default::default() },
                None,
            )
            .await
            .unwrap();
        assert!(patched.is_none(), "a flagged row reads as absent");
    }

    #[tokio::test]
    async fn test_update_records_last_login() {
        let db = test_db().await;
        let company = seed_company(&db).await;
        let repo = db.accounts();

        let account = repo
            .create(AccountDraft { company: Some(company), ..Default::default() }, None)
            .await
            .unwrap();
        assert!(account.last_login.is_none());

        let stamp = chrono::Utc::now();
        let updated = repo
            .update(
                account.id,
                AccountDraft { last_login: Some(stamp), ..Default::default() },
                None,
            )
            .await
            .unwrap()
            .unwrap();
        let stored = updated.last_login.unwrap();
        assert!((stored - stamp).num_milliseconds().abs() < 1000);
        assert_eq!(updated.code, account.code);
    }

    #[tokio::test]
    async fn test_find_multiple_by_company_skips_flagged() {
        let db = test_db().await;
        let company = seed_company(&db).await;
        let repo = db.accounts();

        let a = repo
            .create(AccountDraft { company: Some(company), ..Default::default() }, None)
            .await
            .unwrap();
        repo.create(AccountDraft { company: Some(company), ..Default::default() }, None)
            .await
            .unwrap();
        repo.soft_delete(a.id, None).await.unwrap();

        let live = repo.find_multiple("company", company, None).await.unwrap();
        assert_eq!(live.len(), 1);
    }
}
