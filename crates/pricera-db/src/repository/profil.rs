//! # Profil Repository
//!
//! Database operations for profils (user roles). The `reference` column is
//! the machine-facing handle and is format-checked; `name` is the display
//! label. Both are unique.

use tracing::debug;

use crate::engine::{self, Arg, FindQuery, Paginated};
use crate::error::{DbError, DbResult};
use crate::guid;
use crate::pool::Database;
use crate::repository::{data_control, now};
use crate::tx::TxContext;
use pricera_core::{Profil, ProfilDraft, GUID_LENGTH};

const TABLE: &str = "pca_profil";

/// Repository for profil database operations.
#[derive(Debug, Clone)]
pub struct ProfilRepository {
    db: Database,
}

impl ProfilRepository {
    /// Creates a new ProfilRepository.
    pub fn new(db: Database) -> Self {
        ProfilRepository { db }
    }

    /// One profil by id.
    pub async fn find(&self, id: i64, tx: Option<&mut TxContext>) -> DbResult<Option<Profil>> {
        self.find_by_attribute("id", id, tx).await
    }

    /// One profil by any validated column (`guid`, `reference`, ...).
    pub async fn find_by_attribute(
        &self,
        attribute: &str,
        value: impl Into<Arg>,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Option<Profil>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_by_attribute(scope.conn(), TABLE, attribute, value.into(), false).await
    }

    /// Profils whose text column contains `needle`.
    pub async fn find_by_string(
        &self,
        attribute: &str,
        needle: &str,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<Profil>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_by_like(scope.conn(), TABLE, attribute, needle, false).await
    }

    /// All profils matching one column exactly.
    pub async fn find_multiple(
        &self,
        attribute: &str,
        value: impl Into<Arg>,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<Profil>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_many_by_attribute(scope.conn(), TABLE, attribute, value.into(), false).await
    }

    /// Caller-shaped paginated listing: equality criteria, ordering, and
    /// a page window (defaults: everything, id ascending, 10 per page).
    pub async fn find_all(
        &self,
        query: FindQuery,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Paginated<Profil>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_page(scope.conn(), TABLE, false, query).await
    }

    /// Creates a profil with a derived guid when the draft carries none.
    pub async fn create(&self, draft: ProfilDraft, tx: Option<&mut TxContext>) -> DbResult<Profil> {
        let mut scope = self.db.scope(tx).await?;
        let conn = scope.conn();

        let mut draft = draft;
        if draft.guid.is_none() {
            draft.guid = Some(guid::generate_guid(&mut *conn, TABLE, GUID_LENGTH, None).await?);
        }

        data_control(&mut *conn, TABLE, &draft, 0).await?;

        let stamp = now();
        let done = sqlx::query(
            "INSERT INTO pca_profil (guid, name, reference, description, created, updated)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(draft.guid)
        .bind(&draft.name)
        .bind(&draft.reference)
        .bind(&draft.description)
        .bind(stamp)
        .bind(stamp)
        .execute(&mut *conn)
        .await?;

        let id = done.last_insert_rowid();
        debug!(id, guid = draft.guid, "profil created");

        engine::fetch_by_attribute(&mut *conn, TABLE, "id", Arg::Int(id), false)
            .await?
            .ok_or_else(|| DbError::Internal(format!("profil {id} vanished after insert")))
    }

    /// Applies a patch over the stored row; DataControl sees the merge.
    /// `None` when no row carries this id.
    pub async fn update(
        &self,
        id: i64,
        patch: ProfilDraft,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Option<Profil>> {
        let mut scope = self.db.scope(tx).await?;
        let conn = scope.conn();

        let existing: Profil =
            match engine::fetch_by_attribute(&mut *conn, TABLE, "id", Arg::Int(id), false).await? {
                Some(row) => row,
                None => return Ok(None),
            };

        let merged = patch.merged_with(&existing);
        data_control(&mut *conn, TABLE, &merged, id).await?;

        sqlx::query(
            "UPDATE pca_profil
             SET guid = ?, name = ?, reference = ?, description = ?, updated = ?
             WHERE id = ?",
        )
        .bind(merged.guid)
        .bind(&merged.name)
        .bind(&merged.reference)
        .bind(&merged.description)
        .bind(now())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        debug!(id, "profil updated");

        engine::fetch_by_attribute(&mut *conn, TABLE, "id", Arg::Int(id), false)
            .await?
            .ok_or_else(|| DbError::Internal(format!("profil {id} vanished after update")))
            .map(Some)
    }

    /// Hard delete. `true` when a row was removed.
    pub async fn delete(&self, id: i64, tx: Option<&mut TxContext>) -> DbResult<bool> {
        let mut scope = self.db.scope(tx).await?;
        let removed = engine::delete_by_id(scope.conn(), TABLE, id).await?;
        if removed {
            debug!(id, "profil deleted");
        }
        Ok(removed)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn admin() -> ProfilDraft {
        ProfilDraft {
            guid: None,
            name: Some("Administrator".to_string()),
            reference: Some("admin".to_string()),
            description: Some("Full access".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_reference() {
        let db = test_db().await;
        let created = db.profils().create(admin(), None).await.unwrap();
        assert_eq!(created.guid, 100001);

        let found = db
            .profils()
            .find_by_attribute("reference", "admin", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.description.as_deref(), Some("Full access"));
    }

    #[tokio::test]
    async fn test_reference_format_enforced() {
        let db = test_db().await;
        let err = db
            .profils()
            .create(
                ProfilDraft {
                    reference: Some("not valid!".to_string()),
                    ..admin()
                },
                None,
            )
            .await
            .err()
            .unwrap();

        match err {
            DbError::Validation(v) => assert!(v.to_string().contains("reference has invalid format")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_name_and_reference_rejected_together() {
        let db = test_db().await;
        db.profils().create(admin(), None).await.unwrap();

        let err = db.profils().create(admin(), None).await.err().unwrap();
        match err {
            DbError::Validation(v) => {
                let msg = v.to_string();
                assert!(msg.contains("name already exists"), "{msg}");
                assert!(msg.contains("reference already exists"), "{msg}");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_keeps_unpatched_fields() {
        let db = test_db().await;
        let created = db.profils().create(admin(), None).await.unwrap();

        let updated = db
            .profils()
            .update(
                created.id,
                ProfilDraft {
                    description: Some("Everything".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "Administrator");
        assert_eq!(updated.reference, "admin");
        assert_eq!(updated.description.as_deref(), Some("Everything"));
    }

    #[tokio::test]
    async fn test_delete_reports_whether_a_row_went() {
        let db = test_db().await;
        assert!(!db.profils().delete(42, None).await.unwrap());

        let created = db.profils().create(admin(), None).await.unwrap();
        assert!(db.profils().delete(created.id, None).await.unwrap());
        assert!(db.profils().find(created.id, None).await.unwrap().is_none());
    }
}
