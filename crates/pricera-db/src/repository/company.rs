//! # Company Repository
//!
//! Database operations for companies: the directory's central entity, with
//! a WKT-encoded geographic point and two JSON-shaped columns.
//!
//! ## Geo Queries
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Radius / Nearest Strategy                              │
//! │                                                                         │
//! │  SQLite has no trigonometry, so geo queries run in two stages:         │
//! │                                                                         │
//! │  1. SELECT every company row (point is TEXT WKT)                       │
//! │  2. Decode each point, compute haversine distance to the center,       │
//! │     filter/sort in memory                                               │
//! │                                                                         │
//! │  Rows whose stored point no longer decodes are skipped with a          │
//! │  warning rather than failing the whole query.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tracing::{debug, warn};

use crate::engine::{self, Arg, FindQuery, Paginated};
use crate::error::{DbError, DbResult};
use crate::guid;
use crate::pool::Database;
use crate::repository::{data_control, now};
use crate::tx::TxContext;
use pricera_core::{Company, CompanyDraft, GeoPoint, GUID_LENGTH};

const TABLE: &str = "pca_company";

/// Repository for company database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.companies();
///
/// let nearby = repo
///     .find_by_radius(GeoPoint::new(4.05, 9.7)?, 25.0, None)
///     .await?;
/// for (company, km) in nearby {
///     println!("{} is {km:.1} km away", company.name);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CompanyRepository {
    db: Database,
}

fn json_col<T: Serialize>(value: &Option<T>) -> DbResult<Option<String>> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DbError::Internal(format!("json column encode failed: {e}")))
}

impl CompanyRepository {
    /// Creates a new CompanyRepository.
    pub fn new(db: Database) -> Self {
        CompanyRepository { db }
    }

    /// One company by id.
    pub async fn find(&self, id: i64, tx: Option<&mut TxContext>) -> DbResult<Option<Company>> {
        self.find_by_attribute("id", id, tx).await
    }

    /// One company by any validated column (`guid`, `code`, ...).
    pub async fn find_by_attribute(
        &self,
        attribute: &str,
        value: impl Into<Arg>,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Option<Company>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_by_attribute(scope.conn(), TABLE, attribute, value.into(), false).await
    }

    /// Companies whose text column contains `needle`.
    pub async fn find_by_string(
        &self,
        attribute: &str,
        needle: &str,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<Company>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_by_like(scope.conn(), TABLE, attribute, needle, false).await
    }

    /// All companies matching one column exactly (e.g. every company of a
    /// country).
    pub async fn find_multiple(
        &self,
        attribute: &str,
        value: impl Into<Arg>,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<Company>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_many_by_attribute(scope.conn(), TABLE, attribute, value.into(), false).await
    }

    /// Caller-shaped paginated listing: equality criteria, ordering, and
    /// a page window (defaults: everything, id ascending, 10 per page).
    pub async fn find_all(
        &self,
        query: FindQuery,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Paginated<Company>> {
        let mut scope = self.db.scope(tx).await?;
        engine::fetch_page(scope.conn(), TABLE, false, query).await
    }

    /// Creates a company. The guid is derived when absent; the point is
    /// encoded to WKT and the JSON columns serialized on the way in.
    pub async fn create(
        &self,
        draft: CompanyDraft,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Company> {
        let mut scope = self.db.scope(tx).await?;
        self.create_on(scope.conn(), draft).await
    }

    /// Creates every draft or none: with an ambient transaction the drafts
    /// join it, otherwise the batch runs in its own transaction and the
    /// first rejected draft rolls back the ones already inserted.
    pub async fn bulk_create(
        &self,
        drafts: Vec<CompanyDraft>,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<Company>> {
        match tx {
            Some(ctx) => {
                let mut out = Vec::with_capacity(drafts.len());
                for draft in drafts {
                    out.push(self.create_on(ctx.conn_mut()?, draft).await?);
                }
                Ok(out)
            }
            None => {
                let repo = self.clone();
                self.db
                    .run_in_transaction(move |ctx| {
                        Box::pin(async move {
                            let mut out = Vec::with_capacity(drafts.len());
                            for draft in drafts {
                                out.push(repo.create_on(ctx.conn_mut()?, draft).await?);
                            }
                            Ok(out)
                        })
                    })
                    .await
            }
        }
    }

    async fn create_on(
        &self,
        conn: &mut sqlx::SqliteConnection,
        draft: CompanyDraft,
    ) -> DbResult<Company> {
        let mut draft = draft;
        if draft.guid.is_none() {
            draft.guid = Some(guid::generate_guid(&mut *conn, TABLE, GUID_LENGTH, None).await?);
        }

        data_control(&mut *conn, TABLE, &draft, 0).await?;

        let stamp = now();
        let done = sqlx::query(
            "INSERT INTO pca_company
                 (guid, name, point, code, country, address, metadata, created, updated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(draft.guid)
        .bind(&draft.name)
        .bind(draft.point.map(|p| p.to_wkt()))
        .bind(&draft.code)
        .bind(draft.country)
        .bind(json_col(&draft.address)?)
        .bind(json_col(&draft.metadata)?)
        .bind(stamp)
        .bind(stamp)
        .execute(&mut *conn)
        .await?;

        let id = done.last_insert_rowid();
        debug!(id, guid = draft.guid, "company created");

        engine::fetch_by_attribute(&mut *conn, TABLE, "id", Arg::Int(id), false)
            .await?
            .ok_or_else(|| DbError::Internal(format!("company {id} vanished after insert")))
    }

    /// Applies a patch over the stored row; DataControl sees the merge.
    /// `None` when no row carries this id.
    pub async fn update(
        &self,
        id: i64,
        patch: CompanyDraft,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Option<Company>> {
        let mut scope = self.db.scope(tx).await?;
        let conn = scope.conn();

        let existing: Company =
            match engine::fetch_by_attribute(&mut *conn, TABLE, "id", Arg::Int(id), false).await? {
                Some(row) => row,
                None => return Ok(None),
            };

        let merged = patch
            .merged_with(&existing)
            .map_err(|e| DbError::Internal(format!("stored point for company {id}: {e}")))?;
        data_control(&mut *conn, TABLE, &merged, id).await?;

        sqlx::query(
            "UPDATE pca_company
             SET guid = ?, name = ?, point = ?, code = ?, country = ?,
                 address = ?, metadata = ?, updated = ?
             WHERE id = ?",
        )
        .bind(merged.guid)
        .bind(&merged.name)
        .bind(merged.point.map(|p| p.to_wkt()))
        .bind(&merged.code)
        .bind(merged.country)
        .bind(json_col(&merged.address)?)
        .bind(json_col(&merged.metadata)?)
        .bind(now())
        .bind(id)
        .execute(&mut *conn)
        .await?;

        debug!(id, "company updated");

        engine::fetch_by_attribute(&mut *conn, TABLE, "id", Arg::Int(id), false)
            .await?
            .ok_or_else(|| DbError::Internal(format!("company {id} vanished after update")))
            .map(Some)
    }

    /// Hard delete. `true` when a row was removed.
    pub async fn delete(&self, id: i64, tx: Option<&mut TxContext>) -> DbResult<bool> {
        let mut scope = self.db.scope(tx).await?;
        let removed = engine::delete_by_id(scope.conn(), TABLE, id).await?;
        if removed {
            debug!(id, "company deleted");
        }
        Ok(removed)
    }

    /// Companies whose address names this city.
    pub async fn find_by_city(
        &self,
        city: &str,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<Company>> {
        self.fetch_by_address_field("city", city, tx).await
    }

    /// Companies whose address names this location (the neighbourhood
    /// inside the city).
    pub async fn find_by_location(
        &self,
        location: &str,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<Company>> {
        self.fetch_by_address_field("location", location, tx).await
    }

    /// Companies whose metadata lists this domaine.
    pub async fn find_by_domaine(
        &self,
        domaine: &str,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<Company>> {
        self.fetch_by_metadata_field("domaine", domaine, tx).await
    }

    /// Companies whose metadata lists this sector.
    pub async fn find_by_sector(
        &self,
        sector: &str,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<Company>> {
        self.fetch_by_metadata_field("sector", sector, tx).await
    }

    /// Exact match on one field of the JSON address column.
    async fn fetch_by_address_field(
        &self,
        field: &'static str,
        value: &str,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<Company>> {
        let mut scope = self.db.scope(tx).await?;
        let sql = format!(
            "SELECT * FROM pca_company
             WHERE json_extract(address, '$.{field}') = ?
             ORDER BY id"
        );
        Ok(sqlx::query_as(&sql).bind(value).fetch_all(scope.conn()).await?)
    }

    /// Membership test on one field of the JSON metadata column. The field
    /// holds either a bare string or an array of strings; `json_each`
    /// walks both shapes the same way.
    async fn fetch_by_metadata_field(
        &self,
        field: &'static str,
        value: &str,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<Company>> {
        let mut scope = self.db.scope(tx).await?;
        let sql = format!(
            "SELECT * FROM pca_company
             WHERE metadata IS NOT NULL
               AND EXISTS (
                   SELECT 1 FROM json_each(metadata, '$.{field}')
                   WHERE json_each.value = ?
               )
             ORDER BY id"
        );
        Ok(sqlx::query_as(&sql).bind(value).fetch_all(scope.conn()).await?)
    }

    /// Companies within `radius_km` of `center`, closest first, each paired
    /// with its distance in kilometres.
    pub async fn find_by_radius(
        &self,
        center: GeoPoint,
        radius_km: f64,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<(Company, f64)>> {
        let mut measured = self.measured_from(center, tx).await?;
        measured.retain(|(_, km)| *km <= radius_km);
        Ok(measured)
    }

    /// The `limit` companies closest to `center`, each paired with its
    /// distance in kilometres.
    pub async fn find_nearest(
        &self,
        center: GeoPoint,
        limit: usize,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<(Company, f64)>> {
        let mut measured = self.measured_from(center, tx).await?;
        measured.truncate(limit);
        Ok(measured)
    }

    /// All companies with a decodable point, sorted by distance to `center`.
    async fn measured_from(
        &self,
        center: GeoPoint,
        tx: Option<&mut TxContext>,
    ) -> DbResult<Vec<(Company, f64)>> {
        let mut scope = self.db.scope(tx).await?;
        let rows: Vec<Company> = sqlx::query_as("SELECT * FROM pca_company ORDER BY id")
            .fetch_all(scope.conn())
            .await?;

        let mut measured: Vec<(Company, f64)> = Vec::with_capacity(rows.len());
        for company in rows {
            match company.geo() {
                Ok(point) => {
                    let km = center.haversine_km(&point);
                    measured.push((company, km));
                }
                Err(e) => {
                    warn!(id = company.id, error = %e, "skipping company with undecodable point");
                }
            }
        }

        measured.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(measured)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use pricera_core::{Address, CountryDraft, MetaValue, Metadata};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_country(db: &Database) -> i64 {
        db.countries()
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
            .id
    }

    fn draft(name: &str, country: i64, lat: f64, lon: f64) -> CompanyDraft {
        CompanyDraft {
            guid: None,
            name: Some(name.to_string()),
            point: Some(GeoPoint::new(lat, lon).unwrap()),
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
                speciality: Some(MetaValue::Many(vec!["electronics".to_string()])),
            }),
        }
    }

    #[tokio::test]
    async fn test_create_round_trips_point_and_json_columns() {
        let db = test_db().await;
        let country = seed_country(&db).await;

        let company = db
            .companies()
            .create(draft("Pricera SARL", country, 4.05, 9.7), None)
            .await
            .unwrap();

        assert_eq!(company.guid, 100001);
        assert_eq!(company.point, "POINT(9.7 4.05)");
        let geo = company.geo().unwrap();
        assert_eq!(geo, GeoPoint::new(4.05, 9.7).unwrap());
        assert_eq!(company.address.city.as_deref(), Some("Douala"));
        assert_eq!(
            company.metadata.speciality,
            Some(MetaValue::Many(vec!["electronics".to_string()]))
        );
    }

    #[tokio::test]
    async fn test_missing_point_and_json_fields_collected() {
        let db = test_db().await;
        let country = seed_country(&db).await;

        let mut bad = draft("Pricera SARL", country, 4.05, 9.7);
        bad.point = None;
        bad.address = Some(Address {
            city: Some("Douala".to_string()),
            location: None,
            district: None,
        });

        let err = db.companies().create(bad, None).await.err().unwrap();
        match err {
            DbError::Validation(v) => {
                let msg = v.to_string();
                assert!(msg.contains("point is required"), "{msg}");
                assert!(
                    msg.contains("address is missing required fields: location, district"),
                    "{msg}"
                );
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_optional_code_absent_twice_but_never_duplicated() {
        let db = test_db().await;
        let country = seed_country(&db).await;
        let repo = db.companies();

        // Two code-less companies coexist
        repo.create(draft("Alpha", country, 4.05, 9.7), None).await.unwrap();
        repo.create(draft("Beta", country, 4.06, 9.71), None).await.unwrap();

        let mut c1 = draft("Gamma", country, 4.07, 9.72);
        c1.code = Some("GAMMA1".to_string());
        repo.create(c1, None).await.unwrap();

        let mut c2 = draft("Delta", country, 4.08, 9.73);
        c2.code = Some("GAMMA1".to_string());
        let err = repo.create(c2, None).await.err().unwrap();
        match err {
            DbError::Validation(v) => assert!(v.to_string().contains("code already exists")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_patch_keeps_stored_point() {
        let db = test_db().await;
        let country = seed_country(&db).await;
        let company = db
            .companies()
            .create(draft("Pricera SARL", country, 4.05, 9.7), None)
            .await
            .unwrap();

        let updated = db
            .companies()
            .update(
                company.id,
                CompanyDraft {
                    name: Some("Pricera Group".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "Pricera Group");
        assert_eq!(updated.point, "POINT(9.7 4.05)");
        assert_eq!(updated.country, country);
    }

    #[tokio::test]
    async fn test_bulk_create_is_all_or_nothing() {
        let db = test_db().await;
        let country = seed_country(&db).await;

        let mut bad = draft("Broken", country, 4.1, 9.8);
        bad.name = None;

        let err = db
            .companies()
            .bulk_create(vec![draft("Good", country, 4.05, 9.7), bad], None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DbError::Validation(_)));

        // The valid first draft must have rolled back with the batch
        let page = db.companies().find_all(FindQuery::default(), None).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_find_by_radius_filters_and_sorts() {
        let db = test_db().await;
        let country = seed_country(&db).await;
        let repo = db.companies();

        // Douala, its outskirts, and Yaounde (~210 km away)
        repo.create(draft("Central", country, 4.05, 9.7), None).await.unwrap();
        repo.create(draft("Outskirts", country, 4.15, 9.8), None).await.unwrap();
        repo.create(draft("Capital", country, 3.867, 11.516), None).await.unwrap();

        let center = GeoPoint::new(4.05, 9.7).unwrap();
        let nearby = repo.find_by_radius(center, 50.0, None).await.unwrap();

        assert_eq!(nearby.len(), 2);
        assert_eq!(nearby[0].0.name, "Central");
        assert!(nearby[0].1 < 0.001);
        assert_eq!(nearby[1].0.name, "Outskirts");
        assert!(nearby[1].1 > 0.0 && nearby[1].1 < 50.0);
    }

    #[tokio::test]
    async fn test_find_nearest_orders_by_distance() {
        let db = test_db().await;
        let country = seed_country(&db).await;
        let repo = db.companies();

        repo.create(draft("Capital", country, 3.867, 11.516), None).await.unwrap();
        repo.create(draft("Central", country, 4.05, 9.7), None).await.unwrap();

        let center = GeoPoint::new(4.05, 9.7).unwrap();
        let nearest = repo.find_nearest(center, 1, None).await.unwrap();

        assert_eq!(nearest.len(), 1);
        assert_eq!(nearest[0].0.name, "Central");
    }

    #[tokio::test]
    async fn test_find_by_city_and_location() {
        let db = test_db().await;
        let country = seed_country(&db).await;
        let repo = db.companies();

        repo.create(draft("Central", country, 4.05, 9.7), None).await.unwrap();

        let mut capital = draft("Capital", country, 3.867, 11.516);
        capital.address = Some(Address {
            city: Some("Yaounde".to_string()),
            location: Some("Bastos".to_string()),
            district: Some("Mfoundi".to_string()),
        });
        repo.create(capital, None).await.unwrap();

        let douala = repo.find_by_city("Douala", None).await.unwrap();
        assert_eq!(douala.len(), 1);
        assert_eq!(douala[0].name, "Central");

        let bastos = repo.find_by_location("Bastos", None).await.unwrap();
        assert_eq!(bastos.len(), 1);
        assert_eq!(bastos[0].name, "Capital");

        assert!(repo.find_by_city("Garoua", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_domaine_matches_string_and_array_shapes() {
        let db = test_db().await;
        let country = seed_country(&db).await;
        let repo = db.companies();

        // Bare-string domaine
        repo.create(draft("Central", country, 4.05, 9.7), None).await.unwrap();

        // Array-shaped domaine sharing one entry
        let mut mixed = draft("Mixed", country, 4.06, 9.71);
        mixed.metadata = Some(Metadata {
            domaine: Some(MetaValue::Many(vec![
                "commerce".to_string(),
                "services".to_string(),
            ])),
            sector: Some(MetaValue::One("wholesale".to_string())),
            speciality: Some(MetaValue::One("hardware".to_string())),
        });
        repo.create(mixed, None).await.unwrap();

        let commerce = repo.find_by_domaine("commerce", None).await.unwrap();
        assert_eq!(commerce.len(), 2);

        let services = repo.find_by_domaine("services", None).await.unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "Mixed");

        let retail = repo.find_by_sector("retail", None).await.unwrap();
        assert_eq!(retail.len(), 1);
        assert_eq!(retail[0].name, "Central");

        assert!(repo.find_by_sector("mining", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_geo_queries_skip_corrupted_points() {
        let db = test_db().await;
        let country = seed_country(&db).await;
        let repo = db.companies();

        let broken = repo.create(draft("Broken", country, 4.05, 9.7), None).await.unwrap();
        repo.create(draft("Central", country, 4.05, 9.7), None).await.unwrap();

        // Corrupt one row behind the engine's back
        let mut conn = db.pool().acquire().await.unwrap();
        sqlx::query("UPDATE pca_company SET point = 'garbage' WHERE id = ?")
            .bind(broken.id)
            .execute(conn.as_mut())
            .await
            .unwrap();
        drop(conn);

        let center = GeoPoint::new(4.05, 9.7).unwrap();
        let nearby = repo.find_by_radius(center, 10.0, None).await.unwrap();
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].0.name, "Central");
    }
}
