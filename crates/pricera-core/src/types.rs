//! # Entity Records
//!
//! Plain data records for the five managed entities, plus the draft shapes
//! used on the way into the store.
//!
//! ## Record vs Draft
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Two Shapes Per Entity                             │
//! │                                                                         │
//! │  XxxDraft  ── all fields optional ──►  DataControl  ──►  INSERT/UPDATE │
//! │     ▲                                      │                            │
//! │     │  merged_with(existing) for updates   │ aggregated Violations     │
//! │     │                                      ▼                            │
//! │  Xxx (record) ◄── re-fetched after the write, detached copy            │
//! │                                                                         │
//! │  The record is what repositories hand back: a plain struct with the    │
//! │  generated columns (id, guid, created, updated) filled in. Never a     │
//! │  live store handle.                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: store auto-increment - immutable, used for relations
//! - `guid`: probed integer surrogate with a digit-length floor, never
//!   ambiguous with `id` and never reused after deletion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GeoError;
use crate::geo::GeoPoint;

// =============================================================================
// JSON-shaped column values (Company)
// =============================================================================

/// Company address, stored as a JSON column.
///
/// All three sub-fields are required; the DataControl hook reports every
/// missing one by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub location: Option<String>,
    pub district: Option<String>,
}

impl Address {
    /// Names of the required sub-fields that are absent or blank.
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for (name, value) in [
            ("city", &self.city),
            ("location", &self.location),
            ("district", &self.district),
        ] {
            match value {
                Some(s) if !s.trim().is_empty() => {}
                _ => missing.push(name.to_string()),
            }
        }
        missing
    }
}

/// One metadata entry: a single value or a list of values.
///
/// Serialized untagged, so `"retail"` and `["retail", "wholesale"]` both
/// round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    One(String),
    Many(Vec<String>),
}

impl MetaValue {
    /// A value is empty when it is a blank string or an empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            MetaValue::One(s) => s.trim().is_empty(),
            MetaValue::Many(values) => {
                values.is_empty() || values.iter().all(|v| v.trim().is_empty())
            }
        }
    }
}

/// Company metadata, stored as a JSON column.
///
/// Each field may be a string or a list of strings, but not absent/empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub domaine: Option<MetaValue>,
    pub sector: Option<MetaValue>,
    pub speciality: Option<MetaValue>,
}

impl Metadata {
    /// Names of the required sub-fields that are absent or empty.
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for (name, value) in [
            ("domaine", &self.domaine),
            ("sector", &self.sector),
            ("speciality", &self.speciality),
        ] {
            match value {
                Some(v) if !v.is_empty() => {}
                _ => missing.push(name.to_string()),
            }
        }
        missing
    }
}

// =============================================================================
// Country
// =============================================================================

/// A country record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Country {
    pub id: i64,
    pub guid: i64,
    pub alpha2: String,
    pub alpha3: String,
    pub dialcode: i64,
    pub fr: String,
    pub en: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Incoming country data; also the patch shape for updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryDraft {
    pub guid: Option<i64>,
    pub alpha2: Option<String>,
    pub alpha3: Option<String>,
    pub dialcode: Option<i64>,
    pub fr: Option<String>,
    pub en: Option<String>,
}

impl CountryDraft {
    /// Merged view of an existing record plus this patch, so DataControl
    /// validates what the row will look like after the update.
    pub fn merged_with(&self, existing: &Country) -> CountryDraft {
        CountryDraft {
            guid: self.guid.or(Some(existing.guid)),
            alpha2: self.alpha2.clone().or_else(|| Some(existing.alpha2.clone())),
            alpha3: self.alpha3.clone().or_else(|| Some(existing.alpha3.clone())),
            dialcode: self.dialcode.or(Some(existing.dialcode)),
            fr: self.fr.clone().or_else(|| Some(existing.fr.clone())),
            en: self.en.clone().or_else(|| Some(existing.en.clone())),
        }
    }
}

// =============================================================================
// Profil
// =============================================================================

/// A profil (role) record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Profil {
    pub id: i64,
    pub guid: i64,
    pub name: String,
    pub reference: String,
    pub description: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Incoming profil data; also the patch shape for updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilDraft {
    pub guid: Option<i64>,
    pub name: Option<String>,
    pub reference: Option<String>,
    pub description: Option<String>,
}

impl ProfilDraft {
    pub fn merged_with(&self, existing: &Profil) -> ProfilDraft {
        ProfilDraft {
            guid: self.guid.or(Some(existing.guid)),
            name: self.name.clone().or_else(|| Some(existing.name.clone())),
            reference: self
                .reference
                .clone()
                .or_else(|| Some(existing.reference.clone())),
            description: self.description.clone().or_else(|| existing.description.clone()),
        }
    }
}

// =============================================================================
// Company
// =============================================================================

/// A company record.
///
/// `point` is the raw WKT text exactly as stored; use [`Company::geo`] for
/// the decoded coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Company {
    pub id: i64,
    pub guid: i64,
    pub name: String,
    pub point: String,
    pub code: Option<String>,
    pub country: i64,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub address: Address,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub metadata: Metadata,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Company {
    /// Decodes the stored WKT point.
    pub fn geo(&self) -> Result<GeoPoint, GeoError> {
        GeoPoint::from_wkt(&self.point)
    }
}

/// Incoming company data; also the patch shape for updates.
///
/// The point comes in already decoded - a `GeoPoint` is range-valid by
/// construction, so DataControl only has to check presence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyDraft {
    pub guid: Option<i64>,
    pub name: Option<String>,
    pub point: Option<GeoPoint>,
    pub code: Option<String>,
    pub country: Option<i64>,
    pub address: Option<Address>,
    pub metadata: Option<Metadata>,
}

impl CompanyDraft {
    /// Merged view for updates.
    ///
    /// Fails only if the stored point text no longer decodes, which means
    /// the row was corrupted outside the engine.
    pub fn merged_with(&self, existing: &Company) -> Result<CompanyDraft, GeoError> {
        let point = match self.point {
            Some(p) => Some(p),
            None => Some(existing.geo()?),
        };
        Ok(CompanyDraft {
            guid: self.guid.or(Some(existing.guid)),
            name: self.name.clone().or_else(|| Some(existing.name.clone())),
            point,
            code: self.code.clone().or_else(|| existing.code.clone()),
            country: self.country.or(Some(existing.country)),
            address: self
                .address
                .clone()
                .or_else(|| Some(existing.address.clone())),
            metadata: self
                .metadata
                .clone()
                .or_else(|| Some(existing.metadata.clone())),
        })
    }
}

// =============================================================================
// Account
// =============================================================================

/// An account record. Accounts are soft-deletable: `deleted` rows stay in
/// the store but are invisible to every lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Account {
    pub id: i64,
    pub guid: i64,
    pub code: String,
    pub company: i64,
    pub active: bool,
    pub blocked: bool,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Incoming account data; also the patch shape for updates.
///
/// The soft-delete columns (`deleted`, `deleted_at`) are engine-owned and
/// deliberately absent here - only `soft_delete` touches them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountDraft {
    pub guid: Option<i64>,
    pub code: Option<String>,
    pub company: Option<i64>,
    pub active: Option<bool>,
    pub blocked: Option<bool>,
    pub last_login: Option<DateTime<Utc>>,
}

impl AccountDraft {
    pub fn merged_with(&self, existing: &Account) -> AccountDraft {
        AccountDraft {
            guid: self.guid.or(Some(existing.guid)),
            code: self.code.clone().or_else(|| Some(existing.code.clone())),
            company: self.company.or(Some(existing.company)),
            active: self.active.or(Some(existing.active)),
            blocked: self.blocked.or(Some(existing.blocked)),
            last_login: self.last_login.or(existing.last_login),
        }
    }
}

// =============================================================================
// User
// =============================================================================

/// A user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub guid: i64,
    pub name: String,
    pub profil: i64,
    pub account: i64,
    pub mobile: i64,
    pub email: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Incoming user data; also the patch shape for updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDraft {
    pub guid: Option<i64>,
    pub name: Option<String>,
    pub profil: Option<i64>,
    pub account: Option<i64>,
    pub mobile: Option<i64>,
    pub email: Option<String>,
}

impl UserDraft {
    pub fn merged_with(&self, existing: &User) -> UserDraft {
        UserDraft {
            guid: self.guid.or(Some(existing.guid)),
            name: self.name.clone().or_else(|| Some(existing.name.clone())),
            profil: self.profil.or(Some(existing.profil)),
            account: self.account.or(Some(existing.account)),
            mobile: self.mobile.or(Some(existing.mobile)),
            email: self.email.clone().or_else(|| Some(existing.email.clone())),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
