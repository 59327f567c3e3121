//! # Validation Rules (DataControl, store-free half)
//!
//! Declarative per-entity rule tables plus the single generic evaluator
//! that replaces ad hoc per-entity field checks.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      DataControl Layers                                 │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure, no store)                                 │
//! │  ├── Required-field presence (non-null, non-blank after trim)          │
//! │  ├── Length constraints                                                 │
//! │  ├── Format constraints (reference codes, email)                       │
//! │  └── Structural JSON checks (address, metadata, point presence)        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: pricera-db (needs the store)                                 │
//! │  └── Uniqueness re-query per UniqueRule, excluding the row's own id    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite constraints                                           │
//! │  └── UNIQUE indexes catch the concurrent race the re-query cannot      │
//! │                                                                         │
//! │  Violations from layers 1+2 are collected into ONE error - the save    │
//! │  reports every broken rule, never just the first.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ValidationError, Violations};
use crate::types::{AccountDraft, CompanyDraft, CountryDraft, ProfilDraft, UserDraft};
use crate::{MAX_CODE_LEN, MAX_NAME_LEN};

/// Reference codes: alphanumeric plus underscore and hyphen.
static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("reference pattern is valid"));

/// Deliberately loose email shape check - deliverability is not our problem.
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

// =============================================================================
// Rule Tables
// =============================================================================

/// Controlled character sets for text fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `[A-Za-z0-9_-]+`, used for reference-like codes.
    Reference,
    /// Loose email shape: something@something.tld
    Email,
}

impl Format {
    /// Checks a trimmed value against the format.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Format::Reference => REFERENCE_RE.is_match(value),
            Format::Email => EMAIL_RE.is_match(value),
        }
    }

    /// Human-readable reason used in the violation message.
    pub fn reason(&self) -> &'static str {
        match self {
            Format::Reference => {
                "must contain only alphanumeric characters, underscores, and hyphens"
            }
            Format::Email => "must be a valid email address",
        }
    }
}

/// One row of an entity's rule table.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub required: bool,
    pub max_len: Option<usize>,
    pub format: Option<Format>,
}

/// A column whose value must be unique in the entity's table.
///
/// Evaluated in pricera-db at save time - uniqueness cannot be guaranteed
/// by in-memory checks alone.
#[derive(Debug, Clone, Copy)]
pub struct UniqueRule {
    pub field: &'static str,
}

/// A field value as seen by the generic evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    /// Absent / null.
    Missing,
    Text(&'a str),
    Int(i64),
    Bool(bool),
}

// =============================================================================
// DataRules Trait
// =============================================================================

/// Implemented by every entity draft: the rule table plus by-name field
/// access, so one evaluator serves all entities.
pub trait DataRules {
    /// The declarative rule table.
    fn rules() -> &'static [FieldRule];

    /// Columns re-checked for uniqueness at save time.
    fn unique_rules() -> &'static [UniqueRule] {
        &[]
    }

    /// Looks a field up by its rule-table name.
    fn field(&self, name: &str) -> FieldValue<'_>;

    /// Entity-specific structural checks (JSON columns, point presence).
    fn validate_extra(&self, _out: &mut Violations) {}
}

/// Runs the rule table and structural checks over one candidate row,
/// collecting every violation.
pub fn check<T: DataRules>(row: &T) -> Violations {
    let mut out = Violations::new();

    for rule in T::rules() {
        match row.field(rule.field) {
            FieldValue::Missing => {
                if rule.required {
                    out.push(ValidationError::Required {
                        field: rule.field.to_string(),
                    });
                }
            }
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    if rule.required {
                        out.push(ValidationError::Required {
                            field: rule.field.to_string(),
                        });
                    }
                    continue;
                }
                if let Some(max) = rule.max_len {
                    if s.chars().count() > max {
                        out.push(ValidationError::TooLong {
                            field: rule.field.to_string(),
                            max,
                        });
                    }
                }
                if let Some(format) = rule.format {
                    if !format.matches(trimmed) {
                        out.push(ValidationError::InvalidFormat {
                            field: rule.field.to_string(),
                            reason: format.reason().to_string(),
                        });
                    }
                }
            }
            FieldValue::Int(_) | FieldValue::Bool(_) => {}
        }
    }

    row.validate_extra(&mut out);
    out
}

// Option helpers shared by the impls below.
fn text(value: &Option<String>) -> FieldValue<'_> {
    match value {
        Some(s) => FieldValue::Text(s),
        None => FieldValue::Missing,
    }
}

fn int(value: &Option<i64>) -> FieldValue<'_> {
    match value {
        Some(i) => FieldValue::Int(*i),
        None => FieldValue::Missing,
    }
}

// =============================================================================
// Country
// =============================================================================

const COUNTRY_RULES: &[FieldRule] = &[
    FieldRule { field: "guid", required: true, max_len: None, format: None },
    FieldRule { field: "alpha2", required: true, max_len: Some(MAX_CODE_LEN), format: None },
    FieldRule { field: "alpha3", required: true, max_len: Some(MAX_CODE_LEN), format: None },
    FieldRule { field: "dialcode", required: true, max_len: None, format: None },
    FieldRule { field: "fr", required: true, max_len: Some(MAX_NAME_LEN), format: None },
    FieldRule { field: "en", required: true, max_len: Some(MAX_NAME_LEN), format: None },
];

const COUNTRY_UNIQUE: &[UniqueRule] = &[
    UniqueRule { field: "guid" },
    UniqueRule { field: "alpha2" },
    UniqueRule { field: "alpha3" },
];

impl DataRules for CountryDraft {
    fn rules() -> &'static [FieldRule] {
        COUNTRY_RULES
    }

    fn unique_rules() -> &'static [UniqueRule] {
        COUNTRY_UNIQUE
    }

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "guid" => int(&self.guid),
            "alpha2" => text(&self.alpha2),
            "alpha3" => text(&self.alpha3),
            "dialcode" => int(&self.dialcode),
            "fr" => text(&self.fr),
            "en" => text(&self.en),
            _ => FieldValue::Missing,
        }
    }
}

// =============================================================================
// Profil
// =============================================================================

const PROFIL_RULES: &[FieldRule] = &[
    FieldRule { field: "guid", required: true, max_len: None, format: None },
    FieldRule { field: "name", required: true, max_len: Some(MAX_NAME_LEN), format: None },
    FieldRule {
        field: "reference",
        required: true,
        max_len: Some(MAX_NAME_LEN),
        format: Some(Format::Reference),
    },
    FieldRule { field: "description", required: false, max_len: None, format: None },
];

const PROFIL_UNIQUE: &[UniqueRule] = &[
    UniqueRule { field: "guid" },
    UniqueRule { field: "name" },
    UniqueRule { field: "reference" },
];

impl DataRules for ProfilDraft {
    fn rules() -> &'static [FieldRule] {
        PROFIL_RULES
    }

    fn unique_rules() -> &'static [UniqueRule] {
        PROFIL_UNIQUE
    }

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "guid" => int(&self.guid),
            "name" => text(&self.name),
            "reference" => text(&self.reference),
            "description" => text(&self.description),
            _ => FieldValue::Missing,
        }
    }
}

// =============================================================================
// Company
// =============================================================================

const COMPANY_RULES: &[FieldRule] = &[
    FieldRule { field: "guid", required: true, max_len: None, format: None },
    FieldRule { field: "name", required: true, max_len: Some(MAX_NAME_LEN), format: None },
    FieldRule { field: "code", required: false, max_len: Some(MAX_CODE_LEN), format: None },
    FieldRule { field: "country", required: true, max_len: None, format: None },
];

const COMPANY_UNIQUE: &[UniqueRule] = &[
    UniqueRule { field: "guid" },
    UniqueRule { field: "code" },
];

impl DataRules for CompanyDraft {
    fn rules() -> &'static [FieldRule] {
        COMPANY_RULES
    }

    fn unique_rules() -> &'static [UniqueRule] {
        COMPANY_UNIQUE
    }

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "guid" => int(&self.guid),
            "name" => text(&self.name),
            "code" => text(&self.code),
            "country" => int(&self.country),
            _ => FieldValue::Missing,
        }
    }

    fn validate_extra(&self, out: &mut Violations) {
        // A GeoPoint is range-valid by construction; only presence matters.
        if self.point.is_none() {
            out.push(ValidationError::Required {
                field: "point".to_string(),
            });
        }

        match &self.address {
            None => out.push(ValidationError::Required {
                field: "address".to_string(),
            }),
            Some(address) => {
                let missing = address.missing_fields();
                if !missing.is_empty() {
                    out.push(ValidationError::MissingJsonFields {
                        field: "address".to_string(),
                        missing,
                    });
                }
            }
        }

        match &self.metadata {
            None => out.push(ValidationError::Required {
                field: "metadata".to_string(),
            }),
            Some(metadata) => {
                let missing = metadata.missing_fields();
                if !missing.is_empty() {
                    out.push(ValidationError::MissingJsonFields {
                        field: "metadata".to_string(),
                        missing,
                    });
                }
            }
        }
    }
}

// =============================================================================
// Account
// =============================================================================

const ACCOUNT_RULES: &[FieldRule] = &[
    FieldRule { field: "guid", required: true, max_len: None, format: None },
    FieldRule { field: "code", required: true, max_len: Some(MAX_CODE_LEN), format: None },
    FieldRule { field: "company", required: true, max_len: None, format: None },
];

const ACCOUNT_UNIQUE: &[UniqueRule] = &[
    UniqueRule { field: "guid" },
    UniqueRule { field: "code" },
];

impl DataRules for AccountDraft {
    fn rules() -> &'static [FieldRule] {
        ACCOUNT_RULES
    }

    fn unique_rules() -> &'static [UniqueRule] {
        ACCOUNT_UNIQUE
    }

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "guid" => int(&self.guid),
            "code" => text(&self.code),
            "company" => int(&self.company),
            _ => FieldValue::Missing,
        }
    }
}

// =============================================================================
// User
// =============================================================================

const USER_RULES: &[FieldRule] = &[
    FieldRule { field: "guid", required: true, max_len: None, format: None },
    FieldRule { field: "name", required: true, max_len: Some(MAX_NAME_LEN), format: None },
    FieldRule { field: "profil", required: true, max_len: None, format: None },
    FieldRule { field: "account", required: true, max_len: None, format: None },
    FieldRule { field: "mobile", required: true, max_len: None, format: None },
    FieldRule {
        field: "email",
        required: true,
        max_len: Some(MAX_NAME_LEN),
        format: Some(Format::Email),
    },
];

const USER_UNIQUE: &[UniqueRule] = &[
    UniqueRule { field: "guid" },
    UniqueRule { field: "mobile" },
    UniqueRule { field: "email" },
];

impl DataRules for UserDraft {
    fn rules() -> &'static [FieldRule] {
        USER_RULES
    }

    fn unique_rules() -> &'static [UniqueRule] {
        USER_UNIQUE
    }

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "guid" => int(&self.guid),
            "name" => text(&self.name),
            "profil" => int(&self.profil),
            "account" => int(&self.account),
            "mobile" => int(&self.mobile),
            "email" => text(&self.email),
            _ => FieldValue::Missing,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::types::{Address, MetaValue, Metadata};

    #[test]
    fn test_country_all_required_collected() {
        let draft = CountryDraft::default();
        let v = check(&draft);

        // guid, alpha2, alpha3, dialcode, fr, en - all missing, all reported
        assert_eq!(v.len(), 6);
        let msg = v.to_string();
        assert!(msg.contains("guid is required"));
        assert!(msg.contains("alpha2 is required"));
        assert!(msg.contains("en is required"));
    }

    #[test]
    fn test_country_valid_draft_passes() {
        let draft = CountryDraft {
            guid: Some(100001),
            alpha2: Some("CM".to_string()),
            alpha3: Some("CMR".to_string()),
            dialcode: Some(237),
            fr: Some("Cameroun".to_string()),
            en: Some("Cameroon".to_string()),
        };
        assert!(check(&draft).is_empty());
    }

    #[test]
    fn test_blank_after_trim_counts_as_missing() {
        let draft = CountryDraft {
            guid: Some(100001),
            alpha2: Some("   ".to_string()),
            alpha3: Some("CMR".to_string()),
            dialcode: Some(237),
            fr: Some("Cameroun".to_string()),
            en: Some("Cameroon".to_string()),
        };
        let v = check(&draft);
        assert_eq!(v.len(), 1);
        assert!(v.to_string().contains("alpha2 is required"));
    }

    #[test]
    fn test_length_rule() {
        let draft = ProfilDraft {
            guid: Some(100001),
            name: Some("x".repeat(200)),
            reference: Some("admin".to_string()),
            description: None,
        };
        let v = check(&draft);
        assert_eq!(v.len(), 1);
        assert!(v.to_string().contains("name too long (max 128 characters)"));
    }

    #[test]
    fn test_reference_format_rule() {
        let draft = ProfilDraft {
            guid: Some(100001),
            name: Some("Administrator".to_string()),
            reference: Some("admin role!".to_string()),
            description: None,
        };
        let v = check(&draft);
        assert_eq!(v.len(), 1);
        assert!(v
            .to_string()
            .contains("must contain only alphanumeric characters, underscores, and hyphens"));

        assert!(Format::Reference.matches("admin_role-2"));
        assert!(!Format::Reference.matches("admin role"));
    }

    #[test]
    fn test_email_format_rule() {
        let mut draft = UserDraft {
            guid: Some(100001),
            name: Some("Jane Doe".to_string()),
            profil: Some(1),
            account: Some(1),
            mobile: Some(237_670_000_001),
            email: Some("not-an-email".to_string()),
        };
        let v = check(&draft);
        assert_eq!(v.len(), 1);
        assert!(v.to_string().contains("email has invalid format"));

        draft.email = Some("jane@example.com".to_string());
        assert!(check(&draft).is_empty());
    }

    #[test]
    fn test_company_address_missing_subfields() {
        let draft = CompanyDraft {
            guid: Some(100001),
            name: Some("Pricera SARL".to_string()),
            point: Some(GeoPoint::new(4.05, 9.7).unwrap()),
            code: None,
            country: Some(1),
            address: Some(Address {
                city: Some("Douala".to_string()),
                location: None,
                district: None,
            }),
            metadata: Some(Metadata {
                domaine: Some(MetaValue::One("commerce".to_string())),
                sector: Some(MetaValue::One("retail".to_string())),
                speciality: Some(MetaValue::Many(vec!["electronics".to_string()])),
            }),
        };
        let v = check(&draft);
        assert_eq!(v.len(), 1);
        assert_eq!(
            v.to_string(),
            "address is missing required fields: location, district"
        );
    }

    #[test]
    fn test_company_missing_point_and_metadata() {
        let draft = CompanyDraft {
            guid: Some(100001),
            name: Some("Pricera SARL".to_string()),
            point: None,
            code: None,
            country: Some(1),
            address: Some(Address {
                city: Some("Douala".to_string()),
                location: Some("Akwa".to_string()),
                district: Some("Wouri".to_string()),
            }),
            metadata: None,
        };
        let v = check(&draft);
        assert_eq!(v.len(), 2);
        let msg = v.to_string();
        assert!(msg.contains("point is required"));
        assert!(msg.contains("metadata is required"));
    }

    #[test]
    fn test_optional_code_skipped_when_absent() {
        // Company code is optional; absence must not produce a violation,
        // but an over-long code must.
        let mut draft = CompanyDraft {
            guid: Some(100001),
            name: Some("Pricera SARL".to_string()),
            point: Some(GeoPoint::new(4.05, 9.7).unwrap()),
            code: None,
            country: Some(1),
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
        };
        assert!(check(&draft).is_empty());

        draft.code = Some("x".repeat(200));
        let v = check(&draft);
        assert_eq!(v.len(), 1);
        assert!(v.to_string().contains("code too long"));
    }
}
