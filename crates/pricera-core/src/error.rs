//! # Error Types
//!
//! Domain-specific error types for pricera-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  pricera-core errors (this file)                                       │
//! │  ├── ValidationError  - One violated rule (required, length, format)   │
//! │  ├── Violations       - ALL violated rules of one save, aggregated     │
//! │  └── GeoError         - WKT parsing / coordinate range failures        │
//! │                                                                         │
//! │  pricera-db errors (separate crate)                                    │
//! │  └── DbError          - Store operation failures, wraps Violations     │
//! │                                                                         │
//! │  Flow: ValidationError ──collect──► Violations ──► DbError::Validation │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. A save never fails on the *first* violation - everything is collected
//!    into `Violations` so the caller sees the complete list at once
//! 3. Errors are enum variants, never bare strings

use std::fmt;

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// A single violated validation rule.
///
/// Produced by the rule evaluator in [`crate::validation`] and by the
/// save-time uniqueness re-check in pricera-db.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is null, absent, or empty after trimming.
    #[error("{field} is required")]
    Required { field: String },

    /// A string field exceeds its maximum length.
    #[error("{field} too long (max {max} characters)")]
    TooLong { field: String, max: usize },

    /// A field does not match its declared format.
    ///
    /// ## Examples
    /// - Profil reference with characters outside `[A-Za-z0-9_-]`
    /// - Malformed email address
    /// - A point column that is not `POINT(<lon> <lat>)`
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A declared-unique column already holds this value in another row.
    ///
    /// Re-checked against the store at save time, excluding the row's own
    /// id, so self-updates do not self-collide.
    #[error("{field} already exists")]
    AlreadyExists { field: String },

    /// A JSON-shaped column is missing required sub-fields.
    #[error("{field} is missing required fields: {}", .missing.join(", "))]
    MissingJsonFields { field: String, missing: Vec<String> },
}

// =============================================================================
// Violations (aggregated)
// =============================================================================

/// All rules violated by one candidate row, collected before the save is
/// aborted.
///
/// The save never reports just the first problem: an entity missing two
/// required fields and colliding on one unique column yields three entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Violations(Vec<ValidationError>);

impl Violations {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Violations(Vec::new())
    }

    /// Records one violated rule.
    pub fn push(&mut self, violation: ValidationError) {
        self.0.push(violation);
    }

    /// Returns true when no rule was violated.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of violated rules.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the individual violations.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Consumes the collector, returning the violations.
    pub fn into_inner(self) -> Vec<ValidationError> {
        self.0
    }
}

impl fmt::Display for Violations {
    /// Joins every violated rule into one message, `; `-separated,
    /// matching the aggregated error contract of the DataControl hook.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl std::error::Error for Violations {}

impl From<ValidationError> for Violations {
    fn from(v: ValidationError) -> Self {
        Violations(vec![v])
    }
}

// =============================================================================
// Geo Error
// =============================================================================

/// Failures of the WKT point codec.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    /// Input does not match `POINT(<lon> <lat>)`.
    #[error("point must be in WKT format: POINT(longitude latitude)")]
    InvalidWkt,

    /// Longitude outside `[-180, 180]`.
    #[error("longitude must be between -180 and 180 (got {0})")]
    LongitudeOutOfRange(f64),

    /// Latitude outside `[-90, 90]`.
    #[error("latitude must be between -90 and 90 (got {0})")]
    LatitudeOutOfRange(f64),
}
