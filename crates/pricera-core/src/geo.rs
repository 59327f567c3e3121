//! # GeoPoint Codec
//!
//! WKT point encoding/decoding and great-circle distance.
//!
//! ## Storage Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      GeoPoint Round Trip                                │
//! │                                                                         │
//! │  Caller                         Store (TEXT column)                    │
//! │                                                                         │
//! │  GeoPoint { lat: 4.05,   ──encode──►  "POINT(9.7 4.05)"                │
//! │             lon: 9.7  }               (longitude FIRST, WKT order)     │
//! │                                                                         │
//! │  GeoPoint { lat: 4.05,   ◄──decode──  "POINT(9.7 4.05)"                │
//! │             lon: 9.7  }               regex-extracted, range-checked   │
//! │                                                                         │
//! │  Anything not matching POINT(<num> <num>) is rejected, as is any       │
//! │  coordinate outside lon ∈ [-180,180], lat ∈ [-90,90].                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This is the portable fallback contract: the point lives in a plain text
//! column and distance math happens client-side with the haversine formula.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::GeoError;

/// Earth radius in kilometers, as fixed by the distance contract.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// WKT point pattern: `POINT(<lon> <lat>)`, case-insensitive.
static POINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^POINT\((-?\d+\.?\d*)\s+(-?\d+\.?\d*)\)$").expect("point pattern is valid")
});

// =============================================================================
// GeoPoint
// =============================================================================

/// A validated latitude/longitude pair.
///
/// Construction always goes through [`GeoPoint::new`] or
/// [`GeoPoint::from_wkt`], so a `GeoPoint` in hand is in range by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint", into = "RawPoint")]
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

/// Unvalidated serde mirror of [`GeoPoint`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawPoint {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawPoint> for GeoPoint {
    type Error = GeoError;

    fn try_from(raw: RawPoint) -> Result<Self, GeoError> {
        GeoPoint::new(raw.lat, raw.lon)
    }
}

impl From<GeoPoint> for RawPoint {
    fn from(p: GeoPoint) -> Self {
        RawPoint { lat: p.lat, lon: p.lon }
    }
}

impl GeoPoint {
    /// Creates a point, rejecting out-of-range coordinates.
    ///
    /// NaN fails both range checks and is therefore rejected too.
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeoError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(GeoError::LongitudeOutOfRange(lon));
        }
        Ok(GeoPoint { lat, lon })
    }

    /// Latitude in degrees, `[-90, 90]`.
    #[inline]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees, `[-180, 180]`.
    #[inline]
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Encodes as the WKT literal stored in the point column.
    ///
    /// Longitude comes first - WKT is `POINT(x y)`, and x is longitude.
    pub fn to_wkt(&self) -> String {
        format!("POINT({} {})", self.lon, self.lat)
    }

    /// Decodes a WKT literal.
    ///
    /// ## Returns
    /// * `Err(GeoError::InvalidWkt)` - input does not match the pattern
    /// * `Err(GeoError::*OutOfRange)` - matched but out of range
    pub fn from_wkt(input: &str) -> Result<Self, GeoError> {
        let caps = POINT_RE.captures(input.trim()).ok_or(GeoError::InvalidWkt)?;

        // Both captures are \d-only by the pattern; parse cannot fail on
        // anything the regex accepted, but map defensively anyway.
        let lon: f64 = caps[1].parse().map_err(|_| GeoError::InvalidWkt)?;
        let lat: f64 = caps[2].parse().map_err(|_| GeoError::InvalidWkt)?;

        GeoPoint::new(lat, lon)
    }

    /// Great-circle distance to another point, in kilometers.
    ///
    /// Haversine formula with R = 6371 km:
    /// `d = 2R·asin(√(sin²(Δlat/2) + cos(lat1)·cos(lat2)·sin²(Δlon/2)))`
    pub fn haversine_km(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos()
                * other.lat.to_radians().cos()
                * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wkt_round_trip() {
        let p = GeoPoint::new(4.05, 9.7).unwrap();
        let wkt = p.to_wkt();
        assert_eq!(wkt, "POINT(9.7 4.05)");

        let back = GeoPoint::from_wkt(&wkt).unwrap();
        assert_eq!(back, p);
        assert_eq!(back.to_wkt(), wkt);
    }

    #[test]
    fn test_decode_case_insensitive_and_negative() {
        let p = GeoPoint::from_wkt("point(-73.97 40.78)").unwrap();
        assert_eq!(p.lon(), -73.97);
        assert_eq!(p.lat(), 40.78);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        for bad in [
            "",
            "POINT()",
            "POINT(9.7)",
            "POINT(9.7, 4.05)",
            "POINT(abc def)",
            "LINESTRING(9.7 4.05)",
            "POINT(9.7 4.05) extra",
        ] {
            assert_eq!(GeoPoint::from_wkt(bad), Err(GeoError::InvalidWkt), "{bad:?}");
        }
    }

    #[test]
    fn test_range_validation() {
        assert!(matches!(
            GeoPoint::new(91.0, 0.0),
            Err(GeoError::LatitudeOutOfRange(_))
        ));
        assert!(matches!(
            GeoPoint::new(0.0, -180.5),
            Err(GeoError::LongitudeOutOfRange(_))
        ));
        assert!(matches!(
            GeoPoint::new(f64::NAN, 0.0),
            Err(GeoError::LatitudeOutOfRange(_))
        ));

        // Boundaries are inclusive
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_decode_rejects_out_of_range() {
        assert!(matches!(
            GeoPoint::from_wkt("POINT(200.0 10.0)"),
            Err(GeoError::LongitudeOutOfRange(_))
        ));
        assert!(matches!(
            GeoPoint::from_wkt("POINT(10.0 95.0)"),
            Err(GeoError::LatitudeOutOfRange(_))
        ));
    }

    #[test]
    fn test_haversine_identity_and_symmetry() {
        let douala = GeoPoint::new(4.05, 9.7).unwrap();
        let yaounde = GeoPoint::new(3.87, 11.52).unwrap();

        assert_eq!(douala.haversine_km(&douala), 0.0);

        let there = douala.haversine_km(&yaounde);
        let back = yaounde.haversine_km(&douala);
        assert!((there - back).abs() < 1e-9);

        // Douala to Yaounde is roughly 210 km as the crow flies
        assert!((there - 210.0).abs() < 10.0, "got {there}");
    }

    #[test]
    fn test_haversine_triangle_inequality() {
        let a = GeoPoint::new(4.05, 9.7).unwrap();
        let b = GeoPoint::new(3.87, 11.52).unwrap();
        let c = GeoPoint::new(6.37, 2.39).unwrap();

        let ab = a.haversine_km(&b);
        let bc = b.haversine_km(&c);
        let ac = a.haversine_km(&c);

        assert!(ac <= ab + bc + 1e-9);
    }
}
