//! Station coordinates and descriptive metadata.

use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
/// Both values are signed decimal degrees.
///
/// # Examples
///
/// ```
/// use station_twin::LatLon;
///
/// let vienna = LatLon(48.2082, 16.3738);
/// assert_eq!(vienna.0, 48.2082); // Latitude
/// assert_eq!(vienna.1, 16.3738); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    pub fn latitude(self) -> f64 {
        self.0
    }

    pub fn longitude(self) -> f64 {
        self.1
    }

    /// Longitude folded into `[0, 360)`, the convention used by reanalysis grids.
    pub fn longitude_360(self) -> f64 {
        normalize_longitude(self.1)
    }
}

/// Folds any longitude into `[0, 360)`.
pub fn normalize_longitude(longitude: f64) -> f64 {
    let folded = longitude.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if folded >= 360.0 {
        0.0
    } else {
        folded
    }
}

/// Signed angular difference `a - b` in degrees, folded into `[-180, 180)`.
///
/// Negative when `a` lies west of `b` along the shorter arc.
pub fn signed_longitude_delta(a: f64, b: f64) -> f64 {
    (a - b + 540.0).rem_euclid(360.0) - 180.0
}

/// Location details parsed from a station's descriptive record.
///
/// Every field is optional. A missing field means the record did not state it;
/// callers must handle absence explicitly instead of assuming a default position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StationMetadata {
    /// Latitude in decimal degrees (positive for North, negative for South).
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees (positive for East, negative for West).
    pub longitude: Option<f64>,
    /// Elevation above sea level in meters.
    pub elevation: Option<i32>,
}

impl StationMetadata {
    /// The station coordinate, if both latitude and longitude are known.
    pub fn coordinate(&self) -> Option<LatLon> {
        Some(LatLon(self.latitude?, self.longitude?))
    }

    pub fn is_empty(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none() && self.elevation.is_none()
    }
}
