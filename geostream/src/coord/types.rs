//! Coordinate value types shared by the grid and scope modules.

use serde::Serialize;
use thiserror::Error;

/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -85.05112878;

/// Minimum longitude.
pub const MIN_LON: f64 = -180.0;

/// Maximum longitude.
pub const MAX_LON: f64 = 180.0;

/// Minimum zoom level.
pub const MIN_ZOOM: u32 = 0;

/// Maximum zoom level.
///
/// Grid dimensions are stored as `i32`, so `2^MAX_ZOOM` times the widest
/// supported aspect ratio must stay well inside that range.
pub const MAX_ZOOM: u32 = 24;

/// Errors from coordinate conversions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude outside the Web Mercator range.
    #[error("Invalid latitude: {0} (must be between {MIN_LAT} and {MAX_LAT})")]
    InvalidLatitude(f64),

    /// Longitude outside -180..=180.
    #[error("Invalid longitude: {0} (must be between {MIN_LON} and {MAX_LON})")]
    InvalidLongitude(f64),

    /// Zoom level above [`MAX_ZOOM`].
    #[error("Invalid zoom level: {0} (must be between {MIN_ZOOM} and {MAX_ZOOM})")]
    InvalidZoom(u32),

    /// Grid dimensions that are not positive.
    #[error("Invalid grid dimensions: {0}x{1}")]
    InvalidDimensions(i32, i32),
}

/// A geographic position in degrees with an altitude in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GeoCoordinate {
    /// Latitude in degrees (positive north).
    pub lat: f64,
    /// Longitude in degrees (positive east).
    pub lon: f64,
    /// Altitude above the body surface in meters.
    pub alt: f64,
}

impl GeoCoordinate {
    /// Create a new coordinate.
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self { lat, lon, alt }
    }

    /// Create a surface coordinate (zero altitude).
    pub fn surface(lat: f64, lon: f64) -> Self {
        Self { lat, lon, alt: 0.0 }
    }

    /// Return a copy with latitude clamped to the Web Mercator range and
    /// longitude wrapped into -180..180.
    pub fn normalized(&self) -> Self {
        let mut lon = (self.lon + 180.0).rem_euclid(360.0) - 180.0;
        if lon == MAX_LON {
            lon = MIN_LON;
        }
        Self {
            lat: self.lat.clamp(MIN_LAT, MAX_LAT),
            lon,
            alt: self.alt,
        }
    }
}

impl std::fmt::Display for GeoCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5}, {:.1}m)", self.lat, self.lon, self.alt)
    }
}

/// Geographic bounding box of a tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    /// Minimum (southernmost) latitude
    pub min_lat: f64,
    /// Maximum (northernmost) latitude
    pub max_lat: f64,
    /// Minimum (westernmost) longitude
    pub min_lon: f64,
    /// Maximum (easternmost) longitude
    pub max_lon: f64,
}

impl GeoBounds {
    /// Create a new bounding box.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Whether the point lies inside the bounds (edges inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_wraps_longitude() {
        let coord = GeoCoordinate::surface(10.0, 190.0).normalized();
        assert!((coord.lon - (-170.0)).abs() < 1e-9);

        let coord = GeoCoordinate::surface(10.0, 180.0).normalized();
        assert_eq!(coord.lon, -180.0);
    }

    #[test]
    fn test_normalized_clamps_latitude() {
        let coord = GeoCoordinate::surface(89.0, 0.0).normalized();
        assert_eq!(coord.lat, MAX_LAT);
    }

    #[test]
    fn test_bounds_center_and_contains() {
        let bounds = GeoBounds::new(10.0, 20.0, -5.0, 5.0);
        assert_eq!(bounds.center(), (15.0, 0.0));
        assert!(bounds.contains(12.0, 0.0));
        assert!(!bounds.contains(21.0, 0.0));
    }

    #[test]
    fn test_coord_error_display() {
        let err = CoordError::InvalidZoom(30);
        assert!(err.to_string().contains("30"));
    }
}
