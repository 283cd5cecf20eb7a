//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude)
//! and Web Mercator grid cells. Grids are rectangular: a grid at zoom `z`
//! with aspect ratio `a` has `2^z` rows and `round(2^z * a)` columns.

mod types;

pub use types::{
    CoordError, GeoBounds, GeoCoordinate, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM,
};

use glam::{DVec2, IVec2};
use std::f64::consts::PI;

/// Returns the grid dimensions (columns, rows) for a zoom level.
///
/// Rows double with every zoom level; columns follow the aspect ratio and
/// never drop below one.
#[inline]
pub fn tile_dimensions(zoom: u32, aspect_ratio: f64) -> IVec2 {
    let zoom = zoom.min(MAX_ZOOM);
    let rows = 1i64 << zoom;
    let aspect_ratio = if aspect_ratio.is_finite() && aspect_ratio > 0.0 {
        aspect_ratio
    } else {
        1.0
    };
    let cols = ((rows as f64) * aspect_ratio).round().clamp(1.0, i32::MAX as f64) as i32;
    IVec2::new(cols, rows as i32)
}

/// Derives the zoom level from grid dimensions.
///
/// Zoom is carried by the row count, which is always a power of two.
#[inline]
pub fn zoom_from_dimensions(dimensions: IVec2) -> u32 {
    dimensions.y.max(1).ilog2()
}

/// Converts geographic coordinates to normalized Web Mercator space.
///
/// `x` grows eastwards from 0 at -180°, `y` grows southwards from 0 at the
/// northern Mercator limit. Latitude is clamped to the representable range.
#[inline]
pub fn geo_to_uv(lat: f64, lon: f64) -> DVec2 {
    let lat_rad = lat.clamp(MIN_LAT, MAX_LAT) * PI / 180.0;
    let u = (lon + 180.0) / 360.0;
    let v = (1.0 - lat_rad.tan().asinh() / PI) / 2.0;
    DVec2::new(u, v)
}

/// Converts normalized Web Mercator space back to (latitude, longitude).
#[inline]
pub fn uv_to_geo(uv: DVec2) -> (f64, f64) {
    let lon = uv.x * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * uv.y)).sinh().atan();
    (lat_rad * 180.0 / PI, lon)
}

/// Converts geographic coordinates to a grid cell index.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `dimensions` - Grid dimensions (columns, rows)
///
/// # Returns
///
/// The cell index (column, row) or an error if inputs are invalid.
#[inline]
pub fn to_tile_index(lat: f64, lon: f64, dimensions: IVec2) -> Result<IVec2, CoordError> {
    // Validate inputs
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if dimensions.x <= 0 || dimensions.y <= 0 {
        return Err(CoordError::InvalidDimensions(dimensions.x, dimensions.y));
    }

    let uv = geo_to_uv(lat, lon);
    Ok(uv_to_index(uv, dimensions))
}

/// Converts normalized Web Mercator space to a grid cell, clamping to the grid.
#[inline]
pub fn uv_to_index(uv: DVec2, dimensions: IVec2) -> IVec2 {
    let col = (uv.x * dimensions.x as f64).floor() as i64;
    let row = (uv.y * dimensions.y as f64).floor() as i64;
    IVec2::new(
        col.clamp(0, i64::from(dimensions.x - 1)) as i32,
        row.clamp(0, i64::from(dimensions.y - 1)) as i32,
    )
}

/// Converts a grid cell back to geographic coordinates.
///
/// Returns the latitude/longitude of the cell's northwest corner.
#[inline]
pub fn tile_to_lat_lon(index: IVec2, dimensions: IVec2) -> (f64, f64) {
    uv_to_geo(DVec2::new(
        index.x as f64 / dimensions.x as f64,
        index.y as f64 / dimensions.y as f64,
    ))
}

/// Converts a grid cell to the geographic coordinates of its center.
#[inline]
pub fn tile_center_lat_lon(index: IVec2, dimensions: IVec2) -> (f64, f64) {
    uv_to_geo(DVec2::new(
        (index.x as f64 + 0.5) / dimensions.x as f64,
        (index.y as f64 + 0.5) / dimensions.y as f64,
    ))
}

/// Returns the geographic bounds of a grid cell.
#[inline]
pub fn tile_bounds(index: IVec2, dimensions: IVec2) -> GeoBounds {
    let (max_lat, min_lon) = tile_to_lat_lon(index, dimensions);
    // The far corner may lie one past i32::MAX on the widest grids.
    let (min_lat, max_lon) = uv_to_geo(DVec2::new(
        (f64::from(index.x) + 1.0) / f64::from(dimensions.x),
        (f64::from(index.y) + 1.0) / f64::from(dimensions.y),
    ));
    GeoBounds::new(min_lat, max_lat, min_lon, max_lon)
}
