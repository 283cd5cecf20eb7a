//! Positional URL parameters derived from a scope key.

use std::fmt;

use crate::coord::{tile_bounds, tile_center_lat_lon};

use super::key::{GridKey, ScopeKey};

/// How a grid key is turned into fetch parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UrlScheme {
    /// `[zoom, x, y]`
    #[default]
    ZoomXY,
    /// `[lat, lon]` of the tile center.
    LatLon,
    /// `[lat, lon, alt]` of the tile center; altitude is the surface.
    LatLonAlt,
    /// `[min_lat, min_lon, max_lat, max_lon]` of the tile.
    GeoBoundaries,
}

impl UrlScheme {
    /// Parse from a config string.
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "zoomxy" | "zxy" => Some(Self::ZoomXY),
            "latlon" => Some(Self::LatLon),
            "latlonalt" => Some(Self::LatLonAlt),
            "geoboundaries" | "bbox" => Some(Self::GeoBoundaries),
            _ => None,
        }
    }

    /// Config string for this scheme.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ZoomXY => "zoom_xy",
            Self::LatLon => "lat_lon",
            Self::LatLonAlt => "lat_lon_alt",
            Self::GeoBoundaries => "geo_boundaries",
        }
    }

    /// Number of parameters this scheme yields for a grid key.
    pub fn arity(&self) -> usize {
        match self {
            Self::ZoomXY | Self::LatLonAlt => 3,
            Self::LatLon => 2,
            Self::GeoBoundaries => 4,
        }
    }
}

/// Positional fetch parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UrlParams(Vec<String>);

impl UrlParams {
    /// Wrap a parameter list.
    pub fn new(params: Vec<String>) -> Self {
        Self(params)
    }

    /// Parameters in order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Parameter at `position`.
    pub fn get(&self, position: usize) -> Option<&str> {
        self.0.get(position).map(String::as_str)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UrlParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

fn coordinate(value: f64) -> String {
    format!("{:.8}", value)
}

/// Parameters for a grid key under `scheme`.
pub fn grid_url_params(key: &GridKey, scheme: UrlScheme) -> UrlParams {
    let params = match scheme {
        UrlScheme::ZoomXY => vec![
            key.zoom().to_string(),
            key.index.x.to_string(),
            key.index.y.to_string(),
        ],
        UrlScheme::LatLon => {
            let (lat, lon) = tile_center_lat_lon(key.index, key.dimensions);
            vec![coordinate(lat), coordinate(lon)]
        }
        UrlScheme::LatLonAlt => {
            let (lat, lon) = tile_center_lat_lon(key.index, key.dimensions);
            vec![coordinate(lat), coordinate(lon), coordinate(0.0)]
        }
        UrlScheme::GeoBoundaries => {
            let bounds = tile_bounds(key.index, key.dimensions);
            vec![
                coordinate(bounds.min_lat),
                coordinate(bounds.min_lon),
                coordinate(bounds.max_lat),
                coordinate(bounds.max_lon),
            ]
        }
    };
    UrlParams(params)
}

/// Parameters for any scope key. Id keys always yield `[id]`.
pub fn url_params(key: &ScopeKey, scheme: UrlScheme) -> UrlParams {
    match key {
        ScopeKey::Id(id) => UrlParams(vec![id.to_string()]),
        ScopeKey::Grid(grid) => grid_url_params(grid, scheme),
    }
}
