//! Streaming configuration.
//!
//! Settings are read from an INI file, by default
//! `~/.config/geostream/config.ini`:
//!
//! ```ini
//! [grid]
//! zoom_min = 0
//! zoom_max = 16
//! cascade_min = 0
//! cascade_max = 2
//! size_multiplier = 1.0
//! aspect_ratio = 1.0
//!
//! [body]
//! shape = spherical
//! radius = 6378137
//!
//! [loader]
//! url_template = https://tiles.example.com/{0}/{1}/{2}.json
//! url_scheme = zoom_xy
//! dispatch_interval_ms = 0
//! max_in_flight = 16
//! pool_capacity = 256
//! collider_zoom_min =
//! collider_zoom_max =
//! http_timeout_secs = 10
//!
//! [logging]
//! level = info
//! ansi = true
//! ```
//!
//! Missing keys keep their defaults; present keys are validated on load.
//! Either collider bound may be left empty, which leaves that end of the
//! range open.

mod file;
mod keys;

pub use file::{config_directory, config_file_path, CONFIG_FILE_NAME};
pub use keys::{ConfigKey, ConfigKeyError};

use std::time::Duration;

use glam::DVec3;
use thiserror::Error;

use crate::coord::{MAX_ZOOM, MIN_ZOOM};
use crate::fetch::DEFAULT_HTTP_TIMEOUT;
use crate::grid::{BodyShape, GridSettings, ParentBody};
use crate::lifecycle::DEFAULT_POOL_CAPACITY;
use crate::loader::{LoaderConfig, DEFAULT_MAX_IN_FLIGHT};
use crate::logging::LogConfig;
use crate::scope::UrlScheme;

/// WGS84 equatorial radius in meters.
pub const DEFAULT_BODY_RADIUS: f64 = 6_378_137.0;

/// Default tile endpoint; `{0}`..`{n}` are replaced by the URL parameters.
pub const DEFAULT_URL_TEMPLATE: &str = "https://tiles.example.com/{0}/{1}/{2}.json";

/// Errors reading, parsing or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("Config I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid INI.
    #[error("Config parse error: {0}")]
    Parse(String),

    /// A key holds a value of the wrong type.
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// Values are individually valid but inconsistent.
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

// =============================================================================
// Sections
// =============================================================================

/// `[body]` section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyConfig {
    /// Sphere or plane.
    pub shape: BodyShape,
    /// Radius in meters.
    pub radius: f64,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            shape: BodyShape::Spherical,
            radius: DEFAULT_BODY_RADIUS,
        }
    }
}

impl BodyConfig {
    /// Body centered at the world origin.
    pub fn to_body(&self) -> ParentBody {
        match self.shape {
            BodyShape::Spherical => ParentBody::spherical(DVec3::ZERO, self.radius),
            BodyShape::Flat => ParentBody::flat(DVec3::ZERO, self.radius),
        }
    }
}

/// `[loader]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderSection {
    /// Tile URL template.
    pub url_template: String,
    /// How scope keys become URL parameters.
    pub url_scheme: UrlScheme,
    /// Delay before a scheduled load is dispatched.
    pub dispatch_interval: Duration,
    /// Maximum concurrent fetches per loader.
    pub max_in_flight: usize,
    /// Recycled scopes kept per loader.
    pub pool_capacity: usize,
    /// Lowest zoom flagged `colliderEnabled` in fallback values.
    pub collider_zoom_min: Option<u32>,
    /// Highest zoom flagged `colliderEnabled` in fallback values.
    pub collider_zoom_max: Option<u32>,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            url_scheme: UrlScheme::default(),
            dispatch_interval: Duration::ZERO,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            collider_zoom_min: None,
            collider_zoom_max: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl LoaderSection {
    /// Collider zoom range; `None` only when both bounds are unset.
    pub fn collider_zoom_range(&self) -> Option<(u32, u32)> {
        match (self.collider_zoom_min, self.collider_zoom_max) {
            (None, None) => None,
            (min, max) => Some((min.unwrap_or(MIN_ZOOM), max.unwrap_or(MAX_ZOOM))),
        }
    }

    /// Loader configuration for this section.
    pub fn to_loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            url_scheme: self.url_scheme,
            dispatch_interval: self.dispatch_interval,
            max_in_flight: self.max_in_flight,
            pool_capacity: self.pool_capacity,
            collider_zoom_range: self.collider_zoom_range(),
        }
    }
}

// =============================================================================
// Top level
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoStreamConfig {
    /// `[grid]`
    pub grid: GridSettings,
    /// `[body]`
    pub body: BodyConfig,
    /// `[loader]`
    pub loader: LoaderSection,
    /// `[logging]`
    pub logging: LogConfig,
}

impl GeoStreamConfig {
    /// Check cross-field constraints.
    ///
    /// Ranges given as `(max, min)` are accepted; the grid normalizes them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (zmin, zmax) = self.grid.zoom_range;
        if zmin.max(zmax) > MAX_ZOOM {
            return Err(ConfigError::Validation(format!(
                "zoom range {}..{} exceeds maximum zoom {}",
                zmin, zmax, MAX_ZOOM
            )));
        }
        if !(self.grid.size_multiplier.is_finite() && self.grid.size_multiplier > 0.0) {
            return Err(ConfigError::Validation(
                "grid.size_multiplier must be positive".to_string(),
            ));
        }
        if !(self.grid.aspect_ratio.is_finite() && self.grid.aspect_ratio > 0.0) {
            return Err(ConfigError::Validation(
                "grid.aspect_ratio must be positive".to_string(),
            ));
        }
        let columns = ((1u64 << zmin.max(zmax)) as f64 * self.grid.aspect_ratio).round();
        if columns > f64::from(i32::MAX) {
            return Err(ConfigError::Validation(format!(
                "grid.aspect_ratio {} gives {} columns at zoom {}, more than a grid can index",
                self.grid.aspect_ratio,
                columns,
                zmin.max(zmax)
            )));
        }
        if !(self.body.radius.is_finite() && self.body.radius > 0.0) {
            return Err(ConfigError::Validation(
                "body.radius must be positive".to_string(),
            ));
        }
        if self.loader.max_in_flight == 0 {
            return Err(ConfigError::Validation(
                "loader.max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.loader.url_template.trim().is_empty() {
            return Err(ConfigError::Validation(
                "loader.url_template must not be empty".to_string(),
            ));
        }
        if let Some((min, max)) = self.loader.collider_zoom_range() {
            if min > max {
                return Err(ConfigError::Validation(format!(
                    "collider zoom range {}..{} is inverted",
                    min, max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GeoStreamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.body.radius, DEFAULT_BODY_RADIUS);
        assert_eq!(config.loader.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
    }

    #[test]
    fn test_zoom_above_maximum_rejected() {
        let mut config = GeoStreamConfig::default();
        config.grid.zoom_range = (0, MAX_ZOOM + 1);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_swapped_zoom_range_accepted() {
        let mut config = GeoStreamConfig::default();
        config.grid.zoom_range = (12, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_radius_rejected() {
        let mut config = GeoStreamConfig::default();
        config.body.radius = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_collider_range_rejected() {
        let mut config = GeoStreamConfig::default();
        config.loader.collider_zoom_min = Some(9);
        config.loader.collider_zoom_max = Some(4);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_aspect_ratio_too_wide_for_zoom_rejected() {
        let mut config = GeoStreamConfig::default();
        config.grid.zoom_range = (24, 24);
        config.grid.aspect_ratio = 256.0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.grid.aspect_ratio = 64.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_collider_range_with_open_end() {
        let mut section = LoaderSection::default();
        assert_eq!(section.collider_zoom_range(), None);
        section.collider_zoom_min = Some(12);
        assert_eq!(section.collider_zoom_range(), Some((12, MAX_ZOOM)));
        section.collider_zoom_min = None;
        section.collider_zoom_max = Some(5);
        assert_eq!(section.collider_zoom_range(), Some((MIN_ZOOM, 5)));
        assert_eq!(section.to_loader_config().collider_zoom_range, Some((MIN_ZOOM, 5)));
    }

    #[test]
    fn test_to_loader_config_carries_values() {
        let mut section = LoaderSection::default();
        section.url_scheme = UrlScheme::GeoBoundaries;
        section.max_in_flight = 3;
        let loader = section.to_loader_config();
        assert_eq!(loader.url_scheme, UrlScheme::GeoBoundaries);
        assert_eq!(loader.max_in_flight, 3);
    }

    #[test]
    fn test_flat_body() {
        let body = BodyConfig {
            shape: BodyShape::Flat,
            radius: 10.0,
        }
        .to_body();
        assert_eq!(body.shape, BodyShape::Flat);
        assert_eq!(body.center, DVec3::ZERO);
    }
}
