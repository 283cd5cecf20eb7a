//! Addressable configuration keys.
//!
//! Every setting is reachable as `section.key`, which is how the INI file is
//! read and written and how `geostream config get/set` address values.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use super::GeoStreamConfig;
use crate::grid::BodyShape;
use crate::scope::UrlScheme;

/// Errors addressing or assigning a key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigKeyError {
    /// No key with this name.
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// The value does not parse for this key.
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// A single configuration setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    GridZoomMin,
    GridZoomMax,
    GridCascadeMin,
    GridCascadeMax,
    GridSizeMultiplier,
    GridAspectRatio,
    BodyShape,
    BodyRadius,
    LoaderUrlTemplate,
    LoaderUrlScheme,
    LoaderDispatchIntervalMs,
    LoaderMaxInFlight,
    LoaderPoolCapacity,
    LoaderColliderZoomMin,
    LoaderColliderZoomMax,
    LoaderHttpTimeoutSecs,
    LoggingLevel,
    LoggingAnsi,
}

const ALL_KEYS: [ConfigKey; 18] = [
    ConfigKey::GridZoomMin,
    ConfigKey::GridZoomMax,
    ConfigKey::GridCascadeMin,
    ConfigKey::GridCascadeMax,
    ConfigKey::GridSizeMultiplier,
    ConfigKey::GridAspectRatio,
    ConfigKey::BodyShape,
    ConfigKey::BodyRadius,
    ConfigKey::LoaderUrlTemplate,
    ConfigKey::LoaderUrlScheme,
    ConfigKey::LoaderDispatchIntervalMs,
    ConfigKey::LoaderMaxInFlight,
    ConfigKey::LoaderPoolCapacity,
    ConfigKey::LoaderColliderZoomMin,
    ConfigKey::LoaderColliderZoomMax,
    ConfigKey::LoaderHttpTimeoutSecs,
    ConfigKey::LoggingLevel,
    ConfigKey::LoggingAnsi,
];

impl ConfigKey {
    /// Every key, grouped by section in file order.
    pub fn all() -> &'static [ConfigKey] {
        &ALL_KEYS
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GridZoomMin => "grid.zoom_min",
            Self::GridZoomMax => "grid.zoom_max",
            Self::GridCascadeMin => "grid.cascade_min",
            Self::GridCascadeMax => "grid.cascade_max",
            Self::GridSizeMultiplier => "grid.size_multiplier",
            Self::GridAspectRatio => "grid.aspect_ratio",
            Self::BodyShape => "body.shape",
            Self::BodyRadius => "body.radius",
            Self::LoaderUrlTemplate => "loader.url_template",
            Self::LoaderUrlScheme => "loader.url_scheme",
            Self::LoaderDispatchIntervalMs => "loader.dispatch_interval_ms",
            Self::LoaderMaxInFlight => "loader.max_in_flight",
            Self::LoaderPoolCapacity => "loader.pool_capacity",
            Self::LoaderColliderZoomMin => "loader.collider_zoom_min",
            Self::LoaderColliderZoomMax => "loader.collider_zoom_max",
            Self::LoaderHttpTimeoutSecs => "loader.http_timeout_secs",
            Self::LoggingLevel => "logging.level",
            Self::LoggingAnsi => "logging.ansi",
        }
    }

    /// INI section.
    pub fn section(&self) -> &'static str {
        self.split().0
    }

    /// Key within the section.
    pub fn key_name(&self) -> &'static str {
        self.split().1
    }

    fn split(&self) -> (&'static str, &'static str) {
        let name = self.name();
        name.split_once('.').unwrap_or(("", name))
    }

    /// Current value as written to the file. Unset optional values are empty.
    pub fn get(&self, config: &GeoStreamConfig) -> String {
        match self {
            Self::GridZoomMin => config.grid.zoom_range.0.to_string(),
            Self::GridZoomMax => config.grid.zoom_range.1.to_string(),
            Self::GridCascadeMin => config.grid.cascade_range.0.to_string(),
            Self::GridCascadeMax => config.grid.cascade_range.1.to_string(),
            Self::GridSizeMultiplier => config.grid.size_multiplier.to_string(),
            Self::GridAspectRatio => config.grid.aspect_ratio.to_string(),
            Self::BodyShape => config.body.shape.as_str().to_string(),
            Self::BodyRadius => config.body.radius.to_string(),
            Self::LoaderUrlTemplate => config.loader.url_template.clone(),
            Self::LoaderUrlScheme => config.loader.url_scheme.as_str().to_string(),
            Self::LoaderDispatchIntervalMs => {
                config.loader.dispatch_interval.as_millis().to_string()
            }
            Self::LoaderMaxInFlight => config.loader.max_in_flight.to_string(),
            Self::LoaderPoolCapacity => config.loader.pool_capacity.to_string(),
            Self::LoaderColliderZoomMin => optional(config.loader.collider_zoom_min),
            Self::LoaderColliderZoomMax => optional(config.loader.collider_zoom_max),
            Self::LoaderHttpTimeoutSecs => config.loader.http_timeout.as_secs().to_string(),
            Self::LoggingLevel => config.logging.level.clone(),
            Self::LoggingAnsi => config.logging.ansi.to_string(),
        }
    }

    /// Parse `value` and store it.
    ///
    /// An empty value unsets an optional key; for the collider bounds only
    /// that end of the range is opened.
    pub fn set(&self, config: &mut GeoStreamConfig, value: &str) -> Result<(), ConfigKeyError> {
        let value = value.trim();
        match self {
            Self::GridZoomMin => config.grid.zoom_range.0 = self.parse(value)?,
            Self::GridZoomMax => config.grid.zoom_range.1 = self.parse(value)?,
            Self::GridCascadeMin => config.grid.cascade_range.0 = self.parse(value)?,
            Self::GridCascadeMax => config.grid.cascade_range.1 = self.parse(value)?,
            Self::GridSizeMultiplier => config.grid.size_multiplier = self.parse(value)?,
            Self::GridAspectRatio => config.grid.aspect_ratio = self.parse(value)?,
            Self::BodyShape => {
                config.body.shape = BodyShape::from_config_str(value)
                    .ok_or_else(|| self.invalid(value, "expected spherical or flat"))?;
            }
            Self::BodyRadius => config.body.radius = self.parse(value)?,
            Self::LoaderUrlTemplate => config.loader.url_template = value.to_string(),
            Self::LoaderUrlScheme => {
                config.loader.url_scheme = UrlScheme::from_config_str(value).ok_or_else(|| {
                    self.invalid(
                        value,
                        "expected zoom_xy, lat_lon, lat_lon_alt or geo_boundaries",
                    )
                })?;
            }
            Self::LoaderDispatchIntervalMs => {
                config.loader.dispatch_interval = Duration::from_millis(self.parse(value)?);
            }
            Self::LoaderMaxInFlight => config.loader.max_in_flight = self.parse(value)?,
            Self::LoaderPoolCapacity => config.loader.pool_capacity = self.parse(value)?,
            Self::LoaderColliderZoomMin => {
                config.loader.collider_zoom_min = self.parse_optional(value)?;
            }
            Self::LoaderColliderZoomMax => {
                config.loader.collider_zoom_max = self.parse_optional(value)?;
            }
            Self::LoaderHttpTimeoutSecs => {
                config.loader.http_timeout = Duration::from_secs(self.parse(value)?);
            }
            Self::LoggingLevel => config.logging.level = value.to_string(),
            Self::LoggingAnsi => config.logging.ansi = self.parse(value)?,
        }
        Ok(())
    }

    fn parse<T>(&self, value: &str) -> Result<T, ConfigKeyError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        value
            .parse()
            .map_err(|e: T::Err| self.invalid(value, &e.to_string()))
    }

    fn parse_optional<T>(&self, value: &str) -> Result<Option<T>, ConfigKeyError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if value.is_empty() {
            Ok(None)
        } else {
            self.parse(value).map(Some)
        }
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfigKeyError {
        ConfigKeyError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigKeyError::UnknownKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{MAX_ZOOM, MIN_ZOOM};

    #[test]
    fn test_parse_key_names() {
        assert_eq!("grid.zoom_max".parse::<ConfigKey>(), Ok(ConfigKey::GridZoomMax));
        assert_eq!("Loader.URL_Scheme".parse::<ConfigKey>(), Ok(ConfigKey::LoaderUrlScheme));
        assert!(matches!(
            "grid.nope".parse::<ConfigKey>(),
            Err(ConfigKeyError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_every_key_round_trips_its_name() {
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>(), Ok(*key));
            assert_eq!(format!("{}.{}", key.section(), key.key_name()), key.name());
        }
    }

    #[test]
    fn test_set_then_get() {
        let mut config = GeoStreamConfig::default();
        ConfigKey::GridZoomMax.set(&mut config, "12").unwrap();
        ConfigKey::BodyShape.set(&mut config, "flat").unwrap();
        ConfigKey::LoaderDispatchIntervalMs
            .set(&mut config, "250")
            .unwrap();
        assert_eq!(config.grid.zoom_range.1, 12);
        assert_eq!(config.body.shape, BodyShape::Flat);
        assert_eq!(config.loader.dispatch_interval, Duration::from_millis(250));
        assert_eq!(ConfigKey::LoaderDispatchIntervalMs.get(&config), "250");
    }

    #[test]
    fn test_invalid_value_reports_key() {
        let mut config = GeoStreamConfig::default();
        let err = ConfigKey::LoaderMaxInFlight
            .set(&mut config, "many")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigKeyError::InvalidValue { key: "loader.max_in_flight", .. }
        ));
        assert!(ConfigKey::LoaderUrlScheme.set(&mut config, "quadkey").is_err());
    }

    #[test]
    fn test_collider_bounds() {
        let mut config = GeoStreamConfig::default();
        assert_eq!(ConfigKey::LoaderColliderZoomMin.get(&config), "");

        ConfigKey::LoaderColliderZoomMax.set(&mut config, "14").unwrap();
        assert_eq!(config.loader.collider_zoom_range(), Some((MIN_ZOOM, 14)));
        ConfigKey::LoaderColliderZoomMin.set(&mut config, "10").unwrap();
        assert_eq!(config.loader.collider_zoom_range(), Some((10, 14)));

        ConfigKey::LoaderColliderZoomMin.set(&mut config, "").unwrap();
        assert_eq!(config.loader.collider_zoom_range(), Some((MIN_ZOOM, 14)));
        assert_eq!(ConfigKey::LoaderColliderZoomMin.get(&config), "");
        ConfigKey::LoaderColliderZoomMax.set(&mut config, "").unwrap();
        assert_eq!(config.loader.collider_zoom_range(), None);
    }

    #[test]
    fn test_one_collider_bound_from_file() {
        let config = GeoStreamConfig::from_ini_str(
            "[loader]\ncollider_zoom_min = 12\ncollider_zoom_max =\n",
        )
        .unwrap();
        assert_eq!(config.loader.collider_zoom_range(), Some((12, MAX_ZOOM)));
    }
}
