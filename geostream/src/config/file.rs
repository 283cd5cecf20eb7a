//! INI persistence for [`GeoStreamConfig`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use ini::Ini;

use super::{ConfigError, ConfigKey, ConfigKeyError, GeoStreamConfig};

/// Config file name inside [`config_directory`].
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Directory holding the config file, `~/.config/geostream` on Linux.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("geostream")
}

/// Default config file path.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

impl GeoStreamConfig {
    /// Load from [`config_file_path`]. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = match Ini::load_from_file(path) {
            Ok(ini) => ini,
            Err(ini::Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file; using defaults");
                return Ok(Self::default());
            }
            Err(ini::Error::Io(source)) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
            Err(ini::Error::Parse(e)) => return Err(ConfigError::Parse(e.to_string())),
        };
        let config = Self::from_ini(&ini)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value).map_err(|e| match e {
                    ConfigKeyError::InvalidValue { key, value, reason } => {
                        ConfigError::InvalidValue {
                            key: key.to_string(),
                            value,
                            reason,
                        }
                    }
                    ConfigKeyError::UnknownKey(name) => ConfigError::Parse(name),
                })?;
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Render every key as INI.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini
    }

    /// Save to [`config_file_path`].
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        self.to_ini().write_to_file(path).map_err(io_error)?;
        tracing::debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::BodyShape;
    use crate::scope::UrlScheme;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = GeoStreamConfig::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, GeoStreamConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = GeoStreamConfig::from_ini_str(
            "[grid]\nzoom_max = 10\n\n[loader]\nurl_scheme = lat_lon_alt\n",
        )
        .unwrap();
        assert_eq!(config.grid.zoom_range, (0, 10));
        assert_eq!(config.loader.url_scheme, UrlScheme::LatLonAlt);
        assert_eq!(config.body, GeoStreamConfig::default().body);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = GeoStreamConfig::default();
        config.body.shape = BodyShape::Flat;
        config.loader.dispatch_interval = Duration::from_millis(40);
        config.loader.collider_zoom_min = Some(12);
        config.loader.collider_zoom_max = Some(14);
        config.logging.level = "debug".to_string();
        config.save_to(&path).unwrap();

        let loaded = GeoStreamConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let err = GeoStreamConfig::from_ini_str("[body]\nradius = huge\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "body.radius"));
    }

    #[test]
    fn test_validation_runs_on_load() {
        let err = GeoStreamConfig::from_ini_str("[loader]\nmax_in_flight = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_config_path_ends_with_file_name() {
        let path = config_file_path();
        assert!(path.ends_with("geostream/config.ini"));
    }
}
