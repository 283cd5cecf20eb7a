//! Configuration management CLI commands.
//!
//! `config get`, `config set`, `config list` and `config path` read and
//! modify `config.ini` from the command line.

use std::path::Path;

use clap::Subcommand;
use geostream::config::{config_file_path, ConfigKey, GeoStreamConfig};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., grid.zoom_max)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., loader.url_scheme)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand against the default config file.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    let path = config_file_path();
    match command {
        ConfigCommands::Get { key } => {
            println!("{}", display_value(&get_value(&path, &key)?));
        }
        ConfigCommands::Set { key, value } => {
            let name = set_value(&path, &key, &value)?;
            println!("Set {} = {}", name, value);
        }
        ConfigCommands::List => print_list(&GeoStreamConfig::load_from(&path)?),
        ConfigCommands::Path => println!("{}", path.display()),
    }
    Ok(())
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'geostream config list' to see available keys.",
            key
        ))
    })
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

/// Read one key from the file at `path`.
fn get_value(path: &Path, key: &str) -> Result<String, CliError> {
    let config_key = parse_key(key)?;
    let config = GeoStreamConfig::load_from(path)?;
    Ok(config_key.get(&config))
}

/// Set one key in the file at `path`, validating the whole file before
/// saving. Returns the canonical key name.
fn set_value(path: &Path, key: &str, value: &str) -> Result<&'static str, CliError> {
    let config_key = parse_key(key)?;
    let mut config = GeoStreamConfig::load_from(path)?;
    config_key
        .set(&mut config, value)
        .map_err(|e| CliError::Config(e.to_string()))?;
    config.validate()?;
    config.save_to(path)?;
    Ok(config_key.name())
}

fn print_list(config: &GeoStreamConfig) {
    println!("Configuration Settings");
    println!("======================");
    println!();

    let mut current_section = "";
    for key in ConfigKey::all() {
        let section = key.section();
        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section;
        }
        println!("  {} = {}", key.key_name(), display_value(&key.get(config)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_then_get() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");

        let name = set_value(&path, "Grid.Zoom_Max", "14").unwrap();
        assert_eq!(name, "grid.zoom_max");
        assert_eq!(get_value(&path, "grid.zoom_max").unwrap(), "14");
        assert_eq!(get_value(&path, "grid.zoom_min").unwrap(), "0");
    }

    #[test]
    fn test_unknown_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        assert!(matches!(
            get_value(&path, "grid.bogus"),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_value_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        assert!(set_value(&path, "loader.max_in_flight", "0").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_unset_value_display() {
        assert_eq!(display_value(""), "(not set)");
        assert_eq!(display_value("zoom_xy"), "zoom_xy");
    }
}
