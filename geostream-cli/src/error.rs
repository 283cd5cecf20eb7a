//! CLI error type.

use geostream::config::ConfigError;
use geostream::FetchError;
use thiserror::Error;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The config file could not be loaded or saved.
    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    /// The fetch service could not be created.
    #[error("Failed to create fetch service: {0}")]
    Fetch(#[from] FetchError),

    /// The async runtime could not start.
    #[error("Failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
