//! Logging setup.
//!
//! The library only emits `tracing` events. Binaries call [`init`] once to
//! install a console subscriber; `RUST_LOG` overrides the configured filter.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Console logging options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `warn,geostream::loader=debug`.
    pub level: String,
    /// Colorize output.
    pub ansi: bool,
    /// Print the event target (module path).
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            ansi: true,
            with_target: true,
        }
    }
}

impl LogConfig {
    /// Set the filter directive.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Filter for this configuration, with `RUST_LOG` taking precedence.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| self.configured_filter())
    }

    /// Filter built from `level` alone, ignoring the environment.
    ///
    /// Falls back to [`DEFAULT_LOG_LEVEL`] when `level` does not parse.
    pub fn configured_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
    }
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed, which leaves the
/// existing one in place.
pub fn init(config: &LogConfig) -> bool {
    let console = fmt::layer()
        .with_target(config.with_target)
        .with_ansi(config.ansi)
        .with_timer(fmt::time::uptime());

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(console)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.ansi);
    }

    #[test]
    fn test_configured_filter_keeps_directives() {
        let config = LogConfig::default().with_level("warn,geostream::loader=debug");
        let filter = config.configured_filter().to_string();
        assert!(filter.contains("geostream::loader=debug"));
        assert!(filter.contains("warn"));
    }

    #[test]
    fn test_invalid_level_falls_back() {
        let config = LogConfig::default().with_level("loud=[[");
        assert_eq!(config.configured_filter().to_string(), DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_second_init_is_rejected() {
        let config = LogConfig::default();
        let first = init(&config);
        let second = init(&config);
        assert!(!second || !first);
    }
}
