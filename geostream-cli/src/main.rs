//! GeoStream CLI - Command-line interface
//!
//! Simulates viewpoint flights over the tile grid and manages the
//! configuration file.

mod commands;
mod error;

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use geostream::config::GeoStreamConfig;
use geostream::logging;

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;

#[derive(Debug, Parser)]
#[command(name = "geostream", version, about = "Viewpoint-driven geo data streaming")]
struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fly a viewpoint along a great circle and print tile churn per tick
    Simulate {
        /// Start latitude in degrees
        #[arg(long, default_value_t = 47.4647, allow_hyphen_values = true)]
        from_lat: f64,

        /// Start longitude in degrees
        #[arg(long, default_value_t = 8.5492, allow_hyphen_values = true)]
        from_lon: f64,

        /// End latitude in degrees
        #[arg(long, default_value_t = 48.3538, allow_hyphen_values = true)]
        to_lat: f64,

        /// End longitude in degrees
        #[arg(long, default_value_t = 11.7861, allow_hyphen_values = true)]
        to_lon: f64,

        /// Camera altitude above the surface in meters
        #[arg(long, default_value_t = 3000.0)]
        altitude: f64,

        /// Number of ticks along the route
        #[arg(long, default_value_t = 60)]
        ticks: u32,

        /// Milliseconds between ticks
        #[arg(long, default_value_t = 100)]
        tick_ms: u64,

        /// Serve every tile from memory instead of the configured URL
        #[arg(long)]
        offline: bool,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn init_logging(verbose: bool) {
    let mut log_config = GeoStreamConfig::load()
        .map(|config| config.logging)
        .unwrap_or_default();
    if verbose {
        log_config = log_config.with_level("debug");
    }
    logging::init(&log_config);
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Simulate {
            from_lat,
            from_lon,
            to_lat,
            to_lon,
            altitude,
            ticks,
            tick_ms,
            offline,
        } => commands::simulate::run(SimulateArgs {
            from: (from_lat, from_lon),
            to: (to_lat, to_lon),
            altitude,
            ticks,
            tick_interval: Duration::from_millis(tick_ms),
            offline,
        }),
        Commands::Config { command } => commands::config::run(command),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
