//! Simulate command - fly a viewpoint along a great circle and stream tiles.
//!
//! Each tick moves the camera, runs one session tick and prints the tile
//! churn. With `--offline` every tile resolves from an in-memory service, so
//! the command runs without network access.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use glam::DVec3;
use geostream::config::GeoStreamConfig;
use geostream::coord::GeoCoordinate;
use geostream::fetch::{FetchService, HttpFetchService, RawDecoder, StaticFetchService};
use geostream::grid::ViewpointId;
use geostream::loader::Loader;
use geostream::{LoadContext, StreamingSession};

use crate::error::CliError;

/// Payload served for every tile in offline mode.
const OFFLINE_PAYLOAD: &[u8] = b"{\"source\":\"offline\"}";

/// Arguments for the simulate command.
#[derive(Debug, Clone)]
pub struct SimulateArgs {
    pub from: (f64, f64),
    pub to: (f64, f64),
    pub altitude: f64,
    pub ticks: u32,
    pub tick_interval: Duration,
    pub offline: bool,
}

/// Point at fraction `t` along the great circle from `from` to `to`.
///
/// Both endpoints and the result are `(lat, lon)` in degrees.
pub fn great_circle_point(from: (f64, f64), to: (f64, f64), t: f64) -> (f64, f64) {
    let a = unit_vector(from);
    let b = unit_vector(to);
    let angle = a.dot(b).clamp(-1.0, 1.0).acos();

    let p = if angle.sin().abs() < 1e-12 {
        a.lerp(b, t).try_normalize().unwrap_or(a)
    } else {
        let wa = ((1.0 - t) * angle).sin() / angle.sin();
        let wb = (t * angle).sin() / angle.sin();
        a * wa + b * wb
    };
    (
        p.z.clamp(-1.0, 1.0).asin().to_degrees(),
        p.y.atan2(p.x).to_degrees(),
    )
}

fn unit_vector((lat, lon): (f64, f64)) -> DVec3 {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    DVec3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
}

/// Run the simulate command.
pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    let config = GeoStreamConfig::load()?;
    if args.ticks == 0 {
        return Err(CliError::Config("--ticks must be at least 1".to_string()));
    }

    let fetch: Arc<dyn FetchService> = if args.offline {
        Arc::new(
            StaticFetchService::new().with_fallback(Ok(Bytes::from_static(OFFLINE_PAYLOAD))),
        )
    } else {
        Arc::new(HttpFetchService::with_timeout(
            config.loader.url_template.clone(),
            config.loader.http_timeout,
        )?)
    };

    println!("GeoStream Simulation v{}", env!("CARGO_PKG_VERSION"));
    println!("=========================");
    println!();
    println!(
        "Route:     ({:.4}, {:.4}) -> ({:.4}, {:.4})",
        args.from.0, args.from.1, args.to.0, args.to.1
    );
    println!("Altitude:  {} m", args.altitude);
    println!(
        "Zoom:      {}..{}",
        config.grid.zoom_range.0, config.grid.zoom_range.1
    );
    println!("Source:    {}", fetch.name());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    runtime.block_on(fly(&config, fetch, &args, &shutdown));
    Ok(())
}

async fn fly(
    config: &GeoStreamConfig,
    fetch: Arc<dyn FetchService>,
    args: &SimulateArgs,
    shutdown: &AtomicBool,
) {
    let context = LoadContext::current(fetch, config.loader.to_loader_config());
    let mut session = StreamingSession::from_config(config, context, RawDecoder);
    let body = *session.body();
    let viewpoint = ViewpointId(1);
    session.add_camera(viewpoint);

    let steps = args.ticks.saturating_sub(1).max(1);
    for tick in 0..args.ticks {
        if shutdown.load(Ordering::SeqCst) {
            println!();
            println!("Stopped at tick {}", tick);
            break;
        }

        let t = f64::from(tick) / f64::from(steps);
        let (lat, lon) = great_circle_point(args.from, args.to, t);
        let ground = body.geo_to_local(&GeoCoordinate::new(lat, lon, 0.0)) + body.center;
        let eye = body.geo_to_local(&GeoCoordinate::new(lat, lon, args.altitude)) + body.center;
        session.set_viewpoint(viewpoint, ground, eye);

        let report = session.tick(Instant::now());
        let stats = session.loader().stats();
        let best = session
            .camera(viewpoint)
            .and_then(|camera| camera.best_zoom())
            .map_or_else(|| "-".to_string(), |z| z.to_string());
        let (created, released) = report
            .reconcile
            .map_or((0, 0), |summary| (summary.created, summary.released));

        println!(
            "[{:>4}] ({:>9.4}, {:>10.4}) zoom {:>2} | tiles {:>4} +{:<3} -{:<3} | loaded {:>3} | in flight {:>3}",
            tick, lat, lon, best, stats.scopes, created, released, report.loaded, stats.in_flight
        );

        tokio::time::sleep(args.tick_interval).await;
    }

    // Let outstanding fetches land before the summary.
    for _ in 0..50 {
        let stats = session.loader().stats();
        if stats.in_flight == 0 && stats.pending == 0 {
            break;
        }
        session.tick(Instant::now());
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let stats = session.loader().stats();
    println!();
    println!("Session Summary");
    println!("───────────────");
    println!("  Scopes created:   {} ({} released)", stats.created, stats.released);
    println!("  Fetches:          {} dispatched", stats.dispatched);
    println!("  Loads:            {} loaded, {} failed", stats.loaded, stats.failed);
    println!("  Discarded:        {}", stats.discarded);
    println!(
        "  Scope pool:       {} reused, {} created",
        stats.pool.reused, stats.pool.created
    );

    session.dispose();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_great_circle_endpoints() {
        let from = (47.5, 8.5);
        let to = (52.3, 13.4);
        let start = great_circle_point(from, to, 0.0);
        let end = great_circle_point(from, to, 1.0);
        assert!((start.0 - from.0).abs() < 1e-9 && (start.1 - from.1).abs() < 1e-9);
        assert!((end.0 - to.0).abs() < 1e-9 && (end.1 - to.1).abs() < 1e-9);
    }

    #[test]
    fn test_great_circle_equator_midpoint() {
        let mid = great_circle_point((0.0, 0.0), (0.0, 90.0), 0.5);
        assert!(mid.0.abs() < 1e-9);
        assert!((mid.1 - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_great_circle_same_point() {
        let p = great_circle_point((10.0, 20.0), (10.0, 20.0), 0.3);
        assert!((p.0 - 10.0).abs() < 1e-9);
        assert!((p.1 - 20.0).abs() < 1e-9);
    }
}
