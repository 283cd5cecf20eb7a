//! GeoStream - streaming of geo-referenced data around moving viewpoints
//!
//! A camera grid decides which map tiles matter for a viewpoint on a parent
//! body. Loaders keep one load scope per relevant tile (or per explicit id),
//! fetch and decode payloads on tokio workers, and hand results back on the
//! owner's tick.
//!
//! # Modules
//!
//! - [`coord`] - Web Mercator tile math
//! - [`grid`] - ring radius solver, per-zoom grids and camera grids
//! - [`lifecycle`] - init/dispose state machine and object pool
//! - [`operation`] - single-shot load operations
//! - [`scope`] - load scopes, their keys and URL parameters
//! - [`fetch`] - fetch services and payload decoders
//! - [`loader`] - id and grid-index loaders
//! - [`session`] - per-tick orchestration of cameras and a loader
//! - [`config`] - INI configuration
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod coord;
pub mod error;
pub mod fetch;
pub mod geometry;
pub mod grid;
pub mod lifecycle;
pub mod loader;
pub mod logging;
pub mod operation;
pub mod scope;
pub mod session;

pub use error::{FetchError, LoadError, ParseError, UsageError};
pub use loader::{GridIndexLoader, IdLoader, LoadContext, Loader, LoaderConfig, ScopeHandle};
pub use session::{StreamingSession, TickReport};
