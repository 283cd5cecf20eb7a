//! Streaming session: camera grids feeding a grid-index loader.
//!
//! A session owns one [`CameraGrid2D`] per viewpoint and a
//! [`GridIndexLoader`]. Each [`StreamingSession::tick`] runs the steps in a
//! fixed order:
//!
//! 1. apply worker results from the previous tick
//! 2. update every camera grid from its latest viewpoint
//! 3. reconcile the loader if any grid changed
//! 4. dispatch ready loads
//!
//! Consumers reading scopes between ticks therefore see one consistent
//! state per tick.

use std::time::Instant;

use glam::DVec3;

use crate::config::GeoStreamConfig;
use crate::fetch::PayloadDecoder;
use crate::grid::{CameraGrid2D, GridSettings, ParentBody, ViewpointId};
use crate::loader::{GridIndexLoader, LoadContext, Loader, ReconcileSummary};

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Scopes that reached `Loaded` from worker results.
    pub loaded: usize,
    /// Whether any camera grid changed.
    pub grid_changed: bool,
    /// Reconciliation result, when one ran.
    pub reconcile: Option<ReconcileSummary>,
    /// Fetches dispatched.
    pub dispatched: usize,
}

#[derive(Debug)]
struct CameraSlot {
    grid: CameraGrid2D,
    view_center: DVec3,
    viewpoint: DVec3,
}

/// Cameras, settings and the loader they drive.
#[derive(Debug)]
pub struct StreamingSession<D: PayloadDecoder> {
    body: ParentBody,
    settings: GridSettings,
    enabled: bool,
    cameras: Vec<CameraSlot>,
    loader: GridIndexLoader<D>,
    force_reconcile: bool,
}

impl<D: PayloadDecoder> StreamingSession<D> {
    /// Create a session with no cameras.
    pub fn new(
        context: LoadContext,
        decoder: D,
        body: ParentBody,
        settings: GridSettings,
    ) -> Self {
        Self {
            body,
            settings,
            enabled: true,
            cameras: Vec::new(),
            loader: GridIndexLoader::new("session", context, decoder),
            force_reconcile: false,
        }
    }

    /// Create a session from loaded configuration.
    ///
    /// The context's loader configuration is replaced by the `[loader]`
    /// section.
    pub fn from_config(config: &GeoStreamConfig, context: LoadContext, decoder: D) -> Self {
        let context = context.with_config(config.loader.to_loader_config());
        Self::new(context, decoder, config.body.to_body(), config.grid)
    }

    /// Parent body.
    pub fn body(&self) -> &ParentBody {
        &self.body
    }

    /// Grid settings.
    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    /// Replace the grid settings; applied on the next tick.
    pub fn set_settings(&mut self, settings: GridSettings) {
        if settings != self.settings {
            self.settings = settings;
            self.force_reconcile = true;
        }
    }

    /// Enable or disable streaming for every camera.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Register a viewpoint. Returns `false` if it already exists.
    pub fn add_camera(&mut self, viewpoint: ViewpointId) -> bool {
        if self.camera(viewpoint).is_some() {
            return false;
        }
        self.cameras.push(CameraSlot {
            grid: CameraGrid2D::new(viewpoint),
            view_center: self.body.center,
            viewpoint: self.body.center,
        });
        tracing::debug!(viewpoint = %viewpoint, "Camera added");
        true
    }

    /// Remove a viewpoint; its tiles are released on the next tick.
    pub fn remove_camera(&mut self, viewpoint: ViewpointId) -> bool {
        let before = self.cameras.len();
        self.cameras.retain(|slot| slot.grid.viewpoint() != viewpoint);
        let removed = self.cameras.len() != before;
        if removed {
            self.force_reconcile = true;
            tracing::debug!(viewpoint = %viewpoint, "Camera removed");
        }
        removed
    }

    /// Record the latest camera position and look-at point.
    ///
    /// Returns `false` for unknown viewpoints.
    pub fn set_viewpoint(
        &mut self,
        viewpoint: ViewpointId,
        view_center: DVec3,
        position: DVec3,
    ) -> bool {
        match self
            .cameras
            .iter_mut()
            .find(|slot| slot.grid.viewpoint() == viewpoint)
        {
            Some(slot) => {
                slot.view_center = view_center;
                slot.viewpoint = position;
                true
            }
            None => false,
        }
    }

    /// Camera grid for a viewpoint.
    pub fn camera(&self, viewpoint: ViewpointId) -> Option<&CameraGrid2D> {
        self.cameras
            .iter()
            .map(|slot| &slot.grid)
            .find(|grid| grid.viewpoint() == viewpoint)
    }

    /// All camera grids.
    pub fn cameras(&self) -> impl Iterator<Item = &CameraGrid2D> {
        self.cameras.iter().map(|slot| &slot.grid)
    }

    /// The loader.
    pub fn loader(&self) -> &GridIndexLoader<D> {
        &self.loader
    }

    /// The loader, mutably, for consumers adding references.
    pub fn loader_mut(&mut self) -> &mut GridIndexLoader<D> {
        &mut self.loader
    }

    /// Run one tick at `now`.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport {
            loaded: self.loader.apply_completions(),
            ..Default::default()
        };

        for slot in &mut self.cameras {
            report.grid_changed |= slot.grid.update_camera_grid_properties(
                self.enabled,
                &self.body,
                slot.view_center,
                slot.viewpoint,
                &self.settings,
            );
        }

        if report.grid_changed || self.force_reconcile {
            let grids: Vec<&CameraGrid2D> = self.cameras.iter().map(|slot| &slot.grid).collect();
            report.reconcile = Some(self.loader.on_grid_changed(&grids));
            self.force_reconcile = false;
        }

        report.dispatched = self.loader.dispatch_pending(now);

        if report.grid_changed || report.loaded > 0 {
            tracing::trace!(
                loaded = report.loaded,
                dispatched = report.dispatched,
                grid_changed = report.grid_changed,
                "Tick"
            );
        }
        report
    }

    /// Dispose the loader and drop every camera.
    pub fn dispose(&mut self) -> bool {
        self.cameras.clear();
        self.loader.dispose()
    }
}
