//! Camera grid: per-viewpoint LOD selection across a range of zoom levels.
//!
//! # Algorithm
//!
//! ```text
//! view center ──► local frame ──► geo center, center cell per zoom
//! viewpoint   ──► distance from center
//!
//! for zoom in (zoom_min..=zoom_max).rev():
//!     reference = R / 2^zoom * size_multiplier * VIEW_RADIUS_TUNING
//!     ring      = circle∩circle (sphere) | line∩circle (flat)
//!     cascade   = 0, 1, 2 … for non-empty rings, capped at cascade_max - cascade_min
//!     enabled   = ring > 0 and cascade not capped
//! ```
//!
//! The returned "changed" flag is coarse on purpose: any enable flip or any
//! change in covered cells reports `true`, and the loader recomputes its
//! whole desired set.

use glam::{DVec3, IVec2};

use super::body::ParentBody;
use super::grid2d::Grid2D;
use super::ring::{reference_radius, ring_radius};
use super::GridSettings;
use crate::coord::{uv_to_index, GeoCoordinate, MAX_ZOOM};
use crate::scope::GridKey;

/// Opaque identifier of the viewpoint a camera grid follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewpointId(pub u64);

impl std::fmt::Display for ViewpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "viewpoint#{}", self.0)
    }
}

/// Zoom and cascade ranges a grid list was built for.
#[derive(Debug, Clone, Copy, PartialEq)]
struct GridLayout {
    zoom_range: (u32, u32),
    cascade_range: (u32, u32),
    aspect_ratio: f64,
}

/// LOD grid set for a single viewpoint.
#[derive(Debug, Clone)]
pub struct CameraGrid2D {
    viewpoint: ViewpointId,
    geo_center: GeoCoordinate,
    distance_from_center: f64,
    /// One grid per zoom, ascending.
    grids: Vec<Grid2D>,
    /// Ring radius per grid from the last update, same order as `grids`.
    last_radii: Vec<f64>,
    best_zoom: Option<u32>,
    layout: Option<GridLayout>,
}

impl CameraGrid2D {
    /// Create an empty camera grid following `viewpoint`.
    pub fn new(viewpoint: ViewpointId) -> Self {
        Self {
            viewpoint,
            geo_center: GeoCoordinate::default(),
            distance_from_center: 0.0,
            grids: Vec::new(),
            last_radii: Vec::new(),
            best_zoom: None,
            layout: None,
        }
    }

    /// Viewpoint this grid follows.
    pub fn viewpoint(&self) -> ViewpointId {
        self.viewpoint
    }

    /// Geographic position of the view center at the last update.
    pub fn geo_center(&self) -> GeoCoordinate {
        self.geo_center
    }

    /// Distance used by the ring solver at the last update.
    pub fn distance_from_center(&self) -> f64 {
        self.distance_from_center
    }

    /// Tracked grids in ascending zoom order.
    pub fn grids(&self) -> &[Grid2D] {
        &self.grids
    }

    /// Tracked grid for a zoom level.
    pub fn grid(&self, zoom: u32) -> Option<&Grid2D> {
        self.grids.iter().find(|g| g.zoom() == zoom)
    }

    /// Ring radii from the last update, ascending zoom order.
    pub fn last_radii(&self) -> &[f64] {
        &self.last_radii
    }

    /// Highest enabled zoom level.
    pub fn best_zoom(&self) -> Option<u32> {
        self.best_zoom
    }

    /// Keys of every cell covered by an enabled grid.
    pub fn enabled_keys(&self) -> impl Iterator<Item = GridKey> + '_ {
        self.grids
            .iter()
            .filter(|g| g.is_enabled())
            .flat_map(Grid2D::keys)
    }

    /// Recompute which zoom levels and cells are relevant for the viewpoint.
    ///
    /// # Arguments
    ///
    /// * `enabled` - Global switch; when false every grid is disabled
    /// * `body` - Parent body the grid is draped over
    /// * `view_center` - World-space point the camera looks at
    /// * `viewpoint` - World-space camera position
    /// * `settings` - Zoom/cascade ranges, size multiplier and aspect ratio
    ///
    /// # Returns
    ///
    /// `true` if any grid changed its enabled state or covered cells.
    pub fn update_camera_grid_properties(
        &mut self,
        enabled: bool,
        body: &ParentBody,
        view_center: DVec3,
        viewpoint: DVec3,
        settings: &GridSettings,
    ) -> bool {
        let mut changed = self.rebuild_if_needed(settings);

        if !enabled {
            for grid in &mut self.grids {
                if grid.is_enabled() {
                    grid.set_enabled(false);
                    changed = true;
                }
            }
            self.last_radii.iter_mut().for_each(|r| *r = 0.0);
            self.best_zoom = None;
            return changed;
        }

        let local_center = body.to_local(view_center);
        self.geo_center = body.local_to_geo(local_center);
        let center_uv = body.local_to_uv(local_center);
        self.distance_from_center = body.distance_from_center(body.to_local(viewpoint));

        let (cascade_min, cascade_max) = self.layout.map_or((0, 0), |l| l.cascade_range);
        let max_cascade = cascade_max.saturating_sub(cascade_min);
        let mut next_cascade = 0u32;
        let mut floor_reached = false;
        let mut best_zoom = None;

        for (slot, grid) in self.grids.iter_mut().enumerate().rev() {
            let zoom = grid.zoom();
            let dimensions = grid.dimensions();

            let reference = reference_radius(body.radius, zoom, settings.size_multiplier);
            let mut ring = ring_radius(body, self.distance_from_center, reference);

            let mut cascade = None;
            if floor_reached {
                ring = 0.0;
            } else if ring > 0.0 {
                if next_cascade > max_cascade {
                    floor_reached = true;
                    ring = 0.0;
                } else {
                    cascade = Some(next_cascade);
                    next_cascade += 1;
                    best_zoom.get_or_insert(zoom);
                }
            }

            let enable = ring > 0.0;
            let tile_size = body.circumference() / f64::from(dimensions.x);
            let radius_tiles = if enable { ring / tile_size } else { 0.0 };
            let center_index: IVec2 = uv_to_index(center_uv, dimensions);

            let was_enabled = grid.is_enabled();
            let previous_cells = grid.cells().to_vec();

            grid.set_enabled(enable);
            grid.set_cascade(cascade);
            grid.update_grid(center_index, radius_tiles);
            self.last_radii[slot] = ring;

            if was_enabled != enable || previous_cells.as_slice() != grid.cells() {
                changed = true;
            }
        }

        if self.best_zoom != best_zoom {
            tracing::debug!(
                viewpoint = %self.viewpoint,
                best_zoom = ?best_zoom,
                distance = self.distance_from_center,
                "Camera grid best zoom changed"
            );
        }
        self.best_zoom = best_zoom;

        changed
    }

    /// Rebuild the grid list when the zoom range, cascade range or aspect
    /// ratio changed. Returns true if previously enabled grids were dropped.
    fn rebuild_if_needed(&mut self, settings: &GridSettings) -> bool {
        let (mut zoom_min, mut zoom_max) = settings.zoom_range;
        if zoom_min > zoom_max {
            std::mem::swap(&mut zoom_min, &mut zoom_max);
        }
        zoom_max = zoom_max.min(MAX_ZOOM);
        zoom_min = zoom_min.min(zoom_max);
        let (mut cascade_min, mut cascade_max) = settings.cascade_range;
        if cascade_min > cascade_max {
            std::mem::swap(&mut cascade_min, &mut cascade_max);
        }

        let layout = GridLayout {
            zoom_range: (zoom_min, zoom_max),
            cascade_range: (cascade_min, cascade_max),
            aspect_ratio: settings.aspect_ratio,
        };
        if self.layout == Some(layout) {
            return false;
        }

        let had_enabled = self.grids.iter().any(Grid2D::is_enabled);
        self.grids = (zoom_min..=zoom_max)
            .map(|zoom| Grid2D::new(zoom, settings.aspect_ratio))
            .collect();
        self.last_radii = vec![0.0; self.grids.len()];
        self.layout = Some(layout);

        tracing::debug!(
            viewpoint = %self.viewpoint,
            zoom_min,
            zoom_max,
            cascade_min,
            cascade_max,
            "Camera grid rebuilt"
        );

        had_enabled
    }
}
