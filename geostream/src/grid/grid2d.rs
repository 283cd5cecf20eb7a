//! A single zoom level tracked by a camera grid.

use std::collections::HashSet;

use glam::IVec2;

use crate::coord::tile_dimensions;
use crate::scope::GridKey;

/// One zoom level of a [`super::CameraGrid2D`].
///
/// `enabled` is only toggled by the owning camera grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid2D {
    zoom: u32,
    dimensions: IVec2,
    enabled: bool,
    cascade: Option<u32>,
    was_first_updated: bool,

    // Per-tick data, cleared by `update_grid`.
    center_index: IVec2,
    radius_tiles: f64,
    cells: Vec<IVec2>,
}

impl Grid2D {
    /// Create a disabled grid for a zoom level.
    pub fn new(zoom: u32, aspect_ratio: f64) -> Self {
        Self {
            zoom,
            dimensions: tile_dimensions(zoom, aspect_ratio),
            enabled: false,
            cascade: None,
            was_first_updated: false,
            center_index: IVec2::ZERO,
            radius_tiles: 0.0,
            cells: Vec::new(),
        }
    }

    /// Zoom level of this grid.
    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    /// Grid dimensions (columns, rows).
    pub fn dimensions(&self) -> IVec2 {
        self.dimensions
    }

    /// Whether this zoom level is currently selected.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Cascade rank (0 = highest detail) while enabled.
    pub fn cascade(&self) -> Option<u32> {
        self.cascade
    }

    /// Whether `update_grid` has run at least once.
    pub fn was_first_updated(&self) -> bool {
        self.was_first_updated
    }

    /// Cell containing the view center.
    pub fn center_index(&self) -> IVec2 {
        self.center_index
    }

    /// Ring radius in tiles.
    pub fn radius_tiles(&self) -> f64 {
        self.radius_tiles
    }

    /// Cells covered by the ring; empty while disabled.
    pub fn cells(&self) -> &[IVec2] {
        &self.cells
    }

    /// Ring radius, in tiles, at which every cell is covered.
    ///
    /// Columns wrap, so half the width reaches every column; rows do not, so
    /// a ring centered on an edge row needs the full height.
    pub fn full_coverage_radius(&self) -> f64 {
        f64::from(self.dimensions.x / 2).hypot(f64::from(self.dimensions.y)) + 1.0
    }

    /// Grid keys for every covered cell.
    pub fn keys(&self) -> impl Iterator<Item = GridKey> + '_ {
        let dimensions = self.dimensions;
        self.cells.iter().map(move |&index| GridKey::new(index, dimensions))
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.cascade = None;
            self.cells.clear();
            self.radius_tiles = 0.0;
        }
    }

    pub(crate) fn set_cascade(&mut self, cascade: Option<u32>) {
        self.cascade = cascade;
    }

    /// Clear per-tick data and recompute the covered cells.
    ///
    /// Columns wrap around the antimeridian; rows are clamped to the grid.
    /// Radii past [`Grid2D::full_coverage_radius`] cover the whole grid and
    /// are stored clamped to it.
    pub(crate) fn update_grid(&mut self, center_index: IVec2, radius_tiles: f64) {
        self.cells.clear();
        self.was_first_updated = true;
        self.center_index = center_index;
        self.radius_tiles = radius_tiles.clamp(0.0, self.full_coverage_radius());

        if !self.enabled {
            return;
        }

        // Cell math runs in i64: columns may reach i32::MAX on wide grids.
        let columns = i64::from(self.dimensions.x);
        let rows = i64::from(self.dimensions.y);
        let reach = self.radius_tiles + 0.5;
        let span = reach.ceil() as i64;
        let mut seen = HashSet::new();
        for dy in -span..=span {
            let row = i64::from(center_index.y) + dy;
            if row < 0 || row >= rows {
                continue;
            }
            for dx in -span..=span {
                if (dx as f64).hypot(dy as f64) > reach {
                    continue;
                }
                let col = (i64::from(center_index.x) + dx).rem_euclid(columns);
                let cell = IVec2::new(col as i32, row as i32);
                if seen.insert(cell) {
                    self.cells.push(cell);
                }
            }
        }
    }
}
