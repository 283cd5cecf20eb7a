//! Level-of-detail grid selection.
//!
//! A [`CameraGrid2D`] follows one viewpoint and keeps a [`Grid2D`] per zoom
//! level. Each update solves the visibility ring for every zoom against the
//! [`ParentBody`] and enables the levels whose ring is non-empty, ranked by
//! cascade.

mod body;
mod camera;
mod grid2d;
mod ring;

pub use body::{BodyShape, ParentBody};
pub use camera::{CameraGrid2D, ViewpointId};
pub use grid2d::Grid2D;
pub use ring::{
    max_ring_radius, planar_ring_radius, reference_radius, ring_radius, spherical_ring_radius,
    VIEW_RADIUS_TUNING,
};

/// Default zoom range tracked by a camera grid.
pub const DEFAULT_ZOOM_RANGE: (u32, u32) = (0, 16);

/// Default cascade range (three simultaneous zoom levels).
pub const DEFAULT_CASCADE_RANGE: (u32, u32) = (0, 2);

/// Default size multiplier applied to every reference radius.
pub const DEFAULT_SIZE_MULTIPLIER: f64 = 1.0;

/// Default grid aspect ratio (columns per row).
pub const DEFAULT_ASPECT_RATIO: f64 = 1.0;

/// Zoom/cascade configuration consumed by
/// [`CameraGrid2D::update_camera_grid_properties`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSettings {
    /// Inclusive zoom range `(min, max)`.
    pub zoom_range: (u32, u32),
    /// Inclusive cascade range `(min, max)`; at most `max - min + 1` zoom
    /// levels are enabled at once.
    pub cascade_range: (u32, u32),
    /// Scales every reference radius; larger values pull detail further out.
    pub size_multiplier: f64,
    /// Columns per row of the tile grid.
    pub aspect_ratio: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            zoom_range: DEFAULT_ZOOM_RANGE,
            cascade_range: DEFAULT_CASCADE_RANGE,
            size_multiplier: DEFAULT_SIZE_MULTIPLIER,
            aspect_ratio: DEFAULT_ASPECT_RATIO,
        }
    }
}

impl GridSettings {
    /// Set the zoom range.
    pub fn with_zoom_range(mut self, min: u32, max: u32) -> Self {
        self.zoom_range = (min, max);
        self
    }

    /// Set the cascade range.
    pub fn with_cascade_range(mut self, min: u32, max: u32) -> Self {
        self.cascade_range = (min, max);
        self
    }

    /// Set the size multiplier.
    pub fn with_size_multiplier(mut self, multiplier: f64) -> Self {
        self.size_multiplier = multiplier;
        self
    }

    /// Number of zoom levels that may be enabled at the same time.
    pub fn max_enabled_levels(&self) -> u32 {
        let (min, max) = self.cascade_range;
        max.abs_diff(min) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = GridSettings::default();
        assert_eq!(settings.zoom_range, DEFAULT_ZOOM_RANGE);
        assert_eq!(settings.max_enabled_levels(), 3);
    }

    #[test]
    fn test_builders() {
        let settings = GridSettings::default()
            .with_zoom_range(2, 9)
            .with_cascade_range(1, 2)
            .with_size_multiplier(1.5);
        assert_eq!(settings.zoom_range, (2, 9));
        assert_eq!(settings.max_enabled_levels(), 2);
        assert_eq!(settings.size_multiplier, 1.5);
    }
}
