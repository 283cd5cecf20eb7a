//! Visibility-ring solver.
//!
//! For each zoom level a reference radius is derived from the body radius.
//! The ring is the part of the body surface lying within that radius of the
//! viewpoint; its size decides whether the zoom level is enabled and how many
//! tiles around the view center it covers.

use std::f64::consts::PI;

use glam::DVec2;

use super::body::{BodyShape, ParentBody};
use crate::geometry::{circle_circle_intersection, line_circle_intersection, Intersection};

/// Multiplier applied to `radius / 2^zoom` when deriving the reference radius
/// of a zoom level.
///
/// Empirically tuned; there is no derivation behind the value. Keep it as is.
pub const VIEW_RADIUS_TUNING: f64 = 5.0;

/// Reference viewing radius for a zoom level.
///
/// Zoom 0 is always selected, so its radius is infinite.
pub fn reference_radius(body_radius: f64, zoom: u32, size_multiplier: f64) -> f64 {
    if zoom == 0 {
        return f64::INFINITY;
    }
    body_radius * (1.0 / 2f64.powi(zoom as i32)) * size_multiplier * VIEW_RADIUS_TUNING
}

/// Largest ring a body can produce: half its circumference.
pub fn max_ring_radius(body: &ParentBody) -> f64 {
    PI * body.radius
}

/// Ring radius, measured along the surface, enclosed by the reference circle.
///
/// `distance_from_center` is the viewpoint's distance to the body center for
/// spheres and its signed height above the plane for flat bodies.
pub fn ring_radius(body: &ParentBody, distance_from_center: f64, reference_radius: f64) -> f64 {
    if reference_radius <= 0.0 || reference_radius.is_nan() {
        return 0.0;
    }
    if reference_radius.is_infinite() {
        return max_ring_radius(body);
    }
    match body.shape {
        BodyShape::Spherical => {
            spherical_ring_radius(body.radius, distance_from_center, reference_radius)
        }
        BodyShape::Flat => planar_ring_radius(distance_from_center, reference_radius)
            .min(max_ring_radius(body)),
    }
}

/// Arc length from the sub-viewpoint to the intersection of the body's great
/// circle with the reference circle centered on the viewpoint.
pub fn spherical_ring_radius(body_radius: f64, distance: f64, reference_radius: f64) -> f64 {
    let body_circle = DVec2::ZERO;
    let viewpoint = DVec2::new(distance.abs(), 0.0);
    match circle_circle_intersection(body_circle, body_radius, viewpoint, reference_radius) {
        // Body entirely within reach: the whole surface.
        Intersection::FirstInside | Intersection::Coincident => PI * body_radius,
        // Reference circle buried inside the body: nothing on the surface.
        Intersection::SecondInside | Intersection::Disjoint => 0.0,
        Intersection::Points(p, _) => body_radius * p.y.abs().atan2(p.x),
    }
}

/// Half chord cut on the plane by the reference circle centered `height`
/// above it.
pub fn planar_ring_radius(height: f64, reference_radius: f64) -> f64 {
    let viewpoint = DVec2::new(0.0, height);
    match line_circle_intersection(DVec2::ZERO, DVec2::X, viewpoint, reference_radius) {
        Intersection::Points(p, q) => (q.x - p.x).abs() / 2.0,
        _ => 0.0,
    }
}
