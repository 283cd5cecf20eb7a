//! Planar intersection primitives used by the visibility-ring computation.
//!
//! Both primitives work in a 2D cross-section: the ring solver slices the
//! parent body through its center and the viewpoint, which reduces the
//! sphere case to two circles and the flat case to a line and a circle.

use glam::DVec2;

/// Tolerance below which distances are treated as zero.
pub const EPSILON: f64 = 1e-9;

/// Result of intersecting two shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intersection {
    /// The shapes do not touch.
    Disjoint,
    /// The first circle lies entirely inside the second.
    FirstInside,
    /// The second circle lies entirely inside the first.
    SecondInside,
    /// Both circles are the same circle.
    Coincident,
    /// The boundaries cross (or touch, when both points are equal).
    Points(DVec2, DVec2),
}

/// Intersects circle `(c0, r0)` with circle `(c1, r1)`.
pub fn circle_circle_intersection(c0: DVec2, r0: f64, c1: DVec2, r1: f64) -> Intersection {
    let delta = c1 - c0;
    let d = delta.length();

    if d < EPSILON {
        return if (r0 - r1).abs() < EPSILON {
            Intersection::Coincident
        } else if r0 < r1 {
            Intersection::FirstInside
        } else {
            Intersection::SecondInside
        };
    }
    if d > r0 + r1 {
        return Intersection::Disjoint;
    }
    if d + r0 < r1 {
        return Intersection::FirstInside;
    }
    if d + r1 < r0 {
        return Intersection::SecondInside;
    }

    // Distance from c0 along the center line to the chord.
    let a = (d * d - r1 * r1 + r0 * r0) / (2.0 * d);
    let h = (r0 * r0 - a * a).max(0.0).sqrt();
    let dir = delta / d;
    let mid = c0 + dir * a;
    let perp = DVec2::new(-dir.y, dir.x) * h;
    Intersection::Points(mid + perp, mid - perp)
}

/// Intersects the infinite line through `point` along `direction` with the
/// circle `(center, radius)`.
///
/// Only [`Intersection::Disjoint`] and [`Intersection::Points`] are returned.
pub fn line_circle_intersection(
    point: DVec2,
    direction: DVec2,
    center: DVec2,
    radius: f64,
) -> Intersection {
    let Some(dir) = direction.try_normalize() else {
        return Intersection::Disjoint;
    };
    // Project the circle center onto the line.
    let t = (center - point).dot(dir);
    let closest = point + dir * t;
    let dist = closest.distance(center);
    if dist > radius {
        return Intersection::Disjoint;
    }
    let half_chord = (radius * radius - dist * dist).max(0.0).sqrt();
    Intersection::Points(closest - dir * half_chord, closest + dir * half_chord)
}
