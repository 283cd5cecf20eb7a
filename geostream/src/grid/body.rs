//! Parent body description and local/geographic transforms.
//!
//! World space is Y-up. For spherical bodies longitude 0 points along +X and
//! longitude 90°E along +Z. Flat bodies lay the Web Mercator square on the
//! XZ plane: the map is `2πR` wide, centered on the body origin, with north
//! towards +Z.

use std::f64::consts::PI;

use glam::{DVec2, DVec3};

use crate::coord::{geo_to_uv, uv_to_geo, GeoCoordinate};

/// Shape of the parent body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    /// A sphere of the body radius.
    Spherical,
    /// A plane whose map width equals the sphere's circumference.
    Flat,
}

impl BodyShape {
    /// Parse from a config string (`"spherical"` / `"flat"`).
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "spherical" | "sphere" => Some(Self::Spherical),
            "flat" | "planar" => Some(Self::Flat),
            _ => None,
        }
    }

    /// Config string for this shape.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spherical => "spherical",
            Self::Flat => "flat",
        }
    }
}

/// The body the tile grid is draped over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParentBody {
    /// World-space center (sphere) or origin (flat).
    pub center: DVec3,
    /// Radius in meters.
    pub radius: f64,
    /// Shape of the body.
    pub shape: BodyShape,
}

impl ParentBody {
    /// A spherical body centered at `center`.
    pub fn spherical(center: DVec3, radius: f64) -> Self {
        Self {
            center,
            radius,
            shape: BodyShape::Spherical,
        }
    }

    /// A flat body with its origin at `center`.
    pub fn flat(center: DVec3, radius: f64) -> Self {
        Self {
            center,
            radius,
            shape: BodyShape::Flat,
        }
    }

    /// Total map width (and sphere circumference) in meters.
    pub fn circumference(&self) -> f64 {
        2.0 * PI * self.radius
    }

    /// Converts a world-space point into the body's local frame.
    pub fn to_local(&self, world: DVec3) -> DVec3 {
        world - self.center
    }

    /// Converts a local point to a geographic coordinate.
    pub fn local_to_geo(&self, local: DVec3) -> GeoCoordinate {
        match self.shape {
            BodyShape::Spherical => {
                let length = local.length();
                if length <= f64::EPSILON {
                    return GeoCoordinate::new(0.0, 0.0, -self.radius);
                }
                let lat = (local.y / length).clamp(-1.0, 1.0).asin().to_degrees();
                let lon = local.z.atan2(local.x).to_degrees();
                GeoCoordinate::new(lat, lon, length - self.radius)
            }
            BodyShape::Flat => {
                let (lat, lon) = uv_to_geo(self.local_to_uv(local));
                GeoCoordinate::new(lat, lon, local.y)
            }
        }
    }

    /// Converts a geographic coordinate to a local point.
    pub fn geo_to_local(&self, geo: &GeoCoordinate) -> DVec3 {
        match self.shape {
            BodyShape::Spherical => {
                let lat = geo.lat.to_radians();
                let lon = geo.lon.to_radians();
                let r = self.radius + geo.alt;
                DVec3::new(lat.cos() * lon.cos(), lat.sin(), lat.cos() * lon.sin()) * r
            }
            BodyShape::Flat => {
                let uv = geo_to_uv(geo.lat, geo.lon);
                let width = self.circumference();
                DVec3::new((uv.x - 0.5) * width, geo.alt, (0.5 - uv.y) * width)
            }
        }
    }

    /// Projects a local point to normalized Web Mercator space.
    pub fn local_to_uv(&self, local: DVec3) -> DVec2 {
        match self.shape {
            BodyShape::Spherical => {
                let geo = self.local_to_geo(local);
                geo_to_uv(geo.lat, geo.lon)
            }
            BodyShape::Flat => {
                let width = self.circumference();
                DVec2::new(local.x / width + 0.5, 0.5 - local.z / width)
            }
        }
    }

    /// Distance used by the ring solver: distance to the center for spheres,
    /// signed height above the plane for flat bodies.
    pub fn distance_from_center(&self, local_viewpoint: DVec3) -> f64 {
        match self.shape {
            BodyShape::Spherical => local_viewpoint.length(),
            BodyShape::Flat => local_viewpoint.y,
        }
    }
}
