//! Approximate signed distance from a point to an ellipse boundary.
//!
//! The ellipse is mapped onto a circle of radius `r = major_radius` by a
//! linear transform `A` (rotation into the ellipse frame followed by an
//! anisotropic scale). The distance of a point is then
//!
//! ```text
//! d(p) = r - ||A p - A c||
//! ```
//!
//! which is positive inside, zero on the boundary and negative outside.
//! It is exact for circles and a first-order approximation of pixel
//! distance for elongated ellipses. `A` and `A c` are precomputed so each
//! evaluation is a handful of multiply-adds.

use nalgebra::{Matrix2, Vector2};

use crate::geometry::{Ellipse, GeometryError};

/// Precomputed distance metric for a single ellipse
#[derive(Debug, Clone, Copy)]
pub struct EllipseDistance {
    r_a: Matrix2<f64>,
    r_a_center: Vector2<f64>,
    r: f64,
}

impl EllipseDistance {
    /// Build the metric for `ellipse`.
    ///
    /// # Errors
    /// * `GeometryError::NullEllipse` - for the null sentinel
    /// * `GeometryError::DegenerateEllipse` - if a radius is zero, negative or not finite
    pub fn new(ellipse: &Ellipse) -> Result<Self, GeometryError> {
        if ellipse.is_null() {
            return Err(GeometryError::NullEllipse);
        }
        let major = ellipse.major_radius;
        let minor = ellipse.minor_radius;
        if !(major.is_finite() && minor.is_finite() && minor > 0.0 && major > 0.0) {
            return Err(GeometryError::DegenerateEllipse { major, minor });
        }

        let r = major;
        let (sin, cos) = ellipse.angle.sin_cos();
        let r_a = Matrix2::new(
            r * cos / major,
            r * sin / major,
            -r * sin / minor,
            r * cos / minor,
        );
        let r_a_center = r_a * ellipse.center;

        Ok(Self { r_a, r_a_center, r })
    }

    /// Signed distance of `(x, y)` to the ellipse boundary, positive inside
    pub fn distance(&self, x: f64, y: f64) -> f64 {
        let mapped = self.r_a * Vector2::new(x, y) - self.r_a_center;
        self.r - mapped.x.hypot(mapped.y)
    }

    /// Convenience wrapper for integer pixel coordinates
    pub fn distance_px(&self, x: i32, y: i32) -> f64 {
        self.distance(f64::from(x), f64::from(y))
    }
}
