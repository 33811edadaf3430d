//! Geometry value types shared by the 2D detector and the 3D eye model.
//!
//! Every type carries a distinguished "null" value (all fields zero) that
//! stands for "nothing detected" rather than being an error.

use std::f64::consts::PI;

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a geometric primitive cannot be used for a computation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("ellipse is the null sentinel")]
    NullEllipse,

    #[error("degenerate ellipse: major={major}, minor={minor}")]
    DegenerateEllipse { major: f64, minor: f64 },
}

/// Image-space ellipse.
///
/// `angle` is the rotation of the major axis from +x, in radians.
/// A valid ellipse satisfies `major_radius >= minor_radius >= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: Vector2<f64>,
    pub major_radius: f64,
    pub minor_radius: f64,
    pub angle: f64,
}

impl Ellipse {
    /// Create an ellipse, swapping the radii (and turning the angle by π/2)
    /// when they are given in the wrong order.
    pub fn new(center: Vector2<f64>, major_radius: f64, minor_radius: f64, angle: f64) -> Self {
        if major_radius >= minor_radius {
            Self {
                center,
                major_radius,
                minor_radius,
                angle,
            }
        } else {
            Self {
                center,
                major_radius: minor_radius,
                minor_radius: major_radius,
                angle: angle + PI / 2.0,
            }
        }
    }

    /// Circle of the given radius
    pub fn circle(center: Vector2<f64>, radius: f64) -> Self {
        Self::new(center, radius, radius, 0.0)
    }

    /// The "no detection" sentinel
    pub fn null() -> Self {
        Self {
            center: Vector2::zeros(),
            major_radius: 0.0,
            minor_radius: 0.0,
            angle: 0.0,
        }
    }

    pub fn is_null(&self) -> bool {
        *self == Self::null()
    }

    /// Area enclosed by the ellipse
    pub fn area(&self) -> f64 {
        PI * self.major_radius * self.minor_radius
    }

    /// Perimeter using Ramanujan's first approximation
    pub fn circumference(&self) -> f64 {
        let a = self.major_radius;
        let b = self.minor_radius;
        PI * (3.0 * (a + b) - ((3.0 * a + b) * (a + 3.0 * b)).sqrt())
    }

    /// Unit vector along the major axis
    pub fn major_axis(&self) -> Vector2<f64> {
        Vector2::new(self.angle.cos(), self.angle.sin())
    }

    /// Unit vector along the minor axis
    pub fn minor_axis(&self) -> Vector2<f64> {
        Vector2::new(-self.angle.sin(), self.angle.cos())
    }

    /// Half extents of the axis-aligned bounding box
    pub fn bounding_half_extents(&self) -> Vector2<f64> {
        let ux = self.major_radius * self.angle.cos();
        let uy = self.major_radius * self.angle.sin();
        let vx = self.minor_radius * (self.angle + PI / 2.0).cos();
        let vy = self.minor_radius * (self.angle + PI / 2.0).sin();
        Vector2::new((ux * ux + vx * vx).sqrt(), (uy * uy + vy * vy).sqrt())
    }

    /// Shift the ellipse center by `offset`
    pub fn translated(&self, offset: Vector2<f64>) -> Self {
        Self {
            center: self.center + offset,
            ..*self
        }
    }

    /// Convert to the rotated rectangle convention used by OpenCV's `fitEllipse`
    pub fn to_rotated_rect(&self) -> RotatedRect {
        RotatedRect {
            center: self.center,
            width: 2.0 * self.minor_radius,
            height: 2.0 * self.major_radius,
            angle_deg: self.angle.to_degrees() - 90.0,
        }
    }

    /// Build from a rotated rectangle; height maps to the major axis.
    pub fn from_rotated_rect(rect: &RotatedRect) -> Self {
        Self::new(
            rect.center,
            rect.height / 2.0,
            rect.width / 2.0,
            (rect.angle_deg + 90.0).to_radians(),
        )
    }
}

impl Default for Ellipse {
    fn default() -> Self {
        Self::null()
    }
}

/// Rotated rectangle as produced by contour ellipse fitting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotatedRect {
    pub center: Vector2<f64>,
    pub width: f64,
    pub height: f64,
    /// Rotation in degrees
    pub angle_deg: f64,
}

/// Circle embedded in 3D camera space (e.g. a pupil outline)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle3D {
    pub center: Vector3<f64>,
    /// Unit normal, pointing out of the eyeball
    pub normal: Vector3<f64>,
    pub radius: f64,
}

impl Circle3D {
    pub fn new(center: Vector3<f64>, normal: Vector3<f64>, radius: f64) -> Self {
        Self {
            center,
            normal,
            radius,
        }
    }

    pub fn null() -> Self {
        Self {
            center: Vector3::zeros(),
            normal: Vector3::zeros(),
            radius: 0.0,
        }
    }

    pub fn is_null(&self) -> bool {
        *self == Self::null()
    }
}

impl Default for Circle3D {
    fn default() -> Self {
        Self::null()
    }
}

/// Sphere in 3D camera space (the eyeball model)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Vector3<f64>,
    pub radius: f64,
}

impl Sphere {
    pub fn new(center: Vector3<f64>, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn null() -> Self {
        Self {
            center: Vector3::zeros(),
            radius: 0.0,
        }
    }

    pub fn is_null(&self) -> bool {
        *self == Self::null()
    }

    /// Nearest intersection of the ray `origin + t * direction` (t > 0) with the sphere.
    ///
    /// `direction` must be unit length.
    pub fn intersect_ray(
        &self,
        origin: &Vector3<f64>,
        direction: &Vector3<f64>,
    ) -> Option<Vector3<f64>> {
        let oc = origin - self.center;
        let b = direction.dot(&oc);
        let c = oc.norm_squared() - self.radius * self.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let root = disc.sqrt();
        let t = if -b - root > 0.0 { -b - root } else { -b + root };
        (t > 0.0).then(|| origin + direction * t)
    }
}

impl Default for Sphere {
    fn default() -> Self {
        Self::null()
    }
}

/// A measured quantity paired with a trust weight
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfidenceValue {
    pub value: f64,
    pub confidence: f64,
}

impl ConfidenceValue {
    pub fn new(value: f64, confidence: f64) -> Self {
        Self { value, confidence }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_sentinels() {
        assert!(Ellipse::null().is_null());
        assert!(Ellipse::default().is_null());
        assert!(Circle3D::null().is_null());
        assert!(Sphere::null().is_null());
        assert!(!Ellipse::circle(Vector2::new(1.0, 1.0), 2.0).is_null());
        assert_eq!(ConfidenceValue::default(), ConfidenceValue::new(0.0, 0.0));
    }

    #[test]
    fn test_new_orders_radii() {
        let e = Ellipse::new(Vector2::new(0.0, 0.0), 2.0, 5.0, 0.0);
        assert_eq!(e.major_radius, 5.0);
        assert_eq!(e.minor_radius, 2.0);
        assert_relative_eq!(e.angle, PI / 2.0);
    }

    #[test]
    fn test_circle_circumference_and_area() {
        let c = Ellipse::circle(Vector2::new(0.0, 0.0), 3.0);
        assert_relative_eq!(c.circumference(), 2.0 * PI * 3.0, epsilon = 1e-12);
        assert_relative_eq!(c.area(), PI * 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bounding_half_extents_axis_aligned() {
        let e = Ellipse::new(Vector2::new(10.0, 20.0), 6.0, 2.0, 0.0);
        let half = e.bounding_half_extents();
        assert_relative_eq!(half.x, 6.0, epsilon = 1e-12);
        assert_relative_eq!(half.y, 2.0, epsilon = 1e-12);

        let rotated = Ellipse::new(Vector2::new(10.0, 20.0), 6.0, 2.0, PI / 2.0);
        let half = rotated.bounding_half_extents();
        assert_relative_eq!(half.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(half.y, 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rotated_rect_conversion() {
        let e = Ellipse::new(Vector2::new(4.0, -3.0), 8.0, 5.0, 0.3);
        let rect = e.to_rotated_rect();
        assert_relative_eq!(rect.height, 16.0);
        assert_relative_eq!(rect.width, 10.0);

        let back = Ellipse::from_rotated_rect(&rect);
        assert_relative_eq!(back.major_radius, 8.0, epsilon = 1e-12);
        assert_relative_eq!(back.minor_radius, 5.0, epsilon = 1e-12);
        assert_relative_eq!(back.angle, 0.3, epsilon = 1e-12);
        assert_relative_eq!(back.center, e.center);
    }

    #[test]
    fn test_axes_are_orthonormal() {
        let e = Ellipse::new(Vector2::new(0.0, 0.0), 3.0, 1.0, 0.7);
        assert_relative_eq!(e.major_axis().dot(&e.minor_axis()), 0.0, epsilon = 1e-12);
        assert_relative_eq!(e.minor_axis().norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sphere_ray_intersection() {
        let sphere = Sphere::new(Vector3::new(0.0, 0.0, 40.0), 12.0);
        let hit = sphere
            .intersect_ray(&Vector3::zeros(), &Vector3::new(0.0, 0.0, 1.0))
            .unwrap();
        assert_relative_eq!(hit, Vector3::new(0.0, 0.0, 28.0), epsilon = 1e-12);

        let miss = sphere.intersect_ray(&Vector3::zeros(), &Vector3::new(1.0, 0.0, 0.0));
        assert!(miss.is_none());
    }
}
