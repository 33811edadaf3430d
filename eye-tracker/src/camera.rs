//! Camera collaborators mapping between image ellipses and 3D geometry.
//!
//! Camera frame: `x` right, `y` down, `z` forward along the optical axis.
//! Pupils face the camera, so pupil normals have negative `z`.

use eye_math::{Circle3D, Ellipse, Sphere};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Maps image-space ellipses and pixels into camera space
pub trait Unprojector {
    /// The two pupil circles consistent with an image ellipse.
    ///
    /// Both share a centre and differ in the sign of the image-plane
    /// component of their normal. `None` for null or degenerate ellipses.
    fn unproject(&self, ellipse: &Ellipse) -> Option<[Circle3D; 2]>;

    /// Unit ray through a pixel
    fn pixel_ray(&self, x: f64, y: f64) -> Option<Vector3<f64>>;
}

/// Maps camera-space circles and spheres back into the image
pub trait Reprojector {
    fn project_circle(&self, circle: &Circle3D) -> Option<Ellipse>;

    fn project_sphere(&self, sphere: &Sphere) -> Option<Ellipse>;
}

/// Pinhole camera with a weak-perspective circle model.
///
/// A circle of radius `r` at depth `z` images as an ellipse with major radius
/// `f·r/z`, foreshortened along the image direction of its normal by
/// `|n_z|`. Unprojection inverts this using an assumed physical pupil radius,
/// so depth comes from apparent size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinholeCamera {
    /// Focal length in pixels
    pub focal_length: f64,
    /// Principal point in pixels
    pub principal_point: Vector2<f64>,
    /// Assumed physical pupil radius in millimetres
    pub pupil_radius_mm: f64,
}

impl PinholeCamera {
    pub fn new(focal_length: f64, principal_point: Vector2<f64>, pupil_radius_mm: f64) -> Self {
        Self {
            focal_length,
            principal_point,
            pupil_radius_mm,
        }
    }

    /// Returns `true` when focal length and pupil radius are finite and positive
    pub fn is_valid(&self) -> bool {
        self.focal_length.is_finite()
            && self.focal_length > 0.0
            && self.pupil_radius_mm.is_finite()
            && self.pupil_radius_mm > 0.0
            && self.principal_point.iter().all(|v| v.is_finite())
    }

    /// Perspective projection of a camera-space point
    pub fn project_point(&self, point: &Vector3<f64>) -> Option<Vector2<f64>> {
        if !self.is_valid() || point.z <= 0.0 {
            return None;
        }
        Some(self.principal_point + point.xy() * (self.focal_length / point.z))
    }

    /// Camera-space point on the ray through `pixel` at depth `z`
    pub fn back_project(&self, pixel: &Vector2<f64>, z: f64) -> Vector3<f64> {
        let normalized = (pixel - self.principal_point) / self.focal_length;
        Vector3::new(normalized.x * z, normalized.y * z, z)
    }
}

impl Unprojector for PinholeCamera {
    fn unproject(&self, ellipse: &Ellipse) -> Option<[Circle3D; 2]> {
        if !self.is_valid() || ellipse.is_null() {
            return None;
        }
        let major = ellipse.major_radius;
        let minor = ellipse.minor_radius;
        if !(major.is_finite() && minor.is_finite() && major > 0.0 && minor >= 0.0) {
            return None;
        }

        let depth = self.focal_length * self.pupil_radius_mm / major;
        let center = self.back_project(&ellipse.center, depth);

        let cos_tilt = (minor / major).clamp(0.0, 1.0);
        let sin_tilt = (1.0 - cos_tilt * cos_tilt).sqrt();
        let tilt_dir = ellipse.minor_axis() * sin_tilt;

        let normal_a = Vector3::new(tilt_dir.x, tilt_dir.y, -cos_tilt);
        let normal_b = Vector3::new(-tilt_dir.x, -tilt_dir.y, -cos_tilt);
        Some([
            Circle3D::new(center, normal_a, self.pupil_radius_mm),
            Circle3D::new(center, normal_b, self.pupil_radius_mm),
        ])
    }

    fn pixel_ray(&self, x: f64, y: f64) -> Option<Vector3<f64>> {
        if !self.is_valid() {
            return None;
        }
        self.back_project(&Vector2::new(x, y), 1.0).try_normalize(1e-12)
    }
}

impl Reprojector for PinholeCamera {
    fn project_circle(&self, circle: &Circle3D) -> Option<Ellipse> {
        if circle.is_null() || circle.radius <= 0.0 {
            return None;
        }
        let normal = circle.normal.try_normalize(1e-12)?;
        let center = self.project_point(&circle.center)?;
        let major = self.focal_length * circle.radius / circle.center.z;
        let minor = major * normal.z.abs();
        let angle = if normal.xy().norm() > 1e-12 {
            normal.y.atan2(normal.x) + std::f64::consts::FRAC_PI_2
        } else {
            0.0
        };
        Some(Ellipse::new(center, major, minor, angle))
    }

    fn project_sphere(&self, sphere: &Sphere) -> Option<Ellipse> {
        if sphere.is_null() || sphere.radius <= 0.0 {
            return None;
        }
        let center = self.project_point(&sphere.center)?;
        Some(Ellipse::circle(
            center,
            self.focal_length * sphere.radius / sphere.center.z,
        ))
    }
}
