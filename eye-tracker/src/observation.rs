//! Pupil observations: a 2D detection lifted into camera space.

use eye_math::{Circle3D, Ellipse, Sphere};
use pupil_shared::Detector2DResult;

use crate::camera::Unprojector;

/// One frame's pupil, as an image ellipse plus its two 3D interpretations
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Pupil ellipse in full-image coordinates
    pub ellipse: Ellipse,
    pub candidates: [Circle3D; 2],
    /// 2D detection confidence, used as the observation weight
    pub confidence: f64,
    pub timestamp: f64,
}

impl Observation {
    /// Lift a 2D result into camera space.
    ///
    /// Returns `None` for frames without a pupil and for ellipses the
    /// unprojector cannot handle.
    pub fn from_result<U: Unprojector + ?Sized>(
        result: &Detector2DResult,
        unprojector: &U,
    ) -> Option<Self> {
        if !result.has_detection() {
            return None;
        }
        let ellipse = result.ellipse_in_image();
        let candidates = unprojector.unproject(&ellipse)?;
        Some(Self {
            ellipse,
            candidates,
            confidence: result.confidence,
            timestamp: result.timestamp,
        })
    }

    /// Distance between candidate `index` and the pupil position `sphere` predicts for it
    pub fn candidate_residual(&self, index: usize, sphere: &Sphere) -> f64 {
        let candidate = &self.candidates[index];
        (candidate.center - (sphere.center + candidate.normal * sphere.radius)).norm()
    }

    /// Candidate that best agrees with `sphere` and its residual
    pub fn nearest_candidate(&self, sphere: &Sphere) -> (usize, f64) {
        let first = self.candidate_residual(0, sphere);
        let second = self.candidate_residual(1, sphere);
        if second < first {
            (1, second)
        } else {
            (0, first)
        }
    }

    /// Image-space bin of the pupil centre
    pub fn bin(&self, bin_size_px: f64) -> (i64, i64) {
        (
            (self.ellipse.center.x / bin_size_px).floor() as i64,
            (self.ellipse.center.y / bin_size_px).floor() as i64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{PinholeCamera, Reprojector};
    use approx::assert_relative_eq;
    use nalgebra::{Vector2, Vector3};
    use pupil_shared::{ImageSize, Roi};

    fn camera() -> PinholeCamera {
        PinholeCamera::new(620.0, Vector2::new(320.0, 240.0), 2.0)
    }

    fn result_for(circle: &Circle3D, roi: Roi) -> Detector2DResult {
        let ellipse = camera().project_circle(circle).unwrap();
        let mut result =
            Detector2DResult::no_detection(Vec::new(), roi, 1.5, ImageSize::from((640, 480)));
        result.ellipse = ellipse.translated(-roi.offset());
        result.confidence = 0.9;
        result
    }

    #[test]
    fn test_from_result_uses_full_image_ellipse() {
        let sphere = Sphere::new(Vector3::new(1.0, -2.0, 45.0), 12.0);
        let normal = Vector3::new(0.25, 0.1, -1.0).normalize();
        let circle = Circle3D::new(sphere.center + normal * sphere.radius, normal, 2.0);
        let roi = Roi::new(200, 100, 200, 200);

        let observation = Observation::from_result(&result_for(&circle, roi), &camera()).unwrap();
        assert_relative_eq!(observation.candidates[0].center, circle.center, epsilon = 1e-9);
        assert_eq!(observation.confidence, 0.9);
        assert_eq!(observation.timestamp, 1.5);

        let (index, residual) = observation.nearest_candidate(&sphere);
        assert!(residual < 1e-9);
        assert_relative_eq!(observation.candidates[index].normal, normal, epsilon = 1e-9);
        assert!(observation.candidate_residual(1 - index, &sphere) > 1.0);
    }

    #[test]
    fn test_no_detection_gives_no_observation() {
        let result =
            Detector2DResult::no_detection(Vec::new(), Roi::default(), 0.0, ImageSize::from((64, 64)));
        assert!(Observation::from_result(&result, &camera()).is_none());
    }

    #[test]
    fn test_bins() {
        let circle = Circle3D::new(Vector3::new(0.0, 0.0, 30.0), -Vector3::z(), 2.0);
        let observation =
            Observation::from_result(&result_for(&circle, Roi::new(0, 0, 640, 480)), &camera())
                .unwrap();
        assert_eq!(observation.bin(8.0), (40, 30));
    }
}
