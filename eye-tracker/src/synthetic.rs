//! Synthetic eye for exercising the tracker without a camera.
//!
//! A known eyeball sphere rotates along a gaze trajectory in front of a
//! [`PinholeCamera`]. Each frame projects the pupil, samples edge pixels
//! around the outline with Gaussian noise and scores them into a
//! [`Detector2DResult`] exactly like the 2D stage would.

use std::f64::consts::PI;

use eye_math::{Circle3D, Sphere};
use nalgebra::{Vector2, Vector3};
use pupil_shared::{build_result, Detector2DProperties, Detector2DResult, EdgePoint, ImageSize, Roi};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Normal, NormalError};
use thiserror::Error;

use crate::camera::{PinholeCamera, Reprojector};

/// Gaze trajectory: the pupil normal circles a cone around the optical axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazePath {
    /// Mean half-angle of the cone, radians
    pub cone_rad: f64,
    /// Swing of the half-angle, radians
    pub cone_swing_rad: f64,
    /// Seconds per revolution around the cone
    pub period_s: f64,
}

impl Default for GazePath {
    fn default() -> Self {
        Self {
            cone_rad: 0.4,
            cone_swing_rad: 0.15,
            period_s: 2.0,
        }
    }
}

impl GazePath {
    /// Outward pupil normal at time `t`
    pub fn normal_at(&self, t: f64) -> Vector3<f64> {
        let azimuth = 2.0 * PI * t / self.period_s;
        let tilt = self.cone_rad + self.cone_swing_rad * (azimuth / 2.7).sin();
        Vector3::new(
            tilt.sin() * azimuth.cos(),
            tilt.sin() * azimuth.sin(),
            -tilt.cos(),
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntheticError {
    #[error("noise sigma must be finite and non-negative, got {0}")]
    InvalidSigma(f64),

    #[error("noise distribution: {0}")]
    Distribution(#[from] NormalError),
}

fn pixel_noise(sigma: f64) -> Result<Normal<f64>, SyntheticError> {
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(SyntheticError::InvalidSigma(sigma));
    }
    Ok(Normal::new(0.0, sigma)?)
}

pub struct SyntheticEye {
    pub camera: PinholeCamera,
    pub sphere: Sphere,
    pub image_size: ImageSize,
    pub gaze: GazePath,
    pub properties: Detector2DProperties,
    /// Fraction of the outline covered by edge pixels
    pub edge_coverage: f64,
    edge_noise: Option<Normal<f64>>,
    center_noise: Option<Normal<f64>>,
    rng: ChaCha8Rng,
}

impl SyntheticEye {
    /// Noise-free eye with a 12mm eyeball 45mm in front of a VGA camera
    pub fn new(seed: u64) -> Self {
        Self {
            camera: PinholeCamera::new(620.0, Vector2::new(320.0, 240.0), 2.0),
            sphere: Sphere::new(Vector3::new(1.5, -1.0, 45.0), 12.0),
            image_size: ImageSize::from_width_height(640, 480),
            gaze: GazePath::default(),
            properties: Detector2DProperties::default(),
            edge_coverage: 0.9,
            edge_noise: None,
            center_noise: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Set the standard deviations of edge-pixel and ellipse-centre noise, in pixels
    pub fn with_noise(mut self, edge_px: f64, center_px: f64) -> Result<Self, SyntheticError> {
        self.edge_noise = Some(pixel_noise(edge_px)?);
        self.center_noise = Some(pixel_noise(center_px)?);
        Ok(self)
    }

    /// Ground-truth pupil circle at time `t`
    pub fn pupil_at(&self, t: f64) -> Circle3D {
        self.pupil_for(self.gaze.normal_at(t))
    }

    /// Ground-truth pupil circle for an outward gaze normal
    pub fn pupil_for(&self, normal: Vector3<f64>) -> Circle3D {
        let normal = normal.normalize();
        Circle3D::new(
            self.sphere.center + normal * self.sphere.radius,
            normal,
            self.camera.pupil_radius_mm,
        )
    }

    fn jitter(&mut self, noise: Option<Normal<f64>>) -> Vector2<f64> {
        match noise {
            Some(noise) => Vector2::new(self.rng.sample(noise), self.rng.sample(noise)),
            None => Vector2::zeros(),
        }
    }

    /// Frame along the gaze trajectory
    pub fn frame(&mut self, t: f64) -> Detector2DResult {
        let normal = self.gaze.normal_at(t);
        self.frame_for(normal, t)
    }

    /// Frame for an explicit gaze normal
    pub fn frame_for(&mut self, normal: Vector3<f64>, t: f64) -> Detector2DResult {
        let full_frame = Roi::full_frame(self.image_size);
        let Some(mut ellipse) = self.camera.project_circle(&self.pupil_for(normal)) else {
            return Detector2DResult::no_detection(Vec::new(), full_frame, t, self.image_size);
        };
        ellipse.center += self.jitter(self.center_noise);

        let padded = Roi::bounding_ellipse(&ellipse);
        let padded = Roi::new(padded.x - 8, padded.y - 8, padded.width + 16, padded.height + 16);
        let Some(roi) = padded.clamp_to(self.image_size) else {
            return Detector2DResult::no_detection(Vec::new(), full_frame, t, self.image_size);
        };

        let count = (self.edge_coverage * ellipse.circumference()).round().max(0.0) as usize;
        let major = ellipse.major_axis();
        let minor = ellipse.minor_axis();
        let start = self.rng.random_range(0.0..2.0 * PI);
        let mut edges = Vec::with_capacity(count);
        for i in 0..count {
            let theta = start + 2.0 * PI * i as f64 / count as f64;
            let p = ellipse.center
                + major * ellipse.major_radius * theta.cos()
                + minor * ellipse.minor_radius * theta.sin()
                + self.jitter(self.edge_noise);
            let (x, y) = roi.to_local(p.x.round() as i32, p.y.round() as i32);
            if x >= 0 && y >= 0 && x < roi.width && y < roi.height {
                edges.push(EdgePoint::new(x, y));
            }
        }

        let local = ellipse.translated(-roi.offset());
        build_result(&local, edges, roi, t, self.image_size, &self.properties)
    }
}
