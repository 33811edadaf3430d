//! 2D detector records: the per-frame result and the detector configuration.

use bytemuck::{Pod, Zeroable};
use eye_math::Ellipse;
use serde::{Deserialize, Serialize};

use crate::image_size::ImageSize;
use crate::roi::Roi;
use crate::wire::{self, WireError};

/// Integer edge pixel, relative to the result's ROI
///
/// Laid out as two native `i32`s so edge lists can be cast straight into the
/// wire buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct EdgePoint {
    pub x: i32,
    pub y: i32,
}

impl EdgePoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for EdgePoint {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Per-frame output of the 2D pupil detector
///
/// All coordinates (ellipse centre and edges) are relative to `current_roi`.
/// A frame without a pupil carries the null ellipse and zero confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detector2DResult {
    pub confidence: f64,
    pub ellipse: Ellipse,
    /// Edges that supported the final fit
    pub final_edges: Vec<EdgePoint>,
    /// Every candidate edge the fit considered
    pub raw_edges: Vec<EdgePoint>,
    pub current_roi: Roi,
    pub timestamp: f64,
    pub image_width: i32,
    pub image_height: i32,
}

impl Detector2DResult {
    /// "No pupil" record for a frame. Raw edges are kept for visualisation.
    pub fn no_detection(
        raw_edges: Vec<EdgePoint>,
        roi: Roi,
        timestamp: f64,
        image_size: ImageSize,
    ) -> Self {
        Self {
            confidence: 0.0,
            ellipse: Ellipse::null(),
            final_edges: Vec::new(),
            raw_edges,
            current_roi: roi,
            timestamp,
            image_width: image_size.width as i32,
            image_height: image_size.height as i32,
        }
    }

    /// Whether the record holds a pupil ellipse
    pub fn has_detection(&self) -> bool {
        !self.ellipse.is_null()
    }

    /// Ellipse translated from ROI to full-image coordinates
    ///
    /// The null ellipse stays null.
    pub fn ellipse_in_image(&self) -> Ellipse {
        if self.ellipse.is_null() {
            return self.ellipse;
        }
        self.ellipse.translated(self.current_roi.offset())
    }

    /// Final edges in full-image coordinates
    pub fn final_edges_in_image(&self) -> impl Iterator<Item = EdgePoint> + '_ {
        self.final_edges.iter().map(move |edge| {
            let (x, y) = self.current_roi.to_frame(edge.x, edge.y);
            EdgePoint::new(x, y)
        })
    }

    pub fn image_size(&self) -> ImageSize {
        ImageSize::from_width_height(
            self.image_width.max(0) as usize,
            self.image_height.max(0) as usize,
        )
    }

    /// Encode into the binary record layout
    pub fn to_bytes(&self) -> Vec<u8> {
        wire::encode(self)
    }

    /// Decode a buffer holding exactly one record
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        wire::decode(bytes)
    }
}

/// Configuration of the 2D detector
///
/// Missing keys fall back to the defaults when deserialising, so a partial
/// JSON object overlays the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Detector2DProperties {
    pub intensity_range: i32,
    pub blur_size: i32,
    pub canny_treshold: f64,
    pub canny_ration: f64,
    pub canny_aperture: i32,
    /// Largest accepted pupil diameter in pixels
    pub pupil_size_max: f64,
    /// Smallest accepted pupil diameter in pixels
    pub pupil_size_min: f64,
    pub strong_perimeter_ratio_range_min: f64,
    pub strong_perimeter_ratio_range_max: f64,
    pub strong_area_ratio_range_min: f64,
    pub strong_area_ratio_range_max: f64,
    pub contour_size_min: i32,
    pub ellipse_roundness_ratio: f64,
    pub initial_ellipse_fit_treshhold: f64,
    pub final_perimeter_ratio_range_min: f64,
    pub final_perimeter_ratio_range_max: f64,
    /// Maximum |distance| for an edge to count as support
    pub ellipse_true_support_min_dist: f64,
    pub support_pixel_ratio_exponent: f64,
    pub coarse_detection: bool,
    pub coarse_filter_min: i32,
    pub coarse_filter_max: i32,
}

impl Default for Detector2DProperties {
    fn default() -> Self {
        Self {
            intensity_range: 23,
            blur_size: 5,
            canny_treshold: 160.0,
            canny_ration: 2.0,
            canny_aperture: 5,
            pupil_size_max: 100.0,
            pupil_size_min: 10.0,
            strong_perimeter_ratio_range_min: 0.6,
            strong_perimeter_ratio_range_max: 1.1,
            strong_area_ratio_range_min: 0.8,
            strong_area_ratio_range_max: 1.1,
            contour_size_min: 5,
            ellipse_roundness_ratio: 0.09,
            initial_ellipse_fit_treshhold: 4.3,
            final_perimeter_ratio_range_min: 0.5,
            final_perimeter_ratio_range_max: 1.0,
            ellipse_true_support_min_dist: 3.0,
            support_pixel_ratio_exponent: 2.0,
            coarse_detection: true,
            coarse_filter_min: 128,
            coarse_filter_max: 280,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    #[test]
    fn test_no_detection_record() {
        let raw = vec![EdgePoint::new(1, 2), EdgePoint::new(3, 4)];
        let result = Detector2DResult::no_detection(
            raw.clone(),
            Roi::new(5, 6, 50, 60),
            12.5,
            ImageSize::from_width_height(320, 240),
        );
        assert!(!result.has_detection());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.raw_edges, raw);
        assert!(result.final_edges.is_empty());
        assert!(result.ellipse_in_image().is_null());
        assert_eq!(result.image_size(), ImageSize::from_width_height(320, 240));
    }

    #[test]
    fn test_ellipse_in_image_applies_roi_offset() {
        let mut result = Detector2DResult::no_detection(
            Vec::new(),
            Roi::new(100, 50, 80, 80),
            0.0,
            ImageSize::from_width_height(640, 480),
        );
        result.ellipse = Ellipse::new(Vector2::new(30.0, 20.0), 12.0, 9.0, 0.3);
        result.final_edges = vec![EdgePoint::new(1, 1)];

        let ellipse = result.ellipse_in_image();
        assert_relative_eq!(ellipse.center.x, 130.0);
        assert_relative_eq!(ellipse.center.y, 70.0);
        assert_relative_eq!(ellipse.major_radius, 12.0);
        assert_eq!(
            result.final_edges_in_image().collect::<Vec<_>>(),
            vec![EdgePoint::new(101, 51)]
        );
    }

    #[test]
    fn test_properties_partial_json_overlays_defaults() {
        let props: Detector2DProperties =
            serde_json::from_str(r#"{"pupil_size_max": 150, "coarse_detection": false}"#)
                .unwrap();
        assert_eq!(props.pupil_size_max, 150.0);
        assert!(!props.coarse_detection);
        assert_eq!(props.intensity_range, 23);
        assert_eq!(props.support_pixel_ratio_exponent, 2.0);
    }
}
