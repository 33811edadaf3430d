//! Support-pixel scoring of a fitted pupil ellipse.
//!
//! An edge pixel supports the ellipse when its approximate distance to the
//! boundary is within `ellipse_true_support_min_dist`. The detection
//! confidence is the support ratio raised to `support_pixel_ratio_exponent`.

use eye_math::{Ellipse, EllipseDistance, GeometryError};

use crate::detector_2d::{Detector2DProperties, Detector2DResult, EdgePoint};
use crate::image_size::ImageSize;
use crate::roi::Roi;

/// Outcome of scoring a set of edges against an ellipse
#[derive(Debug, Clone, PartialEq)]
pub struct SupportScore {
    pub support_edges: Vec<EdgePoint>,
    /// `support / total`, zero when there are no edges
    pub support_ratio: f64,
    pub confidence: f64,
}

/// Score `edges` against `ellipse`
///
/// Edges and ellipse must share a coordinate frame.
pub fn score_support(
    ellipse: &Ellipse,
    edges: &[EdgePoint],
    properties: &Detector2DProperties,
) -> Result<SupportScore, GeometryError> {
    let metric = EllipseDistance::new(ellipse)?;
    let max_dist = properties.ellipse_true_support_min_dist;

    let support_edges: Vec<EdgePoint> = edges
        .iter()
        .copied()
        .filter(|edge| metric.distance_px(edge.x, edge.y).abs() <= max_dist)
        .collect();

    let support_ratio = if edges.is_empty() {
        0.0
    } else {
        support_edges.len() as f64 / edges.len() as f64
    };
    // Without support there is no confidence, whatever the exponent
    let confidence = if support_ratio > 0.0 {
        support_ratio
            .powf(properties.support_pixel_ratio_exponent)
            .clamp(0.0, 1.0)
    } else {
        0.0
    };

    Ok(SupportScore {
        support_edges,
        support_ratio,
        confidence,
    })
}

/// Assemble the 2D result for a frame from a candidate ellipse fit
///
/// `ellipse` and `raw_edges` are relative to `roi`. The candidate is rejected
/// (null ellipse, zero confidence) when its diameter is outside the pupil size
/// range or when its support does not cover enough of its circumference.
pub fn build_result(
    ellipse: &Ellipse,
    raw_edges: Vec<EdgePoint>,
    roi: Roi,
    timestamp: f64,
    image_size: ImageSize,
    properties: &Detector2DProperties,
) -> Detector2DResult {
    if ellipse.is_null() {
        return Detector2DResult::no_detection(raw_edges, roi, timestamp, image_size);
    }

    let diameter = 2.0 * ellipse.major_radius;
    if diameter < properties.pupil_size_min || diameter > properties.pupil_size_max {
        log::debug!(
            "Rejecting ellipse with diameter {diameter:.1}px outside [{}, {}]",
            properties.pupil_size_min,
            properties.pupil_size_max
        );
        return Detector2DResult::no_detection(raw_edges, roi, timestamp, image_size);
    }

    let score = match score_support(ellipse, &raw_edges, properties) {
        Ok(score) => score,
        Err(e) => {
            log::debug!("Rejecting ellipse: {e}");
            return Detector2DResult::no_detection(raw_edges, roi, timestamp, image_size);
        }
    };

    let perimeter_ratio = score.support_edges.len() as f64 / ellipse.circumference();
    if perimeter_ratio < properties.final_perimeter_ratio_range_min
        || perimeter_ratio > properties.final_perimeter_ratio_range_max
    {
        log::debug!("Rejecting ellipse with support perimeter ratio {perimeter_ratio:.2}");
        return Detector2DResult::no_detection(raw_edges, roi, timestamp, image_size);
    }

    Detector2DResult {
        confidence: score.confidence,
        ellipse: *ellipse,
        final_edges: score.support_edges,
        raw_edges,
        current_roi: roi,
        timestamp,
        image_width: image_size.width as i32,
        image_height: image_size.height as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;
    use std::f64::consts::PI;

    /// `count` pixels evenly spaced on the ellipse outline
    fn outline(ellipse: &Ellipse, count: usize) -> Vec<EdgePoint> {
        let major = ellipse.major_axis();
        let minor = ellipse.minor_axis();
        (0..count)
            .map(|i| {
                let t = 2.0 * PI * i as f64 / count as f64;
                let p = ellipse.center
                    + major * ellipse.major_radius * t.cos()
                    + minor * ellipse.minor_radius * t.sin();
                EdgePoint::new(p.x.round() as i32, p.y.round() as i32)
            })
            .collect()
    }

    fn pupil() -> Ellipse {
        Ellipse::new(Vector2::new(60.0, 50.0), 20.0, 16.0, 0.3)
    }

    #[test]
    fn test_all_support() {
        let ellipse = pupil();
        let edges = outline(&ellipse, 40);
        let score = score_support(&ellipse, &edges, &Detector2DProperties::default()).unwrap();
        assert_eq!(score.support_edges.len(), 40);
        assert_relative_eq!(score.support_ratio, 1.0);
        assert_relative_eq!(score.confidence, 1.0);
    }

    #[test]
    fn test_confidence_uses_exponent() {
        let ellipse = pupil();
        let mut edges = outline(&ellipse, 30);
        edges.extend(std::iter::repeat(EdgePoint::new(60, 50)).take(10));
        let props = Detector2DProperties::default();
        let score = score_support(&ellipse, &edges, &props).unwrap();
        assert_eq!(score.support_edges.len(), 30);
        assert_relative_eq!(score.support_ratio, 0.75);
        assert_relative_eq!(score.confidence, 0.75f64.powf(2.0));
    }

    #[test]
    fn test_no_edges_zero_confidence() {
        let score = score_support(&pupil(), &[], &Detector2DProperties::default()).unwrap();
        assert_eq!(score.support_ratio, 0.0);
        assert_eq!(score.confidence, 0.0);
    }

    #[test]
    fn test_no_support_zero_confidence_with_negative_exponent() {
        let props = Detector2DProperties {
            support_pixel_ratio_exponent: -1.0,
            ..Default::default()
        };
        // Every edge sits at the centre, far from the outline
        let edges = vec![EdgePoint::new(60, 50); 12];
        let score = score_support(&pupil(), &edges, &props).unwrap();
        assert!(score.support_edges.is_empty());
        assert_eq!(score.support_ratio, 0.0);
        assert_eq!(score.confidence, 0.0);
    }

    #[test]
    fn test_null_ellipse_rejected() {
        let props = Detector2DProperties::default();
        assert_eq!(
            score_support(&Ellipse::null(), &[EdgePoint::new(1, 1)], &props),
            Err(GeometryError::NullEllipse)
        );
    }

    #[test]
    fn test_build_result_accepts_good_fit() {
        let ellipse = pupil();
        let count = (0.9 * ellipse.circumference()) as usize;
        let edges = outline(&ellipse, count);
        let result = build_result(
            &ellipse,
            edges.clone(),
            Roi::new(0, 0, 120, 100),
            3.0,
            ImageSize::from_width_height(320, 240),
            &Detector2DProperties::default(),
        );
        assert!(result.has_detection());
        assert_relative_eq!(result.confidence, 1.0);
        assert_eq!(result.final_edges.len(), count);
        assert_eq!(result.raw_edges, edges);
        assert_eq!(result.image_width, 320);
    }

    #[test]
    fn test_build_result_rejects_size_out_of_range() {
        let tiny = Ellipse::circle(Vector2::new(10.0, 10.0), 3.0);
        let edges = outline(&tiny, 18);
        let result = build_result(
            &tiny,
            edges.clone(),
            Roi::default(),
            0.0,
            ImageSize::from_width_height(64, 64),
            &Detector2DProperties::default(),
        );
        assert!(!result.has_detection());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.raw_edges, edges);
    }

    #[test]
    fn test_build_result_rejects_sparse_support() {
        let ellipse = pupil();
        let edges = outline(&ellipse, 12);
        let result = build_result(
            &ellipse,
            edges,
            Roi::default(),
            0.0,
            ImageSize::from_width_height(320, 240),
            &Detector2DProperties::default(),
        );
        assert!(!result.has_detection());
    }
}
