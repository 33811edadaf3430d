//! 3D detector records: tracker properties, per-frame result and the
//! per-hypothesis debug snapshot.

use eye_math::{Circle3D, Ellipse, Sphere};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// External tuning of the 3D eye-model tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Detector3DProperties {
    /// In `[0, 1]`; higher values spawn new hypotheses more readily and
    /// retire stale ones sooner
    pub model_sensitivity: f64,
    /// Disables every model mutation while set
    pub model_is_frozen: bool,
}

impl Default for Detector3DProperties {
    fn default() -> Self {
        Self {
            model_sensitivity: 0.997,
            model_is_frozen: false,
        }
    }
}

/// Diagnostic snapshot of one eye-model hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDebugProperties {
    pub sphere: Sphere,
    pub initial_sphere: Sphere,
    pub bin_positions: Vec<Vector3<f64>>,
    pub maturity: f64,
    pub solver_fit: f64,
    pub confidence: f64,
    pub performance: f64,
    pub performance_gradient: f64,
    pub model_id: u64,
    pub birth_timestamp: f64,
}

/// Per-frame output of the 3D tracker
///
/// `model_id == 0` means no model has been selected yet. The `edges`,
/// `predicted_circle` and `models` fields are only filled when debug output
/// was requested for the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detector3DResult {
    pub confidence: f64,
    pub circle: Circle3D,
    pub ellipse: Ellipse,
    pub sphere: Sphere,
    pub projected_sphere: Ellipse,
    pub timestamp: f64,
    pub model_id: u64,
    pub model_birth_timestamp: f64,
    pub model_confidence: f64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<Vector3<f64>>,
    #[serde(default, skip_serializing_if = "Circle3D::is_null")]
    pub predicted_circle: Circle3D,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelDebugProperties>,
}

impl Detector3DResult {
    /// Result for a frame where no model is selected
    pub fn unassigned(timestamp: f64) -> Self {
        Self {
            confidence: 0.0,
            circle: Circle3D::null(),
            ellipse: Ellipse::null(),
            sphere: Sphere::null(),
            projected_sphere: Ellipse::null(),
            timestamp,
            model_id: 0,
            model_birth_timestamp: 0.0,
            model_confidence: 0.0,
            edges: Vec::new(),
            predicted_circle: Circle3D::null(),
            models: Vec::new(),
        }
    }

    pub fn has_model(&self) -> bool {
        self.model_id != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let props = Detector3DProperties::default();
        assert_eq!(props.model_sensitivity, 0.997);
        assert!(!props.model_is_frozen);
    }

    #[test]
    fn test_unassigned_result() {
        let result = Detector3DResult::unassigned(4.0);
        assert!(!result.has_model());
        assert!(result.sphere.is_null());
        assert!(result.circle.is_null());
        assert_eq!(result.timestamp, 4.0);
    }

    #[test]
    fn test_debug_fields_omitted_from_json_when_empty() {
        let json = serde_json::to_value(Detector3DResult::unassigned(1.0)).unwrap();
        let object = json.as_object().unwrap();
        assert!(object.contains_key("sphere"));
        assert!(!object.contains_key("edges"));
        assert!(!object.contains_key("predicted_circle"));
        assert!(!object.contains_key("models"));

        let back: Detector3DResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, Detector3DResult::unassigned(1.0));
    }
}
