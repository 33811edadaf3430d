//! Namespaced property documents.
//!
//! Hosts exchange detector configuration as one JSON object with a `"2d"` and
//! a `"3d"` namespace. Older hosts wrote `"2D_Settings"` / `"3D_Settings"`;
//! those are upgraded on load.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::detector_2d::Detector2DProperties;
use crate::detector_3d::Detector3DProperties;
use crate::image_size::ImageSize;

pub const NAMESPACE_2D: &str = "2d";
pub const NAMESPACE_3D: &str = "3d";
pub const LEGACY_NAMESPACE_2D: &str = "2D_Settings";
pub const LEGACY_NAMESPACE_3D: &str = "3D_Settings";

/// A JSON object keyed by namespace
pub type NamespacedProperties = Map<String, Value>;

#[derive(Error, Debug)]
pub enum PropertiesError {
    #[error("namespace '{0}' is not a JSON object")]
    NotAnObject(String),

    #[error("property document is not a JSON object")]
    InvalidDocument,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Copy legacy namespaces to their current names when the current ones are absent
pub fn upgrade_legacy_namespaces(doc: &mut NamespacedProperties) {
    for (legacy, current) in [
        (LEGACY_NAMESPACE_2D, NAMESPACE_2D),
        (LEGACY_NAMESPACE_3D, NAMESPACE_3D),
    ] {
        if doc.contains_key(current) {
            continue;
        }
        if let Some(value) = doc.remove(legacy) {
            log::info!("Upgrading legacy property namespace '{legacy}' to '{current}'");
            doc.insert(current.to_string(), value);
        }
    }
}

fn from_namespace<T>(doc: &NamespacedProperties, namespace: &str) -> Result<T, PropertiesError>
where
    T: DeserializeOwned + Default,
{
    match doc.get(namespace) {
        None => Ok(T::default()),
        Some(Value::Object(fields)) => Ok(serde_json::from_value(Value::Object(fields.clone()))?),
        Some(_) => Err(PropertiesError::NotAnObject(namespace.to_string())),
    }
}

fn to_namespace<T: Serialize>(
    properties: &T,
    namespace: &str,
) -> Result<NamespacedProperties, PropertiesError> {
    let mut doc = Map::new();
    doc.insert(namespace.to_string(), serde_json::to_value(properties)?);
    Ok(doc)
}

/// Defaults overlaid with whatever keys the `"2d"` namespace holds
pub fn detector_2d_properties_from_namespaced(
    doc: &NamespacedProperties,
) -> Result<Detector2DProperties, PropertiesError> {
    from_namespace(doc, NAMESPACE_2D)
}

/// Defaults overlaid with whatever keys the `"3d"` namespace holds
pub fn detector_3d_properties_from_namespaced(
    doc: &NamespacedProperties,
) -> Result<Detector3DProperties, PropertiesError> {
    from_namespace(doc, NAMESPACE_3D)
}

pub fn detector_2d_properties_to_namespaced(
    properties: &Detector2DProperties,
) -> Result<NamespacedProperties, PropertiesError> {
    to_namespace(properties, NAMESPACE_2D)
}

pub fn detector_3d_properties_to_namespaced(
    properties: &Detector3DProperties,
) -> Result<NamespacedProperties, PropertiesError> {
    to_namespace(properties, NAMESPACE_3D)
}

/// Rescale the pixel-size limits after the eye camera resolution changed
///
/// Both limits scale by `new.width / old.width`; a zero-width `old` leaves
/// them unchanged.
pub fn on_resolution_change(properties: &mut Detector2DProperties, old: ImageSize, new: ImageSize) {
    let Some(scale) = old.width_scale_to(&new) else {
        log::warn!("Ignoring resolution change from zero-width image {old}");
        return;
    };
    properties.pupil_size_min *= scale;
    properties.pupil_size_max *= scale;
    log::debug!(
        "Resolution {old} -> {new}: pupil size range now [{:.1}, {:.1}]",
        properties.pupil_size_min,
        properties.pupil_size_max
    );
}

/// Both detectors' properties as one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorProperties {
    pub detector_2d: Detector2DProperties,
    pub detector_3d: Detector3DProperties,
}

impl DetectorProperties {
    /// Read both namespaces, upgrading legacy names first
    pub fn from_namespaced(doc: &NamespacedProperties) -> Result<Self, PropertiesError> {
        let mut doc = doc.clone();
        upgrade_legacy_namespaces(&mut doc);
        Ok(Self {
            detector_2d: detector_2d_properties_from_namespaced(&doc)?,
            detector_3d: detector_3d_properties_from_namespaced(&doc)?,
        })
    }

    pub fn to_namespaced(&self) -> Result<NamespacedProperties, PropertiesError> {
        let mut doc = detector_2d_properties_to_namespaced(&self.detector_2d)?;
        doc.extend(detector_3d_properties_to_namespaced(&self.detector_3d)?);
        Ok(doc)
    }

    /// Save as a namespaced JSON file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), PropertiesError> {
        let json = serde_json::to_string_pretty(&Value::Object(self.to_namespaced()?))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from a namespaced JSON file
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, PropertiesError> {
        let json = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Value>(&json)? {
            Value::Object(doc) => Self::from_namespaced(&doc),
            _ => Err(PropertiesError::InvalidDocument),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn object(value: Value) -> NamespacedProperties {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_missing_namespace_gives_defaults() {
        let doc = Map::new();
        assert_eq!(
            detector_2d_properties_from_namespaced(&doc).unwrap(),
            Detector2DProperties::default()
        );
        assert_eq!(
            detector_3d_properties_from_namespaced(&doc).unwrap(),
            Detector3DProperties::default()
        );
    }

    #[test]
    fn test_overlay_partial_namespace() {
        let doc = object(json!({
            "2d": {"intensity_range": 30, "unknown_key": 1},
            "3d": {"model_is_frozen": true}
        }));
        let props_2d = detector_2d_properties_from_namespaced(&doc).unwrap();
        assert_eq!(props_2d.intensity_range, 30);
        assert_eq!(props_2d.blur_size, 5);
        let props_3d = detector_3d_properties_from_namespaced(&doc).unwrap();
        assert!(props_3d.model_is_frozen);
        assert_eq!(props_3d.model_sensitivity, 0.997);
    }

    #[test]
    fn test_namespace_must_be_object() {
        let doc = object(json!({"2d": 5}));
        assert!(matches!(
            detector_2d_properties_from_namespaced(&doc),
            Err(PropertiesError::NotAnObject(ns)) if ns == "2d"
        ));
    }

    #[test]
    fn test_legacy_upgrade() {
        let doc = object(json!({
            "2D_Settings": {"pupil_size_max": 120},
            "3D_Settings": {"model_sensitivity": 0.5},
            "3d": {"model_sensitivity": 0.9}
        }));
        let props = DetectorProperties::from_namespaced(&doc).unwrap();
        assert_eq!(props.detector_2d.pupil_size_max, 120.0);
        // Current namespace wins over legacy
        assert_eq!(props.detector_3d.model_sensitivity, 0.9);
    }

    #[test]
    fn test_to_namespaced_roundtrip() {
        let mut props = DetectorProperties::default();
        props.detector_2d.canny_aperture = 7;
        props.detector_3d.model_is_frozen = true;
        let doc = props.to_namespaced().unwrap();
        assert!(doc.contains_key("2d"));
        assert!(doc.contains_key("3d"));
        assert_eq!(DetectorProperties::from_namespaced(&doc).unwrap(), props);
    }

    #[test]
    fn test_resolution_change_scales_pupil_sizes() {
        let mut props = Detector2DProperties::default();
        on_resolution_change(
            &mut props,
            ImageSize::from_width_height(320, 240),
            ImageSize::from_width_height(640, 480),
        );
        assert_relative_eq!(props.pupil_size_min, 20.0);
        assert_relative_eq!(props.pupil_size_max, 200.0);

        on_resolution_change(
            &mut props,
            ImageSize::from_width_height(0, 0),
            ImageSize::from_width_height(640, 480),
        );
        assert_relative_eq!(props.pupil_size_max, 200.0);
    }
}
