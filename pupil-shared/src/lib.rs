//! Records and configuration exchanged between the pupil detectors and their host.
//!
//! Contains the per-frame 2D and 3D result records, the detector property
//! sets, the region-of-interest type, the binary wire format for 2D results,
//! and the support-pixel scoring that turns an ellipse fit into a 2D result.

pub mod detector_2d;
pub mod detector_3d;
pub mod image_size;
pub mod properties;
pub mod roi;
pub mod scoring;
pub mod wire;

pub use detector_2d::{Detector2DProperties, Detector2DResult, EdgePoint};
pub use detector_3d::{Detector3DProperties, Detector3DResult, ModelDebugProperties};
pub use image_size::ImageSize;
pub use properties::{DetectorProperties, PropertiesError};
pub use roi::Roi;
pub use scoring::{build_result, score_support, SupportScore};
pub use wire::WireError;
