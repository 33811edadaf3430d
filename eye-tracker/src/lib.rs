//! 3D eye-model tracking on top of 2D pupil detections.
//!
//! Each frame's [`Detector2DResult`](pupil_shared::Detector2DResult) is lifted
//! into camera space by an [`Unprojector`], fed to every live [`EyeModel`]
//! hypothesis held by the [`EyeModelTracker`], and the best-ranked model is
//! reported as a [`Detector3DResult`](pupil_shared::Detector3DResult).

pub mod camera;
pub mod model;
pub mod observation;
pub mod sphere_fit;
pub mod synthetic;
pub mod tracker;
pub mod tuning;

pub use camera::{PinholeCamera, Reprojector, Unprojector};
pub use model::{EyeModel, ModelRank, ObservationOutcome};
pub use observation::Observation;
pub use sphere_fit::{fit_sphere, SphereFit, SphereFitError};
pub use synthetic::{GazePath, SyntheticError, SyntheticEye};
pub use tracker::{EyeModelTracker, TrackerError};
pub use tuning::{SensitivityCurve, SolverSettings, TrackerTuning, TuningError};
