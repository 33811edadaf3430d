//! Numeric building blocks for pupil detection and eye model tracking.
//!
//! - [`geometry`]: ellipse, 3D circle and sphere value types with null sentinels
//! - [`ellipse_distance`]: cheap signed point-to-ellipse distance approximation
//! - [`moving_average`]: incremental simple and weighted moving averages
//! - [`misc`]: spherical coordinate and interpolation helpers

pub mod ellipse_distance;
pub mod geometry;
pub mod misc;
pub mod moving_average;

pub use ellipse_distance::EllipseDistance;
pub use geometry::{Circle3D, ConfidenceValue, Ellipse, GeometryError, RotatedRect, Sphere};
pub use moving_average::{MovingAverageError, SimpleMovingAverage, WeightedMovingAverage};
