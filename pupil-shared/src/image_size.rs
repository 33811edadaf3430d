//! Image dimensions and size utilities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Image dimensions structure
///
/// Represents the width and height of an eye camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
}

impl ImageSize {
    /// Create a new ImageSize
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Get total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Horizontal scale factor from `self` to `other`
    ///
    /// Returns `None` when `self` has zero width.
    pub fn width_scale_to(&self, other: &ImageSize) -> Option<f64> {
        (self.width > 0).then(|| other.width as f64 / self.width as f64)
    }

    /// Convert to tuple (width, height)
    pub fn to_tuple(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

impl From<(usize, usize)> for ImageSize {
    fn from(dimensions: (usize, usize)) -> Self {
        Self::from_width_height(dimensions.0, dimensions.1)
    }
}

impl From<ImageSize> for (usize, usize) {
    fn from(size: ImageSize) -> Self {
        size.to_tuple()
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
