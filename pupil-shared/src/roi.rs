//! Region of interest: the sub-rectangle of the frame a detection ran on.
//!
//! Coordinates inside a 2D result are relative to its ROI.

use eye_math::Ellipse;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::image_size::ImageSize;

/// Integer rectangle `(x, y, width, height)` in full-frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Roi {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Roi {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// ROI covering the whole frame
    pub fn full_frame(size: ImageSize) -> Self {
        Self::new(0, 0, size.width as i32, size.height as i32)
    }

    /// Build from inclusive corner coordinates
    pub fn from_min_max(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Self {
        Self::new(x_min, y_min, x_max - x_min + 1, y_max - y_min + 1)
    }

    /// Inclusive maximum x coordinate
    pub fn x_max(&self) -> i32 {
        self.x + self.width - 1
    }

    /// Inclusive maximum y coordinate
    pub fn y_max(&self) -> i32 {
        self.y + self.height - 1
    }

    /// Offset of the ROI origin in the full frame
    pub fn offset(&self) -> Vector2<f64> {
        Vector2::new(f64::from(self.x), f64::from(self.y))
    }

    /// Whether a full-frame point lies inside the ROI
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x <= self.x_max() && y <= self.y_max()
    }

    /// ROI-relative point to full-frame coordinates
    pub fn to_frame(&self, x: i32, y: i32) -> (i32, i32) {
        (x + self.x, y + self.y)
    }

    /// Full-frame point to ROI-relative coordinates
    pub fn to_local(&self, x: i32, y: i32) -> (i32, i32) {
        (x - self.x, y - self.y)
    }

    /// Smallest integer rectangle containing `ellipse`
    pub fn bounding_ellipse(ellipse: &Ellipse) -> Self {
        let half = ellipse.bounding_half_extents();
        Self::new(
            (ellipse.center.x - half.x).floor() as i32,
            (ellipse.center.y - half.y).floor() as i32,
            2 * half.x.ceil() as i32 + 1,
            2 * half.y.ceil() as i32 + 1,
        )
    }

    /// Intersection with the frame bounds, `None` if they do not overlap
    pub fn clamp_to(&self, size: ImageSize) -> Option<Self> {
        let x_min = self.x.max(0);
        let y_min = self.y.max(0);
        let x_max = self.x_max().min(size.width as i32 - 1);
        let y_max = self.y_max().min(size.height as i32 - 1);
        (x_min <= x_max && y_min <= y_max).then(|| Self::from_min_max(x_min, y_min, x_max, y_max))
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ROI(x_min={}, y_min={}, x_max={}, y_max={})",
            self.x,
            self.y,
            self.x_max(),
            self.y_max()
        )
    }
}
