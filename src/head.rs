//! Head region estimation from a person mask.
//!
//! The head is assumed to occupy the top slice of the person's visible
//! silhouette. No facial landmarks are used, so the estimate works the same
//! whether the golfer faces the camera, turns sideways or faces away.

use crate::config::HeadConfig;
use crate::mask::PersonMask;

/// Axis-aligned box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadBoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl HeadBoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// True when the box covers no pixels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge
    pub fn x2(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn y2(&self) -> u32 {
        self.y + self.height
    }
}

/// Estimate the head box of the person in `mask`
///
/// Returns `None` when the mask holds no person pixel.
pub fn detect_head_region(
    mask: &PersonMask,
    frame_width: u32,
    frame_height: u32,
    config: &HeadConfig,
) -> Option<HeadBoundingBox> {
    let (x_min, y_min, x_max, y_max) = mask.extent()?;

    let person_width = x_max - x_min;
    let person_height = y_max - y_min;

    let head_height = (person_height as f32 * config.head_height_ratio) as u32;
    let padding = (head_height as f32 * config.padding_ratio) as u32;

    let x = x_min.saturating_sub(padding).min(frame_width);
    let y = y_min.saturating_sub(padding).min(frame_height);
    let width = (person_width + 2 * padding).min(frame_width - x);
    let height = (head_height + 2 * padding).min(frame_height - y);

    Some(HeadBoundingBox::new(x, y, width, height))
}
