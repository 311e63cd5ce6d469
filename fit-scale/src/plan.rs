// SPDX-License-Identifier: MIT
//! # Size and Placement Plans
//!
//! Computes output dimensions for two situations the camera pipeline hits:
//! bounding a capture by its longest side before encoding, and letterboxing
//! the fitted image onto a square preview canvas.
//!
//! - No upscaling: images smaller than the bound keep their size
//! - Clamp to minimum 1px so later stages never see a zero-area image

use serde::{Deserialize, Serialize};

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// The shorter of the two sides.
    pub fn short_side(self) -> u32 {
        self.w.min(self.h)
    }

    /// The longer of the two sides.
    pub fn long_side(self) -> u32 {
        self.w.max(self.h)
    }

    /// Pixel count as `usize` (one byte per pixel for grayscale buffers).
    pub fn area(self) -> usize {
        self.w as usize * self.h as usize
    }

    pub fn is_empty(self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// True when `next` is no larger on either axis and smaller on at least one.
    pub fn shrinks_to(self, next: Size) -> bool {
        next.w <= self.w && next.h <= self.h && (next.w < self.w || next.h < self.h)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// Defines how the scaled content is placed on the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AspectMode {
    /// Keep original aspect ratio; output is exactly the scaled content.
    Preserve,
    /// Keep aspect ratio and center the content on a square canvas of the
    /// bound, filling the rest with `bg` (a gray level).
    Pad { bg: u8 },
}

/// Complete placement plan for one resize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Longest-side bound used for planning
    pub max_long: u32,
    pub aspect: AspectMode,
    /// Final canvas dimensions
    pub out: Size,
    /// Where the scaled content lands when padding: (x, y, width, height).
    pub dst_roi: Option<(u32, u32, u32, u32)>,
}

impl ScalePlan {
    /// Dimensions of the scaled content itself (without padding).
    pub fn content(&self) -> Size {
        match self.dst_roi {
            Some((_, _, w, h)) => Size::new(w, h),
            None => self.out,
        }
    }

    /// True when the content keeps the input dimensions and no canvas is added.
    pub fn is_identity(&self) -> bool {
        self.dst_roi.is_none() && self.out == self.input
    }
}

/// Compute a placement plan that bounds the longest side by `max_long`.
///
/// # Arguments
/// * `input` - Source image dimensions
/// * `max_long` - Upper bound for the longest side of the content
/// * `aspect` - Whether to pad the content onto a square canvas
pub fn build_plan(input: Size, max_long: u32, aspect: AspectMode) -> ScalePlan {
    let (w, h) = fit_preserve(input, max_long);
    match aspect {
        AspectMode::Preserve => ScalePlan {
            input,
            max_long,
            aspect,
            out: Size { w, h },
            dst_roi: None,
        },
        AspectMode::Pad { .. } => {
            let out = Size {
                w: max_long.max(1),
                h: max_long.max(1),
            };
            let x = (out.w - w) / 2;
            let y = (out.h - h) / 2;
            ScalePlan {
                input,
                max_long,
                aspect,
                out,
                dst_roi: Some((x, y, w, h)),
            }
        }
    }
}

/// Fit within `max_long` on the longest dimension, never upscaling.
fn fit_preserve(input: Size, max_long: u32) -> (u32, u32) {
    let (w, h) = (f64::from(input.w), f64::from(input.h));
    let long = w.max(h).max(1.0);
    let s = (f64::from(max_long) / long).min(1.0);
    (
        ((w * s).round() as u32).clamp(1, max_long.max(1)),
        ((h * s).round() as u32).clamp(1, max_long.max(1)),
    )
}
