//! # Status Display
//!
//! Two-line status text plus a small square preview of the stored photo,
//! sized for a 128x128 panel. No panel driver ships here; `LogDisplay`
//! reports through tracing and embedders provide their own sink.

use fast_image_resize::Resizer;
use fit_scale::cpu::{ResampleFilter, letterbox_gray};
use image::GrayImage;
use tracing::info;

use crate::encode::dimensions;
use crate::error::{CamError, CamResult};

pub const PREVIEW_SIDE: u32 = 128;

pub trait DisplaySink: Send + Sync {
    fn show_text(&self, line1: &str, line2: &str);

    /// Show a preview canvas produced by `preview_canvas`.
    fn show_preview(&self, canvas: &GrayImage);
}

/// Letterbox `image` onto a black `side`x`side` canvas, preserving aspect
/// ratio and never upscaling.
pub fn preview_canvas(image: &GrayImage, side: u32) -> CamResult<GrayImage> {
    let mut resizer = Resizer::new();
    let (pixels, size) = letterbox_gray(
        &mut resizer,
        image.as_raw(),
        dimensions(image),
        side,
        0,
        ResampleFilter::Lanczos3,
    )?;
    GrayImage::from_raw(size.w, size.h, pixels)
        .ok_or_else(|| CamError::resize(format!("preview buffer does not match {}", size)))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn show_text(&self, line1: &str, line2: &str) {
        info!(target: "fitcam::display", "{} | {}", line1, line2);
    }

    fn show_preview(&self, canvas: &GrayImage) {
        info!(
            target: "fitcam::display",
            width = canvas.width(),
            height = canvas.height(),
            "preview"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn preview_is_square_and_letterboxed() {
        let image = GrayImage::from_pixel(1024, 512, Luma([200]));
        let canvas = preview_canvas(&image, PREVIEW_SIDE).unwrap();
        assert_eq!(canvas.dimensions(), (128, 128));
        assert_eq!(canvas.get_pixel(64, 0).0[0], 0);
        assert_eq!(canvas.get_pixel(64, 127).0[0], 0);
        assert_eq!(canvas.get_pixel(64, 64).0[0], 200);
    }

    #[test]
    fn small_image_is_centered_not_upscaled() {
        let image = GrayImage::from_pixel(40, 20, Luma([255]));
        let canvas = preview_canvas(&image, PREVIEW_SIDE).unwrap();
        assert_eq!(canvas.dimensions(), (128, 128));
        assert_eq!(canvas.get_pixel(10, 64).0[0], 0);
        assert_eq!(canvas.get_pixel(64, 64).0[0], 255);
    }
}
