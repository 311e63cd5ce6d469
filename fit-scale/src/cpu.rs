// SPDX-License-Identifier: MIT
// CPU scaler built on fast_image_resize (SIMD-accelerated).
// Gray8 in -> Gray8 out, tightly packed rows.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8;
use fir::{ResizeOptions, Resizer};
use serde::{Deserialize, Serialize};

use crate::plan::{build_plan, AspectMode, Size};

#[derive(Debug)]
pub enum ScaleError {
    EmptyImage(Size),
    BufferTooSmall { expected: usize, actual: usize },
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::EmptyImage(size) => write!(f, "Cannot resample a zero-area image ({})", size),
            ScaleError::BufferTooSmall { expected, actual } => {
                write!(f, "Source buffer too small: expected {} bytes, got {}", expected, actual)
            }
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

/// Resampling kernel. Downscale rounds default to bilinear for speed;
/// previews look better with Lanczos3.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ResampleFilter {
    Nearest,
    #[default]
    Bilinear,
    CatmullRom,
    Lanczos3,
}

impl ResampleFilter {
    fn options(self) -> ResizeOptions {
        let alg = match self {
            ResampleFilter::Nearest => fir::ResizeAlg::Nearest,
            ResampleFilter::Bilinear => fir::ResizeAlg::Convolution(fir::FilterType::Bilinear),
            ResampleFilter::CatmullRom => fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom),
            ResampleFilter::Lanczos3 => fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3),
        };
        ResizeOptions::new().resize_alg(alg)
    }
}

/// Resample a tightly packed Gray8 buffer to `dst_size`.
///
/// Returns a freshly allocated `dst_size.w * dst_size.h` buffer; the source is
/// never modified.
pub fn resize_gray(
    resizer: &mut Resizer,
    src: &[u8],
    src_size: Size,
    dst_size: Size,
    filter: ResampleFilter,
) -> Result<Vec<u8>, ScaleError> {
    if src_size.is_empty() {
        return Err(ScaleError::EmptyImage(src_size));
    }
    if dst_size.is_empty() {
        return Err(ScaleError::EmptyImage(dst_size));
    }
    if src.len() < src_size.area() {
        return Err(ScaleError::BufferTooSmall {
            expected: src_size.area(),
            actual: src.len(),
        });
    }
    if src_size == dst_size {
        return Ok(src[..src_size.area()].to_vec());
    }

    let src_view = TypedImageRef::<U8>::from_buffer(src_size.w, src_size.h, &src[..src_size.area()])?;
    let mut dst = vec![0u8; dst_size.area()];
    {
        let mut dst_image = TypedImage::<U8>::from_buffer(dst_size.w, dst_size.h, &mut dst)?;
        resizer.resize_typed::<U8>(&src_view, &mut dst_image, &filter.options())?;
    }
    Ok(dst)
}

/// Letterbox a Gray8 image onto a `side`x`side` canvas filled with `bg`,
/// preserving aspect ratio and never upscaling.
pub fn letterbox_gray(
    resizer: &mut Resizer,
    src: &[u8],
    src_size: Size,
    side: u32,
    bg: u8,
    filter: ResampleFilter,
) -> Result<(Vec<u8>, Size), ScaleError> {
    let plan = build_plan(src_size, side, AspectMode::Pad { bg });
    let content = plan.content();
    let scaled = resize_gray(resizer, src, src_size, content, filter)?;

    let mut canvas = vec![bg; plan.out.area()];
    let (x, y, _, _) = plan.dst_roi.unwrap_or((0, 0, content.w, content.h));
    blit_rows(&scaled, content, &mut canvas, plan.out.w, x, y);
    Ok((canvas, plan.out))
}

#[inline]
fn blit_rows(src: &[u8], src_size: Size, dst: &mut [u8], dst_w: u32, x: u32, y: u32) {
    let row_bytes = src_size.w as usize;
    for r in 0..src_size.h as usize {
        let s = &src[r * row_bytes..(r + 1) * row_bytes];
        let start = (y as usize + r) * dst_w as usize + x as usize;
        dst[start..start + row_bytes].copy_from_slice(s);
    }
}
