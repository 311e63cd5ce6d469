//! # Budget Encoder
//!
//! Fits a captured grayscale image under a hard byte budget while keeping
//! the codec quality as high as possible.
//!
//! ## Architecture
//!
//! Leaves first:
//! 1. **codec**: `Codec` trait plus WebP and JPEG bindings
//! 2. **search**: bounded binary search for the highest fitting quality
//! 3. **downscale**: geometric shrinking with a fresh search per round
//! 4. **heuristic**: the last achieved quality, shared across calls
//! 5. **fit**: the single entry point composing all of the above
//!
//! Control flow is `fit -> fit_by_downscale -> search -> Codec::encode`,
//! with the heuristic read before and written after each call. Everything
//! here is synchronous and free of I/O.

pub mod codec;
pub mod downscale;
pub mod fit;
pub mod heuristic;
pub mod search;

pub use codec::{Codec, CodecKind, JpegCodec};
#[cfg(feature = "webp")]
pub use codec::WebpCodec;
pub use fit::{BudgetEncoder, FitResult, FitStats, fit};
pub use heuristic::{HeuristicState, SharedHeuristic};
pub use search::{EncodeAttempt, SearchOutcome, search};

use fit_scale::Size;
use image::GrayImage;

/// Dimensions of a grayscale image as a `fit_scale::Size`.
pub fn dimensions(image: &GrayImage) -> Size {
    Size::new(image.width(), image.height())
}
