//! Orchestrator: validate, read the bias, fit, record the outcome.

use fit_scale::Size;
use image::GrayImage;
use tracing::{info, warn};

use super::codec::Codec;
use super::dimensions;
use super::downscale::fit_by_downscale;
use super::heuristic::SharedHeuristic;
use crate::config::FitTuning;
use crate::error::{CamError, CamResult};

/// Diagnostics for one `fit` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FitStats {
    /// Codec invocations across all rounds.
    pub encodes: usize,
    /// Resizes performed.
    pub downscale_rounds: usize,
    /// Dimensions searched, starting with the input.
    pub trail: Vec<Size>,
}

/// Outcome of fitting an image under a byte budget.
///
/// When `fits` is true, `bytes.len() <= budget`. When false, `bytes` is the
/// smallest encode the tuning allows and the caller decides what to do.
#[derive(Debug, Clone)]
pub struct FitResult {
    /// The image that was encoded, possibly downscaled.
    pub image: GrayImage,
    pub bytes: Vec<u8>,
    pub quality: u8,
    pub fits: bool,
    pub stats: FitStats,
}

impl FitResult {
    pub fn size(&self) -> Size {
        dimensions(&self.image)
    }
}

/// Encode `image` under `budget` bytes, maximizing quality.
///
/// Reads the starting quality from `state` and records the achieved quality
/// back into it, whether or not the budget was met.
///
/// # Errors
///
/// - `CamError::InvalidImage` for a zero-area image
/// - `CamError::Config` for invalid tuning
/// - codec and resampler failures, unchanged
///
/// # Examples
///
/// ```rust
/// use fitcam::config::FitTuning;
/// use fitcam::encode::{JpegCodec, SharedHeuristic, fit};
/// use image::{GrayImage, Luma};
///
/// let tuning = FitTuning::default();
/// let state = SharedHeuristic::from_tuning(&tuning);
/// let image = GrayImage::from_pixel(800, 600, Luma([90]));
///
/// let result = fit(&JpegCodec, &image, 102_400, &tuning, &state)?;
/// assert!(result.fits);
/// assert!(result.bytes.len() <= 102_400);
/// # Ok::<(), fitcam::error::CamError>(())
/// ```
pub fn fit(
    codec: &dyn Codec,
    image: &GrayImage,
    budget: usize,
    tuning: &FitTuning,
    state: &SharedHeuristic,
) -> CamResult<FitResult> {
    if image.width() == 0 || image.height() == 0 {
        return Err(CamError::invalid_image(image.width(), image.height()).with_operation("fit"));
    }
    tuning.validate()?;

    let bias = state.bias();
    let result = fit_by_downscale(codec, image, budget, bias, tuning)?;
    state.record(result.quality, tuning);

    if result.fits {
        info!(
            codec = codec.name(),
            quality = result.quality,
            bytes = result.bytes.len(),
            budget,
            size = %result.size(),
            encodes = result.stats.encodes,
            rounds = result.stats.downscale_rounds,
            "fit complete"
        );
    } else {
        warn!(
            codec = codec.name(),
            quality = result.quality,
            bytes = result.bytes.len(),
            budget,
            size = %result.size(),
            encodes = result.stats.encodes,
            "budget unreachable, returning best effort"
        );
    }
    Ok(result)
}

/// A codec, budget and tuning bound to one heuristic state.
///
/// # Examples
///
/// ```rust
/// use fitcam::config::FitTuning;
/// use fitcam::encode::{BudgetEncoder, JpegCodec};
/// use image::{GrayImage, Luma};
///
/// let encoder = BudgetEncoder::new(Box::new(JpegCodec), 50_000, FitTuning::default())?;
/// let result = encoder.fit(&GrayImage::from_pixel(640, 480, Luma([0])))?;
/// assert!(result.fits);
/// assert_eq!(encoder.state().bias(), result.quality);
/// # Ok::<(), fitcam::error::CamError>(())
/// ```
pub struct BudgetEncoder {
    codec: Box<dyn Codec>,
    budget: usize,
    tuning: FitTuning,
    state: SharedHeuristic,
}

impl BudgetEncoder {
    /// Validates `tuning` and seeds a fresh heuristic from it.
    pub fn new(codec: Box<dyn Codec>, budget: usize, tuning: FitTuning) -> CamResult<Self> {
        tuning.validate()?;
        Ok(Self {
            codec,
            budget,
            state: SharedHeuristic::from_tuning(&tuning),
            tuning,
        })
    }

    /// Share an existing heuristic, e.g. between encoders for one camera.
    pub fn with_state(mut self, state: SharedHeuristic) -> Self {
        self.state = state;
        self
    }

    pub fn fit(&self, image: &GrayImage) -> CamResult<FitResult> {
        fit(self.codec.as_ref(), image, self.budget, &self.tuning, &self.state)
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn tuning(&self) -> &FitTuning {
        &self.tuning
    }

    pub fn state(&self) -> &SharedHeuristic {
        &self.state
    }
}

impl std::fmt::Debug for BudgetEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetEncoder")
            .field("codec", &self.codec.name())
            .field("budget", &self.budget)
            .field("tuning", &self.tuning)
            .field("state", &self.state.snapshot())
            .finish()
    }
}
