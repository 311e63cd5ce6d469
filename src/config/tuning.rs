//! Encoder tuning.
//!
//! | Parameter | Default | Description |
//! |-----------|---------|-------------|
//! | `q_min` | 30 | Lowest quality the search may return |
//! | `q_max` | 92 | Highest quality the search may start at |
//! | `min_side` | 640 | Shorter-side floor for downscaling |
//! | `max_downscale_rounds` | 5 | Resize rounds before the final search |
//! | `max_search_steps` | 5 | Binary-search encodes per search |
//! | `initial_quality` | 78 | Seed for the shared heuristic |
//! | `filter` | bilinear | Resampling kernel for downscale rounds |
//! | `shrink` | see `ShrinkPolicy` | Scale factors for downscale rounds |

use fit_scale::cpu::ResampleFilter;
use fit_scale::shrink::ShrinkPolicy;
use serde::{Deserialize, Serialize};

use crate::error::{CamError, CamResult};

/// Tuning for the budget encoder.
///
/// # Examples
///
/// ```rust
/// use fitcam::config::FitTuning;
///
/// let tuning = FitTuning { q_min: 40, ..FitTuning::default() };
/// assert!(tuning.validate().is_ok());
/// assert_eq!(tuning.clamp_quality(10), 40);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitTuning {
    pub q_min: u8,
    pub q_max: u8,
    pub min_side: u32,
    pub max_downscale_rounds: u32,
    pub max_search_steps: u32,
    pub initial_quality: u8,
    pub filter: ResampleFilter,
    pub shrink: ShrinkPolicy,
}

impl Default for FitTuning {
    fn default() -> Self {
        Self {
            q_min: 30,
            q_max: 92,
            min_side: 640,
            max_downscale_rounds: 5,
            max_search_steps: 5,
            initial_quality: 78,
            filter: ResampleFilter::Bilinear,
            shrink: ShrinkPolicy::default(),
        }
    }
}

impl FitTuning {
    /// Validates the tuning parameters.
    pub fn validate(&self) -> CamResult<()> {
        if !(1..=100).contains(&self.q_min) {
            return Err(CamError::config(
                "q_min",
                self.q_min.to_string(),
                "must be between 1 and 100",
            ));
        }
        if !(1..=100).contains(&self.q_max) {
            return Err(CamError::config(
                "q_max",
                self.q_max.to_string(),
                "must be between 1 and 100",
            ));
        }
        if self.q_min > self.q_max {
            return Err(CamError::config(
                "q_min",
                self.q_min.to_string(),
                format!("must not exceed q_max ({})", self.q_max),
            ));
        }
        if self.min_side == 0 {
            return Err(CamError::config("min_side", "0", "must be greater than 0"));
        }
        if !(self.q_min..=self.q_max).contains(&self.initial_quality) {
            return Err(CamError::config(
                "initial_quality",
                self.initial_quality.to_string(),
                format!("must be within {}..={}", self.q_min, self.q_max),
            ));
        }
        self.shrink
            .validate()
            .map_err(|reason| CamError::config("shrink", format!("{:?}", self.shrink), reason))
    }

    /// Clamp a quality into `[q_min, q_max]`.
    pub fn clamp_quality(&self, quality: u8) -> u8 {
        quality.clamp(self.q_min, self.q_max)
    }

    /// Upper bound on codec invocations for one `fit` call.
    pub fn max_encodes(&self) -> usize {
        (self.max_downscale_rounds as usize + 1) * (2 * self.max_search_steps as usize + 2)
    }
}
