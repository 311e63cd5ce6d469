//! # fitcam
//!
//! Grayscale still-camera pipeline whose every stored photo fits a hard
//! byte budget (100 KiB by default), at the highest quality that fits.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `encode`: the budget encoder (codec binding, quality search, downscale
//!   controller, cross-call heuristic, orchestrator)
//! - `capture`: frame sources (`libcamera-jpeg`, image files)
//! - `storage`: timestamped gallery plus the `latest` slot
//! - `notify`, `display`: live events and the status panel
//! - `ledger`: permanent upload through an external script, receipt log
//! - `session`: one-shot capture workflow tying everything together
//! - `config`, `error`: configuration and the shared error type
//!
//! Geometry and resampling live in the `fit-scale` workspace crate.
//!
//! ## Example
//!
//! ```rust
//! use fitcam::{FitTuning, JpegCodec, SharedHeuristic, fit};
//! use image::{GrayImage, Luma};
//!
//! let tuning = FitTuning::default();
//! let state = SharedHeuristic::from_tuning(&tuning);
//! let frame = GrayImage::from_fn(1024, 1024, |x, y| Luma([((x ^ y) & 0xFF) as u8]));
//!
//! let result = fit(&JpegCodec, &frame, 100 * 1024, &tuning, &state)?;
//! if result.fits {
//!     assert!(result.bytes.len() <= 100 * 1024);
//! }
//! # Ok::<(), fitcam::CamError>(())
//! ```

pub mod capture;
pub mod config;
pub mod display;
pub mod encode;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod session;
pub mod storage;

pub use config::{CamConfig, FitTuning};
pub use encode::{BudgetEncoder, Codec, CodecKind, FitResult, JpegCodec, SharedHeuristic, fit};
#[cfg(feature = "webp")]
pub use encode::WebpCodec;
pub use error::{CamError, CamResult, HasRecoverySuggestion, HasSeverity, Retryable};
pub use session::{CameraSession, CaptureReport};
