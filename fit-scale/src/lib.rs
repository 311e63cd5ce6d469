// SPDX-License-Identifier: MIT
//! # fit-scale: geometry and resampling for budget-constrained encoding
//!
//! This crate holds everything about image *dimensions* that the encoder in
//! `fitcam` needs, kept apart from codec concerns so it can be tested without
//! touching an encoder.
//!
//! ## Key Components
//!
//! - [`plan`]: `Size` plus aspect-preserving and letterbox plan computation
//! - [`shrink`]: the downscale step policy (proportional, last-resort, forced)
//! - [`cpu`]: single-channel resampling on `fast_image_resize` (SIMD)
//!
//! ## Usage Example
//!
//! ```rust
//! use fit_scale::plan::Size;
//! use fit_scale::shrink::{plan_shrink, ShrinkPolicy};
//!
//! let policy = ShrinkPolicy::default();
//! // 1024x1024 encoded to 200 KB at the lowest quality, budget 100 KB
//! let step = plan_shrink(Size::new(1024, 1024), 640, 102_400, 204_800, &policy, false)
//!     .expect("shrink possible");
//! assert!(step.to.w < 1024 && step.to.w >= 640);
//! ```

pub mod cpu;
pub mod plan;
pub mod shrink;

pub use plan::Size;
