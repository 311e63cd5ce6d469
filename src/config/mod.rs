//! # Configuration Module
//!
//! Encoder tuning and the camera/storage/upload configuration built on it.

#[allow(clippy::module_inception)]
pub mod config;
pub mod tuning;

pub use config::CamConfig;
pub use tuning::FitTuning;
