//! # Capture Module
//!
//! Sources of grayscale frames for the session. Every source returns an
//! 8-bit single-channel image; color conversion happens here, before the
//! encoder sees anything.

pub mod file;
pub mod libcamera;

use async_trait::async_trait;
use image::GrayImage;

use crate::error::{CamError, CamResult};

pub use file::FileSource;
pub use libcamera::LibcameraSource;

/// Abstract interface for still-frame sources.
#[async_trait]
pub trait CaptureSource: Send {
    /// Capture one frame and convert it to grayscale.
    async fn capture(&mut self) -> CamResult<GrayImage>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Decode an encoded image off the async runtime and convert it to gray.
pub(crate) async fn decode_gray(bytes: Vec<u8>) -> CamResult<GrayImage> {
    tokio::task::spawn_blocking(move || -> CamResult<GrayImage> {
        let decoded = image::load_from_memory(&bytes)?;
        Ok(decoded.to_luma8())
    })
    .await
    .map_err(|e| CamError::capture(format!("decoder task failed: {}", e)))?
}
