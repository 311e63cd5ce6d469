//! Common test utilities shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use fitcam::encode::{Codec, dimensions};
use fitcam::error::{CamError, CamResult};
use image::{GrayImage, Luma};
use parking_lot::Mutex;

/// Test frame generators
pub mod frames {
    use super::*;

    /// Uniform gray, compresses to almost nothing.
    pub fn flat(width: u32, height: u32) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([128]))
    }

    /// Smooth diagonal gradient, compresses well.
    pub fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([((x + y) / 8 % 256) as u8]))
    }

    /// Deterministic pseudo-random noise, close to incompressible.
    pub fn noise(width: u32, height: u32, seed: u32) -> GrayImage {
        let mut state = seed;
        GrayImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            Luma([(state >> 24) as u8])
        })
    }
}

/// Codec whose output length is `pixels * quality / divisor`, so every
/// search and downscale decision is predictable.
pub struct ModelCodec {
    divisor: usize,
    calls: AtomicUsize,
}

impl ModelCodec {
    pub fn new(divisor: usize) -> Self {
        Self {
            divisor,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }
}

impl Codec for ModelCodec {
    fn name(&self) -> &'static str {
        "model"
    }

    fn extension(&self) -> &'static str {
        "bin"
    }

    fn mime_type(&self) -> &'static str {
        "application/octet-stream"
    }

    fn encode(&self, image: &GrayImage, quality: u8) -> CamResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let size = dimensions(image);
        if size.is_empty() {
            return Err(CamError::encoding("model", quality, "zero-area image"));
        }
        Ok(vec![quality; size.area() * usize::from(quality) / self.divisor])
    }
}

/// Mock capture sources for session tests
pub mod mock_capture {
    use super::*;
    use async_trait::async_trait;
    use fitcam::capture::CaptureSource;
    use std::collections::VecDeque;

    /// Yields scripted frames or failures in order, then fails.
    pub struct ScriptedSource {
        script: VecDeque<CamResult<GrayImage>>,
    }

    impl ScriptedSource {
        pub fn new() -> Self {
            Self {
                script: VecDeque::new(),
            }
        }

        pub fn frame(mut self, image: GrayImage) -> Self {
            self.script.push_back(Ok(image));
            self
        }

        pub fn failure(mut self, reason: &str) -> Self {
            self.script.push_back(Err(CamError::capture(reason)));
            self
        }
    }

    #[async_trait]
    impl CaptureSource for ScriptedSource {
        async fn capture(&mut self) -> CamResult<GrayImage> {
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(CamError::capture("script exhausted")))
        }

        fn describe(&self) -> String {
            format!("scripted ({} left)", self.script.len())
        }
    }
}

/// Display sink that records everything shown.
#[derive(Clone, Default)]
pub struct RecordingDisplay {
    pub lines: Arc<Mutex<Vec<(String, String)>>>,
    pub previews: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl RecordingDisplay {
    pub fn first_lines(&self) -> Vec<String> {
        self.lines.lock().iter().map(|(a, _)| a.clone()).collect()
    }
}

impl fitcam::display::DisplaySink for RecordingDisplay {
    fn show_text(&self, line1: &str, line2: &str) {
        self.lines.lock().push((line1.to_string(), line2.to_string()));
    }

    fn show_preview(&self, canvas: &GrayImage) {
        self.previews.lock().push(canvas.dimensions());
    }
}
