//! # Camera Session
//!
//! Ties a capture source, the budget encoder and the output collaborators
//! into one shot-at-a-time workflow.
//!
//! ## Flow of `capture_once`
//!
//! 1. Display "Capturing..." with the wall-clock time
//! 2. Capture a grayscale frame
//! 3. Fit it under the budget on the blocking pool (CPU bound)
//! 4. Persist the bytes to the timestamp and `latest` slots, still on the
//!    blocking pool
//! 5. Show a preview, notify `captured`, return to "Ready"
//!
//! Any failure shows "Capture ERR" before returning to "Ready"; the error is
//! returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use image::GrayImage;
use tracing::{error, info};

use crate::capture::{CaptureSource, LibcameraSource};
use crate::config::CamConfig;
use crate::display::{DisplaySink, LogDisplay, PREVIEW_SIDE, preview_canvas};
use crate::encode::{BudgetEncoder, FitResult};
use crate::error::{CamError, CamResult};
use crate::notify::{CamEvent, Notifier, NullNotifier};
use crate::storage::{PersistenceSink, PhotoStore, StoredPhoto};

pub const READY_HINT: &str = "Press button / Web";

/// Summary of one completed shot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub stored: StoredPhoto,
    pub quality: u8,
    pub bytes: usize,
    pub fits: bool,
    pub width: u32,
    pub height: u32,
    pub encodes: usize,
}

/// High-level capture session.
pub struct CameraSession {
    source: Box<dyn CaptureSource>,
    encoder: Arc<BudgetEncoder>,
    sink: Arc<dyn PersistenceSink>,
    notifier: Arc<dyn Notifier>,
    display: Arc<dyn DisplaySink>,
    preview_side: u32,
    preview_hold: Duration,
    error_hold: Duration,
}

impl CameraSession {
    /// Create a new camera session using the builder pattern.
    pub fn builder() -> CameraSessionBuilder {
        CameraSessionBuilder::new()
    }

    pub fn encoder(&self) -> &BudgetEncoder {
        &self.encoder
    }

    /// Take one photo, fit it under the budget and store it.
    pub async fn capture_once(&mut self) -> CamResult<CaptureReport> {
        let clock = Local::now().format("%H:%M:%S").to_string();
        self.display.show_text("Capturing...", &clock);

        match self.shoot().await {
            Ok(report) => {
                self.display.show_text("Ready", READY_HINT);
                Ok(report)
            }
            Err(e) => {
                error!(source = %self.source.describe(), error = %e, "capture failed");
                self.display.show_text("Capture ERR", "See logs");
                hold(self.error_hold).await;
                self.display.show_text("Ready", READY_HINT);
                Err(e)
            }
        }
    }

    async fn shoot(&mut self) -> CamResult<CaptureReport> {
        let image = self.source.capture().await?;

        let encoder = Arc::clone(&self.encoder);
        let sink = Arc::clone(&self.sink);
        let side = self.preview_side;
        let (result, canvas, stored) = tokio::task::spawn_blocking(
            move || -> CamResult<(FitResult, GrayImage, StoredPhoto)> {
                let result = encoder.fit(&image)?;
                let canvas = preview_canvas(&result.image, side)?;
                let stored = sink.persist(&result.bytes, encoder.codec().extension())?;
                Ok((result, canvas, stored))
            },
        )
        .await
        .map_err(|e| CamError::external("tokio", e).with_operation("fit"))??;

        self.display.show_preview(&canvas);
        hold(self.preview_hold).await;

        self.notifier.notify(CamEvent::captured_now());
        let size = result.size();
        info!(
            path = %stored.path.display(),
            quality = result.quality,
            bytes = result.bytes.len(),
            fits = result.fits,
            size = %size,
            "captured"
        );
        Ok(CaptureReport {
            stored,
            quality: result.quality,
            bytes: result.bytes.len(),
            fits: result.fits,
            width: size.w,
            height: size.h,
            encodes: result.stats.encodes,
        })
    }
}

async fn hold(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Builder for creating camera sessions with a fluent API.
pub struct CameraSessionBuilder {
    source: Option<Box<dyn CaptureSource>>,
    encoder: Option<BudgetEncoder>,
    sink: Option<Arc<dyn PersistenceSink>>,
    notifier: Arc<dyn Notifier>,
    display: Arc<dyn DisplaySink>,
    preview_side: u32,
    preview_hold: Duration,
    error_hold: Duration,
}

impl Default for CameraSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraSessionBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            encoder: None,
            sink: None,
            notifier: Arc::new(NullNotifier),
            display: Arc::new(LogDisplay),
            preview_side: PREVIEW_SIDE,
            preview_hold: Duration::from_secs(3),
            error_hold: Duration::from_secs(1),
        }
    }

    /// Camera source, encoder and photo store from `config`.
    pub fn from_config(config: &CamConfig) -> CamResult<Self> {
        config.validate()?;
        let encoder = BudgetEncoder::new(config.codec.build()?, config.budget_bytes, config.tuning)?;
        Ok(Self::new()
            .with_source(LibcameraSource::from_config(config))
            .with_encoder(encoder)
            .with_sink(PhotoStore::new(&config.photos_dir)))
    }

    pub fn with_source<S: CaptureSource + 'static>(mut self, source: S) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_encoder(mut self, encoder: BudgetEncoder) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn with_sink<P: PersistenceSink + 'static>(mut self, sink: P) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn with_notifier<N: Notifier + 'static>(mut self, notifier: N) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn with_display<D: DisplaySink + 'static>(mut self, display: D) -> Self {
        self.display = Arc::new(display);
        self
    }

    pub fn with_preview_side(mut self, side: u32) -> Self {
        self.preview_side = side;
        self
    }

    /// How long the preview and the error text stay up before "Ready".
    pub fn with_holds(mut self, preview: Duration, error: Duration) -> Self {
        self.preview_hold = preview;
        self.error_hold = error;
        self
    }

    pub fn build(self) -> CamResult<CameraSession> {
        let source = self
            .source
            .ok_or_else(|| CamError::config("session", "source", "no capture source specified"))?;
        let encoder = self
            .encoder
            .ok_or_else(|| CamError::config("session", "encoder", "no encoder specified"))?;
        let sink = self
            .sink
            .ok_or_else(|| CamError::config("session", "sink", "no persistence sink specified"))?;
        if self.preview_side == 0 {
            return Err(CamError::config("preview_side", "0", "must be greater than 0"));
        }
        Ok(CameraSession {
            source,
            encoder: Arc::new(encoder),
            sink,
            notifier: self.notifier,
            display: self.display,
            preview_side: self.preview_side,
            preview_hold: self.preview_hold,
            error_hold: self.error_hold,
        })
    }
}
