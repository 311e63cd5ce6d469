//! Frames from an existing image file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::GrayImage;

use super::{CaptureSource, decode_gray};
use crate::error::{CamError, CamResult};

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CaptureSource for FileSource {
    async fn capture(&mut self) -> CamResult<GrayImage> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| CamError::io_at("read image", &self.path, e))?;
        decode_gray(bytes)
            .await
            .map_err(|e| e.with_context(format!("decoding {}", self.path.display())))
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
