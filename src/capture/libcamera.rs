//! Raspberry Pi camera capture through the `libcamera-jpeg` tool.
//!
//! The tool writes a JPEG to a scratch path (tmpfs by default); the frame is
//! then decoded and converted to grayscale.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use image::GrayImage;
use tokio::process::Command;
use tracing::{debug, info};

use super::{CaptureSource, decode_gray};
use crate::config::CamConfig;
use crate::error::{CamError, CamResult, ErrorSeverity};

#[derive(Debug, Clone)]
pub struct LibcameraSource {
    program: String,
    width: u32,
    height: u32,
    output: PathBuf,
    autofocus: bool,
}

impl LibcameraSource {
    pub fn new(width: u32, height: u32, output: impl Into<PathBuf>) -> Self {
        Self {
            program: "libcamera-jpeg".to_string(),
            width,
            height,
            output: output.into(),
            autofocus: false,
        }
    }

    pub fn from_config(config: &CamConfig) -> Self {
        Self::new(config.capture_width, config.capture_height, &config.capture_tmp)
            .with_autofocus(config.autofocus)
    }

    pub fn with_autofocus(mut self, autofocus: bool) -> Self {
        self.autofocus = autofocus;
        self
    }

    /// Use a different executable with the same command line, e.g.
    /// `rpicam-jpeg` on newer images.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-n".to_string(),
            "--width".to_string(),
            self.width.to_string(),
            "--height".to_string(),
            self.height.to_string(),
            "-o".to_string(),
            self.output.display().to_string(),
        ];
        if self.autofocus {
            args.extend(["--autofocus-mode".to_string(), "continuous".to_string()]);
        }
        args
    }
}

#[async_trait]
impl CaptureSource for LibcameraSource {
    async fn capture(&mut self) -> CamResult<GrayImage> {
        debug!(program = %self.program, args = ?self.args(), "starting camera tool");
        let output = Command::new(&self.program)
            .args(self.args())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                CamError::capture(format!("failed to start {}: {}", self.program, e))
                    .with_severity(ErrorSeverity::Fatal)
                    .with_recovery_suggestion("Install libcamera-apps and check PATH")
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CamError::capture(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ))
            .with_recovery_suggestion("Check the camera ribbon cable and that no other process holds the camera"));
        }

        let bytes = tokio::fs::read(&self.output)
            .await
            .map_err(|e| CamError::io_at("read capture", &self.output, e))?;
        let image = decode_gray(bytes).await?;
        info!(width = image.width(), height = image.height(), "frame captured");
        Ok(image)
    }

    fn describe(&self) -> String {
        format!("{} {}x{}", self.program, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_match_camera_tool_cli() {
        let source = LibcameraSource::new(1024, 768, "/dev/shm/shot.jpg");
        assert_eq!(
            source.args(),
            ["-n", "--width", "1024", "--height", "768", "-o", "/dev/shm/shot.jpg"]
        );
    }

    #[test]
    fn autofocus_adds_mode_flag() {
        let config = CamConfig {
            autofocus: true,
            ..CamConfig::default()
        };
        let args = LibcameraSource::from_config(&config).args();
        assert_eq!(&args[args.len() - 2..], ["--autofocus-mode", "continuous"]);
    }

    #[tokio::test]
    async fn missing_program_is_a_capture_error() {
        let mut source = LibcameraSource::new(64, 64, "/nonexistent/shot.jpg")
            .with_program("fitcam-no-such-camera-tool");
        let err = source.capture().await.unwrap_err();
        assert_eq!(err.category(), "capture");
        // every later shot would fail the same way
        assert!(crate::error::classify::is_fatal(&err));
    }
}
