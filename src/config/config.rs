//! # Camera Configuration
//!
//! Everything the `fitcam` binary needs besides the encoder tuning: where
//! captures come from, where they go, and how uploads are made.
//!
//! ## Configuration Parameters
//!
//! | Parameter | Default | Description |
//! |-----------|---------|-------------|
//! | `photos_dir` | `~/photos` | Gallery directory |
//! | `capture_tmp` | `/dev/shm/shot.jpg` | Scratch file for the camera tool |
//! | `capture_width` x `capture_height` | 1024 x 1024 | Requested sensor output |
//! | `autofocus` | `false` | Continuous autofocus (camera module 3) |
//! | `budget_bytes` | 102,400 | Hard cap for stored photos |
//! | `codec` | `webp` | Output format |
//! | `tuning` | see `FitTuning` | Encoder search and downscale tuning |
//! | `uploader_script` | `upload.js` | Node script run as `node <script> --json <file>` |
//! | `ledger_log` | `<photos_dir>/ledger.json` | Append-only upload log |
//! | `gateway` | `https://arweave.net` | Base URL for upload status polling |
//!
//! ## Examples
//!
//! ```rust
//! use fitcam::config::CamConfig;
//!
//! let config: CamConfig = serde_json::from_str(r#"{"budget_bytes": 51200, "codec": "jpeg"}"#)?;
//! assert!(config.validate().is_ok());
//! assert_eq!(config.capture_width, 1024);
//! # Ok::<(), serde_json::Error>(())
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tuning::FitTuning;
use crate::encode::CodecKind;
use crate::error::{CamError, CamResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CamConfig {
    /// Directory holding timestamped photos and the `latest` slot.
    pub photos_dir: PathBuf,

    /// Scratch JPEG written by the camera tool. A tmpfs path keeps the SD
    /// card out of the capture loop.
    pub capture_tmp: PathBuf,

    pub capture_width: u32,
    pub capture_height: u32,

    /// Pass `--autofocus-mode continuous` to the camera tool.
    pub autofocus: bool,

    /// Hard byte cap for every stored photo.
    pub budget_bytes: usize,

    pub codec: CodecKind,

    pub tuning: FitTuning,

    pub uploader_script: PathBuf,

    /// Defaults to `ledger.json` inside `photos_dir`.
    pub ledger_log: Option<PathBuf>,

    pub gateway: String,
}

impl Default for CamConfig {
    fn default() -> Self {
        Self {
            photos_dir: default_photos_dir(),
            capture_tmp: PathBuf::from("/dev/shm/shot.jpg"),
            capture_width: 1024,
            capture_height: 1024,
            autofocus: false,
            budget_bytes: 100 * 1024,
            codec: CodecKind::default(),
            tuning: FitTuning::default(),
            uploader_script: PathBuf::from("upload.js"),
            ledger_log: None,
            gateway: "https://arweave.net".to_string(),
        }
    }
}

fn default_photos_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photos")
}

impl CamConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> CamResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CamError::io_at("read config", path, e))?;
        let config: CamConfig = serde_json::from_str(&text).map_err(|e| {
            CamError::config("config", path.display().to_string(), e.to_string())
                .with_recovery_suggestion("Check the file is a JSON object with known keys")
        })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> CamResult<()> {
        if self.capture_width == 0 || self.capture_height == 0 {
            return Err(CamError::config(
                "capture_size",
                format!("{}x{}", self.capture_width, self.capture_height),
                "capture dimensions must be greater than 0",
            ));
        }
        if self.budget_bytes == 0 {
            return Err(CamError::config("budget_bytes", "0", "must be greater than 0"));
        }
        if self.gateway.is_empty() {
            return Err(CamError::config("gateway", "", "must not be empty"));
        }
        self.tuning.validate()
    }

    pub fn ledger_log_path(&self) -> PathBuf {
        self.ledger_log
            .clone()
            .unwrap_or_else(|| self.photos_dir.join("ledger.json"))
    }
}
