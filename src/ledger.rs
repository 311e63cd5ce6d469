//! # Ledger Upload
//!
//! Publishes a stored photo to a permanent ledger through an external
//! uploader script, keeps a local append-only log of receipts, and polls the
//! gateway for confirmation.
//!
//! The uploader contract: `node <script> --json <file>` prints one JSON
//! object `{ok, id, url, size, file, error}` on stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{CamError, CamResult};
use crate::notify::{CamEvent, Notifier};
use crate::storage::PhotoStore;

/// What the uploader reported for a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub id: String,
    pub url: Option<String>,
    pub size: Option<u64>,
    pub file: Option<String>,
}

#[async_trait]
pub trait LedgerUploader: Send + Sync {
    async fn upload(&self, path: &Path) -> CamResult<LedgerReceipt>;
}

#[derive(Debug, Deserialize)]
struct UploaderReply {
    #[serde(default)]
    ok: bool,
    id: Option<String>,
    url: Option<String>,
    size: Option<u64>,
    file: Option<String>,
    error: Option<String>,
}

impl UploaderReply {
    fn into_receipt(self) -> CamResult<LedgerReceipt> {
        if !self.ok {
            return Err(CamError::ledger(
                "upload",
                self.error.unwrap_or_else(|| "Upload failed".to_string()),
            ));
        }
        let id = self
            .id
            .ok_or_else(|| CamError::ledger("upload", "uploader reported success without an id"))?;
        Ok(LedgerReceipt {
            id,
            url: self.url,
            size: self.size,
            file: self.file,
        })
    }
}

/// Runs the uploader script for each upload.
#[derive(Debug, Clone)]
pub struct ScriptUploader {
    program: String,
    script: PathBuf,
    max_bytes: u64,
}

impl ScriptUploader {
    pub fn new(script: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            program: "node".to_string(),
            script: script.into(),
            max_bytes: max_bytes as u64,
        }
    }

    /// Interpreter for the script; `node` by default.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl LedgerUploader for ScriptUploader {
    async fn upload(&self, path: &Path) -> CamResult<LedgerReceipt> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| CamError::io_at("stat upload", path, e))?;
        if meta.len() > self.max_bytes {
            return Err(CamError::ledger(
                "upload",
                format!("{} is {} bytes, over the {} byte cap", path.display(), meta.len(), self.max_bytes),
            )
            .with_recovery_suggestion("Re-encode the photo under the budget first"));
        }
        if !self.script.is_file() {
            return Err(CamError::ledger(
                "upload",
                format!("uploader script not found: {}", self.script.display()),
            ));
        }

        debug!(program = %self.program, script = %self.script.display(), file = %path.display(), "running uploader");
        let output = Command::new(&self.program)
            .arg(&self.script)
            .arg("--json")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CamError::ledger("upload", format!("failed to start {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = if stderr.trim().is_empty() {
                format!("uploader exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(CamError::ledger("upload", reason));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let reply: UploaderReply = serde_json::from_str(stdout.trim())
            .map_err(|e| CamError::ledger("upload", format!("unparseable uploader output: {}", e)))?;
        let receipt = reply.into_receipt()?;
        info!(id = %receipt.id, file = %path.display(), "uploaded to ledger");
        Ok(receipt)
    }
}

/// One line of the local upload log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub id: String,
    pub url: Option<String>,
    pub size: Option<u64>,
    pub file: Option<String>,
    pub ts_ms: i64,
}

impl LedgerRecord {
    pub fn from_receipt(receipt: LedgerReceipt) -> Self {
        Self {
            id: receipt.id,
            url: receipt.url,
            size: receipt.size,
            file: receipt.file,
            ts_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// JSON-array file of `LedgerRecord`s.
///
/// A missing or unreadable log reads as empty so one bad write never blocks
/// future uploads.
#[derive(Debug, Clone)]
pub struct LedgerLog {
    path: PathBuf,
}

impl LedgerLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> Vec<LedgerRecord> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "ledger log unreadable");
                }
                return Vec::new();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "ledger log corrupt, starting over");
            Vec::new()
        })
    }

    pub fn append(&self, record: LedgerRecord) -> CamResult<()> {
        let mut records = self.records();
        records.push(record);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CamError::io_at("create ledger dir", parent, e))?;
        }
        let json = serde_json::to_string_pretty(&records)?;
        std::fs::write(&self.path, json).map_err(|e| CamError::io_at("write ledger log", &self.path, e))
    }
}

/// Upload the newest stored photo, log the receipt and announce it.
pub async fn publish_latest(
    store: &PhotoStore,
    extension: &str,
    uploader: &dyn LedgerUploader,
    log: &LedgerLog,
    notifier: &dyn Notifier,
) -> CamResult<LedgerRecord> {
    let path = store
        .latest(extension)?
        .ok_or_else(|| CamError::ledger("upload", "no image available to upload"))?;
    let receipt = uploader.upload(&path).await?;
    let record = LedgerRecord::from_receipt(receipt);
    log.append(record.clone())?;
    notifier.notify(CamEvent::uploaded_now(&record.id));
    Ok(record)
}

/// Confirmation state of one ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxStatus {
    pub http_status: u16,
    pub confirmations: Option<u64>,
    pub confirmed: bool,
}

impl TxStatus {
    /// Interpret a gateway `/tx/<id>/status` response. Pending transactions
    /// answer 202 with a plain-text body; confirmed ones answer 200 with a
    /// JSON object.
    pub fn from_response(http_status: u16, body: &str) -> Self {
        let json: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let confirmations = json
            .as_ref()
            .and_then(|v| v.get("number_of_confirmations"))
            .and_then(|v| v.as_u64());
        let flagged = json
            .as_ref()
            .and_then(|v| v.get("confirmed"))
            .is_some_and(|v| !v.is_null() && v != &serde_json::Value::Bool(false));
        Self {
            http_status,
            confirmations,
            confirmed: http_status == 200 && (confirmations.is_some() || flagged),
        }
    }
}

/// Polls a gateway for transaction status.
#[derive(Debug, Clone)]
pub struct StatusPoller {
    client: reqwest::Client,
    gateway: String,
}

impl StatusPoller {
    pub fn new(gateway: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway: gateway.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn status_url(&self, id: &str) -> String {
        format!("{}/tx/{}/status", self.gateway, id)
    }

    pub async fn status(&self, id: &str) -> CamResult<TxStatus> {
        let response = self
            .client
            .get(self.status_url(id))
            .timeout(Duration::from_secs(10))
            .send()
            .await?;
        let code = response.status().as_u16();
        let body = response.text().await?;
        Ok(TxStatus::from_response(code, &body))
    }

    /// Poll up to `attempts` times, `interval` apart, stopping once confirmed.
    /// Transport errors are logged and count as an attempt.
    pub async fn wait_confirmed(&self, id: &str, attempts: u32, interval: Duration) -> Option<TxStatus> {
        let mut last = None;
        for attempt in 1..=attempts {
            tokio::time::sleep(interval).await;
            match self.status(id).await {
                Ok(status) => {
                    info!(attempt, http = status.http_status, confirmed = status.confirmed, "ledger status");
                    last = Some(status);
                    if status.confirmed {
                        break;
                    }
                }
                Err(e) => warn!(attempt, error = %e, "ledger status poll failed"),
            }
        }
        last
    }
}
