//! # Error Handling
//!
//! One error type for the whole camera pipeline, carrying rich context and
//! classification so callers can decide what to do with a failure.
//!
//! ## Architecture
//!
//! - **Error Types**: `CamError` variants cover the encoder core (invalid
//!   image, codec rejection, configuration) and its collaborators (capture,
//!   storage, ledger upload)
//! - **Error Context**: timestamp, operation, recovery suggestion, severity
//! - **Error Traits**: `Retryable`, `HasSeverity`, `HasRecoverySuggestion`,
//!   read by the CLI to decide whether a multi-shot run continues
//!
//! An unreachable byte budget is *not* an error: it is reported through
//! `FitResult::fits`.
//!
//! ## Usage
//!
//! ```rust
//! use fitcam::error::{CamError, Retryable};
//!
//! let error = CamError::capture("libcamera-jpeg exited with status 1")
//!     .with_operation("capture_once")
//!     .with_recovery_suggestion("Check the camera ribbon cable and rerun");
//!
//! assert!(error.is_retryable());
//! assert_eq!(error.category(), "capture");
//! ```

use std::{error::Error as StdError, fmt, time::SystemTime};

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Warnings that may indicate potential issues
    Warning,
    /// Errors that affect one operation but not the process
    Error,
    /// Errors that need an operator (hardware, credentials)
    Critical,
    /// Errors that cannot be recovered from
    Fatal,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Explicit retry override
    pub retryable: bool,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
            retryable: false,
        }
    }
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Base error type for the camera pipeline
#[derive(Debug)]
pub enum CamError {
    /// Input image has a zero dimension
    InvalidImage {
        width: u32,
        height: u32,
        context: ErrorContext,
    },
    /// The codec rejected a well-formed image/quality pair
    Encoding {
        codec: String,
        quality: u8,
        reason: String,
        context: ErrorContext,
    },
    /// Configuration or tuning validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// Camera capture failures
    Capture {
        reason: String,
        context: ErrorContext,
    },
    /// Resampling failures
    Resize {
        reason: String,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// Ledger upload or status errors
    Ledger {
        operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// External library errors
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
}

impl CamError {
    /// Create an invalid image error
    pub fn invalid_image(width: u32, height: u32) -> Self {
        Self::InvalidImage {
            width,
            height,
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a codec error
    pub fn encoding(codec: impl Into<String>, quality: u8, reason: impl Into<String>) -> Self {
        Self::Encoding {
            codec: codec.into(),
            quality,
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a capture error
    pub fn capture(reason: impl Into<String>) -> Self {
        Self::Capture {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a resampling error
    pub fn resize(reason: impl Into<String>) -> Self {
        Self::Resize {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: None,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error tied to a path
    pub fn io_at(
        operation: impl Into<String>,
        path: impl AsRef<std::path::Path>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: Some(path.as_ref().display().to_string()),
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create a ledger error
    pub fn ledger(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Ledger {
            operation: operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an external library error
    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Set severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    /// Mark as retryable
    pub fn retryable(mut self) -> Self {
        self.context_mut().retryable = true;
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::InvalidImage { context, .. } => context,
            Self::Encoding { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::Capture { context, .. } => context,
            Self::Resize { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::Ledger { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::InvalidImage { context, .. } => context,
            Self::Encoding { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::Capture { context, .. } => context,
            Self::Resize { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::Ledger { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidImage { .. } => "invalid_image",
            Self::Encoding { .. } => "encoding",
            Self::Config { .. } => "config",
            Self::Capture { .. } => "capture",
            Self::Resize { .. } => "resize",
            Self::Io { .. } => "io",
            Self::Ledger { .. } => "ledger",
            Self::External { .. } => "external",
        }
    }
}

impl fmt::Display for CamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CamError::InvalidImage { width, height, .. } => {
                write!(f, "Invalid image: {}x{} has zero area", width, height)
            }
            CamError::Encoding {
                codec,
                quality,
                reason,
                ..
            } => {
                write!(f, "{} encoding failed at quality {}: {}", codec, quality, reason)
            }
            CamError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            CamError::Capture { reason, .. } => write!(f, "Capture failed: {}", reason),
            CamError::Resize { reason, .. } => write!(f, "Resize failed: {}", reason),
            CamError::Io {
                operation,
                path,
                source,
                ..
            } => {
                if let Some(path) = path {
                    write!(f, "I/O error during {} on '{}': {}", operation, path, source)
                } else {
                    write!(f, "I/O error during {}: {}", operation, source)
                }
            }
            CamError::Ledger {
                operation, reason, ..
            } => {
                write!(f, "Ledger error during {}: {}", operation, reason)
            }
            CamError::External {
                library, source, ..
            } => {
                write!(f, "External library error in {}: {}", library, source)
            }
        }
    }
}

impl StdError for CamError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::External { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type CamResult<T> = Result<T, CamError>;

/// Trait for errors that can be retried
pub trait Retryable {
    /// Check if this error can be retried
    fn is_retryable(&self) -> bool;

    /// Get the recommended retry delay in milliseconds
    fn retry_delay_ms(&self) -> Option<u64> {
        None
    }
}

impl Retryable for CamError {
    // Encoding is deterministic, so only collaborator failures are worth a retry.
    fn is_retryable(&self) -> bool {
        self.context().retryable
            || matches!(
                self,
                Self::Capture { .. } | Self::Io { .. } | Self::Ledger { .. }
            )
    }

    fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            Self::Capture { .. } => Some(1000),
            Self::Ledger { .. } => Some(3000),
            Self::Io { .. } => Some(100),
            _ => None,
        }
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for CamError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for CamError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Errors caused by the input or configuration rather than the environment
    pub fn is_fatal(error: &CamError) -> bool {
        matches!(
            error,
            CamError::InvalidImage { .. } | CamError::Config { .. }
        ) || error.severity() == ErrorSeverity::Fatal
    }
}

impl From<std::io::Error> for CamError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<image::ImageError> for CamError {
    fn from(error: image::ImageError) -> Self {
        Self::external("image", error)
    }
}

impl From<serde_json::Error> for CamError {
    fn from(error: serde_json::Error) -> Self {
        Self::external("serde_json", error)
    }
}

impl From<fit_scale::cpu::ScaleError> for CamError {
    fn from(error: fit_scale::cpu::ScaleError) -> Self {
        Self::resize(error.to_string())
    }
}

impl From<reqwest::Error> for CamError {
    fn from(error: reqwest::Error) -> Self {
        Self::ledger("http", error.to_string()).retryable()
    }
}
