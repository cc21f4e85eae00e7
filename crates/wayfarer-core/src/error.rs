//! Error types module
//!
//! Unified error taxonomy for the ingestion pipeline. Every stage fails fast
//! and synchronously; `ErrorMetadata` maps each failure class to its HTTP
//! status, machine-readable code, and a client message that never leaks
//! scanner signature names or library internals.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for security rejections and recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "VALIDATION_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad type or size. Always user-correctable.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Infected verdict, or scanner unavailable under a fail-closed posture.
    /// Must also emit a security-audit event at the rejection site.
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// Unsupported or corrupt variant of an otherwise-allowed format. Terminal.
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Remote store rejected the upload or the network failed.
    #[error("Upload error: {0}")]
    Upload(String),

    /// Upload succeeded but the caller's domain-record write failed. The
    /// remote asset is orphaned; callers recover via a reconciliation sweep
    /// rather than blocking the user-visible response.
    #[error("Persistence gap for asset {asset_id}: {message}")]
    PersistenceGap { asset_id: String, message: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata per variant: (http_status, error_code, recoverable, log_level).
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, LogLevel) {
    match err {
        AppError::Validation(_) => (400, "VALIDATION_ERROR", false, LogLevel::Debug),
        AppError::SecurityViolation(_) => (400, "SECURITY_VIOLATION", false, LogLevel::Warn),
        AppError::Conversion(_) => (500, "CONVERSION_ERROR", false, LogLevel::Error),
        AppError::Upload(_) => (500, "UPLOAD_ERROR", true, LogLevel::Error),
        AppError::PersistenceGap { .. } => (500, "PERSISTENCE_GAP", true, LogLevel::Warn),
        AppError::BadRequest(_) => (400, "BAD_REQUEST", false, LogLevel::Debug),
        AppError::Internal(_) => (500, "INTERNAL_ERROR", true, LogLevel::Error),
        AppError::InternalWithSource { .. } => (500, "INTERNAL_ERROR", true, LogLevel::Error),
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            // Signature names stay in the logs, never in the response.
            AppError::SecurityViolation(_) => {
                "File rejected by security scanning".to_string()
            }
            AppError::Conversion(_) => "Failed to process image".to_string(),
            AppError::Upload(_) => "Failed to upload file to storage".to_string(),
            AppError::PersistenceGap { .. } => "Internal server error".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}
