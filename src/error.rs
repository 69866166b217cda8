//! Kinded errors produced by the pipeline engine.
//!
//! Analyzer failures arrive as opaque [`anyhow::Error`] values and are mapped
//! into an [`ExecutorError`] by the classifier. The `code` decides whether
//! the step runner may retry; everything else is diagnostic payload.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{epoch_ms, PipelineStage};

/// Closed set of error kinds.
///
/// The first four are recoverable (retried with backoff); the rest surface
/// immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RateLimit,
    NetworkError,
    ServiceUnavailable,
    Timeout,
    Authentication,
    ContentFilter,
    SchemaValidation,
    Cancelled,
    MaxRetriesExceeded,
    Unknown,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorCode {
    /// Whether the backoff policy may retry this kind.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorCode::RateLimit
                | ErrorCode::NetworkError
                | ErrorCode::ServiceUnavailable
                | ErrorCode::Timeout
        )
    }

    /// Stable wire name (matches the serde rename).
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RateLimit => "RATE_LIMIT",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Authentication => "AUTHENTICATION",
            ErrorCode::ContentFilter => "CONTENT_FILTER",
            ErrorCode::SchemaValidation => "SCHEMA_VALIDATION",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::MaxRetriesExceeded => "MAX_RETRIES_EXCEEDED",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

/// A classified pipeline error.
///
/// Every error appended to a run's error list is also emitted as a
/// `pipeline:error` event exactly once.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("[{code}] {message} (stage: {stage})")]
pub struct ExecutorError {
    pub code: ErrorCode,
    pub message: String,
    pub stage: PipelineStage,
    pub recoverable: bool,
    /// Epoch milliseconds when the error was classified.
    pub timestamp: i64,
    /// The underlying error when this wraps another (e.g. retry exhaustion).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ExecutorError>>,
    /// Which attempt produced this error (1-based), if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
}

impl ExecutorError {
    pub fn new(code: ErrorCode, message: impl Into<String>, stage: PipelineStage) -> Self {
        Self {
            code,
            message: message.into(),
            stage,
            recoverable: code.is_recoverable(),
            timestamp: epoch_ms(),
            cause: None,
            attempt: None,
        }
    }

    /// A cancellation observed at `stage`.
    pub fn cancelled(stage: PipelineStage) -> Self {
        Self::new(ErrorCode::Cancelled, "operation was cancelled", stage)
    }

    /// A per-attempt timeout at `stage`.
    pub fn timeout(stage: PipelineStage, after: std::time::Duration) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("operation timed out after {}ms", after.as_millis()),
            stage,
        )
    }

    /// Wrap a recoverable error whose retry budget ran out.
    pub fn retries_exhausted(stage: PipelineStage, attempts: u32, last: ExecutorError) -> Self {
        let mut err = Self::new(
            ErrorCode::MaxRetriesExceeded,
            format!("giving up after {} attempts: {}", attempts, last.message),
            stage,
        );
        err.attempt = Some(attempts);
        err.cause = Some(Box::new(last));
        err
    }

    /// Stamp the attempt number (builder style).
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }
}

/// Engine-level result alias.
pub type Result<T> = std::result::Result<T, ExecutorError>;
