//! Resilient execution of a single analyzer invocation.
//!
//! [`run_step`] wraps one async operation with a per-attempt timeout, error
//! classification, a retry loop with exponential backoff, and cancellation
//! observed at every suspension point. This is the only path through which
//! the orchestrator calls an analyzer.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backoff::RetryOptions;
use crate::classify::classify_error;
use crate::error::ExecutorError;
use crate::types::PipelineStage;

/// Per-step execution options.
#[derive(Debug, Clone)]
pub struct StepOptions {
    /// Total attempts, including the first. Default: 3.
    pub max_attempts: u32,
    /// Per-attempt timeout. A timer win classifies as `TIMEOUT`.
    pub timeout: Duration,
    /// Backoff timing between attempts.
    pub retry: RetryOptions,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(30),
            retry: RetryOptions::default(),
        }
    }
}

/// Type alias for the hook invoked on every classified failure.
pub type ErrorHook<'a> = Option<&'a mut (dyn FnMut(&ExecutorError) + Send)>;

/// Type alias for the hook invoked before each backoff sleep.
///
/// Arguments: `(attempt_number, delay_before_retry, error_being_retried)`.
pub type RetryHook<'a> = Option<&'a mut (dyn FnMut(u32, Duration, &ExecutorError) + Send)>;

/// Observation hooks for a step — bundles the optional callbacks.
#[derive(Default)]
pub struct StepHooks<'a> {
    /// Called once per classified failure, before the retry decision.
    pub on_error: ErrorHook<'a>,
    /// Called before each backoff sleep.
    pub on_retry: RetryHook<'a>,
}

impl StepHooks<'_> {
    /// No observation.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Run `op` with timeout, retry, and cancellation semantics.
///
/// - Attempts run `1..=max_attempts`; each races `op()` against the step
///   timeout and the cancel token (token checked first).
/// - Failures are classified; recoverable ones sleep `backoff(attempt)` and
///   retry, fatal ones surface immediately.
/// - A recoverable failure on the final attempt is wrapped into
///   `MAX_RETRIES_EXCEEDED` with the last error as its cause.
/// - Cancellation observed anywhere — before an attempt, mid-call, or during
///   the backoff sleep — returns `CANCELLED` at once and is never retried.
pub async fn run_step<T, F, Fut>(
    mut op: F,
    stage: PipelineStage,
    opts: &StepOptions,
    cancel: &CancellationToken,
    mut hooks: StepHooks<'_>,
) -> Result<T, ExecutorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if cancel.is_cancelled() {
            return Err(ExecutorError::cancelled(stage));
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecutorError::cancelled(stage)),
            _ = tokio::time::sleep(opts.timeout) => {
                Err(ExecutorError::timeout(stage, opts.timeout).with_attempt(attempt))
            }
            r = op() => r.map_err(|e| classify_error(&e, stage, Some(attempt))),
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if err.is_cancelled() {
            return Err(err);
        }

        if let Some(cb) = hooks.on_error.as_deref_mut() {
            cb(&err);
        }
        tracing::warn!(
            stage = %stage,
            attempt,
            code = err.code.as_str(),
            "step attempt failed: {}",
            err.message
        );

        if !err.recoverable {
            return Err(err);
        }
        if attempt >= opts.max_attempts {
            return Err(ExecutorError::retries_exhausted(stage, attempt, err));
        }

        let delay = opts.retry.delay_for_attempt(attempt);
        if let Some(cb) = hooks.on_retry.as_deref_mut() {
            cb(attempt, delay, &err);
        }
        tracing::warn!(
            stage = %stage,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "retrying after backoff"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExecutorError::cancelled(stage)),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
