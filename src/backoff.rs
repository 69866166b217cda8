//! Retry delay policy: exponential backoff with bounded jitter.
//!
//! Delays grow as `initial * multiplier^(attempt-1)`, plus a uniform jitter
//! of up to a quarter of that value, capped at `max_delay`. The jitter keeps
//! concurrent runs that hit the same rate limit from retrying in lockstep.

use std::time::Duration;

/// Retry timing options for the resilient step runner.
///
/// # Example
///
/// ```
/// use suitability_pipeline::backoff::RetryOptions;
/// use std::time::Duration;
///
/// let opts = RetryOptions::default();
/// assert_eq!(opts.initial_delay, Duration::from_secs(1));
/// assert_eq!(opts.max_delay, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Delay before the first retry. Default: 1 second.
    pub initial_delay: Duration,

    /// Hard cap applied after jitter. Default: 10 seconds.
    pub max_delay: Duration,

    /// Growth factor per attempt. Default: 2.0.
    pub backoff_multiplier: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryOptions {
    /// Calculate the delay before retrying after `attempt` (1-based) failed.
    ///
    /// `min(max_delay, base + jitter)` where `base = initial *
    /// multiplier^(attempt-1)` and jitter is uniform in `[0, 0.25 * base)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.delay_with_jitter(attempt, fastrand::f64())
    }

    /// Seeded variant for deterministic tests.
    pub fn delay_for_attempt_with(&self, attempt: u32, rng: &mut fastrand::Rng) -> Duration {
        self.delay_with_jitter(attempt, rng.f64())
    }

    fn delay_with_jitter(&self, attempt: u32, unit: f64) -> Duration {
        let exp = attempt.saturating_sub(1);
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exp as i32);
        let jitter = unit * 0.25 * base;
        let capped = (base + jitter).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}
