//! Engine configuration: stage timeouts, retry budgets, failure policy,
//! and the resume strategy switch.

use std::time::Duration;

use crate::backoff::RetryOptions;
use crate::parallel::ErrorStrategy;
use crate::step::StepOptions;
use crate::types::PipelineStage;

/// How a suspended run is continued across process boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    /// Reload persisted state and re-enter at the suspended stage.
    /// Requires a configured snapshot store (and its database).
    Snapshot,
    /// Start a fresh run with the collected answers pre-applied; the old
    /// run id survives only as a client-side correlation id.
    StatelessRestart,
}

/// Tunables for the whole engine. One per [`RunManager`](crate::manager::RunManager).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// What a partial stage failure does to the run. Default: fail fast.
    pub error_strategy: ErrorStrategy,

    /// Whole-pipeline deadline enforced by the orchestrator. Default: 180s.
    pub pipeline_timeout: Duration,

    pub screening: StepOptions,
    pub dimensions: StepOptions,
    pub verdict: StepOptions,
    pub secondary: StepOptions,
    pub synthesis: StepOptions,

    pub resume_mode: ResumeMode,

    /// Only meaningful in snapshot mode; handed to the external store.
    pub database_url: Option<String>,

    /// Event channel buffer per run. A full buffer blocks the orchestrator.
    pub event_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let retry = RetryOptions::default();
        Self {
            error_strategy: ErrorStrategy::FailFast,
            pipeline_timeout: Duration::from_secs(180),
            screening: StepOptions {
                max_attempts: 3,
                timeout: Duration::from_secs(30),
                retry: retry.clone(),
            },
            dimensions: StepOptions {
                max_attempts: 4,
                timeout: Duration::from_secs(90),
                retry: retry.clone(),
            },
            verdict: StepOptions {
                max_attempts: 3,
                timeout: Duration::from_secs(30),
                retry: retry.clone(),
            },
            secondary: StepOptions {
                max_attempts: 4,
                timeout: Duration::from_secs(60),
                retry: retry.clone(),
            },
            synthesis: StepOptions {
                max_attempts: 3,
                timeout: Duration::from_secs(30),
                retry,
            },
            resume_mode: ResumeMode::StatelessRestart,
            database_url: None,
            event_buffer: 64,
        }
    }
}

impl PipelineConfig {
    /// Step options for a stage.
    pub fn step_options(&self, stage: PipelineStage) -> &StepOptions {
        match stage {
            PipelineStage::Screening => &self.screening,
            PipelineStage::Dimensions => &self.dimensions,
            PipelineStage::Verdict => &self.verdict,
            PipelineStage::Secondary => &self.secondary,
            PipelineStage::Synthesis => &self.synthesis,
        }
    }

    /// Load the deployment switches from the environment.
    ///
    /// `PIPELINE_SNAPSHOT_RESUME=1|true` selects snapshot resume;
    /// `DATABASE_URL` is picked up for the snapshot store. Everything else
    /// keeps its default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let snapshot = std::env::var("PIPELINE_SNAPSHOT_RESUME")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if snapshot {
            config.resume_mode = ResumeMode::Snapshot;
            config.database_url = std::env::var("DATABASE_URL").ok();
            if config.database_url.is_none() {
                tracing::warn!("snapshot resume enabled but DATABASE_URL is unset");
            }
        }
        tracing::info!(
            resume_mode = ?config.resume_mode,
            error_strategy = ?config.error_strategy,
            "pipeline config loaded"
        );
        config
    }

    /// Set the failure policy (builder style).
    pub fn with_error_strategy(mut self, strategy: ErrorStrategy) -> Self {
        self.error_strategy = strategy;
        self
    }

    /// Set the whole-pipeline deadline.
    pub fn with_pipeline_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline_timeout = timeout;
        self
    }

    /// Set the resume strategy.
    pub fn with_resume_mode(mut self, mode: ResumeMode) -> Self {
        self.resume_mode = mode;
        self
    }

    /// Apply the same step options to every stage. Mostly useful for tests
    /// that want short timeouts across the board.
    pub fn with_uniform_steps(mut self, opts: StepOptions) -> Self {
        self.screening = opts.clone();
        self.dimensions = opts.clone();
        self.verdict = opts.clone();
        self.secondary = opts.clone();
        self.synthesis = opts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stage_budgets() {
        let c = PipelineConfig::default();
        assert_eq!(c.screening.timeout, Duration::from_secs(30));
        assert_eq!(c.screening.max_attempts, 3);
        assert_eq!(c.dimensions.timeout, Duration::from_secs(90));
        assert_eq!(c.dimensions.max_attempts, 4);
        assert_eq!(c.verdict.timeout, Duration::from_secs(30));
        assert_eq!(c.secondary.timeout, Duration::from_secs(60));
        assert_eq!(c.secondary.max_attempts, 4);
        assert_eq!(c.synthesis.timeout, Duration::from_secs(30));
        assert_eq!(c.pipeline_timeout, Duration::from_secs(180));
    }

    #[test]
    fn test_default_strategy_is_fail_fast() {
        assert_eq!(
            PipelineConfig::default().error_strategy,
            ErrorStrategy::FailFast
        );
    }

    #[test]
    fn test_step_options_lookup() {
        let c = PipelineConfig::default();
        for stage in PipelineStage::ALL {
            let opts = c.step_options(stage);
            assert!(opts.max_attempts >= 3);
        }
        assert_eq!(
            c.step_options(PipelineStage::Dimensions).max_attempts,
            4
        );
    }
}
