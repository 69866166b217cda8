//! Analyzer contract: the seam between the engine and the LLM-backed
//! analysis functions.
//!
//! The engine treats every analyzer call as a black box: typed input in,
//! typed output out, any error out as an opaque [`anyhow::Error`] that the
//! classifier maps to a kinded [`ExecutorError`](crate::error::ExecutorError).
//! Implementations receive the run's cancellation token and are expected to
//! abort in-flight work when it fires.
//!
//! ## Architecture
//!
//! ```text
//! Orchestrator ──► run_step ──► Analyzer::screening / dimension / verdict
//!                                  │            risks / alternatives /
//!                                  │            architecture / synthesize
//!                       ┌──────────┴──────────┐
//!                  LLM-backed impl        MockAnalyzer
//!                  (external crate)       (deterministic tests)
//! ```

pub mod mock;

pub use mock::MockAnalyzer;

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::types::{
    Alternative, ArchitectureOutput, DimensionAnalysis, DimensionId, PipelineInput,
    PreBuildQuestion, RecommendedArchitecture, RiskFactor, ScreeningOutput, UserAnswer,
    VerdictResult,
};

/// Everything the secondary analyzers (risks, alternatives, architecture)
/// get to look at.
#[derive(Debug, Clone)]
pub struct SecondaryContext {
    pub input: PipelineInput,
    pub dimensions: BTreeMap<DimensionId, DimensionAnalysis>,
    pub verdict: VerdictResult,
}

/// Everything the final narrative synthesis gets to look at.
#[derive(Debug, Clone)]
pub struct SynthesisContext {
    pub input: PipelineInput,
    pub screening: ScreeningOutput,
    pub dimensions: BTreeMap<DimensionId, DimensionAnalysis>,
    pub answers: Vec<UserAnswer>,
    pub verdict: VerdictResult,
    pub risks: Vec<RiskFactor>,
    pub alternatives: Vec<Alternative>,
    pub architecture: Option<RecommendedArchitecture>,
    pub questions_before_building: Vec<PreBuildQuestion>,
}

/// Abstraction over the LLM-backed analysis functions.
///
/// Object-safe and designed to be held as `Arc<dyn Analyzer>`. The per-
/// dimension method is the factory form of the dimensions stage: the engine
/// fans all seven out through its parallel runner, which is what gives the
/// partial-failure policy per-dimension granularity.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Screen the problem: is it evaluable, what must be clarified first?
    async fn screening(
        &self,
        input: &PipelineInput,
        answers: &[UserAnswer],
        cancel: &CancellationToken,
    ) -> anyhow::Result<ScreeningOutput>;

    /// Analyze one rubric dimension.
    async fn dimension(
        &self,
        id: DimensionId,
        input: &PipelineInput,
        screening: &ScreeningOutput,
        answers: &[UserAnswer],
        cancel: &CancellationToken,
    ) -> anyhow::Result<DimensionAnalysis>;

    /// Weigh the dimension analyses into an overall verdict.
    async fn verdict(
        &self,
        input: &PipelineInput,
        screening: &ScreeningOutput,
        dimensions: &BTreeMap<DimensionId, DimensionAnalysis>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<VerdictResult>;

    /// Identify risk factors.
    async fn risks(
        &self,
        ctx: &SecondaryContext,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<RiskFactor>>;

    /// Propose alternative approaches.
    async fn alternatives(
        &self,
        ctx: &SecondaryContext,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<Alternative>>;

    /// Recommend an architecture and the questions to settle before building.
    async fn architecture(
        &self,
        ctx: &SecondaryContext,
        cancel: &CancellationToken,
    ) -> anyhow::Result<ArchitectureOutput>;

    /// Produce the final narrative reasoning.
    async fn synthesize(
        &self,
        ctx: &SynthesisContext,
        cancel: &CancellationToken,
    ) -> anyhow::Result<String>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str {
        "analyzer"
    }
}
