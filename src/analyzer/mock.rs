//! Mock analyzer for testing without a live LLM.
//!
//! [`MockAnalyzer`] returns happy-path defaults for every stage; individual
//! calls can be scripted to return a canned value, fail with a given error
//! text, or hang until cancelled. Scripts are consumed front-to-front, one
//! entry per call, so retry behavior is exact and deterministic.
//!
//! # Example
//!
//! ```
//! use suitability_pipeline::analyzer::MockAnalyzer;
//! use suitability_pipeline::types::DimensionId;
//!
//! // error_tolerance is rate limited twice, then recovers
//! let mock = MockAnalyzer::new()
//!     .fail_dimension(DimensionId::ErrorTolerance, "429 Too Many Requests")
//!     .fail_dimension(DimensionId::ErrorTolerance, "429 Too Many Requests");
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Analyzer, SecondaryContext, SynthesisContext};
use crate::types::{
    Alternative, AnalysisStatus, ArchitectureOutput, DimensionAnalysis, DimensionId,
    DimensionScore, FollowUpQuestion, PipelineInput, PreBuildQuestion, PreliminarySignal,
    PriorityLevel, RecommendedArchitecture, RiskFactor, ScreeningOutput, UserAnswer,
    VerdictResult, Verdict,
};

/// One scripted response.
#[derive(Debug, Clone)]
pub enum MockResponse<T> {
    /// Return this value.
    Ok(T),
    /// Fail with this error text (classified by the engine).
    Fail(String),
    /// Never resolve; return a cancellation error if the token fires first.
    Hang,
}

type Script<T> = Mutex<VecDeque<MockResponse<T>>>;

/// A scriptable analyzer with happy-path defaults.
///
/// Unscripted calls succeed: screening finds nothing to clarify, every
/// dimension scores favorable at weight 0.7, the verdict is `STRONG_FIT`
/// at 0.88, and the secondary analyses return small fixed payloads.
pub struct MockAnalyzer {
    screening: Script<ScreeningOutput>,
    dimensions: Mutex<HashMap<DimensionId, VecDeque<MockResponse<DimensionAnalysis>>>>,
    verdict: Script<VerdictResult>,
    risks: Script<Vec<RiskFactor>>,
    alternatives: Script<Vec<Alternative>>,
    architecture: Script<ArchitectureOutput>,
    synthesis: Script<String>,
    calls: Mutex<HashMap<String, u32>>,
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self {
            screening: Mutex::new(VecDeque::new()),
            dimensions: Mutex::new(HashMap::new()),
            verdict: Mutex::new(VecDeque::new()),
            risks: Mutex::new(VecDeque::new()),
            alternatives: Mutex::new(VecDeque::new()),
            architecture: Mutex::new(VecDeque::new()),
            synthesis: Mutex::new(VecDeque::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// The default happy screening output: evaluable, no questions.
    pub fn default_screening() -> ScreeningOutput {
        ScreeningOutput {
            can_evaluate: true,
            reason: None,
            clarifying_questions: Vec::new(),
            partial_insights: Vec::new(),
            preliminary_signal: PreliminarySignal::LikelyPositive,
            dimension_priorities: Vec::new(),
        }
    }

    /// The default favorable analysis for a dimension.
    pub fn default_dimension(id: DimensionId) -> DimensionAnalysis {
        DimensionAnalysis {
            id,
            name: id.display_name().to_string(),
            score: DimensionScore::Favorable,
            confidence: 0.9,
            weight: 0.7,
            reasoning: format!("{} looks favorable for this problem", id.display_name()),
            evidence: vec!["stated in the problem description".to_string()],
            info_gaps: Vec::new(),
            status: AnalysisStatus::Complete,
        }
    }

    /// The default verdict: `STRONG_FIT` at confidence 0.88.
    pub fn default_verdict() -> VerdictResult {
        VerdictResult {
            verdict: Verdict::StrongFit,
            confidence: 0.88,
            summary: "Well suited to an automated approach".to_string(),
            reasoning: "All dimensions score favorably".to_string(),
            key_factors: Vec::new(),
        }
    }

    fn default_risks() -> Vec<RiskFactor> {
        vec![RiskFactor {
            risk: "Edge cases outside the labeled distribution".to_string(),
            severity: PriorityLevel::Medium,
            mitigation: Some("route low-confidence items to a human".to_string()),
        }]
    }

    fn default_alternatives() -> Vec<Alternative> {
        vec![Alternative {
            approach: "Rules-based triage".to_string(),
            description: "Keyword routing for the unambiguous majority".to_string(),
            tradeoff: Some("brittle as categories evolve".to_string()),
        }]
    }

    fn default_architecture() -> ArchitectureOutput {
        ArchitectureOutput {
            architecture: Some(RecommendedArchitecture {
                pattern: "classify-with-review".to_string(),
                description: "Single-pass classification with human review of low-confidence output"
                    .to_string(),
                components: vec!["classifier".to_string(), "review queue".to_string()],
            }),
            questions_before_building: vec![PreBuildQuestion {
                question: "What is the acceptable mislabel rate?".to_string(),
                why_it_matters: "Sets the confidence threshold for review routing".to_string(),
            }],
        }
    }

    // --- scripting ---

    /// Queue a screening output for the next screening call.
    pub fn with_screening(self, output: ScreeningOutput) -> Self {
        self.screening.lock().unwrap().push_back(MockResponse::Ok(output));
        self
    }

    /// Queue a screening output that surfaces the given questions.
    pub fn with_screening_questions(self, questions: Vec<FollowUpQuestion>) -> Self {
        let output = ScreeningOutput {
            clarifying_questions: questions,
            preliminary_signal: PreliminarySignal::Uncertain,
            ..Self::default_screening()
        };
        self.with_screening(output)
    }

    /// Queue a screening failure.
    pub fn fail_screening(self, message: impl Into<String>) -> Self {
        self.screening
            .lock()
            .unwrap()
            .push_back(MockResponse::Fail(message.into()));
        self
    }

    /// Queue a canned analysis for one dimension.
    pub fn with_dimension(self, id: DimensionId, analysis: DimensionAnalysis) -> Self {
        self.dimensions
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .push_back(MockResponse::Ok(analysis));
        self
    }

    /// Queue one failure for a dimension. Chain to fail repeatedly.
    pub fn fail_dimension(self, id: DimensionId, message: impl Into<String>) -> Self {
        self.dimensions
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .push_back(MockResponse::Fail(message.into()));
        self
    }

    /// Queue a canned verdict.
    pub fn with_verdict(self, verdict: VerdictResult) -> Self {
        self.verdict.lock().unwrap().push_back(MockResponse::Ok(verdict));
        self
    }

    /// Queue one verdict failure.
    pub fn fail_verdict(self, message: impl Into<String>) -> Self {
        self.verdict
            .lock()
            .unwrap()
            .push_back(MockResponse::Fail(message.into()));
        self
    }

    /// Queue one verdict call that never resolves.
    pub fn hang_verdict(self) -> Self {
        self.verdict.lock().unwrap().push_back(MockResponse::Hang);
        self
    }

    /// Queue one risks failure.
    pub fn fail_risks(self, message: impl Into<String>) -> Self {
        self.risks
            .lock()
            .unwrap()
            .push_back(MockResponse::Fail(message.into()));
        self
    }

    /// Queue one alternatives failure.
    pub fn fail_alternatives(self, message: impl Into<String>) -> Self {
        self.alternatives
            .lock()
            .unwrap()
            .push_back(MockResponse::Fail(message.into()));
        self
    }

    /// Queue one architecture failure.
    pub fn fail_architecture(self, message: impl Into<String>) -> Self {
        self.architecture
            .lock()
            .unwrap()
            .push_back(MockResponse::Fail(message.into()));
        self
    }

    /// Queue a canned synthesis string.
    pub fn with_synthesis(self, reasoning: impl Into<String>) -> Self {
        self.synthesis
            .lock()
            .unwrap()
            .push_back(MockResponse::Ok(reasoning.into()));
        self
    }

    /// How many times an endpoint was called. Keys: `"screening"`,
    /// `"dimension:<id>"`, `"verdict"`, `"risks"`, `"alternatives"`,
    /// `"architecture"`, `"synthesize"`.
    pub fn call_count(&self, key: &str) -> u32 {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    fn bump(&self, key: &str) {
        *self.calls.lock().unwrap().entry(key.to_string()).or_insert(0) += 1;
    }

    async fn resolve<T: Clone>(
        &self,
        script: &Script<T>,
        default: T,
        cancel: &CancellationToken,
    ) -> anyhow::Result<T> {
        let next = script.lock().unwrap().pop_front();
        match next {
            None => Ok(default),
            Some(MockResponse::Ok(value)) => Ok(value),
            Some(MockResponse::Fail(message)) => Err(anyhow!(message)),
            Some(MockResponse::Hang) => {
                cancel.cancelled().await;
                Err(anyhow!("call aborted by cancellation"))
            }
        }
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    async fn screening(
        &self,
        _input: &PipelineInput,
        _answers: &[UserAnswer],
        cancel: &CancellationToken,
    ) -> anyhow::Result<ScreeningOutput> {
        self.bump("screening");
        self.resolve(&self.screening, Self::default_screening(), cancel)
            .await
    }

    async fn dimension(
        &self,
        id: DimensionId,
        _input: &PipelineInput,
        _screening: &ScreeningOutput,
        _answers: &[UserAnswer],
        cancel: &CancellationToken,
    ) -> anyhow::Result<DimensionAnalysis> {
        self.bump(&format!("dimension:{}", id));
        let next = self.dimensions.lock().unwrap().get_mut(&id).and_then(|q| q.pop_front());
        match next {
            None => Ok(Self::default_dimension(id)),
            Some(MockResponse::Ok(value)) => Ok(value),
            Some(MockResponse::Fail(message)) => Err(anyhow!(message)),
            Some(MockResponse::Hang) => {
                cancel.cancelled().await;
                Err(anyhow!("call aborted by cancellation"))
            }
        }
    }

    async fn verdict(
        &self,
        _input: &PipelineInput,
        _screening: &ScreeningOutput,
        _dimensions: &BTreeMap<DimensionId, DimensionAnalysis>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<VerdictResult> {
        self.bump("verdict");
        self.resolve(&self.verdict, Self::default_verdict(), cancel)
            .await
    }

    async fn risks(
        &self,
        _ctx: &SecondaryContext,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<RiskFactor>> {
        self.bump("risks");
        self.resolve(&self.risks, Self::default_risks(), cancel).await
    }

    async fn alternatives(
        &self,
        _ctx: &SecondaryContext,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<Alternative>> {
        self.bump("alternatives");
        self.resolve(&self.alternatives, Self::default_alternatives(), cancel)
            .await
    }

    async fn architecture(
        &self,
        _ctx: &SecondaryContext,
        cancel: &CancellationToken,
    ) -> anyhow::Result<ArchitectureOutput> {
        self.bump("architecture");
        self.resolve(&self.architecture, Self::default_architecture(), cancel)
            .await
    }

    async fn synthesize(
        &self,
        _ctx: &SynthesisContext,
        cancel: &CancellationToken,
    ) -> anyhow::Result<String> {
        self.bump("synthesize");
        self.resolve(
            &self.synthesis,
            "The problem is a strong fit for an automated pipeline.".to_string(),
            cancel,
        )
        .await
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
