//! Core data model for the analysis pipeline.
//!
//! Wire-facing types are `camelCase`-renamed and all enums are closed: the
//! transport boundary deserializes into these records and nothing else.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current wall-clock time as epoch milliseconds.
pub fn epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Screening,
    Dimensions,
    Verdict,
    Secondary,
    Synthesis,
}

impl PipelineStage {
    /// All stages in execution order.
    pub const ALL: [PipelineStage; 5] = [
        PipelineStage::Screening,
        PipelineStage::Dimensions,
        PipelineStage::Verdict,
        PipelineStage::Secondary,
        PipelineStage::Synthesis,
    ];

    /// Stable wire name for the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Screening => "screening",
            PipelineStage::Dimensions => "dimensions",
            PipelineStage::Verdict => "verdict",
            PipelineStage::Secondary => "secondary",
            PipelineStage::Synthesis => "synthesis",
        }
    }

    /// Contribution of this stage to overall progress (sums to 100).
    pub fn progress_weight(&self) -> u8 {
        match self {
            PipelineStage::Screening => 10,
            PipelineStage::Dimensions => 40,
            PipelineStage::Verdict => 15,
            PipelineStage::Secondary => 25,
            PipelineStage::Synthesis => 10,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a run.
///
/// `Running → Suspended → Running` may repeat; `Completed`, `Failed`, and
/// `Cancelled` are terminal sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Suspended,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Whether this status is final.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

/// The seven fixed rubric dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionId {
    TaskDeterminism,
    ErrorTolerance,
    DataAvailability,
    EvaluationClarity,
    EdgeCaseRisk,
    HumanOversightCost,
    RateOfChange,
}

impl DimensionId {
    /// All seven dimensions.
    pub const ALL: [DimensionId; 7] = [
        DimensionId::TaskDeterminism,
        DimensionId::ErrorTolerance,
        DimensionId::DataAvailability,
        DimensionId::EvaluationClarity,
        DimensionId::EdgeCaseRisk,
        DimensionId::HumanOversightCost,
        DimensionId::RateOfChange,
    ];

    /// Stable wire identifier (matches the serde rename).
    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionId::TaskDeterminism => "task_determinism",
            DimensionId::ErrorTolerance => "error_tolerance",
            DimensionId::DataAvailability => "data_availability",
            DimensionId::EvaluationClarity => "evaluation_clarity",
            DimensionId::EdgeCaseRisk => "edge_case_risk",
            DimensionId::HumanOversightCost => "human_oversight_cost",
            DimensionId::RateOfChange => "rate_of_change",
        }
    }

    /// Human-readable name for display.
    pub fn display_name(&self) -> &'static str {
        match self {
            DimensionId::TaskDeterminism => "Task Determinism",
            DimensionId::ErrorTolerance => "Error Tolerance",
            DimensionId::DataAvailability => "Data Availability",
            DimensionId::EvaluationClarity => "Evaluation Clarity",
            DimensionId::EdgeCaseRisk => "Edge Case Risk",
            DimensionId::HumanOversightCost => "Human Oversight Cost",
            DimensionId::RateOfChange => "Rate of Change",
        }
    }
}

impl std::fmt::Display for DimensionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to a pipeline run. Immutable once the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineInput {
    /// The natural-language problem description.
    pub problem: String,

    /// Optional additional context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Answers applied before the run begins (stateless-restart resume).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_applied_answers: Vec<UserAnswer>,
}

impl PipelineInput {
    /// Minimum accepted problem length, in characters.
    pub const MIN_PROBLEM_CHARS: usize = 10;
    /// Maximum accepted problem length, in characters.
    pub const MAX_PROBLEM_CHARS: usize = 5000;
    /// Maximum accepted context length, in characters.
    pub const MAX_CONTEXT_CHARS: usize = 10_000;

    pub fn new(problem: impl Into<String>) -> Self {
        Self {
            problem: problem.into(),
            context: None,
            pre_applied_answers: Vec::new(),
        }
    }

    /// Attach additional context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Seed answers that screening should treat as already given.
    pub fn with_pre_applied(mut self, answers: Vec<UserAnswer>) -> Self {
        self.pre_applied_answers = answers;
        self
    }

    /// Validate length bounds: problem 10..=5000 chars, context <= 10000.
    ///
    /// The transport rejects out-of-bounds input with a 400 before a stream
    /// is opened; this is the engine-side backstop for embedded callers.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.problem.chars().count();
        if n < Self::MIN_PROBLEM_CHARS {
            return Err(format!(
                "problem too short: {} chars (minimum {})",
                n,
                Self::MIN_PROBLEM_CHARS
            ));
        }
        if n > Self::MAX_PROBLEM_CHARS {
            return Err(format!(
                "problem too long: {} chars (maximum {})",
                n,
                Self::MAX_PROBLEM_CHARS
            ));
        }
        if let Some(ref ctx) = self.context {
            let n = ctx.chars().count();
            if n > Self::MAX_CONTEXT_CHARS {
                return Err(format!(
                    "context too long: {} chars (maximum {})",
                    n,
                    Self::MAX_CONTEXT_CHARS
                ));
            }
        }
        Ok(())
    }
}

/// Which stage surfaced a question or received an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStage {
    Screening,
    Dimension,
}

/// A user-provided answer to a follow-up question. Keyed by `question_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswer {
    pub question_id: String,
    pub answer: String,
    pub source: SourceStage,
    /// Epoch milliseconds when the answer was recorded.
    pub timestamp: i64,
}

impl UserAnswer {
    pub fn new(
        question_id: impl Into<String>,
        answer: impl Into<String>,
        source: SourceStage,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            answer: answer.into(),
            source,
            timestamp: epoch_ms(),
        }
    }
}

/// Urgency of a follow-up question. Unanswered `Blocking` questions suspend
/// the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionPriority {
    Blocking,
    Helpful,
    Optional,
}

/// Where a follow-up question came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSource {
    pub stage: SourceStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_id: Option<DimensionId>,
}

/// A pre-formulated option the user can pick instead of free text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedOption {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_on_score: Option<String>,
}

/// A clarifying question surfaced by screening or a dimension analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpQuestion {
    pub id: String,
    pub question: String,
    pub rationale: String,
    pub priority: QuestionPriority,
    pub source: QuestionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_assumption: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_options: Vec<SuggestedOption>,
}

impl FollowUpQuestion {
    /// Shorthand constructor for a screening-sourced blocking question.
    pub fn blocking(id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            rationale: String::new(),
            priority: QuestionPriority::Blocking,
            source: QuestionSource {
                stage: SourceStage::Screening,
                dimension_id: None,
            },
            current_assumption: None,
            suggested_options: Vec::new(),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.priority == QuestionPriority::Blocking
    }
}

/// Verdict of a single rubric dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionScore {
    Favorable,
    Neutral,
    Unfavorable,
}

/// Completion state of a dimension analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Complete,
}

/// Result of analyzing one rubric dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionAnalysis {
    pub id: DimensionId,
    pub name: String,
    pub score: DimensionScore,
    /// Analyzer confidence in `0..=1`.
    pub confidence: f64,
    /// Relative weight of this dimension in `0..=1`.
    pub weight: f64,
    pub reasoning: String,
    pub evidence: Vec<String>,
    pub info_gaps: Vec<FollowUpQuestion>,
    pub status: AnalysisStatus,
}

impl DimensionAnalysis {
    /// The substitute used when a dimension fails under the
    /// continue-with-partial strategy: neutral score, zero weight.
    pub fn neutral_default(id: DimensionId) -> Self {
        Self {
            id,
            name: id.display_name().to_string(),
            score: DimensionScore::Neutral,
            confidence: 0.0,
            weight: 0.0,
            reasoning: String::new(),
            evidence: Vec::new(),
            info_gaps: Vec::new(),
            status: AnalysisStatus::Pending,
        }
    }
}

/// Early read on the likely outcome, before dimensions run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreliminarySignal {
    LikelyPositive,
    Uncertain,
    LikelyNegative,
}

/// An insight screening can offer before full dimension analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialInsight {
    pub insight: String,
    pub confidence: f64,
    pub relevant_dimension: DimensionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    High,
    Medium,
    Low,
}

/// Screening's suggestion for how much attention each dimension deserves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionPriority {
    pub dimension_id: DimensionId,
    pub priority: PriorityLevel,
    pub reason: String,
}

/// Output of the screening stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningOutput {
    pub can_evaluate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub clarifying_questions: Vec<FollowUpQuestion>,
    pub partial_insights: Vec<PartialInsight>,
    pub preliminary_signal: PreliminarySignal,
    pub dimension_priorities: Vec<DimensionPriority>,
}

/// Overall verdict classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    StrongFit,
    Conditional,
    WeakFit,
    NotRecommended,
}

/// How strongly a dimension pushed the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Influence {
    StronglyPositive,
    Positive,
    Neutral,
    Negative,
    StronglyNegative,
}

/// One dimension's contribution to the verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFactor {
    pub dimension_id: DimensionId,
    pub influence: Influence,
    pub note: String,
}

/// Output of the verdict stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictResult {
    pub verdict: Verdict,
    pub confidence: f64,
    pub summary: String,
    pub reasoning: String,
    pub key_factors: Vec<KeyFactor>,
}

/// A risk identified by the secondary analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactor {
    pub risk: String,
    pub severity: PriorityLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
}

/// An alternative approach to building the system as described.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternative {
    pub approach: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tradeoff: Option<String>,
}

/// Architecture sketch recommended by the secondary analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedArchitecture {
    pub pattern: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
}

/// A question worth settling before implementation starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreBuildQuestion {
    pub question: String,
    pub why_it_matters: String,
}

/// Combined output of the architecture analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<RecommendedArchitecture>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions_before_building: Vec<PreBuildQuestion>,
}

/// The fully assembled result of a run.
///
/// Field ordering is deterministic: dimensions are sorted lexicographically
/// by id and answered questions appear in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub run_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screening: Option<ScreeningOutput>,
    pub dimensions: Vec<DimensionAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<VerdictResult>,
    pub key_factors: Vec<KeyFactor>,
    pub risks: Vec<RiskFactor>,
    pub alternatives: Vec<Alternative>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<RecommendedArchitecture>,
    pub questions_before_building: Vec<PreBuildQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub answered_questions: Vec<UserAnswer>,
    pub duration_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_weights_sum_to_100() {
        let total: u32 = PipelineStage::ALL
            .iter()
            .map(|s| s.progress_weight() as u32)
            .sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn test_stage_serde_names() {
        assert_eq!(
            serde_json::to_string(&PipelineStage::Screening).unwrap(),
            "\"screening\""
        );
        assert_eq!(
            serde_json::to_string(&PipelineStage::Secondary).unwrap(),
            "\"secondary\""
        );
    }

    #[test]
    fn test_dimension_id_wire_names() {
        for id in DimensionId::ALL {
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.as_str()));
            let back: DimensionId = serde_json::from_str(&json).unwrap();
            assert_eq!(back, id);
        }
    }

    #[test]
    fn test_verdict_screaming_names() {
        assert_eq!(
            serde_json::to_string(&Verdict::StrongFit).unwrap(),
            "\"STRONG_FIT\""
        );
        assert_eq!(
            serde_json::to_string(&Verdict::NotRecommended).unwrap(),
            "\"NOT_RECOMMENDED\""
        );
    }

    #[test]
    fn test_validate_length_boundaries() {
        // 9 chars rejected, 10 accepted
        assert!(PipelineInput::new("x".repeat(9)).validate().is_err());
        assert!(PipelineInput::new("x".repeat(10)).validate().is_ok());
        // 5000 accepted, 5001 rejected
        assert!(PipelineInput::new("x".repeat(5000)).validate().is_ok());
        assert!(PipelineInput::new("x".repeat(5001)).validate().is_err());
    }

    #[test]
    fn test_validate_context_bound() {
        let ok = PipelineInput::new("a valid problem statement")
            .with_context("c".repeat(10_000));
        assert!(ok.validate().is_ok());
        let too_long = PipelineInput::new("a valid problem statement")
            .with_context("c".repeat(10_001));
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_validate_counts_chars_not_bytes() {
        // 10 multi-byte chars pass the minimum even though byte length is larger
        let input = PipelineInput::new("é".repeat(10));
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_neutral_default_shape() {
        let d = DimensionAnalysis::neutral_default(DimensionId::ErrorTolerance);
        assert_eq!(d.score, DimensionScore::Neutral);
        assert_eq!(d.weight, 0.0);
        assert_eq!(d.status, AnalysisStatus::Pending);
        assert_eq!(d.name, "Error Tolerance");
    }

    #[test]
    fn test_follow_up_question_camel_case() {
        let q = FollowUpQuestion::blocking("q1", "Is there human review?");
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["priority"], "blocking");
        assert_eq!(json["source"]["stage"], "screening");
        // optional fields are omitted entirely
        assert!(json.get("currentAssumption").is_none());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::Suspended.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }
}
