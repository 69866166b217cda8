//! Authoritative in-memory record of a run.
//!
//! A `RunState` has a single writer — the run's orchestrator task — and is
//! read by `run_status` snapshots under the same lock. It is fully
//! serde-serializable so the snapshot adapter can persist it between
//! invocations; the cancellation token deliberately lives outside, in the
//! manager's run entry.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ExecutorError;
use crate::types::{
    epoch_ms, Alternative, DimensionAnalysis, DimensionId, FollowUpQuestion, PipelineInput,
    PipelineStage, PreBuildQuestion, RecommendedArchitecture, RiskFactor, RunStatus,
    ScreeningOutput, UserAnswer, VerdictResult,
};

/// Mutable state of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub run_id: Uuid,
    pub input: PipelineInput,

    /// Answers in insertion order, unique by `question_id` (a later answer
    /// to the same question replaces the earlier one in place).
    pub answers: Vec<UserAnswer>,

    pub screening: Option<ScreeningOutput>,
    pub dimensions: BTreeMap<DimensionId, DimensionAnalysis>,

    /// Union of every question surfaced by screening and dimensions.
    /// Append-only; answering a question does not remove it.
    pub pending_questions: Vec<FollowUpQuestion>,

    pub verdict: Option<VerdictResult>,
    pub risks: Option<Vec<RiskFactor>>,
    pub alternatives: Option<Vec<Alternative>>,
    pub architecture: Option<RecommendedArchitecture>,
    pub questions_before_building: Option<Vec<PreBuildQuestion>>,
    pub final_reasoning: Option<String>,

    pub status: RunStatus,
    /// Current or last-completed stage.
    pub stage: PipelineStage,
    /// Stages that finished; a resumed run never re-executes these.
    pub completed_stages: BTreeSet<PipelineStage>,

    pub errors: Vec<ExecutorError>,
    pub started_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl RunState {
    /// Seed a fresh run. Pre-applied answers from the input are recorded
    /// immediately so screening sees them.
    pub fn new(run_id: Uuid, input: PipelineInput) -> Self {
        let mut state = Self {
            run_id,
            answers: Vec::new(),
            screening: None,
            dimensions: BTreeMap::new(),
            pending_questions: Vec::new(),
            verdict: None,
            risks: None,
            alternatives: None,
            architecture: None,
            questions_before_building: None,
            final_reasoning: None,
            status: RunStatus::Running,
            stage: PipelineStage::Screening,
            completed_stages: BTreeSet::new(),
            errors: Vec::new(),
            started_at: epoch_ms(),
            completed_at: None,
            input,
        };
        for answer in state.input.pre_applied_answers.clone() {
            state.record_answer(answer);
        }
        state
    }

    /// Record an answer, replacing any prior answer to the same question
    /// while keeping its original position.
    pub fn record_answer(&mut self, answer: UserAnswer) {
        match self
            .answers
            .iter_mut()
            .find(|a| a.question_id == answer.question_id)
        {
            Some(slot) => *slot = answer,
            None => self.answers.push(answer),
        }
    }

    /// The answer for a question id, if one was given.
    pub fn answer_for(&self, question_id: &str) -> Option<&UserAnswer> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }

    /// Append newly surfaced questions. Questions already known by id are
    /// skipped so re-folding a stage output is idempotent.
    pub fn push_questions(&mut self, questions: &[FollowUpQuestion]) {
        for q in questions {
            if !self.pending_questions.iter().any(|p| p.id == q.id) {
                self.pending_questions.push(q.clone());
            }
        }
    }

    /// Blocking questions with no recorded answer. Non-empty means the run
    /// must suspend instead of entering the next stage.
    pub fn unanswered_blocking(&self) -> Vec<&FollowUpQuestion> {
        self.pending_questions
            .iter()
            .filter(|q| q.is_blocking() && self.answer_for(&q.id).is_none())
            .collect()
    }

    pub fn has_blocking_questions(&self) -> bool {
        !self.unanswered_blocking().is_empty()
    }

    /// Ids of all questions still lacking an answer (any priority).
    pub fn unanswered_ids(&self) -> Vec<String> {
        self.pending_questions
            .iter()
            .filter(|q| self.answer_for(&q.id).is_none())
            .map(|q| q.id.clone())
            .collect()
    }

    pub fn mark_stage_complete(&mut self, stage: PipelineStage) {
        self.completed_stages.insert(stage);
    }

    /// Overall progress in `0..=100`, from completed-stage weights.
    pub fn progress(&self) -> u8 {
        self.completed_stages
            .iter()
            .map(|s| s.progress_weight())
            .sum()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
