//! Deterministic assembly of the final [`AnalysisResult`].
//!
//! Child-task completion order within a stage is nondeterministic; the
//! assembled result is not. Dimensions are sorted lexicographically by id,
//! answered questions keep their insertion order, and key factors fall back
//! to a fixed derivation when the verdict did not provide any.

use crate::state::RunState;
use crate::types::{
    epoch_ms, AnalysisResult, DimensionAnalysis, DimensionId, DimensionScore, Influence,
    KeyFactor, PipelineStage,
};

/// Build the result from whatever subset of stages has completed.
///
/// Used both for the terminal success path and for partial results on
/// failure, so every stage field is optional-tolerant.
pub fn assemble_result(state: &RunState) -> AnalysisResult {
    let mut dimensions: Vec<DimensionAnalysis> = state.dimensions.values().cloned().collect();

    // A completed dimensions stage reports all seven slots; the ones that
    // failed under continue-with-partial appear as neutral defaults.
    if state.completed_stages.contains(&PipelineStage::Dimensions) {
        for id in DimensionId::ALL {
            if !state.dimensions.contains_key(&id) {
                dimensions.push(DimensionAnalysis::neutral_default(id));
            }
        }
    }
    dimensions.sort_by_key(|d| d.id.as_str());

    let key_factors = match &state.verdict {
        Some(v) if !v.key_factors.is_empty() => v.key_factors.clone(),
        _ => derive_key_factors(&dimensions),
    };

    let completed_at = state.completed_at.unwrap_or_else(epoch_ms);

    AnalysisResult {
        run_id: state.run_id,
        screening: state.screening.clone(),
        dimensions,
        verdict: state.verdict.clone(),
        key_factors,
        risks: state.risks.clone().unwrap_or_default(),
        alternatives: state.alternatives.clone().unwrap_or_default(),
        architecture: state.architecture.clone(),
        questions_before_building: state.questions_before_building.clone().unwrap_or_default(),
        reasoning: state.final_reasoning.clone(),
        answered_questions: state.answers.clone(),
        duration_ms: completed_at - state.started_at,
    }
}

/// Derive key factors from dimension scores when the verdict carried none.
fn derive_key_factors(dimensions: &[DimensionAnalysis]) -> Vec<KeyFactor> {
    dimensions
        .iter()
        .map(|d| {
            let influence = match d.score {
                DimensionScore::Favorable if d.weight >= 0.7 => Influence::StronglyPositive,
                DimensionScore::Favorable => Influence::Positive,
                DimensionScore::Unfavorable if d.weight >= 0.7 => Influence::StronglyNegative,
                DimensionScore::Unfavorable => Influence::Negative,
                DimensionScore::Neutral => Influence::Neutral,
            };
            KeyFactor {
                dimension_id: d.id,
                influence,
                note: d.reasoning.clone(),
            }
        })
        .collect()
}
