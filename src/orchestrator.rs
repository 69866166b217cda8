//! Sequential stage driver for a single run.
//!
//! The orchestrator owns the run's mutation rights: it advances the five
//! stages in order, fans dimension and secondary analyses out through the
//! parallel runner, folds outputs into [`RunState`], emits events, and
//! decides the terminal transition. Suspension happens only at stage
//! boundaries: before entering the stage that follows screening or
//! dimensions, any unanswered blocking question parks the run.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::Instrument;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::analyzer::{Analyzer, SecondaryContext, SynthesisContext};
use crate::assemble::assemble_result;
use crate::config::PipelineConfig;
use crate::error::{ErrorCode, ExecutorError};
use crate::events::{EventBus, PipelineEvent};
use crate::parallel::{run_all, ErrorStrategy, Settled};
use crate::snapshot::{RunSnapshot, SnapshotStore};
use crate::state::RunState;
use crate::step::{run_step, StepHooks};
use crate::types::{
    epoch_ms, AnalysisResult, AnalysisStatus, Alternative, ArchitectureOutput, DimensionAnalysis,
    DimensionId, PipelineStage, RiskFactor, RunStatus,
};

/// How a run ended (or paused), as reported to the caller of `start`/`resume`.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// All five stages completed.
    Completed(Box<AnalysisResult>),
    /// Parked on unanswered blocking questions; resume with answers.
    Suspended {
        run_id: Uuid,
        stage: PipelineStage,
        pending_questions: Vec<String>,
    },
    /// A non-recoverable error escaped a stage.
    Failed {
        error: ExecutorError,
        partial: Box<AnalysisResult>,
    },
    /// The run was cancelled.
    Cancelled { run_id: Uuid },
}

enum DriveEnd {
    Completed,
    Suspended {
        stage: PipelineStage,
        pending_questions: Vec<String>,
    },
}

enum SecondarySlot {
    Risks(Vec<RiskFactor>),
    Alternatives(Vec<Alternative>),
    Architecture(ArchitectureOutput),
}

type SecondaryMaker = Box<
    dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<SecondarySlot, ExecutorError>>
        + Send,
>;

/// Drives one run from its current state to suspension or a terminal state.
pub struct Orchestrator {
    analyzer: Arc<dyn Analyzer>,
    config: PipelineConfig,
    bus: EventBus,
    cancel: CancellationToken,
    state: Arc<Mutex<RunState>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
}

impl Orchestrator {
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        config: PipelineConfig,
        bus: EventBus,
        cancel: CancellationToken,
        state: Arc<Mutex<RunState>>,
        snapshots: Option<Arc<dyn SnapshotStore>>,
    ) -> Self {
        Self {
            analyzer,
            config,
            bus,
            cancel,
            state,
            snapshots,
        }
    }

    /// Run to suspension or a terminal state, enforcing the whole-pipeline
    /// deadline.
    pub async fn run(self) -> PipelineOutcome {
        let run_id = self.state.lock().await.run_id;
        let span = tracing::info_span!("pipeline_run", run_id = %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> PipelineOutcome {
        let outcome = tokio::select! {
            out = self.drive() => out,
            _ = tokio::time::sleep(self.config.pipeline_timeout) => {
                self.cancel.cancel();
                let stage = self.state.lock().await.stage;
                Err(ExecutorError::new(
                    ErrorCode::Timeout,
                    format!(
                        "pipeline exceeded {}ms overall deadline",
                        self.config.pipeline_timeout.as_millis()
                    ),
                    stage,
                ))
            }
        };

        self.finish(run_id, outcome).await
    }

    async fn drive(&self) -> Result<DriveEnd, ExecutorError> {
        for stage in PipelineStage::ALL {
            // suspension gate: no stage after screening or dimensions starts
            // while a blocking question is unanswered
            if matches!(stage, PipelineStage::Dimensions | PipelineStage::Verdict) {
                if let Some(end) = self.suspend_if_blocked().await {
                    return Ok(end);
                }
            }

            let already_done = {
                let state = self.state.lock().await;
                state.completed_stages.contains(&stage)
            };
            if already_done {
                continue;
            }
            if self.cancel.is_cancelled() {
                return Err(ExecutorError::cancelled(stage));
            }

            match stage {
                PipelineStage::Screening => self.run_screening().await?,
                PipelineStage::Dimensions => self.run_dimensions().await?,
                PipelineStage::Verdict => self.run_verdict().await?,
                PipelineStage::Secondary => self.run_secondary().await?,
                PipelineStage::Synthesis => self.run_synthesis().await?,
            }

            self.state.lock().await.mark_stage_complete(stage);
            self.persist().await;
        }
        Ok(DriveEnd::Completed)
    }

    /// Park the run if blocking questions are unanswered. The reported stage
    /// is the one that surfaced the questions (current `state.stage`).
    async fn suspend_if_blocked(&self) -> Option<DriveEnd> {
        let (blocked, stage, pending) = {
            let state = self.state.lock().await;
            let pending: Vec<String> = state
                .unanswered_blocking()
                .iter()
                .map(|q| q.id.clone())
                .collect();
            (!pending.is_empty(), state.stage, pending)
        };
        if !blocked {
            return None;
        }
        {
            let mut state = self.state.lock().await;
            state.status = RunStatus::Suspended;
        }
        self.persist().await;
        tracing::info!(stage = %stage, pending = pending.len(), "run suspended on blocking questions");
        Some(DriveEnd::Suspended {
            stage,
            pending_questions: pending,
        })
    }

    async fn enter_stage(&self, stage: PipelineStage) {
        {
            let mut state = self.state.lock().await;
            state.stage = stage;
        }
        tracing::info!(stage = %stage, "entering stage");
        self.bus.emit(PipelineEvent::StageChanged { stage }).await;
    }

    async fn run_screening(&self) -> Result<(), ExecutorError> {
        self.enter_stage(PipelineStage::Screening).await;
        self.bus.emit(PipelineEvent::ScreeningStart {}).await;

        let (input, answers) = {
            let state = self.state.lock().await;
            (state.input.clone(), state.answers.clone())
        };
        let analyzer = self.analyzer.clone();
        let cancel = self.cancel.clone();
        let output = run_step(
            move || {
                let analyzer = analyzer.clone();
                let input = input.clone();
                let answers = answers.clone();
                let cancel = cancel.clone();
                async move { analyzer.screening(&input, &answers, &cancel).await }
            },
            PipelineStage::Screening,
            self.config.step_options(PipelineStage::Screening),
            &self.cancel,
            StepHooks::none(),
        )
        .await?;

        {
            let mut state = self.state.lock().await;
            state.push_questions(&output.clarifying_questions);
            state.screening = Some(output.clone());
        }
        for question in &output.clarifying_questions {
            self.bus
                .emit(PipelineEvent::ScreeningQuestion {
                    question: question.clone(),
                })
                .await;
        }
        for insight in &output.partial_insights {
            self.bus
                .emit(PipelineEvent::ScreeningInsight {
                    insight: insight.clone(),
                })
                .await;
        }
        self.bus
            .emit(PipelineEvent::ScreeningSignal {
                signal: output.preliminary_signal,
            })
            .await;
        self.bus
            .emit(PipelineEvent::ScreeningComplete { output })
            .await;
        Ok(())
    }

    async fn run_dimensions(&self) -> Result<(), ExecutorError> {
        self.enter_stage(PipelineStage::Dimensions).await;

        let (input, screening, answers) = {
            let state = self.state.lock().await;
            (
                state.input.clone(),
                state.screening.clone(),
                state.answers.clone(),
            )
        };
        let Some(screening) = screening else {
            return Err(ExecutorError::new(
                ErrorCode::Unknown,
                "screening output missing from run state",
                PipelineStage::Dimensions,
            ));
        };

        for id in DimensionId::ALL {
            self.bus
                .emit(PipelineEvent::DimensionStart { dimension_id: id })
                .await;
        }

        let opts = self.config.dimensions.clone();
        let makers: Vec<_> = DimensionId::ALL
            .into_iter()
            .map(|id| {
                let analyzer = self.analyzer.clone();
                let input = input.clone();
                let screening = screening.clone();
                let answers = answers.clone();
                let opts = opts.clone();
                move |token: CancellationToken| async move {
                    let call_token = token.clone();
                    run_step(
                        move || {
                            let analyzer = analyzer.clone();
                            let input = input.clone();
                            let screening = screening.clone();
                            let answers = answers.clone();
                            let token = call_token.clone();
                            async move {
                                analyzer
                                    .dimension(id, &input, &screening, &answers, &token)
                                    .await
                            }
                        },
                        PipelineStage::Dimensions,
                        &opts,
                        &token,
                        StepHooks::none(),
                    )
                    .await
                }
            })
            .collect();

        let settled = run_all(
            makers,
            PipelineStage::Dimensions,
            self.config.error_strategy,
            &self.cancel,
        )
        .await;

        if self.cancel.is_cancelled() {
            return Err(ExecutorError::cancelled(PipelineStage::Dimensions));
        }

        let mut fatal: Option<ExecutorError> = None;
        for Settled { index, outcome } in settled {
            let id = DimensionId::ALL[index];
            match outcome {
                Ok(mut analysis) => {
                    analysis.id = id;
                    analysis.status = AnalysisStatus::Complete;
                    {
                        let mut state = self.state.lock().await;
                        state.push_questions(&analysis.info_gaps);
                        state.dimensions.insert(id, analysis.clone());
                    }
                    for question in &analysis.info_gaps {
                        self.bus
                            .emit(PipelineEvent::DimensionQuestion {
                                question: question.clone(),
                            })
                            .await;
                    }
                    self.bus
                        .emit(PipelineEvent::DimensionComplete {
                            dimension_id: id,
                            analysis,
                        })
                        .await;
                }
                Err(err) => match self.config.error_strategy {
                    ErrorStrategy::FailFast => {
                        // prefer the originating failure over sibling
                        // cancellations triggered by it
                        match &fatal {
                            None => fatal = Some(err),
                            Some(existing) if existing.is_cancelled() && !err.is_cancelled() => {
                                fatal = Some(err)
                            }
                            _ => {}
                        }
                    }
                    ErrorStrategy::ContinueWithPartial => {
                        if err.is_cancelled() {
                            fatal.get_or_insert(err);
                        } else {
                            tracing::warn!(dimension = %id, "dimension failed, continuing with partial results");
                            self.record_error(&err).await;
                        }
                    }
                },
            }
        }
        if let Some(err) = fatal {
            return Err(err);
        }
        Ok(())
    }

    async fn run_verdict(&self) -> Result<(), ExecutorError> {
        // progress signal precedes the stage transition in the event stream
        self.bus.emit(PipelineEvent::VerdictComputing {}).await;
        self.enter_stage(PipelineStage::Verdict).await;

        let (input, screening, dimensions) = {
            let state = self.state.lock().await;
            (
                state.input.clone(),
                state.screening.clone(),
                padded_dimensions(&state.dimensions),
            )
        };
        let Some(screening) = screening else {
            return Err(ExecutorError::new(
                ErrorCode::Unknown,
                "screening output missing from run state",
                PipelineStage::Verdict,
            ));
        };

        let analyzer = self.analyzer.clone();
        let cancel = self.cancel.clone();
        let verdict = run_step(
            move || {
                let analyzer = analyzer.clone();
                let input = input.clone();
                let screening = screening.clone();
                let dimensions = dimensions.clone();
                let cancel = cancel.clone();
                async move {
                    analyzer
                        .verdict(&input, &screening, &dimensions, &cancel)
                        .await
                }
            },
            PipelineStage::Verdict,
            self.config.step_options(PipelineStage::Verdict),
            &self.cancel,
            StepHooks::none(),
        )
        .await?;

        {
            let mut state = self.state.lock().await;
            state.verdict = Some(verdict.clone());
        }
        self.bus
            .emit(PipelineEvent::VerdictResult { result: verdict })
            .await;
        Ok(())
    }

    async fn run_secondary(&self) -> Result<(), ExecutorError> {
        self.enter_stage(PipelineStage::Secondary).await;
        self.bus.emit(PipelineEvent::RisksStart {}).await;
        self.bus.emit(PipelineEvent::AlternativesStart {}).await;
        self.bus.emit(PipelineEvent::ArchitectureStart {}).await;

        let ctx = {
            let state = self.state.lock().await;
            let Some(verdict) = state.verdict.clone() else {
                return Err(ExecutorError::new(
                    ErrorCode::Unknown,
                    "verdict missing from run state",
                    PipelineStage::Secondary,
                ));
            };
            SecondaryContext {
                input: state.input.clone(),
                dimensions: padded_dimensions(&state.dimensions),
                verdict,
            }
        };

        let opts = self.config.secondary.clone();
        let make = |kind: u8| -> SecondaryMaker {
            let analyzer = self.analyzer.clone();
            let ctx = ctx.clone();
            let opts = opts.clone();
            Box::new(
                move |token: CancellationToken| -> BoxFuture<'static, Result<SecondarySlot, ExecutorError>> {
                    Box::pin(async move {
                    let call_token = token.clone();
                    run_step(
                        move || {
                            let analyzer = analyzer.clone();
                            let ctx = ctx.clone();
                            let token = call_token.clone();
                            async move {
                                match kind {
                                    0 => analyzer
                                        .risks(&ctx, &token)
                                        .await
                                        .map(SecondarySlot::Risks),
                                    1 => analyzer
                                        .alternatives(&ctx, &token)
                                        .await
                                        .map(SecondarySlot::Alternatives),
                                    _ => analyzer
                                        .architecture(&ctx, &token)
                                        .await
                                        .map(SecondarySlot::Architecture),
                                }
                            }
                        },
                        PipelineStage::Secondary,
                        &opts,
                        &token,
                        StepHooks::none(),
                    )
                    .await
                    })
                },
            )
        };
        let makers: Vec<SecondaryMaker> = vec![make(0), make(1), make(2)];

        let settled = run_all(
            makers,
            PipelineStage::Secondary,
            self.config.error_strategy,
            &self.cancel,
        )
        .await;

        if self.cancel.is_cancelled() {
            return Err(ExecutorError::cancelled(PipelineStage::Secondary));
        }

        let mut risks: Vec<RiskFactor> = Vec::new();
        let mut alternatives: Vec<Alternative> = Vec::new();
        let mut architecture = ArchitectureOutput {
            architecture: None,
            questions_before_building: Vec::new(),
        };

        for Settled { index, outcome } in settled {
            match outcome {
                Ok(SecondarySlot::Risks(value)) => risks = value,
                Ok(SecondarySlot::Alternatives(value)) => alternatives = value,
                Ok(SecondarySlot::Architecture(value)) => architecture = value,
                Err(err) => match self.config.error_strategy {
                    ErrorStrategy::FailFast => return Err(err),
                    ErrorStrategy::ContinueWithPartial => {
                        if err.is_cancelled() {
                            return Err(err);
                        }
                        tracing::warn!(
                            slot = index,
                            "secondary analysis failed, substituting default"
                        );
                        self.record_error(&err).await;
                        // the slot keeps its empty default
                    }
                },
            }
        }

        {
            let mut state = self.state.lock().await;
            state.risks = Some(risks.clone());
            state.alternatives = Some(alternatives.clone());
            state.architecture = architecture.architecture.clone();
            state.questions_before_building =
                Some(architecture.questions_before_building.clone());
        }

        self.bus.emit(PipelineEvent::RisksComplete { risks }).await;
        self.bus
            .emit(PipelineEvent::AlternativesComplete { alternatives })
            .await;
        self.bus
            .emit(PipelineEvent::ArchitectureComplete {
                architecture: architecture.architecture,
            })
            .await;
        self.bus
            .emit(PipelineEvent::PreBuildComplete {
                questions: architecture.questions_before_building,
            })
            .await;
        Ok(())
    }

    async fn run_synthesis(&self) -> Result<(), ExecutorError> {
        self.enter_stage(PipelineStage::Synthesis).await;
        self.bus.emit(PipelineEvent::ReasoningStart {}).await;

        let ctx = {
            let state = self.state.lock().await;
            let (Some(screening), Some(verdict)) =
                (state.screening.clone(), state.verdict.clone())
            else {
                return Err(ExecutorError::new(
                    ErrorCode::Unknown,
                    "synthesis requires screening and verdict in run state",
                    PipelineStage::Synthesis,
                ));
            };
            SynthesisContext {
                input: state.input.clone(),
                screening,
                dimensions: padded_dimensions(&state.dimensions),
                answers: state.answers.clone(),
                verdict,
                risks: state.risks.clone().unwrap_or_default(),
                alternatives: state.alternatives.clone().unwrap_or_default(),
                architecture: state.architecture.clone(),
                questions_before_building: state
                    .questions_before_building
                    .clone()
                    .unwrap_or_default(),
            }
        };

        let analyzer = self.analyzer.clone();
        let cancel = self.cancel.clone();
        let reasoning = run_step(
            move || {
                let analyzer = analyzer.clone();
                let ctx = ctx.clone();
                let cancel = cancel.clone();
                async move { analyzer.synthesize(&ctx, &cancel).await }
            },
            PipelineStage::Synthesis,
            self.config.step_options(PipelineStage::Synthesis),
            &self.cancel,
            StepHooks::none(),
        )
        .await?;

        {
            let mut state = self.state.lock().await;
            state.final_reasoning = Some(reasoning.clone());
        }
        self.bus
            .emit(PipelineEvent::ReasoningComplete { reasoning })
            .await;
        Ok(())
    }

    /// Append an error to the run record and emit its event. The two always
    /// travel together, exactly once per error.
    async fn record_error(&self, err: &ExecutorError) {
        {
            let mut state = self.state.lock().await;
            state.errors.push(err.clone());
        }
        self.bus
            .emit(PipelineEvent::PipelineError {
                code: err.code,
                message: err.message.clone(),
                recoverable: err.recoverable,
            })
            .await;
    }

    async fn persist(&self) {
        if let Some(store) = &self.snapshots {
            let snapshot = {
                let state = self.state.lock().await;
                RunSnapshot::capture(&state)
            };
            if let Err(err) = store.save(&snapshot).await {
                tracing::error!("snapshot save failed: {:#}", err);
            }
        }
    }

    async fn finish(
        &self,
        run_id: Uuid,
        outcome: Result<DriveEnd, ExecutorError>,
    ) -> PipelineOutcome {
        match outcome {
            Ok(DriveEnd::Completed) => {
                {
                    let mut state = self.state.lock().await;
                    state.status = RunStatus::Completed;
                    state.completed_at = Some(epoch_ms());
                }
                self.persist().await;
                let result = {
                    let state = self.state.lock().await;
                    assemble_result(&state)
                };
                self.bus
                    .emit(PipelineEvent::PipelineComplete {
                        result: Box::new(result.clone()),
                    })
                    .await;
                tracing::info!("run completed");
                PipelineOutcome::Completed(Box::new(result))
            }
            Ok(DriveEnd::Suspended {
                stage,
                pending_questions,
            }) => PipelineOutcome::Suspended {
                run_id,
                stage,
                pending_questions,
            },
            Err(err) if err.is_cancelled() => {
                let already_recorded = {
                    let state = self.state.lock().await;
                    state.status == RunStatus::Cancelled
                };
                if !already_recorded {
                    {
                        let mut state = self.state.lock().await;
                        state.status = RunStatus::Cancelled;
                        state.completed_at = Some(epoch_ms());
                    }
                    self.record_error(&err).await;
                }
                self.persist().await;
                tracing::info!("run cancelled");
                PipelineOutcome::Cancelled { run_id }
            }
            Err(err) => {
                {
                    let mut state = self.state.lock().await;
                    state.status = RunStatus::Failed;
                    state.completed_at = Some(epoch_ms());
                }
                self.record_error(&err).await;
                self.persist().await;
                let partial = {
                    let state = self.state.lock().await;
                    assemble_result(&state)
                };
                tracing::error!(code = err.code.as_str(), "run failed: {}", err.message);
                PipelineOutcome::Failed {
                    error: err,
                    partial: Box::new(partial),
                }
            }
        }
    }
}

/// The full seven-dimension view handed to downstream analyzers: absent
/// dimensions appear as neutral, zero-weight defaults.
fn padded_dimensions(
    dimensions: &BTreeMap<DimensionId, DimensionAnalysis>,
) -> BTreeMap<DimensionId, DimensionAnalysis> {
    let mut padded = dimensions.clone();
    for id in DimensionId::ALL {
        padded
            .entry(id)
            .or_insert_with(|| DimensionAnalysis::neutral_default(id));
    }
    padded
}
