//! Typed run events and the per-run event bus.
//!
//! Every run has exactly one producer (the orchestrator, plus the manager
//! for lifecycle errors) and one consumer (the transport). Events are
//! delivered in emission order over a bounded channel: a slow subscriber
//! blocks the producer rather than dropping anything, and emits after
//! unsubscribe are discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::types::{
    Alternative, AnalysisResult, DimensionAnalysis, DimensionId, FollowUpQuestion, PartialInsight,
    PipelineStage, PreBuildQuestion, PreliminarySignal, RecommendedArchitecture, RiskFactor,
    ScreeningOutput, VerdictResult,
};

/// Events emitted over the lifetime of a run.
///
/// The serde `type` tag carries the literal SSE event name
/// (e.g. `"pipeline:start"`).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    #[serde(rename = "pipeline:start", rename_all = "camelCase")]
    PipelineStart { run_id: Uuid, timestamp: i64 },

    #[serde(rename = "pipeline:stage")]
    StageChanged { stage: PipelineStage },

    #[serde(rename = "pipeline:resumed", rename_all = "camelCase")]
    PipelineResumed {
        run_id: Uuid,
        from_step: PipelineStage,
    },

    #[serde(rename = "pipeline:complete")]
    PipelineComplete { result: Box<AnalysisResult> },

    #[serde(rename = "pipeline:error")]
    PipelineError {
        code: ErrorCode,
        message: String,
        recoverable: bool,
    },

    #[serde(rename = "screening:start")]
    ScreeningStart {},

    #[serde(rename = "screening:complete")]
    ScreeningComplete { output: ScreeningOutput },

    #[serde(rename = "screening:question")]
    ScreeningQuestion { question: FollowUpQuestion },

    #[serde(rename = "screening:insight")]
    ScreeningInsight { insight: PartialInsight },

    #[serde(rename = "screening:signal")]
    ScreeningSignal { signal: PreliminarySignal },

    #[serde(rename = "dimension:start", rename_all = "camelCase")]
    DimensionStart { dimension_id: DimensionId },

    #[serde(rename = "dimension:complete", rename_all = "camelCase")]
    DimensionComplete {
        dimension_id: DimensionId,
        analysis: DimensionAnalysis,
    },

    #[serde(rename = "dimension:question")]
    DimensionQuestion { question: FollowUpQuestion },

    #[serde(rename = "verdict:computing")]
    VerdictComputing {},

    #[serde(rename = "verdict:result")]
    VerdictResult { result: VerdictResult },

    #[serde(rename = "risks:start")]
    RisksStart {},

    #[serde(rename = "risks:complete")]
    RisksComplete { risks: Vec<RiskFactor> },

    #[serde(rename = "alternatives:start")]
    AlternativesStart {},

    #[serde(rename = "alternatives:complete")]
    AlternativesComplete { alternatives: Vec<Alternative> },

    #[serde(rename = "architecture:start")]
    ArchitectureStart {},

    #[serde(rename = "architecture:complete")]
    ArchitectureComplete {
        architecture: Option<RecommendedArchitecture>,
    },

    #[serde(rename = "preBuild:complete")]
    PreBuildComplete { questions: Vec<PreBuildQuestion> },

    #[serde(rename = "reasoning:start")]
    ReasoningStart {},

    #[serde(rename = "reasoning:complete")]
    ReasoningComplete { reasoning: String },

    #[serde(rename = "answer:received", rename_all = "camelCase")]
    AnswerReceived { question_id: String, answer: String },
}

impl PipelineEvent {
    /// The SSE event name for this event.
    pub fn tag(&self) -> &'static str {
        match self {
            PipelineEvent::PipelineStart { .. } => "pipeline:start",
            PipelineEvent::StageChanged { .. } => "pipeline:stage",
            PipelineEvent::PipelineResumed { .. } => "pipeline:resumed",
            PipelineEvent::PipelineComplete { .. } => "pipeline:complete",
            PipelineEvent::PipelineError { .. } => "pipeline:error",
            PipelineEvent::ScreeningStart {} => "screening:start",
            PipelineEvent::ScreeningComplete { .. } => "screening:complete",
            PipelineEvent::ScreeningQuestion { .. } => "screening:question",
            PipelineEvent::ScreeningInsight { .. } => "screening:insight",
            PipelineEvent::ScreeningSignal { .. } => "screening:signal",
            PipelineEvent::DimensionStart { .. } => "dimension:start",
            PipelineEvent::DimensionComplete { .. } => "dimension:complete",
            PipelineEvent::DimensionQuestion { .. } => "dimension:question",
            PipelineEvent::VerdictComputing {} => "verdict:computing",
            PipelineEvent::VerdictResult { .. } => "verdict:result",
            PipelineEvent::RisksStart {} => "risks:start",
            PipelineEvent::RisksComplete { .. } => "risks:complete",
            PipelineEvent::AlternativesStart {} => "alternatives:start",
            PipelineEvent::AlternativesComplete { .. } => "alternatives:complete",
            PipelineEvent::ArchitectureStart {} => "architecture:start",
            PipelineEvent::ArchitectureComplete { .. } => "architecture:complete",
            PipelineEvent::PreBuildComplete { .. } => "preBuild:complete",
            PipelineEvent::ReasoningStart {} => "reasoning:start",
            PipelineEvent::ReasoningComplete { .. } => "reasoning:complete",
            PipelineEvent::AnswerReceived { .. } => "answer:received",
        }
    }
}

/// Producer half of a run's event channel.
///
/// Cheap to clone; the manager and the orchestrator share one.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<PipelineEvent>,
    open: Arc<AtomicBool>,
}

/// Consumer half, handed to the transport.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<PipelineEvent>,
    open: Arc<AtomicBool>,
}

impl EventBus {
    /// Create a connected producer/consumer pair with the given buffer.
    pub fn channel(capacity: usize) -> (EventBus, EventStream) {
        let (tx, rx) = mpsc::channel(capacity);
        let open = Arc::new(AtomicBool::new(true));
        (
            EventBus {
                tx,
                open: open.clone(),
            },
            EventStream { rx, open },
        )
    }

    /// Deliver an event to the subscriber.
    ///
    /// Blocks when the buffer is full (backpressure on the producer).
    /// Discards silently once the subscriber has unsubscribed or dropped.
    pub async fn emit(&self, event: PipelineEvent) {
        if !self.open.load(Ordering::Acquire) {
            tracing::trace!(event = event.tag(), "discarding event: subscriber gone");
            return;
        }
        if self.tx.send(event).await.is_err() {
            self.open.store(false, Ordering::Release);
        }
    }

    /// Whether a subscriber is still attached.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl EventStream {
    /// Receive the next event; `None` once the producer side is gone and
    /// the buffer is drained.
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        self.rx.recv().await
    }

    /// Non-blocking receive: the next buffered event, or `None` when the
    /// buffer is currently empty or the channel is closed.
    pub fn try_recv(&mut self) -> Option<PipelineEvent> {
        self.rx.try_recv().ok()
    }

    /// Detach from the bus. Idempotent and safe to call while the producer
    /// is emitting; events after this point are discarded.
    pub fn unsubscribe(&mut self) {
        self.open.store(false, Ordering::Release);
        self.rx.close();
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.open.store(false, Ordering::Release);
    }
}
