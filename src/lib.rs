//! # Suitability Pipeline
//!
//! Execution engine for an interactive, streaming analysis pipeline that
//! evaluates a natural-language problem description against a fixed rubric
//! of seven dimensions and produces a verdict with supporting artifacts.
//!
//! A run advances through five stages — screening, per-dimension analysis,
//! verdict synthesis, secondary analyses (risks, alternatives, architecture),
//! and final narrative synthesis — and may suspend between stages to collect
//! answers to blocking questions before resuming.
//!
//! The LLM-backed analyzer bodies, prompt text, and the HTTP/SSE transport
//! live outside this crate. What lives here is the machinery between them:
//!
//! - **[`RunManager`]** — run lifecycle: `start_pipeline`, `resume_pipeline`,
//!   `resume_stateless`, `cancel_run`, `run_status`, `cleanup_run`.
//! - **[`Orchestrator`]** — the sequential stage driver with parallel
//!   fan-out, suspension, partial-failure policy, and terminal transitions.
//! - **[`run_step`]** — per-call timeout, classification, retry with
//!   backoff, cancellation; every analyzer invocation goes through it.
//! - **[`EventBus`]** — ordered, lossless, single-subscriber event stream
//!   feeding the transport's SSE writer.
//! - **[`Analyzer`]** — the async trait the LLM layer implements;
//!   [`MockAnalyzer`] ships for deterministic tests.
//! - **[`SnapshotStore`]** — optional persistence seam for cross-process
//!   resume; without it, resume falls back to stateless restart.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use suitability_pipeline::{MockAnalyzer, PipelineConfig, PipelineInput, RunManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = RunManager::new(Arc::new(MockAnalyzer::new()), PipelineConfig::from_env());
//!
//!     let mut handle = manager
//!         .start_pipeline(PipelineInput::new(
//!             "Classify inbound support tickets into 12 categories; \
//!              mislabels are human-reviewed.",
//!         ))
//!         .await?;
//!
//!     // forward events to the SSE writer
//!     tokio::spawn(async move {
//!         while let Some(event) = handle.events.recv().await {
//!             println!("{}", serde_json::to_string(&event).unwrap());
//!         }
//!     });
//!
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod assemble;
pub mod backoff;
pub mod classify;
pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod orchestrator;
pub mod parallel;
pub mod snapshot;
pub mod state;
pub mod step;
pub mod types;

pub use analyzer::{Analyzer, MockAnalyzer, SecondaryContext, SynthesisContext};
pub use assemble::assemble_result;
pub use backoff::RetryOptions;
pub use classify::classify_error;
pub use config::{PipelineConfig, ResumeMode};
pub use error::{ErrorCode, ExecutorError};
pub use events::{EventBus, EventStream, PipelineEvent};
pub use manager::{RunHandle, RunManager, RunStatusReport};
pub use orchestrator::{Orchestrator, PipelineOutcome};
pub use parallel::{run_all, ErrorStrategy, Settled};
pub use snapshot::{MemorySnapshotStore, RunSnapshot, SnapshotStore};
pub use state::RunState;
pub use step::{run_step, StepHooks, StepOptions};
pub use types::{
    AnalysisResult, DimensionAnalysis, DimensionId, FollowUpQuestion, PipelineInput,
    PipelineStage, QuestionPriority, RunStatus, ScreeningOutput, UserAnswer, Verdict,
    VerdictResult,
};
