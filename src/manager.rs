//! Run lifecycle ownership: start, resume, cancel, status, cleanup.
//!
//! One [`RunManager`] owns every live run in the process, keyed by run id.
//! It is plain dependency-injected state — construct one per service (or per
//! test) rather than reaching for a global. The transport gets back a
//! [`RunHandle`]: the event subscription plus a oneshot carrying the final
//! [`PipelineOutcome`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::analyzer::Analyzer;
use crate::config::PipelineConfig;
use crate::error::{ErrorCode, ExecutorError};
use crate::events::{EventBus, EventStream, PipelineEvent};
use crate::orchestrator::{Orchestrator, PipelineOutcome};
use crate::snapshot::SnapshotStore;
use crate::state::RunState;
use crate::types::{epoch_ms, PipelineInput, PipelineStage, RunStatus, UserAnswer};

struct RunEntry {
    state: Arc<Mutex<RunState>>,
    cancel: CancellationToken,
    bus: EventBus,
}

/// What a caller gets back from `start_pipeline` / `resume_pipeline`.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: Uuid,
    /// Ordered event subscription; one per run.
    pub events: EventStream,
    /// Resolves once the orchestrator reaches suspension or a terminal state.
    pub outcome: oneshot::Receiver<PipelineOutcome>,
}

/// Point-in-time view of a run, served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatusReport {
    pub run_id: Uuid,
    pub stage: PipelineStage,
    pub status: RunStatus,
    /// Ids of surfaced questions that still lack an answer.
    pub pending_questions: Vec<String>,
    pub errors: Vec<ExecutorError>,
    pub started_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    /// 0..=100, from completed-stage weights.
    pub progress: u8,
}

/// Owns run state and orchestrator tasks for every live run.
pub struct RunManager {
    analyzer: Arc<dyn Analyzer>,
    config: PipelineConfig,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    runs: Mutex<HashMap<Uuid, RunEntry>>,
}

impl RunManager {
    pub fn new(analyzer: Arc<dyn Analyzer>, config: PipelineConfig) -> Self {
        Self {
            analyzer,
            config,
            snapshots: None,
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a snapshot store; enables snapshot resume across processes.
    pub fn with_snapshots(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(store);
        self
    }

    /// Validate the input, seed a fresh run, and spawn its orchestrator.
    ///
    /// `pipeline:start` is emitted before this returns, so the subscriber
    /// always sees it first.
    pub async fn start_pipeline(&self, input: PipelineInput) -> Result<RunHandle, ExecutorError> {
        input.validate().map_err(|message| {
            ExecutorError::new(
                ErrorCode::SchemaValidation,
                message,
                PipelineStage::Screening,
            )
        })?;

        let run_id = Uuid::new_v4();
        let state = Arc::new(Mutex::new(RunState::new(run_id, input)));
        let (bus, events) = EventBus::channel(self.config.event_buffer);
        let cancel = CancellationToken::new();

        bus.emit(PipelineEvent::PipelineStart {
            run_id,
            timestamp: epoch_ms(),
        })
        .await;

        self.runs.lock().await.insert(
            run_id,
            RunEntry {
                state: state.clone(),
                cancel: cancel.clone(),
                bus: bus.clone(),
            },
        );

        let outcome = self.spawn_orchestrator(state, bus, cancel);
        tracing::info!(run_id = %run_id, "pipeline started");
        Ok(RunHandle {
            run_id,
            events,
            outcome,
        })
    }

    /// Resume a suspended run in place (snapshot mode).
    ///
    /// The run must be suspended; its state is taken from memory or, when
    /// this process never saw the run, reloaded from the snapshot store.
    /// Answers merge over existing ones by question id.
    pub async fn resume_pipeline(
        &self,
        run_id: Uuid,
        answers: Vec<UserAnswer>,
    ) -> Result<RunHandle, ExecutorError> {
        let state = match self.lookup_state(run_id).await {
            Some(state) => state,
            None => self.restore_from_snapshot(run_id).await?,
        };

        let from_step = {
            let mut s = state.lock().await;
            if s.status != RunStatus::Suspended {
                return Err(ExecutorError::new(
                    ErrorCode::Unknown,
                    format!("run {} is not suspended", run_id),
                    s.stage,
                ));
            }
            for answer in &answers {
                s.record_answer(answer.clone());
            }
            s.status = RunStatus::Running;
            s.stage
        };

        let (bus, events) = EventBus::channel(self.config.event_buffer);
        let cancel = CancellationToken::new();

        bus.emit(PipelineEvent::PipelineResumed { run_id, from_step })
            .await;
        for answer in &answers {
            bus.emit(PipelineEvent::AnswerReceived {
                question_id: answer.question_id.clone(),
                answer: answer.answer.clone(),
            })
            .await;
        }

        self.runs.lock().await.insert(
            run_id,
            RunEntry {
                state: state.clone(),
                cancel: cancel.clone(),
                bus: bus.clone(),
            },
        );

        let outcome = self.spawn_orchestrator(state, bus, cancel);
        tracing::info!(run_id = %run_id, from_step = %from_step, "pipeline resumed");
        Ok(RunHandle {
            run_id,
            events,
            outcome,
        })
    }

    /// Stateless-restart resume: a brand-new run whose input carries the
    /// collected answers pre-applied. The old run id is only a correlation
    /// id for the client; the new run gets a fresh one.
    pub async fn resume_stateless(
        &self,
        correlation_id: Uuid,
        input: PipelineInput,
    ) -> Result<RunHandle, ExecutorError> {
        tracing::info!(
            correlation_id = %correlation_id,
            answers = input.pre_applied_answers.len(),
            "stateless restart"
        );
        self.start_pipeline(input).await
    }

    /// Snapshot of a run's externally visible status. `None` for unknown ids.
    pub async fn run_status(&self, run_id: Uuid) -> Option<RunStatusReport> {
        let state = self.lookup_state(run_id).await?;
        let s = state.lock().await;
        Some(RunStatusReport {
            run_id: s.run_id,
            stage: s.stage,
            status: s.status,
            pending_questions: s.unanswered_ids(),
            errors: s.errors.clone(),
            started_at: s.started_at,
            completed_at: s.completed_at,
            progress: s.progress(),
        })
    }

    /// Cancel a run: mark it cancelled, record and emit the `CANCELLED`
    /// error, and signal the token so in-flight work unwinds.
    ///
    /// Returns whether the run was active (running or suspended). Idempotent:
    /// repeat calls on a terminal run return `false` and change nothing.
    pub async fn cancel_run(&self, run_id: Uuid) -> bool {
        let entry = {
            let runs = self.runs.lock().await;
            runs.get(&run_id)
                .map(|e| (e.state.clone(), e.cancel.clone(), e.bus.clone()))
        };
        let Some((state, cancel, bus)) = entry else {
            return false;
        };

        let err = {
            let mut s = state.lock().await;
            if s.status.is_terminal() {
                return false;
            }
            s.status = RunStatus::Cancelled;
            s.completed_at = Some(epoch_ms());
            let err = ExecutorError::cancelled(s.stage);
            s.errors.push(err.clone());
            err
        };

        cancel.cancel();
        bus.emit(PipelineEvent::PipelineError {
            code: err.code,
            message: err.message.clone(),
            recoverable: err.recoverable,
        })
        .await;
        tracing::info!(run_id = %run_id, "run cancelled");
        true
    }

    /// Drop the run record (and its snapshots, if a store is configured).
    /// Safe to call once the transport has drained the event stream.
    pub async fn cleanup_run(&self, run_id: Uuid) -> bool {
        let removed = self.runs.lock().await.remove(&run_id).is_some();
        if removed {
            if let Some(store) = &self.snapshots {
                if let Err(err) = store.remove(run_id).await {
                    tracing::warn!(run_id = %run_id, "snapshot cleanup failed: {:#}", err);
                }
            }
            tracing::debug!(run_id = %run_id, "run record removed");
        }
        removed
    }

    async fn lookup_state(&self, run_id: Uuid) -> Option<Arc<Mutex<RunState>>> {
        let runs = self.runs.lock().await;
        runs.get(&run_id).map(|e| e.state.clone())
    }

    async fn restore_from_snapshot(
        &self,
        run_id: Uuid,
    ) -> Result<Arc<Mutex<RunState>>, ExecutorError> {
        let Some(store) = &self.snapshots else {
            return Err(ExecutorError::new(
                ErrorCode::Unknown,
                format!("unknown run {} and no snapshot store configured", run_id),
                PipelineStage::Screening,
            ));
        };
        let snapshot = store.load(run_id).await.map_err(|err| {
            ExecutorError::new(
                ErrorCode::Unknown,
                format!("snapshot load failed for run {}: {:#}", run_id, err),
                PipelineStage::Screening,
            )
        })?;
        let Some(snapshot) = snapshot else {
            return Err(ExecutorError::new(
                ErrorCode::Unknown,
                format!("unknown run {}", run_id),
                PipelineStage::Screening,
            ));
        };
        tracing::info!(run_id = %run_id, "run state restored from snapshot");
        Ok(Arc::new(Mutex::new(snapshot.state)))
    }

    fn spawn_orchestrator(
        &self,
        state: Arc<Mutex<RunState>>,
        bus: EventBus,
        cancel: CancellationToken,
    ) -> oneshot::Receiver<PipelineOutcome> {
        let (tx, rx) = oneshot::channel();
        let orchestrator = Orchestrator::new(
            self.analyzer.clone(),
            self.config.clone(),
            bus,
            cancel,
            state,
            self.snapshots.clone(),
        );
        tokio::spawn(async move {
            let outcome = orchestrator.run().await;
            let _ = tx.send(outcome);
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::MockAnalyzer;
    use crate::backoff::RetryOptions;
    use crate::snapshot::MemorySnapshotStore;
    use crate::step::StepOptions;
    use crate::types::{FollowUpQuestion, SourceStage, Verdict};
    use std::time::Duration;

    fn fast_config() -> PipelineConfig {
        let mut config = PipelineConfig::default()
            .with_pipeline_timeout(Duration::from_secs(10))
            .with_uniform_steps(StepOptions {
                max_attempts: 3,
                timeout: Duration::from_millis(500),
                retry: RetryOptions {
                    initial_delay: Duration::from_millis(2),
                    max_delay: Duration::from_millis(20),
                    backoff_multiplier: 2.0,
                },
            });
        config.event_buffer = 256;
        config
    }

    fn manager(analyzer: MockAnalyzer) -> RunManager {
        RunManager::new(Arc::new(analyzer), fast_config())
    }

    fn ticket_input() -> PipelineInput {
        PipelineInput::new(
            "Classify inbound support tickets into 12 categories; mislabels are human-reviewed.",
        )
    }

    /// Collect the buffered events of a settled run. The manager's run
    /// entry keeps the bus alive, so this drains what has been emitted
    /// rather than waiting for channel close.
    fn drain(handle: &mut RunHandle) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Assert `expected` occurs as an ordered subsequence of `tags`.
    fn assert_subsequence(tags: &[&str], expected: &[&str]) {
        let mut it = tags.iter();
        for want in expected {
            assert!(
                it.any(|t| t == want),
                "event {:?} missing or out of order in {:?}",
                want,
                tags
            );
        }
    }

    #[tokio::test]
    async fn test_happy_path_event_order() {
        let m = manager(MockAnalyzer::new());
        let mut handle = m.start_pipeline(ticket_input()).await.unwrap();

        let outcome = (&mut handle.outcome).await.unwrap();
        let result = match outcome {
            PipelineOutcome::Completed(result) => result,
            other => panic!("expected completion, got {:?}", other),
        };
        assert_eq!(result.verdict.as_ref().unwrap().verdict, Verdict::StrongFit);
        assert!((result.verdict.as_ref().unwrap().confidence - 0.88).abs() < 1e-9);

        let events = drain(&mut handle);
        let tags: Vec<&str> = events.iter().map(|e| e.tag()).collect();

        assert_eq!(tags[0], "pipeline:start");
        assert_eq!(*tags.last().unwrap(), "pipeline:complete");
        assert_subsequence(
            &tags,
            &[
                "pipeline:start",
                "pipeline:stage", // screening
                "screening:start",
                "screening:complete",
                "pipeline:stage", // dimensions
                "dimension:complete",
                "dimension:complete",
                "dimension:complete",
                "dimension:complete",
                "dimension:complete",
                "dimension:complete",
                "dimension:complete",
                "verdict:computing",
                "pipeline:stage", // verdict
                "verdict:result",
                "pipeline:stage", // secondary
                "risks:start",
                "alternatives:start",
                "architecture:start",
                "risks:complete",
                "alternatives:complete",
                "architecture:complete",
                "preBuild:complete",
                "pipeline:stage", // synthesis
                "reasoning:start",
                "reasoning:complete",
                "pipeline:complete",
            ],
        );
        assert!(!tags.contains(&"pipeline:error"));
    }

    #[tokio::test]
    async fn test_input_validation_boundaries() {
        let m = manager(MockAnalyzer::new());
        let err = m
            .start_pipeline(PipelineInput::new("x".repeat(9)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SchemaValidation);

        let err = m
            .start_pipeline(PipelineInput::new("x".repeat(5001)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SchemaValidation);

        assert!(m.start_pipeline(PipelineInput::new("x".repeat(10))).await.is_ok());
        assert!(m
            .start_pipeline(PipelineInput::new("x".repeat(5000)))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_blocking_question_suspends_then_in_memory_resume() {
        let analyzer = MockAnalyzer::new().with_screening_questions(vec![
            FollowUpQuestion::blocking("q1", "Does a human review mislabels?"),
        ]);
        let m = manager(analyzer);
        let mut handle = m.start_pipeline(ticket_input()).await.unwrap();

        let outcome = (&mut handle.outcome).await.unwrap();
        let run_id = match outcome {
            PipelineOutcome::Suspended {
                run_id,
                stage,
                pending_questions,
            } => {
                assert_eq!(stage, PipelineStage::Screening);
                assert_eq!(pending_questions, vec!["q1".to_string()]);
                run_id
            }
            other => panic!("expected suspension, got {:?}", other),
        };

        let status = m.run_status(run_id).await.unwrap();
        assert_eq!(status.status, RunStatus::Suspended);
        assert_eq!(status.pending_questions, vec!["q1".to_string()]);
        assert_eq!(status.progress, 10);

        // resume with the blocking answer; same run id continues
        let mut resumed = m
            .resume_pipeline(
                run_id,
                vec![UserAnswer::new(
                    "q1",
                    "Yes, human review exists",
                    SourceStage::Screening,
                )],
            )
            .await
            .unwrap();
        assert_eq!(resumed.run_id, run_id);

        let outcome = (&mut resumed.outcome).await.unwrap();
        let result = match outcome {
            PipelineOutcome::Completed(result) => result,
            other => panic!("expected completion after resume, got {:?}", other),
        };
        assert_eq!(result.run_id, run_id);
        assert_eq!(result.answered_questions.len(), 1);

        let events = drain(&mut resumed);
        let tags: Vec<&str> = events.iter().map(|e| e.tag()).collect();
        assert_eq!(tags[0], "pipeline:resumed");
        assert_eq!(tags[1], "answer:received");
        // screening is not re-executed on resume
        assert!(!tags.contains(&"screening:start"));
        assert!(tags.contains(&"verdict:result"));
    }

    #[tokio::test]
    async fn test_screening_runs_once_across_suspend_resume() {
        let analyzer = Arc::new(
            MockAnalyzer::new()
                .with_screening_questions(vec![FollowUpQuestion::blocking("q1", "blocking?")]),
        );
        let m = RunManager::new(analyzer.clone(), fast_config());
        let mut handle = m.start_pipeline(ticket_input()).await.unwrap();
        let outcome = (&mut handle.outcome).await.unwrap();
        let run_id = match outcome {
            PipelineOutcome::Suspended { run_id, .. } => run_id,
            other => panic!("expected suspension, got {:?}", other),
        };
        assert_eq!(analyzer.call_count("screening"), 1);
        assert_eq!(analyzer.call_count("verdict"), 0);

        let mut resumed = m
            .resume_pipeline(
                run_id,
                vec![UserAnswer::new("q1", "yes", SourceStage::Screening)],
            )
            .await
            .unwrap();
        let outcome = (&mut resumed.outcome).await.unwrap();
        assert!(matches!(outcome, PipelineOutcome::Completed(_)));

        // screening was not re-executed; the rest of the pipeline ran once
        assert_eq!(analyzer.call_count("screening"), 1);
        assert_eq!(analyzer.call_count("verdict"), 1);
        assert_eq!(analyzer.call_count("synthesize"), 1);
    }

    #[tokio::test]
    async fn test_snapshot_resume_across_manager_instances() {
        let store = Arc::new(MemorySnapshotStore::new());
        let analyzer = MockAnalyzer::new()
            .with_screening_questions(vec![FollowUpQuestion::blocking("q1", "blocking?")]);
        let m1 = RunManager::new(Arc::new(analyzer), fast_config())
            .with_snapshots(store.clone());

        let mut handle = m1.start_pipeline(ticket_input()).await.unwrap();
        let outcome = (&mut handle.outcome).await.unwrap();
        let run_id = match outcome {
            PipelineOutcome::Suspended { run_id, .. } => run_id,
            other => panic!("expected suspension, got {:?}", other),
        };

        // a fresh manager (fresh process) with the same store can resume it
        let m2 = RunManager::new(Arc::new(MockAnalyzer::new()), fast_config())
            .with_snapshots(store.clone());
        let mut resumed = m2
            .resume_pipeline(
                run_id,
                vec![UserAnswer::new("q1", "yes", SourceStage::Screening)],
            )
            .await
            .unwrap();

        let outcome = (&mut resumed.outcome).await.unwrap();
        let result = match outcome {
            PipelineOutcome::Completed(result) => result,
            other => panic!("expected completion, got {:?}", other),
        };
        assert_eq!(result.run_id, run_id);

        // same terminal verdict as an equivalent single-process run
        let single = RunManager::new(Arc::new(MockAnalyzer::new()), fast_config());
        let mut baseline = single
            .start_pipeline(ticket_input().with_pre_applied(vec![UserAnswer::new(
                "q1",
                "yes",
                SourceStage::Screening,
            )]))
            .await
            .unwrap();
        let baseline_outcome = (&mut baseline.outcome).await.unwrap();
        let baseline_result = match baseline_outcome {
            PipelineOutcome::Completed(result) => result,
            other => panic!("expected completion, got {:?}", other),
        };
        assert_eq!(
            result.verdict.as_ref().unwrap().verdict,
            baseline_result.verdict.as_ref().unwrap().verdict
        );
        assert_eq!(result.dimensions.len(), baseline_result.dimensions.len());
    }

    #[tokio::test]
    async fn test_stateless_restart_completes_without_suspension() {
        // first run surfaces a blocking question
        let analyzer = MockAnalyzer::new()
            .with_screening_questions(vec![FollowUpQuestion::blocking("q1", "blocking?")]);
        let m = manager(analyzer);
        let mut first = m.start_pipeline(ticket_input()).await.unwrap();
        let outcome = (&mut first.outcome).await.unwrap();
        let old_run_id = match outcome {
            PipelineOutcome::Suspended { run_id, .. } => run_id,
            other => panic!("expected suspension, got {:?}", other),
        };

        // restart with the answer pre-applied; the mock's scripted screening
        // was consumed, so the fresh run sees the default (no questions)
        let mut restarted = m
            .resume_stateless(
                old_run_id,
                ticket_input().with_pre_applied(vec![UserAnswer::new(
                    "q1",
                    "yes",
                    SourceStage::Screening,
                )]),
            )
            .await
            .unwrap();
        assert_ne!(restarted.run_id, old_run_id);

        let outcome = (&mut restarted.outcome).await.unwrap();
        let result = match outcome {
            PipelineOutcome::Completed(result) => result,
            other => panic!("expected completion, got {:?}", other),
        };
        assert_eq!(result.run_id, restarted.run_id);
        assert_eq!(result.answered_questions.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_run_mid_flight() {
        let analyzer = MockAnalyzer::new().hang_verdict();
        let mut config = fast_config();
        config = config.with_uniform_steps(StepOptions {
            max_attempts: 1,
            timeout: Duration::from_secs(60),
            retry: RetryOptions::default(),
        });
        let m = RunManager::new(Arc::new(analyzer), config);
        let mut handle = m.start_pipeline(ticket_input()).await.unwrap();
        let run_id = handle.run_id;

        // let it reach the verdict stage, then cancel
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(m.cancel_run(run_id).await);

        let outcome = (&mut handle.outcome).await.unwrap();
        assert!(matches!(outcome, PipelineOutcome::Cancelled { .. }));

        let status = m.run_status(run_id).await.unwrap();
        assert_eq!(status.status, RunStatus::Cancelled);
        assert_eq!(status.errors.len(), 1);
        assert_eq!(status.errors[0].code, ErrorCode::Cancelled);

        // cancel is idempotent: terminal runs report inactive
        assert!(!m.cancel_run(run_id).await);
        let status = m.run_status(run_id).await.unwrap();
        assert_eq!(status.status, RunStatus::Cancelled);
        assert_eq!(status.errors.len(), 1);

        let events = drain(&mut handle);
        let error_events: Vec<_> = events
            .iter()
            .filter(|e| e.tag() == "pipeline:error")
            .collect();
        assert_eq!(error_events.len(), 1);
        assert!(!events.iter().any(|e| e.tag() == "pipeline:complete"));
    }

    #[tokio::test]
    async fn test_subscriber_disconnect_then_cancel() {
        let analyzer = MockAnalyzer::new().hang_verdict();
        let mut config = fast_config();
        config = config.with_uniform_steps(StepOptions {
            max_attempts: 1,
            timeout: Duration::from_secs(60),
            retry: RetryOptions::default(),
        });
        let m = RunManager::new(Arc::new(analyzer), config);
        let mut handle = m.start_pipeline(ticket_input()).await.unwrap();
        let run_id = handle.run_id;

        // client drops the stream; the transport reacts by cancelling
        handle.events.unsubscribe();
        assert!(m.cancel_run(run_id).await);

        let outcome = (&mut handle.outcome).await.unwrap();
        assert!(matches!(outcome, PipelineOutcome::Cancelled { .. }));
        let status = m.run_status(run_id).await.unwrap();
        assert_eq!(status.status, RunStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_status_unknown_run_is_none() {
        let m = manager(MockAnalyzer::new());
        assert!(m.run_status(Uuid::new_v4()).await.is_none());
        assert!(!m.cancel_run(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn test_status_progress_after_completion() {
        let m = manager(MockAnalyzer::new());
        let mut handle = m.start_pipeline(ticket_input()).await.unwrap();
        let _ = (&mut handle.outcome).await.unwrap();

        let status = m.run_status(handle.run_id).await.unwrap();
        assert_eq!(status.status, RunStatus::Completed);
        assert_eq!(status.progress, 100);
        assert!(status.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_cleanup_removes_record() {
        let m = manager(MockAnalyzer::new());
        let mut handle = m.start_pipeline(ticket_input()).await.unwrap();
        let _ = (&mut handle.outcome).await.unwrap();

        assert!(m.cleanup_run(handle.run_id).await);
        assert!(m.run_status(handle.run_id).await.is_none());
        assert!(!m.cleanup_run(handle.run_id).await);
    }

    #[tokio::test]
    async fn test_resume_rejects_non_suspended_run() {
        let m = manager(MockAnalyzer::new());
        let mut handle = m.start_pipeline(ticket_input()).await.unwrap();
        let _ = (&mut handle.outcome).await.unwrap();

        let err = m
            .resume_pipeline(
                handle.run_id,
                vec![UserAnswer::new("q1", "yes", SourceStage::Screening)],
            )
            .await
            .unwrap_err();
        assert!(err.message.contains("not suspended"));
    }

    #[tokio::test]
    async fn test_resume_unknown_run_without_store_fails() {
        let m = manager(MockAnalyzer::new());
        let err = m
            .resume_pipeline(
                Uuid::new_v4(),
                vec![UserAnswer::new("q1", "yes", SourceStage::Screening)],
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Unknown);
    }
}
