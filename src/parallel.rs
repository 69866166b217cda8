//! Concurrent fan-out with per-index settled results.
//!
//! The parallel runner starts every child at once and reports each one's
//! outcome separately, in submission order. No error crosses a task boundary
//! as a panic or early return: a child either fulfills with its value or
//! rejects with a classified [`ExecutorError`].

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorCode, ExecutorError};
use crate::types::PipelineStage;

/// What a stage does when one of its children fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorStrategy {
    /// First rejection cancels the shared token; siblings unwind.
    FailFast,
    /// Siblings keep running; the caller substitutes defaults.
    ContinueWithPartial,
}

/// Outcome of one child, tagged with its submission index.
#[derive(Debug)]
pub struct Settled<T> {
    pub index: usize,
    pub outcome: Result<T, ExecutorError>,
}

impl<T> Settled<T> {
    pub fn is_fulfilled(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Run all `makers` concurrently and settle every slot.
///
/// Each maker receives a child token of `cancel`: cancelling the parent run
/// reaches every child, and under [`ErrorStrategy::FailFast`] the first
/// rejection cancels the shared child token so outstanding siblings abort.
/// Results come back in submission order regardless of completion order.
/// A panicking child settles as [`ErrorCode::Unknown`].
pub async fn run_all<T, F, Fut>(
    makers: Vec<F>,
    stage: PipelineStage,
    strategy: ErrorStrategy,
    cancel: &CancellationToken,
) -> Vec<Settled<T>>
where
    T: Send + 'static,
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, ExecutorError>> + Send + 'static,
{
    let shared = cancel.child_token();
    let total = makers.len();
    let mut set = JoinSet::new();

    for (index, make) in makers.into_iter().enumerate() {
        let fut = make(shared.clone());
        set.spawn(async move {
            let outcome = AssertUnwindSafe(fut).catch_unwind().await.unwrap_or_else(|_| {
                Err(ExecutorError::new(
                    ErrorCode::Unknown,
                    "analyzer task panicked",
                    stage,
                ))
            });
            (index, outcome)
        });
    }

    let mut slots: Vec<Option<Result<T, ExecutorError>>> =
        std::iter::repeat_with(|| None).take(total).collect();

    while let Some(joined) = set.join_next().await {
        if let Ok((index, outcome)) = joined {
            if outcome.is_err() && strategy == ErrorStrategy::FailFast {
                shared.cancel();
            }
            slots[index] = Some(outcome);
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| Settled {
            index,
            outcome: slot.unwrap_or_else(|| {
                Err(ExecutorError::new(
                    ErrorCode::Unknown,
                    "analyzer task vanished",
                    stage,
                ))
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_results_in_submission_order() {
        let cancel = CancellationToken::new();
        // later-submitted children finish first
        let makers: Vec<_> = (0..4u64)
            .map(|i| {
                move |_token: CancellationToken| async move {
                    tokio::time::sleep(Duration::from_millis(40 - i * 10)).await;
                    Ok::<u64, ExecutorError>(i)
                }
            })
            .collect();

        let settled = run_all(
            makers,
            PipelineStage::Dimensions,
            ErrorStrategy::ContinueWithPartial,
            &cancel,
        )
        .await;

        let values: Vec<u64> = settled
            .iter()
            .map(|s| *s.outcome.as_ref().unwrap())
            .collect();
        assert_eq!(values, vec![0, 1, 2, 3]);
    }

    type TestFut = std::pin::Pin<Box<dyn Future<Output = Result<u32, ExecutorError>> + Send>>;
    type TestMaker = Box<dyn FnOnce(CancellationToken) -> TestFut + Send>;

    #[tokio::test]
    async fn test_continue_with_partial_keeps_siblings() {
        let cancel = CancellationToken::new();
        let makers: Vec<TestMaker> = vec![
            Box::new(|_t: CancellationToken| -> TestFut {
                Box::pin(async {
                    Err(ExecutorError::new(
                        ErrorCode::Authentication,
                        "401",
                        PipelineStage::Dimensions,
                    ))
                })
            }),
            Box::new(|_t: CancellationToken| -> TestFut {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(7)
                })
            }),
        ];

        let settled = run_all(
            makers,
            PipelineStage::Dimensions,
            ErrorStrategy::ContinueWithPartial,
            &cancel,
        )
        .await;

        assert!(!settled[0].is_fulfilled());
        assert_eq!(*settled[1].outcome.as_ref().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_fail_fast_cancels_outstanding_siblings() {
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let makers: Vec<TestMaker> = vec![
            Box::new(|_t: CancellationToken| -> TestFut {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Err(ExecutorError::new(
                        ErrorCode::SchemaValidation,
                        "bad output",
                        PipelineStage::Secondary,
                    ))
                })
            }),
            Box::new(|token: CancellationToken| -> TestFut {
                Box::pin(async move {
                    tokio::select! {
                        _ = token.cancelled() => {
                            Err(ExecutorError::cancelled(PipelineStage::Secondary))
                        }
                        _ = tokio::time::sleep(Duration::from_secs(60)) => Ok(1),
                    }
                })
            }),
        ];

        let settled = run_all(
            makers,
            PipelineStage::Secondary,
            ErrorStrategy::FailFast,
            &cancel,
        )
        .await;

        assert_eq!(
            settled[0].outcome.as_ref().unwrap_err().code,
            ErrorCode::SchemaValidation
        );
        assert_eq!(
            settled[1].outcome.as_ref().unwrap_err().code,
            ErrorCode::Cancelled
        );
        assert!(
            started.elapsed() < Duration::from_secs(10),
            "fail-fast did not abort the slow sibling"
        );
    }

    #[tokio::test]
    async fn test_parent_cancel_reaches_children() {
        let cancel = CancellationToken::new();
        let c2 = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            c2.cancel();
        });

        let makers: Vec<_> = (0..2)
            .map(|_| {
                |token: CancellationToken| async move {
                    tokio::select! {
                        _ = token.cancelled() => {
                            Err(ExecutorError::cancelled(PipelineStage::Dimensions))
                        }
                        _ = tokio::time::sleep(Duration::from_secs(60)) => Ok(0u32),
                    }
                }
            })
            .collect();

        let settled = run_all(
            makers,
            PipelineStage::Dimensions,
            ErrorStrategy::ContinueWithPartial,
            &cancel,
        )
        .await;

        for s in &settled {
            assert_eq!(s.outcome.as_ref().unwrap_err().code, ErrorCode::Cancelled);
        }
    }

    #[tokio::test]
    async fn test_panicking_child_settles_as_unknown() {
        let cancel = CancellationToken::new();
        let makers: Vec<TestMaker> = vec![
            Box::new(|_t: CancellationToken| -> TestFut {
                Box::pin(async {
                    panic!("analyzer bug");
                    #[allow(unreachable_code)]
                    Ok(0)
                })
            }),
            Box::new(|_t: CancellationToken| -> TestFut { Box::pin(async { Ok(5) }) }),
        ];

        let settled = run_all(
            makers,
            PipelineStage::Dimensions,
            ErrorStrategy::ContinueWithPartial,
            &cancel,
        )
        .await;

        assert_eq!(
            settled[0].outcome.as_ref().unwrap_err().code,
            ErrorCode::Unknown
        );
        assert_eq!(*settled[1].outcome.as_ref().unwrap(), 5);
    }

    #[tokio::test]
    async fn test_empty_input_settles_empty() {
        let cancel = CancellationToken::new();
        let makers: Vec<fn(CancellationToken) -> std::future::Ready<Result<u32, ExecutorError>>> =
            Vec::new();
        let settled = run_all(
            makers,
            PipelineStage::Secondary,
            ErrorStrategy::FailFast,
            &cancel,
        )
        .await;
        assert!(settled.is_empty());
    }
}
