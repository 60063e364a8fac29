//! Accrual-poll daemon: subscribes once to the pub/sub hint queue and polls
//! the calculator's *result* endpoint for each job, bounded by a counting
//! semaphore.
//!
//! Grounded on `examples/original_source/internal/order_created/accruals_processor/daemon.go`.
//! Subscribes to the queue **once** at startup rather than per-tick — the
//! original re-subscribes inside its select loop, which drops any job
//! pushed between subscriptions.

use std::sync::Arc;
use std::time::Duration;

use accrual_calculator_client::{AccrualResult, AccrualStatus, CalculatorApi, CalculatorError};
use accrual_domain::{EventName, Meta, OrderCreatedMessage};
use accrual_pubsub::PubsubQueue;
use accrual_runtime::retry::{retry_with_predicate, RetryPolicy};
use accrual_runtime::{CircuitBreaker, ShutdownSignal};
use accrual_store::EventRepository;
use tokio::sync::Semaphore;

/// Subscribe once and process jobs until `shutdown` fires. In-flight polls
/// finish their current HTTP call; there is no mid-flight cancellation.
pub async fn run(
    repo: Arc<dyn EventRepository>,
    calculator: Arc<dyn CalculatorApi>,
    queue: Arc<dyn PubsubQueue>,
    breaker: CircuitBreaker,
    workers_count: usize,
    mut shutdown: ShutdownSignal,
) {
    tracing::info!(workers_count, "accrual poll daemon started");

    let mut receiver = match queue.subscribe().await {
        Ok(receiver) => receiver,
        Err(err) => {
            tracing::error!(error = %err, "accrual poll daemon: failed to subscribe to pub/sub queue");
            return;
        }
    };

    let semaphore = Arc::new(Semaphore::new(workers_count));

    loop {
        tokio::select! {
            received = receiver.recv() => {
                let Some(job) = received else {
                    tracing::info!("accrual poll daemon: pub/sub channel closed");
                    break;
                };

                // Acquired here, not in the spawned task: mirrors the original's
                // push-then-spawn ordering so a full semaphore backs up the
                // receive loop instead of spawning unboundedly many tasks.
                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    break;
                };

                let repo = Arc::clone(&repo);
                let calculator = Arc::clone(&calculator);
                let queue = Arc::clone(&queue);
                let breaker = breaker.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(err) = process_job(repo.as_ref(), calculator.as_ref(), queue.as_ref(), &breaker, &job).await {
                        metrics::counter!("daemons.polls_total", "outcome" => "error").increment(1);
                        tracing::error!(order_number = %job.number, error = %err, "process accrual error");
                    } else {
                        metrics::counter!("daemons.polls_total", "outcome" => "ok").increment(1);
                    }
                });
            }
            () = shutdown.requested() => {
                tracing::info!("accrual poll daemon shutting down");
                break;
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum PollError {
    #[error("calculator circuit breaker is open")]
    CircuitOpen,
    #[error("calculator result call failed: {0}")]
    Calculator(#[source] CalculatorError),
    #[error("failed to save accrual event: {0}")]
    SaveEvent(#[source] accrual_store::StoreError),
    #[error("failed to re-enqueue job: {0}")]
    Requeue(#[source] accrual_pubsub::PubsubError),
}

async fn process_job(
    repo: &dyn EventRepository,
    calculator: &dyn CalculatorApi,
    queue: &dyn PubsubQueue,
    breaker: &CircuitBreaker,
    job: &OrderCreatedMessage,
) -> Result<(), PollError> {
    if breaker.check().is_err() {
        queue.push(job).await.map_err(PollError::Requeue)?;
        return Err(PollError::CircuitOpen);
    }

    let policy = RetryPolicy::builder().max_retries(2).initial_delay(Duration::from_millis(100)).build();
    match retry_with_predicate(policy, || calculator.result(&job.number), is_transient_calculator_error).await {
        Ok(accrual) => {
            breaker.record_success();
            handle_result(repo, queue, job, accrual).await
        }
        Err(CalculatorError::RateLimited { retry_after }) => {
            tracing::debug!(order_number = %job.number, retry_after_secs = retry_after.as_secs(), "too many requests, sleeping and requeuing");
            tokio::time::sleep(retry_after).await;
            queue.push(job).await.map_err(PollError::Requeue)
        }
        Err(err) => {
            breaker.record_failure();
            let meta = Meta::for_order(job.order_uuid.clone(), job.number.clone()).with_error(err.to_string());
            repo.create_accrual_event(&fresh_uuid(), EventName::AccrualFailed, &meta)
                .await
                .map_err(PollError::SaveEvent)?;
            Err(PollError::Calculator(err))
        }
    }
}

/// Network failures are worth a couple of quick retries before tripping the
/// breaker; a rate limit or a non-2xx verdict is the calculator's own
/// answer, not something a retry changes.
fn is_transient_calculator_error(err: &CalculatorError) -> bool {
    matches!(err, CalculatorError::Request(_))
}

async fn handle_result(
    repo: &dyn EventRepository,
    queue: &dyn PubsubQueue,
    job: &OrderCreatedMessage,
    accrual: AccrualResult,
) -> Result<(), PollError> {
    tracing::debug!(order_number = %job.number, status = ?accrual.status, "got accrual result");

    if accrual.status.is_pending() {
        return queue.push(job).await.map_err(PollError::Requeue);
    }

    if accrual.status == AccrualStatus::Invalid {
        let meta = Meta::for_order(job.order_uuid.clone(), job.number.clone())
            .with_error(format!("accrual failed, got invalid status - {:?}", accrual.status));
        return repo
            .create_accrual_event(&fresh_uuid(), EventName::AccrualFailed, &meta)
            .await
            .map_err(PollError::SaveEvent);
    }

    let amount = accrual_domain::to_minor_units(accrual.accrual);
    let meta = Meta::for_order(job.order_uuid.clone(), job.number.clone()).with_amount(amount);
    repo.create_accrual_event(&fresh_uuid(), EventName::AccrualFinished, &meta)
        .await
        .map_err(PollError::SaveEvent)
}

fn fresh_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use accrual_testing::{FakeCalculatorClient, InMemoryEventRepository};

    fn job() -> OrderCreatedMessage {
        OrderCreatedMessage {
            event_uuid: "E1".into(),
            order_uuid: "O1".into(),
            number: "42".into(),
            state: String::new(),
        }
    }

    #[tokio::test]
    async fn processed_status_births_an_accrual_finished_row_with_rounded_amount() {
        let repo = InMemoryEventRepository::new();
        let calculator = FakeCalculatorClient::new();
        calculator.push_result(Ok(AccrualResult {
            order: "42".into(),
            accrual: 12.34,
            status: AccrualStatus::Processed,
        }));
        let queue = accrual_pubsub::InMemoryQueue::new();

        process_job(&repo, &calculator, &queue, &CircuitBreaker::new(), &job()).await.unwrap();

        let snapshot = repo.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, EventName::AccrualFinished);
        assert_eq!(snapshot[0].meta.amount, 1234);
    }

    #[tokio::test]
    async fn invalid_status_births_an_accrual_failed_row() {
        let repo = InMemoryEventRepository::new();
        let calculator = FakeCalculatorClient::new();
        calculator.push_result(Ok(AccrualResult {
            order: "42".into(),
            accrual: 0.0,
            status: AccrualStatus::Invalid,
        }));
        let queue = accrual_pubsub::InMemoryQueue::new();

        process_job(&repo, &calculator, &queue, &CircuitBreaker::new(), &job()).await.unwrap();

        let snapshot = repo.snapshot();
        assert_eq!(snapshot[0].name, EventName::AccrualFailed);
        assert!(snapshot[0].meta.error.as_deref().unwrap().contains("Invalid"));
    }

    #[tokio::test]
    async fn pending_status_requeues_without_writing_any_row() {
        let repo = InMemoryEventRepository::new();
        let calculator = FakeCalculatorClient::new();
        calculator.push_result(Ok(AccrualResult {
            order: "42".into(),
            accrual: 0.0,
            status: AccrualStatus::Processing,
        }));
        let queue = accrual_pubsub::InMemoryQueue::new();

        process_job(&repo, &calculator, &queue, &CircuitBreaker::new(), &job()).await.unwrap();

        assert!(repo.snapshot().is_empty());
        let mut rx = queue.subscribe().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), job());
    }

    #[tokio::test]
    async fn open_breaker_requeues_without_calling_the_calculator() {
        let repo = InMemoryEventRepository::new();
        let calculator = FakeCalculatorClient::new();
        let queue = accrual_pubsub::InMemoryQueue::new();
        let breaker = CircuitBreaker::new().with_failure_threshold(1);
        breaker.record_failure();

        let result = process_job(&repo, &calculator, &queue, &breaker, &job()).await;

        assert!(matches!(result, Err(PollError::CircuitOpen)));
        assert!(repo.snapshot().is_empty());
        let mut rx = queue.subscribe().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), job());
    }
}
