//! Event-processor daemon: a fixed-size worker pool that dequeues one
//! `order_created` row per tick, looks up the order, kicks off the
//! calculator's *calculate* request, and hands the job to the accrual-poll
//! daemon via the pub/sub queue.
//!
//! Grounded on `examples/original_source/internal/order_created/events_processor/daemon.go`:
//! each worker runs its own ticker rather than a single shared one, so one
//! slow worker never stalls the others' cadence.

use std::sync::Arc;
use std::time::Duration;

use accrual_calculator_client::{CalculateGood, CalculateRequest, CalculatorApi, CalculatorError};
use accrual_domain::{Event, OrderCreatedMessage};
use accrual_orders_client::{OrdersApi, OrdersClientError};
use accrual_pubsub::PubsubQueue;
use accrual_runtime::retry::{retry_with_predicate, RetryPolicy};
use accrual_runtime::{CircuitBreaker, ShutdownSignal};
use accrual_store::EventRepository;

/// The two downstream calls this daemon guards independently: a stuck
/// orders service shouldn't keep tripping the calculator's breaker, and
/// vice versa.
#[derive(Clone)]
pub struct Breakers {
    /// Guards the orders gRPC lookup.
    pub orders: CircuitBreaker,
    /// Guards the calculator's *calculate* call.
    pub calculator: CircuitBreaker,
}

impl Default for Breakers {
    fn default() -> Self {
        Self {
            orders: CircuitBreaker::new(),
            calculator: CircuitBreaker::new(),
        }
    }
}

/// Run `workers_count` independent ticking workers until `shutdown` fires.
pub async fn run(
    repo: Arc<dyn EventRepository>,
    orders: Arc<dyn OrdersApi>,
    calculator: Arc<dyn CalculatorApi>,
    queue: Arc<dyn PubsubQueue>,
    breakers: Breakers,
    poll_interval: Duration,
    workers_count: usize,
    shutdown: ShutdownSignal,
) {
    tracing::info!(workers_count, poll_interval_ms = poll_interval.as_millis(), "event processor daemon started");

    let mut handles = Vec::with_capacity(workers_count);
    for worker_id in 0..workers_count {
        let repo = Arc::clone(&repo);
        let orders = Arc::clone(&orders);
        let calculator = Arc::clone(&calculator);
        let queue = Arc::clone(&queue);
        let breakers = breakers.clone();
        let mut shutdown = shutdown.clone();

        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = process_once(repo.as_ref(), orders.as_ref(), calculator.as_ref(), queue.as_ref(), &breakers).await {
                            metrics::counter!("daemons.events_processed", "outcome" => "error").increment(1);
                            tracing::error!(worker_id, error = %err, "process order created event error");
                        } else {
                            metrics::counter!("daemons.events_processed", "outcome" => "ok").increment(1);
                        }
                    }
                    () = shutdown.requested() => {
                        tracing::debug!(worker_id, "daemon worker graceful shutdown");
                        return;
                    }
                }
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
}

/// Errors from one tick. Every branch either records failure on the event
/// row itself or, for "no row reserved", is simply `Ok(())` — this type
/// only exists so the worker loop has something to log.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("reserve event failed: {0}")]
    Reserve(#[source] accrual_store::StoreError),
    #[error("orders circuit breaker is open")]
    OrdersCircuitOpen,
    #[error("order lookup failed: {0}")]
    OrderLookup(#[source] accrual_orders_client::OrdersClientError),
    #[error("calculator circuit breaker is open")]
    CalculatorCircuitOpen,
    #[error("calculate request failed: {0}")]
    Calculate(#[source] accrual_calculator_client::CalculatorError),
    #[error("pub/sub enqueue failed: {0}")]
    Enqueue(#[source] accrual_pubsub::PubsubError),
    #[error("failed to save event state: {0}")]
    SaveState(#[source] accrual_store::StoreError),
}

async fn process_once(
    repo: &dyn EventRepository,
    orders: &dyn OrdersApi,
    calculator: &dyn CalculatorApi,
    queue: &dyn PubsubQueue,
    breakers: &Breakers,
) -> Result<(), ProcessError> {
    let Some(event) = repo.reserve_order_created().await.map_err(ProcessError::Reserve)? else {
        return Ok(());
    };

    tracing::debug!(event_uuid = %event.uuid, "reserved order_created event");

    if breakers.orders.check().is_err() {
        fail(repo, &event, "orders circuit breaker is open".into()).await?;
        return Err(ProcessError::OrdersCircuitOpen);
    }

    let order = match retry_with_predicate(
        RetryPolicy::builder().max_retries(2).initial_delay(Duration::from_millis(100)).build(),
        || orders.find(&event.meta.order_number),
        is_transient_orders_error,
    )
    .await
    {
        Ok(order) => {
            breakers.orders.record_success();
            order
        }
        Err(err) => {
            breakers.orders.record_failure();
            fail(repo, &event, err.to_string()).await?;
            return Err(ProcessError::OrderLookup(err));
        }
    };

    let goods = order
        .goods
        .into_iter()
        .map(|g| CalculateGood {
            description: g.name,
            price: g.price,
        })
        .collect();

    let request = CalculateRequest {
        order: order.number,
        goods,
    };

    if breakers.calculator.check().is_err() {
        fail(repo, &event, "calculator circuit breaker is open".into()).await?;
        return Err(ProcessError::CalculatorCircuitOpen);
    }

    match retry_with_predicate(
        RetryPolicy::builder().max_retries(2).initial_delay(Duration::from_millis(100)).build(),
        || calculator.calculate(&request),
        is_transient_calculator_error,
    )
    .await
    {
        Ok(()) => breakers.calculator.record_success(),
        Err(err) => {
            breakers.calculator.record_failure();
            fail(repo, &event, err.to_string()).await?;
            return Err(ProcessError::Calculate(err));
        }
    }

    let job = OrderCreatedMessage {
        event_uuid: event.uuid.clone(),
        order_uuid: event.meta.order_uuid.clone(),
        number: request.order.clone(),
        state: String::new(),
    };

    if let Err(err) = queue.push(&job).await {
        fail(repo, &event, err.to_string()).await?;
        return Err(ProcessError::Enqueue(err));
    }

    repo.set_finished(&event).await.map_err(ProcessError::SaveState)?;
    tracing::info!(event_uuid = %event.uuid, "order_created event finished");
    Ok(())
}

/// Connection and RPC-layer failures are worth a couple of quick retries;
/// "no such order" is a business outcome, not a transient one.
fn is_transient_orders_error(err: &OrdersClientError) -> bool {
    matches!(err, OrdersClientError::Connect(_) | OrdersClientError::Rpc(_))
}

/// Network failures are worth retrying; a non-202 response and rate limits
/// are the calculator's own verdict, not something a retry fixes.
fn is_transient_calculator_error(err: &CalculatorError) -> bool {
    matches!(err, CalculatorError::Request(_))
}

async fn fail(repo: &dyn EventRepository, event: &Event, error: String) -> Result<(), ProcessError> {
    let mut failed = event.clone();
    failed.meta.error = Some(error);
    repo.set_failed(&failed).await.map_err(ProcessError::SaveState)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use accrual_calculator_client::AccrualStatus;
    use accrual_domain::{EventName, EventState, Meta};
    use accrual_orders_client::{DenormalizedOrder, Good};
    use accrual_testing::{FakeCalculatorClient, FakeOrdersClient, InMemoryEventRepository};

    #[tokio::test]
    async fn happy_path_finishes_the_row_and_enqueues_a_poll_job() {
        let repo = InMemoryEventRepository::new();
        let meta = Meta::for_order("O1", "42");
        repo.save_order_created(&Event::new("E1", EventName::OrderCreated, meta, accrual_domain::Utc::now()))
            .await
            .unwrap();

        let orders = FakeOrdersClient::new();
        orders.register(
            "42",
            DenormalizedOrder {
                number: "42".into(),
                goods: vec![Good {
                    name: "widget".into(),
                    price: 1000,
                }],
            },
        );

        let calculator = FakeCalculatorClient::new();
        calculator.push_result(Ok(accrual_calculator_client::AccrualResult {
            order: "42".into(),
            accrual: 12.34,
            status: AccrualStatus::Processed,
        }));

        let queue = accrual_pubsub::InMemoryQueue::new();

        process_once(&repo, &orders, &calculator, &queue, &Breakers::default()).await.unwrap();

        let snapshot = repo.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].state, EventState::Finished);
        assert_eq!(snapshot[1].name, EventName::AccrualStarted);
        assert_eq!(calculator.calculated_requests().len(), 1);
    }

    #[tokio::test]
    async fn order_lookup_failure_marks_the_row_failed() {
        let repo = InMemoryEventRepository::new();
        let meta = Meta::for_order("O1", "missing");
        repo.save_order_created(&Event::new(
            "E1",
            EventName::OrderCreated,
            meta,
            accrual_domain::Utc::now(),
        ))
        .await
        .unwrap();

        let orders = FakeOrdersClient::new();
        let calculator = FakeCalculatorClient::new();
        let queue = accrual_pubsub::InMemoryQueue::new();

        let result = process_once(&repo, &orders, &calculator, &queue, &Breakers::default()).await;
        assert!(result.is_err());

        let snapshot = repo.snapshot();
        assert_eq!(snapshot[0].state, EventState::Failed);
        assert_eq!(snapshot[1].name, EventName::AccrualFailed);
    }

    #[tokio::test]
    async fn no_eligible_row_is_a_no_op() {
        let repo = InMemoryEventRepository::new();
        let orders = FakeOrdersClient::new();
        let calculator = FakeCalculatorClient::new();
        let queue = accrual_pubsub::InMemoryQueue::new();

        process_once(&repo, &orders, &calculator, &queue, &Breakers::default()).await.unwrap();
        assert!(repo.snapshot().is_empty());
    }
}
