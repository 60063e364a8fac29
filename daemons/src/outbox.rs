//! Outbox publisher daemon: drains `new` rows whose name is one of the
//! outbox kinds, routes each to the matching broker envelope, and
//! transitions the row to its terminal state.
//!
//! Grounded on `examples/original_source/internal/transaction_outbox/daemon.go`
//! (tagged dispatch by event name to one of three publishers) and
//! `.../started/publisher.go` (key = order number, so one order's events
//! stay on one partition).

use std::sync::Arc;
use std::time::Duration;

use accrual_broker::OutboxWriter;
use accrual_domain::{AccrualProcessed, Event, EventName, EventState};
use accrual_runtime::ShutdownSignal;
use accrual_store::EventRepository;

/// Run `workers_count` independent ticking workers until `shutdown` fires.
pub async fn run(
    repo: Arc<dyn EventRepository>,
    writer: Arc<OutboxWriter>,
    poll_interval: Duration,
    workers_count: usize,
    shutdown: ShutdownSignal,
) {
    tracing::info!(workers_count, poll_interval_ms = poll_interval.as_millis(), "transaction outbox daemon started");

    let mut handles = Vec::with_capacity(workers_count);
    for worker_id in 0..workers_count {
        let repo = Arc::clone(&repo);
        let writer = Arc::clone(&writer);
        let mut shutdown = shutdown.clone();

        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = process_once(repo.as_ref(), writer.as_ref()).await {
                            metrics::counter!("outbox.events_total", "outcome" => "error").increment(1);
                            tracing::error!(worker_id, error = %err, "send events finished with error");
                        } else {
                            metrics::counter!("outbox.events_total", "outcome" => "ok").increment(1);
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

#[derive(Debug, thiserror::Error)]
enum ProcessError {
    #[error("fetch outbox event failed: {0}")]
    Fetch(#[source] accrual_store::StoreError),
    #[error("publish event failed: {0}")]
    Publish(#[source] accrual_broker::BrokerError),
    #[error("update event state failed: {0}")]
    SaveState(#[source] accrual_store::StoreError),
}

async fn process_once(repo: &dyn EventRepository, writer: &OutboxWriter) -> Result<(), ProcessError> {
    let Some(event) = repo.first_outbox_event().await.map_err(ProcessError::Fetch)? else {
        return Ok(());
    };

    let envelope = envelope_for(&event);

    match writer.publish(&event.meta.order_number, &envelope).await {
        Ok(()) => {
            repo.set_state(&event.uuid, EventState::Finished)
                .await
                .map_err(ProcessError::SaveState)?;
            tracing::info!(event_uuid = %event.uuid, name = %event.name, "published accrual event");
            Ok(())
        }
        Err(err) => {
            repo.set_state(&event.uuid, EventState::Failed)
                .await
                .map_err(ProcessError::SaveState)?;
            Err(ProcessError::Publish(err))
        }
    }
}

/// Tagged dispatch by the row's `name`: the three outbox kinds share one
/// broker writer but each builds a distinct envelope variant.
fn envelope_for(event: &Event) -> AccrualProcessed {
    match event.name {
        EventName::AccrualStarted => AccrualProcessed::Started {
            event_uuid: event.uuid.clone(),
            order_uuid: event.meta.order_uuid.clone(),
        },
        EventName::AccrualFinished => AccrualProcessed::Finished {
            event_uuid: event.uuid.clone(),
            order_uuid: event.meta.order_uuid.clone(),
            amount: event.meta.amount,
        },
        EventName::AccrualFailed | EventName::OrderCreated => AccrualProcessed::Failed {
            event_uuid: event.uuid.clone(),
            order_uuid: event.meta.order_uuid.clone(),
            error: event.meta.error.clone().unwrap_or_default(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use accrual_domain::Meta;

    #[test]
    fn started_event_maps_to_the_started_envelope_variant() {
        let event = Event::new(
            "E1",
            EventName::AccrualStarted,
            Meta::for_order("O1", "42"),
            accrual_domain::Utc::now(),
        );
        assert!(matches!(envelope_for(&event), AccrualProcessed::Started { .. }));
    }

    #[test]
    fn finished_event_carries_its_amount_through() {
        let event = Event::new(
            "E1",
            EventName::AccrualFinished,
            Meta::for_order("O1", "42").with_amount(1234),
            accrual_domain::Utc::now(),
        );
        match envelope_for(&event) {
            AccrualProcessed::Finished { amount, .. } => assert_eq!(amount, 1234),
            other => panic!("expected Finished variant, got {other:?}"),
        }
    }

    #[test]
    fn failed_event_carries_its_error_through() {
        let event = Event::new(
            "E1",
            EventName::AccrualFailed,
            Meta::for_order("O1", "42").with_error("boom"),
            accrual_domain::Utc::now(),
        );
        match envelope_for(&event) {
            AccrualProcessed::Failed { error, .. } => assert_eq!(error, "boom"),
            other => panic!("expected Failed variant, got {other:?}"),
        }
    }
}
