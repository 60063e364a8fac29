//! Inbox consumer: reads `order_created` broker messages and persists each
//! as a `new` event row, committing the broker offset only once the write
//! succeeds.
//!
//! Grounded on `examples/original_source/internal/order_created/consumer/consumer.go`:
//! fetch one message, decode, save, commit — on any failure, log and leave
//! the offset uncommitted so the broker redelivers.

use accrual_broker::{Delivery, InboxReader};
use accrual_domain::{Event, EventName, Meta, OrderCreatedMessage};
use accrual_runtime::ShutdownSignal;
use accrual_store::EventRepository;

/// Run the inbox consumer loop until `shutdown` is requested.
///
/// Races the next inbound message against the shutdown signal in a
/// `tokio::select!`, finishing any in-flight write before exiting.
pub async fn run(reader: &InboxReader, repo: &dyn EventRepository, mut shutdown: ShutdownSignal) {
    tracing::info!("inbox consumer started");

    loop {
        tokio::select! {
            received = reader.recv() => {
                match received {
                    Ok((message, delivery)) => process_message(repo, &message, delivery).await,
                    Err(err) => tracing::error!(error = %err, "order_created: fetch message error"),
                }
            }
            () = shutdown.requested() => {
                tracing::info!("inbox consumer shutting down");
                break;
            }
        }
    }
}

async fn process_message(repo: &dyn EventRepository, message: &OrderCreatedMessage, delivery: Delivery<'_>) {
    let event = to_event(message);
    tracing::info!(event_uuid = %event.uuid, order_number = %message.number, "consumed order_created message");

    match repo.save_order_created(&event).await {
        Ok(()) => {
            metrics::counter!("inbox.messages_total", "outcome" => "ok").increment(1);
            if let Err(err) = delivery.commit() {
                tracing::error!(event_uuid = %event.uuid, error = %err, "order_created: failed to commit offset");
            }
        }
        Err(err) => {
            metrics::counter!("inbox.messages_total", "outcome" => "error").increment(1);
            tracing::error!(event_uuid = %event.uuid, error = %err, "order_created: save message error, offset not committed");
        }
    }
}

fn to_event(message: &OrderCreatedMessage) -> Event {
    let mut meta = Meta::for_order(message.order_uuid.clone(), message.number.clone());
    if !message.state.is_empty() {
        meta.state = Some(message.state.clone());
    }
    Event::new(message.event_uuid.clone(), EventName::OrderCreated, meta, accrual_domain::Utc::now())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use accrual_domain::EventState;
    use accrual_testing::InMemoryEventRepository;

    #[test]
    fn order_created_message_converts_to_a_new_event_row() {
        let message = OrderCreatedMessage {
            event_uuid: "E1".into(),
            order_uuid: "O1".into(),
            number: "42".into(),
            state: "NEW".into(),
        };
        let event = to_event(&message);
        assert_eq!(event.uuid, "E1");
        assert_eq!(event.name, EventName::OrderCreated);
        assert_eq!(event.state, EventState::New);
        assert_eq!(event.meta.order_number, "42");
        assert_eq!(event.meta.state.as_deref(), Some("NEW"));
    }

    #[tokio::test]
    async fn save_is_idempotent_on_repeated_delivery() {
        let repo = InMemoryEventRepository::new();
        let message = OrderCreatedMessage {
            event_uuid: "E1".into(),
            order_uuid: "O1".into(),
            number: "42".into(),
            state: String::new(),
        };
        let event = to_event(&message);

        repo.save_order_created(&event).await.unwrap();
        repo.save_order_created(&event).await.unwrap();

        assert_eq!(repo.snapshot().len(), 1);
    }
}
