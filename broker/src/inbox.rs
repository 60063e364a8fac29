use accrual_domain::OrderCreatedMessage;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;

use crate::error::BrokerError;

/// Reads `order_created` messages off the inbound topic.
///
/// Mirrors `examples/original_source/internal/order_created/consumer/consumer.go`:
/// fetch one message, decode it, hand it to the caller, and only commit the
/// offset once the caller reports the downstream write succeeded. A decode
/// or persistence failure leaves the offset uncommitted, so the broker
/// redelivers on the next fetch.
pub struct InboxReader {
    consumer: StreamConsumer,
}

impl InboxReader {
    /// Connect a consumer in the given group, subscribed to `topic`, with
    /// manual offset commits (`enable.auto.commit=false`) so the caller
    /// controls exactly when a message is considered durably handled.
    pub fn connect(brokers: &str, group_id: &str, topic: &str) -> Result<Self, BrokerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|e| BrokerError::Connect(e.to_string()))?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| BrokerError::Connect(e.to_string()))?;

        Ok(Self { consumer })
    }

    /// Block until one message is available, decode it, and return it along
    /// with a handle the caller uses to commit (or deliberately not commit)
    /// its offset.
    pub async fn recv(&self) -> Result<(OrderCreatedMessage, Delivery<'_>), BrokerError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| BrokerError::Fetch(e.to_string()))?;

        let payload = message.payload().ok_or(BrokerError::EmptyPayload)?;
        let decoded: OrderCreatedMessage = bincode::deserialize(payload)?;

        Ok((
            decoded,
            Delivery {
                consumer: &self.consumer,
                message,
            },
        ))
    }
}

/// A fetched-but-not-yet-committed message. Call [`Delivery::commit`] once
/// the caller's downstream write has succeeded.
pub struct Delivery<'a> {
    consumer: &'a StreamConsumer,
    message: rdkafka::message::BorrowedMessage<'a>,
}

impl Delivery<'_> {
    /// Commit this message's offset. Only call this after the downstream
    /// write (`SaveOrderCreated`) has succeeded.
    pub fn commit(&self) -> Result<(), BrokerError> {
        self.consumer
            .commit_message(&self.message, CommitMode::Async)
            .map_err(|e| BrokerError::Commit(e.to_string()))
    }
}
