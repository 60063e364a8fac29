use std::time::Duration;

use accrual_domain::AccrualProcessed;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use crate::error::BrokerError;

/// Writes `AccrualProcessed` envelopes to the outbound topic.
///
/// Publishes via `FutureProducer` + `FutureRecord` + `Timeout::After`,
/// keyed by order number so every event for one order lands on the same
/// partition.
pub struct OutboxWriter {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl OutboxWriter {
    /// Connect a producer publishing to `topic` with `acks=0`, matching the
    /// original system's `RequiredAcks: 0` (the outbox retries at the
    /// application layer via `SetState(failed)`, not at the broker layer).
    pub fn connect(brokers: &str, topic: &str) -> Result<Self, BrokerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "0")
            .create()
            .map_err(|e| BrokerError::Connect(e.to_string()))?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
            timeout: Duration::from_secs(5),
        })
    }

    /// Encode `envelope` with bincode and publish it keyed by `order_number`.
    pub async fn publish(&self, order_number: &str, envelope: &AccrualProcessed) -> Result<(), BrokerError> {
        let payload = bincode::serialize(envelope)?;
        let record = FutureRecord::to(&self.topic)
            .payload(&payload)
            .key(order_number.as_bytes());

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                tracing::debug!(
                    topic = %self.topic,
                    partition,
                    offset,
                    order_number,
                    "published accrual event"
                );
                Ok(())
            }
            Err((err, _)) => Err(BrokerError::Publish(err.to_string())),
        }
    }
}
