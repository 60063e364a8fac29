use accrual_domain::OrderCreatedMessage;
use futures::StreamExt;
use redis::AsyncCommands;
use tokio::sync::mpsc::{self, Receiver};

use crate::error::PubsubError;
use crate::PubsubQueue;

/// `PubsubQueue` backed by a single named Redis channel.
///
/// Grounded on `examples/original_source/internal/accruals_queue/pub_sub.go`'s
/// `Push`/`Subscribe` pair: `Push` is a plain `PUBLISH`, `Subscribe` opens a
/// dedicated pub/sub connection and forwards decoded messages to the
/// caller until the connection closes or a payload fails to decode.
pub struct RedisQueue {
    client: redis::Client,
    channel: String,
}

impl RedisQueue {
    /// Connect to `redis_url`, publishing and subscribing on `channel`
    /// (default `accruals_in_progress`).
    pub fn connect(redis_url: &str, channel: impl Into<String>) -> Result<Self, PubsubError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            channel: channel.into(),
        })
    }
}

#[async_trait::async_trait]
impl PubsubQueue for RedisQueue {
    async fn push(&self, message: &OrderCreatedMessage) -> Result<(), PubsubError> {
        let payload = bincode::serialize(message)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.publish(&self.channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<Receiver<OrderCreatedMessage>, PubsubError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;

        let (tx, rx) = mpsc::channel(256);
        let channel = self.channel.clone();

        tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload = msg.get_payload_bytes().to_vec();
                match bincode::deserialize::<OrderCreatedMessage>(&payload) {
                    Ok(decoded) => {
                        if tx.send(decoded).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::error!(channel = %channel, error = %err, "undecodable pub/sub payload, closing subscription");
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}
