use std::sync::Mutex;

use accrual_domain::OrderCreatedMessage;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::error::PubsubError;
use crate::PubsubQueue;

/// In-process `PubsubQueue`, for daemon tests that shouldn't need a live
/// Redis instance. `subscribe` may only be called once, matching the
/// single-logical-subscriber model the real queue follows.
pub struct InMemoryQueue {
    sender: Mutex<Option<Sender<OrderCreatedMessage>>>,
    // Kept so `push` before `subscribe` is still delivered once subscribed.
    receiver: Mutex<Option<Receiver<OrderCreatedMessage>>>,
}

impl InMemoryQueue {
    /// A fresh queue with a bounded internal channel.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1024);
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
        }
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PubsubQueue for InMemoryQueue {
    async fn push(&self, message: &OrderCreatedMessage) -> Result<(), PubsubError> {
        let sender = self.sender.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
        if let Some(sender) = sender {
            let _ = sender.send(message.clone()).await;
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<Receiver<OrderCreatedMessage>, PubsubError> {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        Ok(receiver.unwrap_or_else(|| mpsc::channel(1).1))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pushed_messages_are_received_after_subscribing() {
        let queue = InMemoryQueue::new();
        let msg = OrderCreatedMessage {
            event_uuid: "E1".into(),
            order_uuid: "O1".into(),
            number: "42".into(),
            state: String::new(),
        };

        queue.push(&msg).await.unwrap();
        let mut rx = queue.subscribe().await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received, msg);
    }
}
