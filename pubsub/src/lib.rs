//! The ephemeral pub/sub hint queue the event-processor and poll daemons
//! share in-process.
//!
//! The durable event table is the single source of truth; this queue only
//! carries hints for in-flight accrual polls. It is rebuildable from the
//! database and may lose messages without a correctness impact. Grounded on
//! `examples/original_source/internal/accruals_queue/pub_sub.go`, which
//! backs this exact channel with Redis pub/sub in production.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod redis_queue;

pub use error::PubsubError;
pub use memory::InMemoryQueue;
pub use redis_queue::RedisQueue;

use accrual_domain::OrderCreatedMessage;
use tokio::sync::mpsc::Receiver;

/// The queue contract the event-processor (producer) and poll daemon
/// (producer + consumer) depend on.
///
/// `subscribe` is called once per daemon lifetime. Resubscribing every
/// tick would drop any job pushed between subscriptions.
#[async_trait::async_trait]
pub trait PubsubQueue: Send + Sync {
    /// Publish a poll job onto the channel.
    async fn push(&self, message: &OrderCreatedMessage) -> Result<(), PubsubError>;

    /// Subscribe once and receive decoded jobs until the channel closes. A
    /// decode failure terminates the subscription; the caller must
    /// re-subscribe to resume (the returned receiver is simply dropped and
    /// `subscribe` called again).
    async fn subscribe(&self) -> Result<Receiver<OrderCreatedMessage>, PubsubError>;
}
