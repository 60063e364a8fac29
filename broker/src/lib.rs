//! Kafka-compatible broker transport for the accrual adapter.
//!
//! Two concrete, narrow pieces instead of a generic event bus: [`InboxReader`]
//! consumes `order_created` messages with manual offset commits (committed
//! only after the caller's downstream write succeeds, for at-least-once
//! delivery), and [`OutboxWriter`] publishes `AccrualProcessed` envelopes
//! keyed by order number so a given order's events stay on one partition.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod inbox;
mod outbox;

pub use error::BrokerError;
pub use inbox::{Delivery, InboxReader};
pub use outbox::OutboxWriter;
