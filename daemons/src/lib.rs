//! # accrual-daemons
//!
//! The four logical units of the accrual adapter's event pipeline, grouped
//! into the three processes they actually ship as: the inbox consumer
//! reads `order_created` broker messages into the durable store, the
//! event-processor and accrual-poll daemons share a pub/sub hint queue in
//! one process, and the outbox publisher drains `accrual_*` rows back out
//! to the broker.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod inbox;
pub mod outbox;
pub mod poll;
pub mod processor;
