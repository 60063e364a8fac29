//! Postgres-backed durable event repository for the accrual adapter.
//!
//! The `events` table is the single source of truth for the pipeline. This
//! crate exposes the six transactional operations the daemons need and
//! nothing else: two locking disciplines (`SKIP LOCKED` for the
//! event-processor's homogeneous dequeue, `NOWAIT` for the outbox's
//! mixed-kind fail-fast dequeue), insert-or-ignore idempotency, and the
//! atomic state-transition-plus-companion-event writes the pipeline needs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod repository;

pub use error::StoreError;
pub use repository::{EventRepository, PgEventRepository};

/// SQL that creates the `events` table, applied by binaries at startup (no
/// external migration runner is introduced for a single-table schema).
pub const SCHEMA: &str = include_str!("../migrations/0001_events.sql");
