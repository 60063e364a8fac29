//! # accrual-domain
//!
//! Core types shared by every crate in the accrual adapter: the persisted
//! `Event`/`Meta` model, the money-rounding law, and the `Clock` abstraction
//! used to keep daemon logic testable. Each daemon and client crate defines
//! its own `thiserror` error enum scoped to the calls it makes; there is no
//! shared error taxonomy here.

pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

mod event;
mod money;
mod wire;

pub use event::{Event, EventName, EventState, Meta};
pub use money::to_minor_units;
pub use wire::{AccrualProcessed, OrderCreatedMessage};

/// Injectable wall-clock, so daemon logic can be driven by a fixed time in tests.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// `Clock` backed by the real system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
