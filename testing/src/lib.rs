//! # accrual-testing
//!
//! In-memory fakes for the accrual adapter's daemon tests: a fixed clock, an
//! `EventRepository` backed by a `Vec` instead of Postgres, and fake
//! calculator/orders clients that return scripted responses.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod mocks;

pub use mocks::{
    test_clock, FakeCalculatorClient, FakeOrdersClient, FixedClock, InMemoryEventRepository,
};
