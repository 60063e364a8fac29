//! # accrual-runtime
//!
//! The ambient stack shared by every accrual adapter binary: environment
//! configuration, retry/backoff, a circuit breaker for the calculator and
//! orders clients, and the cooperative shutdown signal daemons select on.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;

pub mod circuit_breaker;
pub mod retry;
pub mod shutdown;

pub use circuit_breaker::{CircuitBreaker, CircuitOpenError, CircuitState};
pub use config::Config;
pub use error::RuntimeError;
pub use shutdown::ShutdownSignal;

/// Install the `tracing` subscriber from `RUST_LOG`/`LOG_LEVEL`, falling
/// back to the configured `log_level` if neither is set.
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
