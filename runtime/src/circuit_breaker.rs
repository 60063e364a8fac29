use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    Closed,
    /// Failing fast, calls are rejected immediately.
    Open,
    /// Probing recovery with a limited number of calls.
    HalfOpen,
}

/// Circuit breaker is open; the call was rejected without being attempted.
#[derive(Debug, Clone, thiserror::Error)]
#[error("circuit breaker is open")]
pub struct CircuitOpenError;

/// Wraps calls to an unreliable downstream (the calculator HTTP API, the
/// orders gRPC service) and stops attempting them after a run of failures,
/// so a daemon doesn't spend its poll budget on a service that's down.
///
/// Callers check `Result<T, CircuitOpenError>` before making their own
/// fallible call, rather than wrapping the call itself.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Arc<AtomicU8>,
    failure_count: Arc<AtomicUsize>,
    success_count: Arc<AtomicUsize>,
    opened_at: Arc<AtomicU64>,
    failure_threshold: usize,
    timeout: Duration,
    success_threshold: usize,
}

impl CircuitBreaker {
    /// A breaker with defaults: 5 consecutive failures opens it, 60s
    /// before probing recovery, 2 consecutive successes to close it.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(CircuitState::Closed as u8)),
            failure_count: Arc::new(AtomicUsize::new(0)),
            success_count: Arc::new(AtomicUsize::new(0)),
            opened_at: Arc::new(AtomicU64::new(0)),
            failure_threshold: 5,
            timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }

    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Current state, accounting for an elapsed open-to-half-open timeout.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        match self.state.load(Ordering::Acquire) {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    /// Call before attempting the guarded operation.
    ///
    /// # Errors
    ///
    /// Returns `CircuitOpenError` if the breaker is open and the timeout
    /// has not yet elapsed.
    pub fn check(&self) -> Result<(), CircuitOpenError> {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let opened_at = self.opened_at.load(Ordering::Acquire);
                let now = now_nanos();
                let elapsed = Duration::from_nanos(now.saturating_sub(opened_at));

                if elapsed >= self.timeout {
                    self.state.store(CircuitState::HalfOpen as u8, Ordering::Release);
                    self.success_count.store(0, Ordering::Release);
                    metrics::counter!("circuit_breaker.state_change", "from" => "open", "to" => "half_open").increment(1);
                    tracing::info!("circuit breaker probing recovery (open -> half-open)");
                    Ok(())
                } else {
                    Err(CircuitOpenError)
                }
            }
        }
    }

    /// Record that the guarded operation succeeded.
    pub fn record_success(&self) {
        match self.state() {
            CircuitState::Closed => self.failure_count.store(0, Ordering::Release),
            CircuitState::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.success_threshold {
                    self.state.store(CircuitState::Closed as u8, Ordering::Release);
                    self.failure_count.store(0, Ordering::Release);
                    self.success_count.store(0, Ordering::Release);
                    metrics::counter!("circuit_breaker.state_change", "from" => "half_open", "to" => "closed").increment(1);
                    tracing::info!("circuit breaker recovered (half-open -> closed)");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record that the guarded operation failed.
    pub fn record_failure(&self) {
        match self.state() {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.failure_threshold {
                    self.open();
                    metrics::counter!("circuit_breaker.state_change", "from" => "closed", "to" => "open").increment(1);
                    tracing::warn!(failures, threshold = self.failure_threshold, "circuit breaker opening");
                }
            }
            CircuitState::HalfOpen => {
                self.open();
                metrics::counter!("circuit_breaker.state_change", "from" => "half_open", "to" => "open").increment(1);
                tracing::warn!("circuit breaker reopening after failed probe");
            }
            CircuitState::Open => {}
        }
    }

    fn open(&self) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        self.success_count.store(0, Ordering::Release);
        self.opened_at.store(now_nanos(), Ordering::Release);
    }
}

fn now_nanos() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as u64
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CircuitBreaker {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            failure_count: Arc::clone(&self.failure_count),
            success_count: Arc::clone(&self.success_count),
            opened_at: Arc::clone(&self.opened_at),
            failure_threshold: self.failure_threshold,
            timeout: self.timeout,
            success_threshold: self.success_threshold,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new().with_failure_threshold(3);
        for _ in 0..3 {
            breaker.check().unwrap();
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.check().is_err());
    }

    #[test]
    fn closes_after_success_threshold_in_half_open() {
        let breaker = CircuitBreaker::new()
            .with_failure_threshold(1)
            .with_timeout(Duration::ZERO);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        // timeout is zero, so the next check flips it to half-open immediately
        breaker.check().unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_success();
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
