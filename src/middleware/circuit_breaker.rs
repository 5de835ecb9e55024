use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests reach the provider
    Closed,
    /// Provider is skipped without a request
    Open,
    /// Cool-down elapsed, probing whether the provider recovered
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the tier is skipped
    pub failure_threshold: usize,
    /// How long an open circuit waits before probing again
    pub cool_down: Duration,
    /// Consecutive probe successes needed to close again
    pub success_threshold: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cool_down: Duration::from_secs(30),
            success_threshold: 1,
        }
    }
}

/// Guards one remote translation tier.
///
/// While open, the fallback chain skips the tier immediately instead of
/// waiting on a transport timeout for every page of the chapter.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    inner: Arc<RwLock<BreakerInner>>,
    config: CircuitBreakerConfig,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: usize,
    consecutive_successes: usize,
    opened_at: Option<Instant>,
    trips: usize,
}

impl CircuitBreaker {
    pub fn new(name: &'static str) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    pub fn with_config(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            inner: Arc::new(RwLock::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                trips: 0,
            })),
            config,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns false while the circuit is open and the cool-down has not elapsed
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.write();

        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => match inner.opened_at {
                Some(opened_at) if opened_at.elapsed() >= self.config.cool_down => {
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    true
                }
                _ => false,
            },
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.write();
        inner.consecutive_failures = 0;

        if inner.state != CircuitState::Closed {
            inner.consecutive_successes += 1;
            if inner.consecutive_successes >= self.config.success_threshold {
                info!("{} recovered, closing circuit", self.name);
                inner.state = CircuitState::Closed;
                inner.consecutive_successes = 0;
                inner.opened_at = None;
            }
        }
    }

    /// Record a failed request. Returns true if this failure opened the circuit.
    pub fn record_failure(&self) -> bool {
        let mut inner = self.inner.write();
        inner.consecutive_successes = 0;
        inner.consecutive_failures += 1;

        let trip = match inner.state {
            CircuitState::Closed => inner.consecutive_failures >= self.config.failure_threshold,
            // A failed probe reopens immediately
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };

        if trip {
            warn!(
                "{} failed {} time(s) in a row, skipping it for {:?}",
                self.name, inner.consecutive_failures, self.config.cool_down
            );
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.trips += 1;
        }

        trip
    }

    pub fn state(&self) -> CircuitState {
        self.inner.read().state
    }

    /// Number of times this breaker has opened
    pub fn trips(&self) -> usize {
        self.inner.read().trips
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: usize, cool_down: Duration) -> CircuitBreaker {
        CircuitBreaker::with_config(
            "test-tier",
            CircuitBreakerConfig {
                failure_threshold,
                cool_down,
                success_threshold: 1,
            },
        )
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = breaker(3, Duration::from_secs(60));

        assert!(breaker.allow_request());
        assert!(!breaker.record_failure());
        assert!(!breaker.record_failure());
        assert_eq!(breaker.state(), CircuitState::Closed);

        assert!(breaker.record_failure());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_request());
        assert_eq!(breaker.trips(), 1);
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let breaker = breaker(2, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_probe_after_cool_down() {
        let breaker = breaker(1, Duration::from_millis(50));

        breaker.record_failure();
        assert!(!breaker.allow_request());

        std::thread::sleep(Duration::from_millis(80));
        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_failed_probe_reopens() {
        let breaker = breaker(1, Duration::from_millis(50));

        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(80));
        assert!(breaker.allow_request());

        assert!(breaker.record_failure());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.trips(), 2);
    }
}
