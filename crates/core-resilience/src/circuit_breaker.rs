//! Circuit Breaker implementation for fault tolerance
//!
//! The circuit breaker prevents cascading failures by failing fast when a service
//! is experiencing issues. It has three states:
//! - Closed: Normal operation, requests pass through
//! - Open: Service is unhealthy, requests fail immediately
//! - HalfOpen: Testing if service has recovered, one probe at a time
//!
//! [`CircuitBreaker::execute`] also owns the retry loop: every attempt runs
//! under the per-call timeout, transient failures are retried with exponential
//! backoff and jitter, and the breaker state is re-checked before each retry.

use super::error::{Classify, ResilienceError};
use super::stats::{CallStats, HealthSnapshot};
use rand::Rng;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests pass through normally
    Closed,
    /// Circuit is open, requests fail immediately
    /// Next probe time indicates when to try half-open
    Open { next_probe: Instant },
    /// Circuit is half-open, testing service recovery
    HalfOpen,
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: usize,
    /// Optional failure fraction (0.0-1.0) over the last `rate_window` outcomes
    pub failure_rate_threshold: Option<f64>,
    /// Number of outcomes considered by `failure_rate_threshold`
    pub rate_window: usize,
    /// Number of consecutive successes in half-open to close circuit
    pub success_threshold: usize,
    /// Duration to wait before transitioning from open to half-open
    pub cooldown: Duration,
    /// Upper bound for a single attempt
    pub call_timeout: Duration,
    /// Initial backoff delay for retries
    pub initial_backoff: Duration,
    /// Maximum backoff delay for retries
    pub max_backoff: Duration,
    /// Backoff multiplier (exponential backoff)
    pub backoff_multiplier: f64,
    /// Random extra delay as a fraction of the backoff (0.0 disables jitter)
    pub jitter_factor: f64,
    /// Maximum number of retry attempts
    pub max_retries: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_rate_threshold: None,
            rate_window: 20,
            success_threshold: 1,
            cooldown: Duration::from_secs(30),
            call_timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
            max_retries: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = Duration::from_secs_f64(base.min(self.max_backoff.as_secs_f64()));

        if self.jitter_factor > 0.0 {
            let jitter = rand::rng().random_range(0.0..self.jitter_factor);
            capped + Duration::from_secs_f64(capped.as_secs_f64() * jitter)
        } else {
            capped
        }
    }
}

/// Internal state of the circuit breaker
#[derive(Debug)]
struct CircuitBreakerState {
    /// Current state of the circuit
    state: CircuitState,
    /// Consecutive failure count
    consecutive_failures: usize,
    /// Consecutive success count (used in half-open state)
    consecutive_successes: usize,
    /// Start of the half-open probe currently running
    probe_started: Option<Instant>,
    /// Recent outcomes for the failure-rate threshold (true = success)
    outcomes: VecDeque<bool>,
}

impl CircuitBreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            probe_started: None,
            outcomes: VecDeque::new(),
        }
    }
}

/// Circuit breaker for protecting against cascading failures
///
/// Cloning is cheap and clones share state and statistics.
///
/// # Example
/// ```no_run
/// use scm_core_resilience::{CircuitBreaker, CircuitBreakerConfig, Classify};
///
/// #[derive(Debug)]
/// struct NetError;
///
/// impl Classify for NetError {
///     fn is_transient(&self) -> bool {
///         true
///     }
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
///
///     let result = breaker
///         .execute(|| async { Ok::<_, NetError>(42) })
///         .await;
///
///     assert_eq!(result.unwrap(), 42);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<CircuitBreakerState>>,
    stats: Arc<CallStats>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(CircuitBreakerState::new())),
            stats: Arc::new(CallStats::new()),
        }
    }

    /// Create a new circuit breaker with default configuration
    pub fn new_default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state of the circuit breaker
    pub fn get_state(&self) -> CircuitState {
        self.lock().state
    }

    /// Whether calls currently pass through untested
    pub fn is_closed(&self) -> bool {
        matches!(self.get_state(), CircuitState::Closed)
    }

    /// Get current failure count
    pub fn get_failure_count(&self) -> usize {
        self.lock().consecutive_failures
    }

    /// Get current success count
    pub fn get_success_count(&self) -> usize {
        self.lock().consecutive_successes
    }

    /// Health snapshot of this breaker and the calls it has guarded
    pub fn stats(&self) -> HealthSnapshot {
        self.stats.snapshot(self.is_closed())
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = CircuitBreakerState::new();
    }

    /// Execute an operation with circuit breaker protection and retry logic
    ///
    /// The operation will be retried with exponential backoff on transient failures.
    /// If the circuit is open, the operation fails immediately without running.
    /// Non-transient errors are returned after the first attempt.
    pub async fn execute<F, Fut, T, E>(&self, mut op: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let guard = self.stats.start();
        let mut attempt = 0;
        let mut last_error = None;

        loop {
            if let Err(open) = self.try_acquire() {
                guard.failure();
                // Report the failure that opened the circuit rather than the fast failure
                return Err(last_error.unwrap_or(open));
            }

            attempt += 1;

            match self.attempt(op()).await {
                Ok(result) => {
                    self.on_success();
                    guard.success();
                    return Ok(result);
                }
                Err(e) if e.should_trip_breaker() => {
                    self.on_failure();

                    if attempt > self.config.max_retries {
                        debug!(attempt, "retries exhausted");
                        guard.failure();
                        return Err(e);
                    }

                    let delay = self.config.backoff_delay(attempt);
                    debug!(attempt, ?delay, error = %ErrorKind(&e), "transient failure, retrying");
                    last_error = Some(e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    // The provider answered; it is reachable even if it said no
                    self.on_success();
                    guard.failure();
                    return Err(e);
                }
            }
        }
    }

    /// Execute an operation without retry logic
    ///
    /// Useful when you want circuit breaker protection but not automatic retries.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let guard = self.stats.start();

        if let Err(open) = self.try_acquire() {
            guard.failure();
            return Err(open);
        }

        match self.attempt(op()).await {
            Ok(value) => {
                self.on_success();
                guard.success();
                Ok(value)
            }
            Err(e) => {
                if e.should_trip_breaker() {
                    self.on_failure();
                } else {
                    self.on_success();
                }
                guard.failure();
                Err(e)
            }
        }
    }

    /// Run one attempt under the call timeout
    async fn attempt<Fut, T, E>(&self, fut: Fut) -> Result<T, ResilienceError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.config.call_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ResilienceError::Inner(e)),
            Err(_) => {
                self.stats.record_timeout();
                warn!(timeout = ?self.config.call_timeout, "call timed out");
                Err(ResilienceError::Timeout(self.config.call_timeout))
            }
        }
    }

    /// Check circuit state and admit the caller if allowed
    fn try_acquire<E>(&self) -> Result<(), ResilienceError<E>> {
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open { next_probe } => {
                if Instant::now() >= next_probe {
                    // Transition to half-open and let this caller probe
                    state.state = CircuitState::HalfOpen;
                    state.consecutive_successes = 0;
                    state.probe_started = Some(Instant::now());
                    info!("circuit half-open, probing provider");
                    Ok(())
                } else {
                    Err(ResilienceError::CircuitOpen)
                }
            }
            CircuitState::HalfOpen => match state.probe_started {
                // A probe older than the call timeout was abandoned by its caller
                Some(started) if started.elapsed() < self.config.call_timeout => {
                    Err(ResilienceError::CircuitOpen)
                }
                _ => {
                    state.probe_started = Some(Instant::now());
                    Ok(())
                }
            },
        }
    }

    /// Handle successful operation
    fn on_success(&self) {
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed => {
                state.consecutive_failures = 0;
                self.push_outcome(&mut state, true);
            }
            CircuitState::HalfOpen => {
                state.probe_started = None;
                state.consecutive_successes += 1;

                if state.consecutive_successes >= self.config.success_threshold {
                    state.state = CircuitState::Closed;
                    state.consecutive_failures = 0;
                    state.consecutive_successes = 0;
                    state.outcomes.clear();
                    info!("circuit closed");
                }
            }
            CircuitState::Open { .. } => {
                // A call admitted before the circuit opened; the open decision stands
            }
        }
    }

    /// Handle failed operation
    fn on_failure(&self) {
        let mut state = self.lock();

        match state.state {
            CircuitState::Closed => {
                state.consecutive_failures += 1;
                self.push_outcome(&mut state, false);

                if state.consecutive_failures >= self.config.failure_threshold
                    || self.failure_rate_exceeded(&state)
                {
                    warn!(
                        failures = state.consecutive_failures,
                        cooldown = ?self.config.cooldown,
                        "circuit opened"
                    );
                    self.trip(&mut state);
                }
            }
            CircuitState::HalfOpen => {
                // Any failure in half-open state reopens the circuit
                warn!("probe failed, circuit reopened");
                self.trip(&mut state);
            }
            CircuitState::Open { .. } => {
                // Already open, nothing to do
            }
        }
    }

    fn trip(&self, state: &mut CircuitBreakerState) {
        state.state = CircuitState::Open {
            next_probe: Instant::now() + self.config.cooldown,
        };
        state.consecutive_failures = 0;
        state.consecutive_successes = 0;
        state.probe_started = None;
        state.outcomes.clear();
    }

    fn push_outcome(&self, state: &mut CircuitBreakerState, success: bool) {
        if self.config.failure_rate_threshold.is_none() {
            return;
        }
        state.outcomes.push_back(success);
        while state.outcomes.len() > self.config.rate_window {
            state.outcomes.pop_front();
        }
    }

    fn failure_rate_exceeded(&self, state: &CircuitBreakerState) -> bool {
        let Some(threshold) = self.config.failure_rate_threshold else {
            return false;
        };
        if state.outcomes.len() < self.config.rate_window.max(1) {
            return false;
        }
        let failures = state.outcomes.iter().filter(|ok| !**ok).count();
        failures as f64 / state.outcomes.len() as f64 >= threshold
    }

    fn lock(&self) -> MutexGuard<'_, CircuitBreakerState> {
        // State updates never panic mid-way, so a poisoned lock still holds a valid state
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Log-friendly label for an error without requiring `Display` on `E`
struct ErrorKind<'a, E>(&'a ResilienceError<E>);

impl<E> std::fmt::Display for ErrorKind<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            ResilienceError::CircuitOpen => write!(f, "circuit open"),
            ResilienceError::Timeout(d) => write!(f, "timeout after {:?}", d),
            ResilienceError::Inner(_) => write!(f, "operation error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        Network,
        Rejected,
    }

    impl Classify for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Network)
        }
    }

    fn quick_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            cooldown: Duration::from_millis(100),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            jitter_factor: 0.0,
            max_retries: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_circuit_breaker_closed_to_open() {
        let breaker = CircuitBreaker::new(quick_config());

        for _ in 0..3 {
            let result: Result<(), _> = breaker.call(|| async { Err(TestError::Network) }).await;
            assert!(result.is_err());
        }

        match breaker.get_state() {
            CircuitState::Open { .. } => (),
            state => panic!("Expected Open state, got {:?}", state),
        }
        assert!(!breaker.is_closed());
    }

    #[tokio::test]
    async fn test_open_circuit_fails_fast_without_running_op() {
        let breaker = CircuitBreaker::new(quick_config());
        let attempts = AtomicUsize::new(0);

        for _ in 0..3 {
            let _: Result<(), _> = breaker
                .execute(|| async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Network)
                })
                .await;
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        for _ in 0..5 {
            let result: Result<(), _> = breaker
                .execute(|| async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
            assert_eq!(result, Err(ResilienceError::<TestError>::CircuitOpen));
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_half_open_to_closed() {
        let config = CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 2,
            ..quick_config()
        };
        let breaker = CircuitBreaker::new(config);

        for _ in 0..2 {
            let _: Result<(), _> = breaker.call(|| async { Err(TestError::Network) }).await;
        }

        tokio::time::advance(Duration::from_millis(150)).await;

        for _ in 0..2 {
            let result = breaker.call(|| async { Ok::<_, TestError>(()) }).await;
            assert!(result.is_ok());
        }

        assert_eq!(breaker.get_state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_reopens() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..quick_config()
        });

        let _: Result<(), _> = breaker.call(|| async { Err(TestError::Network) }).await;
        tokio::time::advance(Duration::from_millis(150)).await;

        let _: Result<(), _> = breaker.call(|| async { Err(TestError::Network) }).await;
        assert!(matches!(breaker.get_state(), CircuitState::Open { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_single_probe() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..quick_config()
        });

        let _: Result<(), _> = breaker.call(|| async { Err(TestError::Network) }).await;
        tokio::time::advance(Duration::from_millis(150)).await;

        // First caller becomes the probe
        assert!(breaker.try_acquire::<TestError>().is_ok());
        assert_eq!(breaker.get_state(), CircuitState::HalfOpen);

        // Others fail fast while it is in flight
        assert_eq!(
            breaker.try_acquire::<TestError>(),
            Err(ResilienceError::CircuitOpen)
        );

        breaker.on_success();
        assert_eq!(breaker.get_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            max_retries: 2,
            failure_threshold: 10,
            ..quick_config()
        });
        let attempts = AtomicUsize::new(0);

        let result: Result<(), _> = breaker
            .execute(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Network)
            })
            .await;

        assert_eq!(result, Err(ResilienceError::Inner(TestError::Network)));
        // Initial attempt + 2 retries
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejections_are_not_retried() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            max_retries: 5,
            ..quick_config()
        });
        let attempts = AtomicUsize::new(0);

        for _ in 0..10 {
            let result: Result<(), _> = breaker
                .execute(|| async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Rejected)
                })
                .await;
            assert_eq!(result, Err(ResilienceError::Inner(TestError::Rejected)));
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 10);
        assert!(breaker.is_closed());
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failure() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            max_retries: 3,
            ..quick_config()
        });
        let attempts = AtomicUsize::new(0);

        let result = breaker
            .execute(|| async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError::Network)
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(breaker.get_failure_count(), 0);
        let stats = breaker.stats();
        assert_eq!(stats.requests.total, 1);
        assert_eq!(stats.requests.success, 1);
    }

    #[tokio::test]
    async fn test_breaker_opening_mid_retry_stops_attempts() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            max_retries: 10,
            ..quick_config()
        });
        let attempts = AtomicUsize::new(0);

        let result: Result<(), _> = breaker
            .execute(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Network)
            })
            .await;

        assert_eq!(result, Err(ResilienceError::Inner(TestError::Network)));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            call_timeout: Duration::from_millis(50),
            ..quick_config()
        });

        let result: Result<(), ResilienceError<TestError>> = breaker
            .call(|| async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await;

        assert_eq!(result, Err(ResilienceError::Timeout(Duration::from_millis(50))));
        let stats = breaker.stats();
        assert_eq!(stats.requests.timeouts, 1);
        assert_eq!(stats.requests.failure, 1);
    }

    #[tokio::test]
    async fn test_failure_rate_threshold() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 100,
            failure_rate_threshold: Some(0.5),
            rate_window: 4,
            ..quick_config()
        });

        for outcome in [true, false, true, false] {
            let _: Result<(), _> = breaker
                .call(|| async move {
                    if outcome {
                        Ok(())
                    } else {
                        Err(TestError::Network)
                    }
                })
                .await;
        }

        assert!(matches!(breaker.get_state(), CircuitState::Open { .. }));
    }

    #[test]
    fn test_exponential_backoff_without_jitter() {
        let config = CircuitBreakerConfig {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
            ..Default::default()
        };

        assert_eq!(config.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(config.backoff_delay(3), Duration::from_millis(300));
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let config = CircuitBreakerConfig {
            initial_backoff: Duration::from_millis(100),
            jitter_factor: 0.5,
            ..Default::default()
        };

        for _ in 0..50 {
            let delay = config.backoff_delay(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay < Duration::from_millis(151));
        }
    }

    #[tokio::test]
    async fn test_reset() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..quick_config()
        });

        let _: Result<(), _> = breaker.call(|| async { Err(TestError::Network) }).await;
        breaker.reset();

        assert_eq!(breaker.get_state(), CircuitState::Closed);
        assert_eq!(breaker.get_failure_count(), 0);
    }
}
