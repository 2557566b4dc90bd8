//! Circuit breaker decorator for service operations.
//!
//! Wraps a call with outcome/duration instrumentation and fails fast
//! once a failure threshold is reached, instead of letting errors
//! cascade into every caller.
//!
//! States:
//! - `Closed`: normal operation, calls pass through
//! - `Open`: too many failures, calls are rejected immediately
//! - `HalfOpen`: probing recovery, limited calls allowed

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;

/// The state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Rejecting calls.
    Open,
    /// Testing recovery.
    HalfOpen,
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing recovery.
    pub open_timeout: Duration,
    /// Successes needed in half-open state to close the circuit.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// Error returned by a guarded call.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the underlying operation was not invoked.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The underlying operation ran and failed.
    #[error(transparent)]
    Operation(E),
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

/// Process-scoped circuit breaker, shared by cloning.
///
/// Created once at startup and passed by reference to the components
/// that guard their calls with it.
#[derive(Clone)]
pub struct CircuitBreaker {
    state: Arc<Mutex<BreakerState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker in the closed state.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            })),
            config,
        }
    }

    /// Runs `operation` under the breaker, recording duration and outcome.
    ///
    /// Returns `CircuitOpen` without invoking the operation while the
    /// circuit is open and the open timeout has not elapsed.
    pub async fn call<F, T, E>(
        &self,
        operation_name: &'static str,
        operation: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        {
            let mut state = self.state.lock().await;
            if state.state == CircuitState::Open {
                let elapsed_open = state.last_failure.map(|t| t.elapsed());
                if elapsed_open.is_some_and(|e| e >= self.config.open_timeout) {
                    tracing::info!(operation = operation_name, "circuit breaker half-open");
                    state.state = CircuitState::HalfOpen;
                    state.success_count = 0;
                } else {
                    metrics::counter!("circuit_breaker_rejected_total").increment(1);
                    return Err(CircuitBreakerError::CircuitOpen);
                }
            }
        }

        let start = Instant::now();
        let result = operation.await;
        let duration = start.elapsed();
        metrics::histogram!("operation_duration_seconds", "operation" => operation_name)
            .record(duration.as_secs_f64());

        match result {
            Ok(value) => {
                tracing::debug!(operation = operation_name, ?duration, "operation completed");
                self.record_success().await;
                Ok(value)
            }
            Err(err) => {
                tracing::error!(operation = operation_name, error = %err, "operation failed");
                self.record_failure().await;
                Err(CircuitBreakerError::Operation(err))
            }
        }
    }

    async fn record_success(&self) {
        let mut state = self.state.lock().await;
        match state.state {
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    tracing::info!(
                        successes = state.success_count,
                        "circuit breaker closing after recovery"
                    );
                    state.state = CircuitState::Closed;
                    state.failure_count = 0;
                    state.success_count = 0;
                    state.last_failure = None;
                }
            }
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        state.failure_count += 1;
        state.last_failure = Some(Instant::now());

        match state.state {
            CircuitState::Closed => {
                if state.failure_count >= self.config.failure_threshold {
                    tracing::warn!(
                        failures = state.failure_count,
                        "circuit breaker opening"
                    );
                    state.state = CircuitState::Open;
                    metrics::counter!("circuit_breaker_opened_total").increment(1);
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!("failure during half-open probe, reopening circuit");
                state.state = CircuitState::Open;
                state.success_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Returns the current circuit state.
    pub async fn state(&self) -> CircuitState {
        self.state.lock().await.state
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
