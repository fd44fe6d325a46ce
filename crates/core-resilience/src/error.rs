//! Error types for the resilience layer

use std::time::Duration;
use thiserror::Error;

/// Classification hook for errors flowing through the circuit breaker
///
/// Transient errors (network failures, timeouts, provider overload) are
/// retried and counted against the breaker. Everything else is a definitive
/// answer from the remote side and is returned to the caller untouched.
pub trait Classify {
    /// Whether retrying the same call may succeed
    fn is_transient(&self) -> bool;
}

/// Errors that can occur in resilience operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResilienceError<E> {
    /// Circuit breaker is open, rejecting requests
    #[error("Circuit breaker is open, rejecting requests")]
    CircuitOpen,

    /// A single attempt exceeded the configured call timeout
    #[error("Operation timeout after {0:?}")]
    Timeout(Duration),

    /// The wrapped operation failed
    #[error("{0}")]
    Inner(E),
}

impl<E: Classify> ResilienceError<E> {
    /// Check if this error is transient and can be retried
    pub fn is_transient(&self) -> bool {
        match self {
            ResilienceError::CircuitOpen => false,
            ResilienceError::Timeout(_) => true,
            ResilienceError::Inner(e) => e.is_transient(),
        }
    }

    /// Check if this error should contribute to the circuit breaker failure count
    pub fn should_trip_breaker(&self) -> bool {
        !matches!(self, ResilienceError::CircuitOpen) && self.is_transient()
    }
}

impl<E> ResilienceError<E> {
    /// Whether this is a fast failure from an open circuit
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen)
    }

    /// The wrapped operation error, if any
    pub fn into_inner(self) -> Option<E> {
        match self {
            ResilienceError::Inner(e) => Some(e),
            _ => None,
        }
    }
}
