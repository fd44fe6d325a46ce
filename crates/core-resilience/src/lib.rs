//! SCM Core Resilience: Pure-logic fault tolerance primitives
//!
//! # Overview
//!
//! This crate guards calls to a remote provider that may be slow, flaky or
//! down. It includes:
//!
//! - **Circuit Breaker**: Fails fast while the provider is unhealthy and probes for recovery
//! - **Retry**: Exponential backoff with jitter for transient failures, bounded per attempt by a timeout
//! - **Call Statistics**: Atomic counters exposed as a serializable health snapshot
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - Network protocols (HTTP, REST, GraphQL)
//! - Provider APIs or credentials
//! - Application-specific concerns
//!
//! Errors are classified through the [`Classify`] trait: transient errors are
//! retried and trip the breaker, everything else is handed straight back.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Your Application                │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Call Statistics                   │  ← Counts every invocation
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Circuit Breaker                   │  ← Fail-fast protection
//! │  (Tracks failures, opens on threshold)  │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Retry + Timeout                   │  ← Backoff with jitter
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//!         Remote Provider
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use scm_core_resilience::{CircuitBreaker, CircuitBreakerConfig, Classify, ResilienceError};
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct Unreachable;
//!
//! impl Classify for Unreachable {
//!     fn is_transient(&self) -> bool {
//!         true
//!     }
//! }
//!
//! # async fn example() -> Result<(), ResilienceError<Unreachable>> {
//! let config = CircuitBreakerConfig {
//!     failure_threshold: 5,
//!     success_threshold: 2,
//!     cooldown: Duration::from_secs(60),
//!     ..Default::default()
//! };
//!
//! let breaker = CircuitBreaker::new(config);
//!
//! // Execute operation with retry and circuit breaker protection
//! let result = breaker.execute(|| async {
//!     // Your potentially failing operation
//!     Ok::<_, Unreachable>(42)
//! }).await?;
//!
//! println!("{}", serde_json::to_string(&breaker.stats()).unwrap());
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod error;
pub mod stats;

// Re-export main types for convenience
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::{Classify, ResilienceError};
pub use stats::{BreakerStats, CallGuard, CallStats, HealthSnapshot, RequestStats};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use scm_core_resilience::prelude::*;
/// ```
pub mod prelude {
    pub use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use super::error::{Classify, ResilienceError};
    pub use super::stats::HealthSnapshot;
}
