//! Aggregate call statistics
//!
//! Counters are process-wide for the owning breaker, updated atomically from
//! concurrent callers, and only ever grow (the concurrency gauge aside).

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Request counters of a [`HealthSnapshot`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStats {
    /// Invocations started
    pub total: u64,
    /// Attempts that hit the per-call timeout
    pub timeouts: u64,
    /// Invocations that succeeded
    pub success: u64,
    /// Invocations that failed (including fast failures)
    pub failure: u64,
    /// Invocations currently in flight
    pub concurrent: u64,
    /// Mean wall time of finished invocations, in milliseconds
    pub average_time: f64,
}

/// Breaker view of a [`HealthSnapshot`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerStats {
    /// Whether calls currently pass through
    pub is_closed: bool,
}

/// Read-only health view for external monitoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub requests: RequestStats,
    pub breaker: BreakerStats,
}

/// Atomic counters shared by all callers of one breaker
#[derive(Debug, Default)]
pub struct CallStats {
    total: AtomicU64,
    timeouts: AtomicU64,
    success: AtomicU64,
    failure: AtomicU64,
    concurrent: AtomicU64,
    finished: AtomicU64,
    elapsed_micros: AtomicU64,
}

impl CallStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new invocation
    ///
    /// The returned guard must be resolved with [`CallGuard::success`] or
    /// [`CallGuard::failure`]; dropping it unresolved counts as a failure.
    pub fn start(&self) -> CallGuard<'_> {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.concurrent.fetch_add(1, Ordering::Relaxed);
        CallGuard {
            stats: self,
            started: Instant::now(),
            resolved: false,
        }
    }

    /// Count one attempt that exceeded the call timeout
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failure.load(Ordering::Relaxed)
    }

    pub fn concurrent(&self) -> u64 {
        self.concurrent.load(Ordering::Relaxed)
    }

    /// Mean wall time of finished invocations in milliseconds
    pub fn average_time_ms(&self) -> f64 {
        let finished = self.finished.load(Ordering::Relaxed);
        if finished == 0 {
            0.0
        } else {
            self.elapsed_micros.load(Ordering::Relaxed) as f64 / finished as f64 / 1000.0
        }
    }

    /// Build a snapshot; the caller supplies the breaker state
    pub fn snapshot(&self, is_closed: bool) -> HealthSnapshot {
        HealthSnapshot {
            requests: RequestStats {
                total: self.total(),
                timeouts: self.timeouts(),
                success: self.successes(),
                failure: self.failures(),
                concurrent: self.concurrent(),
                average_time: self.average_time_ms(),
            },
            breaker: BreakerStats { is_closed },
        }
    }

    fn finish(&self, started: Instant, succeeded: bool) {
        let counter = if succeeded { &self.success } else { &self.failure };
        counter.fetch_add(1, Ordering::Relaxed);
        self.concurrent.fetch_sub(1, Ordering::Relaxed);
        self.finished.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.elapsed_micros.fetch_add(micros, Ordering::Relaxed);
    }
}

/// In-flight invocation tracked by [`CallStats`]
#[derive(Debug)]
pub struct CallGuard<'a> {
    stats: &'a CallStats,
    started: Instant,
    resolved: bool,
}

impl CallGuard<'_> {
    /// Record a successful outcome
    pub fn success(mut self) {
        self.resolved = true;
        self.stats.finish(self.started, true);
    }

    /// Record a failed outcome
    pub fn failure(mut self) {
        self.resolved = true;
        self.stats.finish(self.started, false);
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.stats.finish(self.started, false);
        }
    }
}
