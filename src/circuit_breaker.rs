// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Circuit breaker guarding the orchestration service.
//!
//! Prevents hammering a failing downstream when critical events keep
//! failing. One breaker is shared by every breaker-eligible event type, so
//! failures of `project.created` also protect `project.deleted`: the breaker
//! models the health of the shared dependency, not of an event type.
//!
//! # States
//!
//! - **Closed**: Normal operation, requests pass through
//! - **Open**: Threshold reached, requests fail fast without attempting
//! - **HalfOpen**: Open, but the recovery timeout has elapsed; the next call
//!   is let through as a trial. Not stored, derived from the open state.
//!
//! ```text
//!          failures >= threshold
//! Closed ─────────────────────────→ Open
//!    ↑                                │ recovery_timeout elapsed
//!    │ trial succeeds                 ↓
//!    └─────────────────────────── HalfOpen ──(trial fails)──→ Open
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! # use project_events::circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitError};
//! # async fn example() {
//! let breaker = CircuitBreaker::new("orchestrator", CircuitConfig::default());
//!
//! match breaker.call(|| async { Ok::<(), String>(()) }).await {
//!     Ok(()) => { /* delivered */ }
//!     Err(CircuitError::Rejected) => { /* circuit open, fail fast */ }
//!     Err(CircuitError::Inner(e)) => { /* delivery error */ }
//! }
//! # }
//! ```

use crate::metrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker state for metrics/monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Normal operation, requests pass through
    Closed,
    /// Cooldown elapsed, next call tries the dependency
    HalfOpen,
    /// Dependency unhealthy, fail-fast
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::HalfOpen => write!(f, "half-open"),
            Self::Open => write!(f, "open"),
        }
    }
}

/// Error type for circuit-protected operations.
#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E> {
    /// The circuit breaker rejected the call (circuit is open).
    #[error("Circuit breaker is OPEN")]
    Rejected,

    /// The underlying operation failed.
    #[error("operation failed: {0}")]
    Inner(#[source] E),
}

impl<E> CircuitError<E> {
    /// Check if this is a rejection (circuit open).
    pub fn is_rejected(&self) -> bool {
        matches!(self, CircuitError::Rejected)
    }

    /// Get the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitError::Inner(e) => Some(e),
            CircuitError::Rejected => None,
        }
    }
}

/// Configuration for a circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitConfig {
    /// Number of consecutive failures to trip the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before letting a trial call through.
    pub recovery_timeout: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitConfig {
    /// Fast recovery for testing.
    pub fn testing() -> Self {
        Self {
            failure_threshold: 2,
            recovery_timeout: Duration::from_millis(50),
        }
    }
}

/// Point-in-time view of the breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct BreakerState {
    open: bool,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    last_failure_wall: Option<DateTime<Utc>>,
}

/// A named circuit breaker with call counters.
///
/// State transitions happen under an internal mutex that is never held
/// across an `.await`; the guarded operation runs unlocked.
pub struct CircuitBreaker {
    name: String,
    config: CircuitConfig,
    state: Mutex<BreakerState>,

    // Metrics
    calls_total: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and config.
    pub fn new(name: impl Into<String>, config: CircuitConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::default()),
            calls_total: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
        }
    }

    /// Create with default config.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitConfig::default())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn derive_state(&self, state: &BreakerState) -> CircuitState {
        if !state.open {
            return CircuitState::Closed;
        }
        match state.last_failure_at {
            Some(at) if at.elapsed() < self.config.recovery_timeout => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    /// Execute an async operation through the circuit breaker.
    ///
    /// Takes a closure that returns a Future so a rejected call never
    /// constructs (let alone polls) the operation. Every `Err` counts as a
    /// failure; use [`call_with`](Self::call_with) to exempt some errors.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with(f, |_| true).await
    }

    /// Like [`call`](Self::call), but only errors for which `is_failure`
    /// returns true move the breaker toward open.
    ///
    /// Other errors are passed through and leave the breaker state and the
    /// success/failure counters untouched: they say nothing about the health
    /// of the protected dependency.
    pub async fn call_with<F, Fut, T, E, P>(&self, f: F, is_failure: P) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        self.calls_total.fetch_add(1, Ordering::Relaxed);

        let current = self.state();
        if current == CircuitState::Open {
            self.rejections.fetch_add(1, Ordering::Relaxed);
            warn!(circuit = %self.name, "Circuit breaker rejected call (open)");
            metrics::record_circuit_rejection(&self.name);
            return Err(CircuitError::Rejected);
        }
        if current == CircuitState::HalfOpen {
            debug!(circuit = %self.name, "Circuit half-open, allowing trial call");
        }

        match f().await {
            Ok(result) => {
                self.successes.fetch_add(1, Ordering::Relaxed);
                self.on_success();
                Ok(result)
            }
            Err(e) if is_failure(&e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.on_failure();
                Err(CircuitError::Inner(e))
            }
            Err(e) => {
                debug!(circuit = %self.name, "Error not counted against circuit");
                Err(CircuitError::Inner(e))
            }
        }
    }

    fn on_success(&self) {
        let mut state = self.lock();
        let was_open = state.open;
        state.open = false;
        state.consecutive_failures = 0;
        drop(state);

        if was_open {
            info!(circuit = %self.name, "Circuit breaker closed after successful trial call");
            metrics::set_circuit_state(&self.name, CircuitState::Closed);
        }
    }

    fn on_failure(&self) {
        let mut state = self.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure_at = Some(Instant::now());
        state.last_failure_wall = Some(Utc::now());

        let failures = state.consecutive_failures;
        let tripped = !state.open && failures >= self.config.failure_threshold;
        if failures >= self.config.failure_threshold {
            state.open = true;
        }
        drop(state);

        if tripped {
            warn!(
                circuit = %self.name,
                failures,
                threshold = self.config.failure_threshold,
                recovery_timeout_ms = self.config.recovery_timeout.as_millis() as u64,
                "Circuit breaker opened"
            );
            metrics::set_circuit_state(&self.name, CircuitState::Open);
        } else {
            debug!(circuit = %self.name, failures, "Circuit call failed");
        }
    }

    /// Current state, with half-open derived from the cooldown.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let state = self.lock();
        self.derive_state(&state)
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    #[must_use]
    pub fn snapshot(&self) -> CircuitSnapshot {
        let state = self.lock();
        CircuitSnapshot {
            state: self.derive_state(&state),
            consecutive_failures: state.consecutive_failures,
            last_failure_at: state.last_failure_wall,
        }
    }

    /// Get total number of calls.
    #[must_use]
    pub fn calls_total(&self) -> u64 {
        self.calls_total.load(Ordering::Relaxed)
    }

    /// Get number of successful calls.
    #[must_use]
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Get number of failed calls (operation errors).
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Get number of rejected calls (circuit open).
    #[must_use]
    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }
}
