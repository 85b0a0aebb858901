// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Priority-aware retry engine.
//!
//! Every publish goes through [`RetryEngine::publish_with_retry()`], which
//! reads the event's registry entry and decides:
//!
//! - how many attempts to make (`max_attempts`)
//! - how long to wait between them (`retry_policy`)
//! - whether attempts go through the shared [`CircuitBreaker`]
//! - what happens when attempts run out (`priority`)
//!
//! # Terminal Failures
//!
//! | Priority | After the last failed attempt |
//! |----------|-------------------------------|
//! | critical, high | [`PublishError::Exhausted`] returned to the caller |
//! | medium, low | logged at error level, `error` metric, `Ok(())` |
//!
//! # Backoff Schedule
//!
//! ```text
//! Attempt  Exponential        Linear
//! -------  -----------        ------
//! 1        100ms + jitter     500ms + jitter
//! 2        200ms + jitter     1000ms + jitter
//! 3        400ms + jitter     1500ms + jitter
//! 4        800ms + jitter     2000ms + jitter
//! ```
//!
//! Jitter is uniform in `[0, 100)` ms, drawn from an injected [`JitterSource`].

use crate::circuit_breaker::{CircuitBreaker, CircuitError};
use crate::error::{PublishError, Result};
use crate::metrics::{MetricKind, MetricsRegistry};
use crate::registry::{EventType, RetryPolicy};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Upper bound (exclusive) of the random jitter added to every delay.
pub const JITTER_MAX_MS: u64 = 100;

/// First exponential delay, doubled per attempt.
pub const EXPONENTIAL_BASE_MS: u64 = 100;

/// Linear delay step, multiplied by the attempt number.
pub const LINEAR_STEP_MS: u64 = 500;

/// Source of retry jitter.
pub trait JitterSource: Send + Sync {
    /// Uniform draw in `[0, upper_ms)`. Returns 0 when `upper_ms` is 0.
    fn jitter_ms(&self, upper_ms: u64) -> u64;
}

/// Default jitter from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn jitter_ms(&self, upper_ms: u64) -> u64 {
        if upper_ms == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..upper_ms)
    }
}

/// Constant jitter, clamped below the upper bound. For deterministic tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedJitter(pub u64);

impl JitterSource for FixedJitter {
    fn jitter_ms(&self, upper_ms: u64) -> u64 {
        self.0.min(upper_ms.saturating_sub(1))
    }
}

/// Delay to wait after failed `attempt` (1-indexed).
pub fn compute_delay(policy: RetryPolicy, attempt: u32, jitter: &dyn JitterSource) -> Duration {
    let attempt = attempt.max(1);
    let base_ms = match policy {
        RetryPolicy::ExponentialBackoff => {
            EXPONENTIAL_BASE_MS.saturating_mul(2u64.saturating_pow(attempt - 1))
        }
        RetryPolicy::LinearBackoff => LINEAR_STEP_MS.saturating_mul(u64::from(attempt)),
        RetryPolicy::None => return Duration::ZERO,
    };
    Duration::from_millis(base_ms.saturating_add(jitter.jitter_ms(JITTER_MAX_MS)))
}

/// Runs delivery attempts according to the event registry.
pub struct RetryEngine {
    circuit: Arc<CircuitBreaker>,
    metrics: Arc<MetricsRegistry>,
    jitter: Arc<dyn JitterSource>,
}

impl RetryEngine {
    pub fn new(circuit: Arc<CircuitBreaker>, metrics: Arc<MetricsRegistry>) -> Self {
        Self::with_jitter(circuit, metrics, Arc::new(ThreadRngJitter))
    }

    pub fn with_jitter(
        circuit: Arc<CircuitBreaker>,
        metrics: Arc<MetricsRegistry>,
        jitter: Arc<dyn JitterSource>,
    ) -> Self {
        Self {
            circuit,
            metrics,
            jitter,
        }
    }

    pub fn circuit(&self) -> &Arc<CircuitBreaker> {
        &self.circuit
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Same as [`publish_with_retry()`](Self::publish_with_retry) for a
    /// dotted event name. Unregistered names fail before any attempt.
    pub async fn publish_named<F, Fut>(&self, event_type: &str, correlation_id: &str, attempt_fn: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let event_type: EventType = event_type.parse()?;
        self.publish_with_retry(event_type, correlation_id, attempt_fn).await
    }

    /// Invoke `attempt_fn` until it succeeds or the registry budget is spent.
    ///
    /// `attempt_fn` is called once per attempt and must perform exactly one
    /// delivery. Non-retryable errors and breaker rejections return
    /// immediately.
    pub async fn publish_with_retry<F, Fut>(
        &self,
        event_type: EventType,
        correlation_id: &str,
        mut attempt_fn: F,
    ) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let entry = event_type.metadata();
        let max_attempts = entry.max_attempts.max(1);
        let started = Instant::now();
        let mut last_error: Option<PublishError> = None;

        for attempt in 1..=max_attempts {
            let outcome = if entry.use_circuit_breaker {
                // Only retryable (transport) errors reflect orchestrator health.
                match self
                    .circuit
                    .call_with(|| attempt_fn(), PublishError::is_retryable)
                    .await
                {
                    Ok(()) => Ok(()),
                    Err(CircuitError::Rejected) => Err(PublishError::CircuitOpen),
                    Err(CircuitError::Inner(e)) => Err(e),
                }
            } else {
                attempt_fn().await
            };

            match outcome {
                Ok(()) => {
                    let elapsed_ms = started.elapsed().as_millis() as f64;
                    self.metrics.increment(event_type, MetricKind::Success);
                    self.metrics.record(event_type, MetricKind::Duration, elapsed_ms);
                    debug!(
                        event_type = %event_type,
                        correlation_id,
                        attempt,
                        duration_ms = elapsed_ms,
                        "Event published"
                    );
                    return Ok(());
                }
                Err(PublishError::CircuitOpen) => {
                    self.metrics.increment(event_type, MetricKind::Failure);
                    warn!(
                        event_type = %event_type,
                        correlation_id,
                        attempt,
                        "Circuit breaker open, not publishing"
                    );
                    return Err(PublishError::CircuitOpen);
                }
                Err(e) if !e.is_retryable() => {
                    error!(
                        event_type = %event_type,
                        correlation_id,
                        attempt,
                        error = %e,
                        "Non-retryable publish error"
                    );
                    return Err(e);
                }
                Err(e) => {
                    if attempt < max_attempts {
                        self.metrics.increment(event_type, MetricKind::Retry);
                        let delay = compute_delay(entry.retry_policy, attempt, self.jitter.as_ref());
                        warn!(
                            event_type = %event_type,
                            correlation_id,
                            attempt,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Publish attempt failed, retrying"
                        );
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    } else {
                        self.metrics.increment(event_type, MetricKind::Failure);
                    }
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.map(|e| e.to_string()).unwrap_or_default();

        if entry.priority.is_high() {
            error!(
                event_type = %event_type,
                correlation_id,
                attempts = max_attempts,
                priority = %entry.priority,
                error = %last_error,
                "Event publish failed after all attempts"
            );
            return Err(PublishError::Exhausted {
                event_type: event_type.as_str().to_string(),
                attempts: max_attempts,
                last_error,
            });
        }

        error!(
            event_type = %event_type,
            correlation_id,
            attempts = max_attempts,
            priority = %entry.priority,
            error = %last_error,
            "Dropping event after all attempts"
        );
        self.metrics.increment(event_type, MetricKind::Error);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::{CircuitConfig, CircuitState};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn engine() -> RetryEngine {
        RetryEngine::with_jitter(
            Arc::new(CircuitBreaker::with_defaults("test")),
            Arc::new(MetricsRegistry::new()),
            Arc::new(FixedJitter(0)),
        )
    }

    fn delivery_error(event_type: EventType) -> PublishError {
        PublishError::delivery(event_type.as_str(), "connection refused")
    }

    // =========================================================================
    // Backoff
    // =========================================================================

    #[test]
    fn test_exponential_delays() {
        let jitter = FixedJitter(0);
        let delays: Vec<_> = (1..=4)
            .map(|n| compute_delay(RetryPolicy::ExponentialBackoff, n, &jitter))
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
            ]
        );
    }

    #[test]
    fn test_linear_delays() {
        let jitter = FixedJitter(0);
        assert_eq!(compute_delay(RetryPolicy::LinearBackoff, 1, &jitter), Duration::from_millis(500));
        assert_eq!(compute_delay(RetryPolicy::LinearBackoff, 2, &jitter), Duration::from_millis(1000));
        assert_eq!(compute_delay(RetryPolicy::LinearBackoff, 3, &jitter), Duration::from_millis(1500));
    }

    #[test]
    fn test_no_policy_never_waits() {
        assert_eq!(compute_delay(RetryPolicy::None, 3, &FixedJitter(50)), Duration::ZERO);
    }

    #[test]
    fn test_fixed_jitter_clamped_below_bound() {
        assert_eq!(
            compute_delay(RetryPolicy::ExponentialBackoff, 1, &FixedJitter(500)),
            Duration::from_millis(199)
        );
    }

    #[test]
    fn test_thread_rng_jitter_in_range() {
        let jitter = ThreadRngJitter;
        for _ in 0..1_000 {
            assert!(jitter.jitter_ms(JITTER_MAX_MS) < JITTER_MAX_MS);
        }
        assert_eq!(jitter.jitter_ms(0), 0);
    }

    #[test]
    fn test_huge_attempt_saturates() {
        let delay = compute_delay(RetryPolicy::ExponentialBackoff, 200, &FixedJitter(0));
        assert_eq!(delay, Duration::from_millis(u64::MAX));
    }

    // =========================================================================
    // Engine
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let engine = engine();
        let calls = AtomicU32::new(0);

        engine
            .publish_with_retry(EventType::ProjectCreated, "c-1", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let metrics = engine.metrics();
        assert_eq!(metrics.get(EventType::ProjectCreated, MetricKind::Success), Some(1.0));
        assert!(metrics.get(EventType::ProjectCreated, MetricKind::Duration).is_some());
        assert_eq!(metrics.get(EventType::ProjectCreated, MetricKind::Retry), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_exhausts_five_attempts() {
        let engine = engine();
        let calls = AtomicU32::new(0);

        let err = engine
            .publish_with_retry(EventType::ProjectDeleted, "c-1", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(delivery_error(EventType::ProjectDeleted)) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        let message = err.to_string();
        assert!(message.contains("project.deleted"));
        assert!(message.contains("after 5 attempts"));
        let metrics = engine.metrics();
        assert_eq!(metrics.get(EventType::ProjectDeleted, MetricKind::Retry), Some(4.0));
        assert_eq!(metrics.get(EventType::ProjectDeleted, MetricKind::Failure), Some(1.0));
        assert_eq!(metrics.get(EventType::ProjectDeleted, MetricKind::Error), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_backoff_elapsed() {
        let engine = engine();
        let start = Instant::now();

        let _ = engine
            .publish_with_retry(EventType::ProjectCreated, "c-1", || async {
                Err(delivery_error(EventType::ProjectCreated))
            })
            .await;

        // 100 + 200 + 400 + 800 with zero jitter.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1500), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1600), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_medium_swallows_after_three_attempts() {
        let engine = engine();
        let calls = AtomicU32::new(0);

        engine
            .publish_with_retry(EventType::ProjectUpdated, "c-1", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(delivery_error(EventType::ProjectUpdated)) }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let metrics = engine.metrics();
        assert_eq!(metrics.get(EventType::ProjectUpdated, MetricKind::Error), Some(1.0));
        assert_eq!(metrics.get(EventType::ProjectUpdated, MetricKind::Retry), Some(2.0));
        assert_eq!(metrics.get(EventType::ProjectUpdated, MetricKind::Failure), Some(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_medium_bypasses_breaker() {
        let engine = engine();

        let _ = engine
            .publish_with_retry(EventType::ProjectArchived, "c-1", || async {
                Err(delivery_error(EventType::ProjectArchived))
            })
            .await;

        assert_eq!(engine.circuit().calls_total(), 0);
        assert_eq!(engine.circuit().consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let engine = engine();
        let calls = AtomicU32::new(0);

        engine
            .publish_with_retry(EventType::ProjectCreated, "c-1", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(delivery_error(EventType::ProjectCreated))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.metrics().get(EventType::ProjectCreated, MetricKind::Success), Some(1.0));
        assert_eq!(engine.circuit().consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_propagates_immediately() {
        let engine = engine();
        let calls = AtomicU32::new(0);

        let err = engine
            .publish_with_retry(EventType::ProjectUpdated, "c-1", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PublishError::Internal("bad envelope".into())) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Internal(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(engine.metrics().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_not_counted_by_circuit() {
        let engine = engine();

        for _ in 0..10 {
            let err = engine
                .publish_with_retry(EventType::ProjectCreated, "c-1", || async {
                    Err(PublishError::Internal("bad envelope".into()))
                })
                .await
                .unwrap_err();
            assert!(matches!(err, PublishError::Internal(_)));
        }

        assert_eq!(engine.circuit().calls_total(), 10);
        assert_eq!(engine.circuit().failures(), 0);
        assert_eq!(engine.circuit().consecutive_failures(), 0);
        assert_eq!(engine.circuit().state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_fails_fast() {
        let circuit = Arc::new(CircuitBreaker::new(
            "test",
            CircuitConfig {
                failure_threshold: 5,
                recovery_timeout: Duration::from_secs(30),
            },
        ));
        let engine = RetryEngine::with_jitter(
            Arc::clone(&circuit),
            Arc::new(MetricsRegistry::new()),
            Arc::new(FixedJitter(0)),
        );

        // Five failed critical attempts trip the shared breaker.
        let _ = engine
            .publish_with_retry(EventType::ProjectCreated, "c-1", || async {
                Err(delivery_error(EventType::ProjectCreated))
            })
            .await;
        assert_eq!(circuit.state(), CircuitState::Open);

        // A different breaker-eligible event type is rejected without a call.
        let calls = AtomicU32::new(0);
        let err = engine
            .publish_with_retry(EventType::ProjectFilesUpdated, "c-2", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await
            .unwrap_err();

        assert!(err.is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            engine.metrics().get(EventType::ProjectFilesUpdated, MetricKind::Failure),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn test_unknown_event_name_rejected() {
        let engine = engine();
        let calls = AtomicU32::new(0);

        let err = engine
            .publish_named("project.renamed", "c-1", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::UnknownEventType(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_named_event_publishes() {
        let engine = engine();
        engine
            .publish_named("project.archived", "c-1", || async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(engine.metrics().get(EventType::ProjectArchived, MetricKind::Success), Some(1.0));
    }
}
