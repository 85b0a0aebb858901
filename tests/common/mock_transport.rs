// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Mock Transport for testing.
//!
//! Records every publish() call for assertions. Failures are scripted:
//! fail the first N calls, fail always, or succeed.

use project_events::transport::{BoxFuture, Transport};
use project_events::{EventEnvelope, EventType, PublishError, Result, TransportKind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A recorded publish() call.
#[derive(Debug, Clone)]
pub struct PublishCall {
    pub event_type: EventType,
    pub correlation_id: String,
    pub event_id: String,
    pub payload: serde_json::Value,
    pub timeout: Duration,
}

/// Mock implementation of Transport that records all calls.
///
/// # Example
/// ```rust,ignore
/// let mock = Arc::new(MockTransport::new());
/// mock.fail_first(2);
///
/// // Use in tests...
///
/// assert_eq!(mock.call_count(), 3);
/// ```
pub struct MockTransport {
    /// Recorded publish() calls
    calls: Mutex<Vec<PublishCall>>,
    /// Remaining calls that fail before success
    fail_remaining: AtomicUsize,
    /// Fail every call regardless of fail_remaining
    always_fail: AtomicBool,
    /// health_check() response
    healthy: AtomicBool,
    /// Optional latency per call
    latency: Mutex<Option<Duration>>,
    closed: AtomicBool,
}

impl MockTransport {
    /// Create a mock that accepts every delivery.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_remaining: AtomicUsize::new(0),
            always_fail: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
            latency: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a mock that rejects every delivery.
    pub fn failing() -> Self {
        let mock = Self::new();
        mock.set_always_fail(true);
        mock
    }

    /// Fail the next `n` calls, then succeed.
    pub fn fail_first(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    pub fn set_always_fail(&self, fail: bool) {
        self.always_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    /// Get all recorded publish() calls.
    pub fn calls(&self) -> Vec<PublishCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Count of calls for one event type.
    pub fn calls_for(&self, event_type: EventType) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.event_type == event_type)
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Clear all recorded calls.
    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
        self.fail_remaining.store(0, Ordering::SeqCst);
        self.always_fail.store(false, Ordering::SeqCst);
    }

    fn should_fail(&self) -> bool {
        if self.always_fail.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Stub
    }

    fn publish<'a>(
        &'a self,
        event_type: EventType,
        envelope: &'a EventEnvelope,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(PublishCall {
                event_type,
                correlation_id: envelope.correlation_id().to_string(),
                event_id: envelope.event_id().to_string(),
                payload: envelope.payload().clone(),
                timeout,
            });

            let latency = *self.latency.lock().unwrap();
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }

            if self.should_fail() {
                Err(PublishError::delivery(event_type.as_str(), "mock delivery failure"))
            } else {
                Ok(())
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move { self.healthy.load(Ordering::SeqCst) })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.closed.store(true, Ordering::SeqCst);
        })
    }
}
