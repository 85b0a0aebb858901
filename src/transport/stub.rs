// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Simulated transport for environments without an orchestrator.
//!
//! Performs no I/O. Optionally sleeps to emulate latency, then fails with
//! the configured probability. Health is always reported as good.

use super::{BoxFuture, Transport};
use crate::config::{StubConfig, TransportKind};
use crate::envelope::EventEnvelope;
use crate::error::{PublishError, Result};
use crate::registry::EventType;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Transport that fakes delivery.
pub struct StubTransport {
    config: StubConfig,
    rng: Mutex<StdRng>,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl StubTransport {
    pub fn new(config: StubConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Use a caller-provided RNG (seeded in tests for reproducible failures).
    pub fn with_rng(config: StubConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng: Mutex::new(rng),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Number of simulated successful deliveries.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Number of synthetic failures raised.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    fn roll_failure(&self) -> bool {
        if self.config.failure_rate <= 0.0 {
            return false;
        }
        let roll: f64 = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen();
        roll < self.config.failure_rate
    }

    async fn simulate(&self, event_type: EventType, envelope: &EventEnvelope, timeout: Duration) -> Result<()> {
        if let Some(delay) = self.config.delay() {
            if delay >= timeout {
                tokio::time::sleep(timeout).await;
                self.failed.fetch_add(1, Ordering::Relaxed);
                return Err(PublishError::delivery(
                    event_type.as_str(),
                    format!("simulated timeout after {}ms", timeout.as_millis()),
                ));
            }
            tokio::time::sleep(delay).await;
        }

        if self.roll_failure() {
            self.failed.fetch_add(1, Ordering::Relaxed);
            debug!(
                event_type = %event_type,
                correlation_id = %envelope.correlation_id(),
                "Stub: simulated delivery failure"
            );
            return Err(PublishError::delivery(event_type.as_str(), "simulated delivery failure"));
        }

        self.delivered.fetch_add(1, Ordering::Relaxed);
        debug!(
            event_type = %event_type,
            event_id = %envelope.event_id(),
            correlation_id = %envelope.correlation_id(),
            "Stub: would deliver event"
        );
        Ok(())
    }
}

impl Transport for StubTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Stub
    }

    fn publish<'a>(
        &'a self,
        event_type: EventType,
        envelope: &'a EventEnvelope,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.simulate(event_type, envelope, timeout))
    }

    fn health_check(&self) -> BoxFuture<'_, bool> {
        Box::pin(async { true })
    }
}
