// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Event publisher facade.
//!
//! The single entry point the project-management code talks to. Ties
//! together:
//! - A [`Transport`] chosen once at startup
//! - The shared [`CircuitBreaker`] for critical events
//! - The [`RetryEngine`] that applies registry policy
//! - The [`MetricsRegistry`] exposed through health snapshots
//!
//! # Publish Flow
//!
//! 1. Build an [`EventEnvelope`] (fresh event id and timestamp)
//! 2. Hand an attempt closure to the retry engine
//! 3. Each attempt calls `Transport::publish` with the registry timeout
//! 4. The retry engine returns, raises or swallows per event priority
//!
//! All publish methods take `&self` and may run concurrently.

mod types;

pub use types::{HealthSnapshot, HealthStatus, PublisherState};

use crate::circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitState};
use crate::config::{PublisherConfig, TokenStatus, TransportKind};
use crate::envelope::EventEnvelope;
use crate::error::Result;
use crate::events::{
    ProjectArchivedEvent, ProjectCreatedEvent, ProjectDeletedEvent, ProjectFilesUpdatedEvent,
    ProjectUpdatedEvent,
};
use crate::metrics::{self, MetricsRegistry};
use crate::registry::EventType;
use crate::retry::{JitterSource, RetryEngine, ThreadRngJitter};
use crate::transport::{build_transport, Transport};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Name of the shared breaker in logs and metrics.
pub const ORCHESTRATOR_CIRCUIT: &str = "orchestrator";

/// Tunables that tests and embedders may override.
#[derive(Clone)]
pub struct PublisherOptions {
    pub circuit: CircuitConfig,
    pub jitter: Arc<dyn JitterSource>,
}

impl Default for PublisherOptions {
    fn default() -> Self {
        Self {
            circuit: CircuitConfig::default(),
            jitter: Arc::new(ThreadRngJitter),
        }
    }
}

/// Publishes project lifecycle events to the orchestration service.
pub struct EventPublisher {
    transport: Arc<dyn Transport>,
    circuit: Arc<CircuitBreaker>,
    metrics: Arc<MetricsRegistry>,
    retry: RetryEngine,
    started_at: Instant,
    state_tx: watch::Sender<PublisherState>,
}

impl EventPublisher {
    /// Build a publisher from configuration.
    ///
    /// Selects the transport and checks it once. A failed check is logged;
    /// the publisher still starts so the service can come up before the
    /// orchestrator does.
    pub async fn init(config: PublisherConfig) -> Result<Self> {
        config.validate()?;
        check_token(&config);

        let transport = build_transport(&config)?;
        let publisher = Self::with_transport(transport);

        let kind = publisher.transport.kind();
        if publisher.transport.health_check().await {
            info!(transport = %kind, "Event publisher ready, transport reachable");
        } else {
            warn!(transport = %kind, "Initial transport health check failed, continuing");
        }

        Ok(publisher)
    }

    /// Build from the process environment.
    pub async fn from_env() -> Result<Self> {
        Self::init(PublisherConfig::from_env()?).await
    }

    /// Wrap an existing transport with default options.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self::with_options(transport, PublisherOptions::default())
    }

    pub fn with_options(transport: Arc<dyn Transport>, options: PublisherOptions) -> Self {
        let circuit = Arc::new(CircuitBreaker::new(ORCHESTRATOR_CIRCUIT, options.circuit));
        let metrics = Arc::new(MetricsRegistry::new());
        let retry = RetryEngine::with_jitter(Arc::clone(&circuit), Arc::clone(&metrics), options.jitter);
        let (state_tx, _) = watch::channel(PublisherState::Running);

        Self {
            transport,
            circuit,
            metrics,
            retry,
            started_at: Instant::now(),
            state_tx,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Publishing
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn publish_project_created(
        &self,
        event: &ProjectCreatedEvent,
        correlation_id: Option<&str>,
    ) -> Result<()> {
        self.publish(EventType::ProjectCreated, event, correlation_id).await
    }

    pub async fn publish_project_updated(
        &self,
        event: &ProjectUpdatedEvent,
        correlation_id: Option<&str>,
    ) -> Result<()> {
        self.publish(EventType::ProjectUpdated, event, correlation_id).await
    }

    pub async fn publish_project_archived(
        &self,
        event: &ProjectArchivedEvent,
        correlation_id: Option<&str>,
    ) -> Result<()> {
        self.publish(EventType::ProjectArchived, event, correlation_id).await
    }

    pub async fn publish_project_deleted(
        &self,
        event: &ProjectDeletedEvent,
        correlation_id: Option<&str>,
    ) -> Result<()> {
        self.publish(EventType::ProjectDeleted, event, correlation_id).await
    }

    pub async fn publish_project_files_updated(
        &self,
        event: &ProjectFilesUpdatedEvent,
        correlation_id: Option<&str>,
    ) -> Result<()> {
        self.publish(EventType::ProjectFilesUpdated, event, correlation_id).await
    }

    /// Publish any serializable payload as `event_type`.
    ///
    /// The payload must serialize to a JSON object.
    pub async fn publish<T: Serialize>(
        &self,
        event_type: EventType,
        event: &T,
        correlation_id: Option<&str>,
    ) -> Result<()> {
        let envelope = EventEnvelope::build(event_type, event, correlation_id)?;
        let timeout = event_type.metadata().timeout();
        let transport = &self.transport;
        let envelope_ref = &envelope;

        debug!(
            event_type = %event_type,
            event_id = %envelope.event_id(),
            correlation_id = %envelope.correlation_id(),
            "Publishing event"
        );

        self.retry
            .publish_with_retry(event_type, envelope.correlation_id(), || {
                transport.publish(event_type, envelope_ref, timeout)
            })
            .await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Health & Diagnostics
    // ═══════════════════════════════════════════════════════════════════════

    /// Check the transport and assemble a health report.
    pub async fn health_check(&self) -> HealthSnapshot {
        let kind = self.transport.kind();
        let healthy = self.transport.health_check().await;
        metrics::set_transport_health(kind, healthy);

        HealthSnapshot {
            status: if healthy {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            transport_kind: kind,
            circuit_breaker_state: self.circuit.snapshot(),
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
            metrics: self.metrics.get_all(),
            error: (!healthy).then(|| format!("{} transport health check failed", kind)),
        }
    }

    pub fn get_metrics(&self) -> BTreeMap<String, f64> {
        self.metrics.get_all()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset_all();
        info!("Event metrics reset");
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit.state()
    }

    pub fn circuit(&self) -> &Arc<CircuitBreaker> {
        &self.circuit
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn state(&self) -> PublisherState {
        *self.state_tx.borrow()
    }

    /// Get a receiver to watch state changes.
    pub fn state_receiver(&self) -> watch::Receiver<PublisherState> {
        self.state_tx.subscribe()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Shutdown
    // ═══════════════════════════════════════════════════════════════════════

    /// Log final metrics and close the transport. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        if self.state_tx.send_replace(PublisherState::Stopped) == PublisherState::Stopped {
            debug!("Event publisher already stopped");
            return;
        }

        let summary = self.metrics.summary();
        info!(
            success = summary.success,
            failure = summary.failure,
            retry = summary.retry,
            error = summary.error,
            circuit_state = %self.circuit.state(),
            "Shutting down event publisher"
        );

        self.transport.close().await;
        info!("Event publisher stopped");
    }
}

fn check_token(config: &PublisherConfig) {
    if let Some(message) = token_warning(config) {
        warn!(transport = %config.transport, "{}", message);
    }
}

/// Warning to emit at init for a missing or placeholder token. Applies to
/// every transport so a stub deployment promoted to HTTP is flagged early.
fn token_warning(config: &PublisherConfig) -> Option<&'static str> {
    match config.token_status() {
        TokenStatus::Configured => None,
        TokenStatus::Missing => {
            Some("INTERNAL_SERVICE_TOKEN not set, orchestrator will reject events")
        }
        TokenStatus::InsecureDefault => {
            Some("INTERNAL_SERVICE_TOKEN is a placeholder value, replace it before production use")
        }
    }
}
