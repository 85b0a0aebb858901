// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics for observability.
//!
//! Two layers:
//!
//! - [`MetricsRegistry`]: in-process per-event-type counters, returned by
//!   `EventPublisher::get_metrics()` and embedded in health snapshots.
//! - Free functions mirroring the same signals to the `metrics` facade so
//!   an installed exporter (Prometheus etc.) sees them. Without a recorder
//!   these are no-ops.
//!
//! # Key Naming Convention
//!
//! Registry keys are `<event_key>_<suffix>`, where `event_key` is the event
//! name with `.` replaced by `_`:
//!
//! ```text
//! project_created_success
//! project_files_updated_retry
//! project_updated_durationMs
//! ```
//!
//! Facade metrics are prefixed with `project_events_` and labelled with
//! `event_type` (and `outcome` for delivery counters).

use crate::circuit_breaker::CircuitState;
use crate::config::TransportKind;
use crate::registry::EventType;
use dashmap::DashMap;
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::collections::BTreeMap;

/// What a recorded value means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Delivered.
    Success,
    /// An attempt failed on its final try, or was rejected by the breaker.
    Failure,
    /// An attempt failed and another will follow.
    Retry,
    /// A low-priority event was dropped after exhausting its attempts.
    Error,
    /// Milliseconds from first attempt to successful delivery. Gauge.
    Duration,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Success,
        MetricKind::Failure,
        MetricKind::Retry,
        MetricKind::Error,
        MetricKind::Duration,
    ];

    /// Suffix appended to the event key.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Retry => "retry",
            Self::Error => "error",
            Self::Duration => "durationMs",
        }
    }

    /// Counters accumulate; the duration gauge is overwritten.
    pub fn is_counter(&self) -> bool {
        !matches!(self, Self::Duration)
    }
}

/// Registry key for an (event type, kind) pair.
pub fn metric_name(event_type: EventType, kind: MetricKind) -> String {
    format!("{}_{}", event_type.metric_key(), kind.suffix())
}

/// Totals across all event types, logged at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub success: f64,
    pub failure: f64,
    pub retry: f64,
    pub error: f64,
}

/// Per-publisher metric store.
///
/// Entries are created lazily on first record and removed by
/// [`reset_all()`](Self::reset_all). The key space is bounded by
/// event types × metric kinds.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    values: DashMap<String, f64>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value. Counters add `value`; duration replaces.
    pub fn record(&self, event_type: EventType, kind: MetricKind, value: f64) {
        let key = metric_name(event_type, kind);
        if kind.is_counter() {
            *self.values.entry(key).or_insert(0.0) += value;
        } else {
            self.values.insert(key, value);
        }
        mirror(event_type, kind, value);
    }

    /// Increment a counter by one.
    pub fn increment(&self, event_type: EventType, kind: MetricKind) {
        self.record(event_type, kind, 1.0);
    }

    /// Current value of one key, if it has been recorded.
    pub fn get(&self, event_type: EventType, kind: MetricKind) -> Option<f64> {
        self.values
            .get(&metric_name(event_type, kind))
            .map(|entry| *entry.value())
    }

    /// Copy of every recorded key, sorted.
    pub fn get_all(&self) -> BTreeMap<String, f64> {
        self.values
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn reset_all(&self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn summary(&self) -> MetricsSummary {
        let mut summary = MetricsSummary::default();
        for event_type in EventType::ALL {
            let value = |kind| self.get(event_type, kind).unwrap_or(0.0);
            summary.success += value(MetricKind::Success);
            summary.failure += value(MetricKind::Failure);
            summary.retry += value(MetricKind::Retry);
            summary.error += value(MetricKind::Error);
        }
        summary
    }
}

// =============================================================================
// Facade Mirrors
// =============================================================================

fn mirror(event_type: EventType, kind: MetricKind, value: f64) {
    match kind {
        MetricKind::Duration => record_delivery_duration(event_type, value),
        _ => record_delivery_outcome(event_type, kind.suffix(), value as u64),
    }
}

/// Record a delivery outcome (success, failure, retry, error).
pub fn record_delivery_outcome(event_type: EventType, outcome: &'static str, count: u64) {
    counter!(
        "project_events_deliveries_total",
        "event_type" => event_type.as_str(),
        "outcome" => outcome
    )
    .increment(count);
}

/// Record end-to-end delivery latency in milliseconds.
pub fn record_delivery_duration(event_type: EventType, duration_ms: f64) {
    histogram!("project_events_delivery_duration_ms", "event_type" => event_type.as_str())
        .record(duration_ms);
}

/// Set circuit breaker state gauge (0=closed, 1=half_open, 2=open).
pub fn set_circuit_state(circuit_name: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("project_events_circuit_state", "circuit" => circuit_name.to_string()).set(value);
}

/// Record circuit breaker rejection (circuit was open).
pub fn record_circuit_rejection(circuit_name: &str) {
    counter!(
        "project_events_circuit_rejections_total",
        "circuit" => circuit_name.to_string()
    )
    .increment(1);
}

/// Gauge for the last transport health check (1=healthy).
pub fn set_transport_health(kind: TransportKind, healthy: bool) {
    gauge!("project_events_transport_healthy", "transport" => kind.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
