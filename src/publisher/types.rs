// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Publisher lifecycle and health types.
//!
//! # State Transitions
//!
//! ```text
//!           shutdown()
//! Running ─────────────→ Stopped
//! ```
//!
//! - **Running**: Accepting publishes. The initial state after construction.
//! - **Stopped**: `shutdown()` ran. The transport is closed; HTTP deliveries
//!   fail, the stub keeps answering.

use crate::circuit_breaker::CircuitSnapshot;
use crate::config::TransportKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// State of the event publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublisherState {
    Running,
    Stopped,
}

impl std::fmt::Display for PublisherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublisherState::Running => write!(f, "Running"),
            PublisherState::Stopped => write!(f, "Stopped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health report for monitoring endpoints.
///
/// Serializes in camelCase so it can be returned from a `/health` handler
/// as-is.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    /// Healthy iff the transport health check succeeded.
    pub status: HealthStatus,
    pub transport_kind: TransportKind,
    pub circuit_breaker_state: CircuitSnapshot,
    /// Milliseconds since the publisher was constructed.
    pub uptime_ms: u64,
    pub metrics: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}
