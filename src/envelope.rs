// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Event envelope: the JSON document handed to a transport.
//!
//! ```text
//! {
//!   "eventType": "project.created",
//!   "payload": { ...event fields..., "eventMetadata": { eventId, eventTimestamp, eventVersion, sourceService } },
//!   "correlationId": "...",
//!   "sourceService": "project-service"
//! }
//! ```
//!
//! An envelope is built once per publish call and never mutated afterwards;
//! retries resend the same envelope (same event id).

use crate::error::{PublishError, Result};
use crate::registry::EventType;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Service name stamped on every envelope.
pub const SOURCE_SERVICE: &str = "project-service";

/// Schema version of the envelope.
pub const EVENT_VERSION: &str = "1.0";

/// Per-event metadata merged into the payload under `eventMetadata`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// `evt_<uuid>`
    pub event_id: String,
    pub event_timestamp: DateTime<Utc>,
    pub event_version: &'static str,
    pub source_service: &'static str,
}

impl EventMetadata {
    fn new() -> Self {
        Self {
            event_id: format!("evt_{}", Uuid::new_v4()),
            event_timestamp: Utc::now(),
            event_version: EVENT_VERSION,
            source_service: SOURCE_SERVICE,
        }
    }
}

/// A fully formed event ready for delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    event_type: EventType,
    payload: serde_json::Value,
    correlation_id: String,
    source_service: &'static str,
    #[serde(skip)]
    metadata: EventMetadata,
}

impl EventEnvelope {
    /// Build an envelope around an event payload.
    ///
    /// The payload must serialize to a JSON object. A correlation id is
    /// generated when the caller does not supply one.
    pub fn build<T: Serialize>(
        event_type: EventType,
        event: &T,
        correlation_id: Option<&str>,
    ) -> Result<Self> {
        let metadata = EventMetadata::new();

        let mut payload = serde_json::to_value(event)?;
        let fields = payload.as_object_mut().ok_or_else(|| {
            PublishError::Internal(format!(
                "payload for {} must serialize to a JSON object",
                event_type
            ))
        })?;
        fields.insert("eventMetadata".to_string(), serde_json::to_value(&metadata)?);

        let correlation_id = correlation_id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Self {
            event_type,
            payload,
            correlation_id,
            source_service: SOURCE_SERVICE,
            metadata,
        })
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn source_service(&self) -> &str {
        self.source_service
    }

    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// Shortcut for `metadata().event_id`.
    pub fn event_id(&self) -> &str {
        &self.metadata.event_id
    }
}
