// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Event metadata registry.
//!
//! A static policy table: every event type the publisher emits has exactly
//! one entry describing its priority tier, retry policy, attempt budget,
//! per-attempt timeout and whether the shared circuit breaker guards it.
//!
//! | Event | Priority | Policy | Attempts | Timeout | Breaker |
//! |-------|----------|--------|----------|---------|---------|
//! | `project.created` | critical | exponential | 5 | 30s | yes |
//! | `project.deleted` | critical | exponential | 5 | 30s | yes |
//! | `project.files.updated` | critical | exponential | 5 | 30s | yes |
//! | `project.updated` | medium | linear | 3 | 15s | no |
//! | `project.archived` | medium | linear | 3 | 15s | no |
//!
//! The table has no mutable state and is safe to read from any task.

use crate::error::{PublishError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Project lifecycle events known to the publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "project.created")]
    ProjectCreated,
    #[serde(rename = "project.updated")]
    ProjectUpdated,
    #[serde(rename = "project.archived")]
    ProjectArchived,
    #[serde(rename = "project.deleted")]
    ProjectDeleted,
    #[serde(rename = "project.files.updated")]
    ProjectFilesUpdated,
}

impl EventType {
    /// Every registered event type.
    pub const ALL: [EventType; 5] = [
        EventType::ProjectCreated,
        EventType::ProjectUpdated,
        EventType::ProjectArchived,
        EventType::ProjectDeleted,
        EventType::ProjectFilesUpdated,
    ];

    /// Dotted wire name, e.g. `project.files.updated`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectCreated => "project.created",
            Self::ProjectUpdated => "project.updated",
            Self::ProjectArchived => "project.archived",
            Self::ProjectDeleted => "project.deleted",
            Self::ProjectFilesUpdated => "project.files.updated",
        }
    }

    /// Prefix used for metric keys, e.g. `project_files_updated`.
    pub fn metric_key(&self) -> &'static str {
        match self {
            Self::ProjectCreated => "project_created",
            Self::ProjectUpdated => "project_updated",
            Self::ProjectArchived => "project_archived",
            Self::ProjectDeleted => "project_deleted",
            Self::ProjectFilesUpdated => "project_files_updated",
        }
    }

    /// Path on the orchestration service that receives this event.
    pub fn delivery_path(&self) -> &'static str {
        match self {
            Self::ProjectCreated => "/api/events/project-created",
            Self::ProjectUpdated => "/api/events/project-updated",
            Self::ProjectArchived => "/api/events/project-archived",
            Self::ProjectDeleted => "/api/events/project-deleted",
            Self::ProjectFilesUpdated => "/api/events/project-files-updated",
        }
    }

    /// Registry entry for this event type.
    pub fn metadata(&self) -> &'static EventMetadataEntry {
        metadata(*self)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        EventType::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == s)
            .ok_or_else(|| PublishError::UnknownEventType(s.to_string()))
    }
}

/// Priority tier. Drives retry budget, backoff shape and whether terminal
/// failures reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Critical and high priority failures propagate to the caller.
    pub fn is_high(&self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Delay shape between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryPolicy {
    ExponentialBackoff,
    LinearBackoff,
    None,
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExponentialBackoff => write!(f, "exponential-backoff"),
            Self::LinearBackoff => write!(f, "linear-backoff"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Delivery policy for one event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadataEntry {
    pub priority: Priority,
    pub retry_policy: RetryPolicy,
    pub max_attempts: u32,
    pub timeout_ms: u64,
    pub use_circuit_breaker: bool,
}

impl EventMetadataEntry {
    /// Per-attempt transport timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

const CRITICAL: EventMetadataEntry = EventMetadataEntry {
    priority: Priority::Critical,
    retry_policy: RetryPolicy::ExponentialBackoff,
    max_attempts: 5,
    timeout_ms: 30_000,
    use_circuit_breaker: true,
};

const MEDIUM: EventMetadataEntry = EventMetadataEntry {
    priority: Priority::Medium,
    retry_policy: RetryPolicy::LinearBackoff,
    max_attempts: 3,
    timeout_ms: 15_000,
    use_circuit_breaker: false,
};

/// Registry entry for a known event type.
pub fn metadata(event_type: EventType) -> &'static EventMetadataEntry {
    match event_type {
        EventType::ProjectCreated | EventType::ProjectDeleted | EventType::ProjectFilesUpdated => {
            &CRITICAL
        }
        EventType::ProjectUpdated | EventType::ProjectArchived => &MEDIUM,
    }
}

/// Look up an entry by dotted event name.
///
/// Fails with [`PublishError::UnknownEventType`] for names outside the registry.
pub fn get(event_type: &str) -> Result<&'static EventMetadataEntry> {
    event_type.parse::<EventType>().map(metadata)
}

/// Whether the event's failures must be surfaced to the caller.
pub fn is_high_priority(event_type: EventType) -> bool {
    metadata(event_type).priority.is_high()
}
