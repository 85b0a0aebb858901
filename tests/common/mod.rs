// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Shared test utilities for integration and chaos tests.
//!
//! This module provides:
//! - Mock Transport for recording and scripting deliveries
//! - Event payload helpers

#![allow(dead_code)]

pub mod mock_transport;

pub use mock_transport::*;

use chrono::Utc;
use project_events::events::{
    FileAction, FileChange, ProjectArchivedEvent, ProjectCreatedEvent, ProjectDeletedEvent,
    ProjectFilesUpdatedEvent, ProjectStatus, ProjectUpdatedEvent,
};
use project_events::retry::FixedJitter;
use project_events::{CircuitConfig, EventPublisher, PublisherOptions};
use std::sync::Arc;

/// Publisher around `transport` with zero jitter and default breaker.
pub fn publisher_with(transport: Arc<MockTransport>) -> EventPublisher {
    EventPublisher::with_options(
        transport,
        PublisherOptions {
            circuit: CircuitConfig::default(),
            jitter: Arc::new(FixedJitter(0)),
        },
    )
}

pub fn created_event(project_id: &str) -> ProjectCreatedEvent {
    ProjectCreatedEvent {
        project_id: project_id.to_string(),
        user_id: "user-1".to_string(),
        name: format!("Project {}", project_id),
        description: Some("integration test".to_string()),
        status: ProjectStatus::Draft,
        created_at: Utc::now(),
    }
}

pub fn updated_event(project_id: &str) -> ProjectUpdatedEvent {
    let mut changes = serde_json::Map::new();
    changes.insert("name".to_string(), serde_json::json!("Renamed"));
    ProjectUpdatedEvent {
        project_id: project_id.to_string(),
        user_id: "user-1".to_string(),
        changes,
        updated_at: Utc::now(),
    }
}

pub fn archived_event(project_id: &str) -> ProjectArchivedEvent {
    ProjectArchivedEvent {
        project_id: project_id.to_string(),
        user_id: "user-1".to_string(),
        archived_at: Utc::now(),
    }
}

pub fn deleted_event(project_id: &str) -> ProjectDeletedEvent {
    ProjectDeletedEvent {
        project_id: project_id.to_string(),
        user_id: "user-1".to_string(),
        deleted_at: Utc::now(),
    }
}

pub fn files_updated_event(project_id: &str) -> ProjectFilesUpdatedEvent {
    ProjectFilesUpdatedEvent {
        project_id: project_id.to_string(),
        user_id: "user-1".to_string(),
        files: vec![
            FileChange {
                path: "src/main.rs".to_string(),
                action: FileAction::Modified,
                size_bytes: Some(2048),
            },
            FileChange {
                path: "README.md".to_string(),
                action: FileAction::Removed,
                size_bytes: None,
            },
        ],
        updated_at: Utc::now(),
    }
}
