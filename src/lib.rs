// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Project Events
//!
//! Resilient publishing of project lifecycle events to an external
//! orchestration service.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                           EventPublisher                             │
//! │                                                                      │
//! │  ┌──────────────┐    ┌─────────────┐    ┌────────────────────────┐   │
//! │  │ EventEnvelope│───►│ RetryEngine │───►│ CircuitBreaker         │   │
//! │  │ (per call)   │    │ (registry   │    │ (shared, critical only)│   │
//! │  └──────────────┘    │  policy)    │    └───────────┬────────────┘   │
//! │                      └──────┬──────┘                ▼                │
//! │                             │            ┌────────────────────────┐  │
//! │                             ▼            │ Transport (http | stub)│  │
//! │                      ┌─────────────┐     └────────────────────────┘  │
//! │                      │ Metrics     │                                 │
//! │                      └─────────────┘                                 │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Delivery Guarantees
//!
//! Each event type has a fixed registry entry (see [`registry`]):
//!
//! - **Critical** (`project.created`, `project.deleted`,
//!   `project.files.updated`): 5 attempts, exponential backoff, guarded by
//!   the circuit breaker. Exhaustion is returned to the caller.
//! - **Medium** (`project.updated`, `project.archived`): 3 attempts, linear
//!   backoff, no breaker. Exhaustion is logged and swallowed.
//!
//! Delivery is at-least-once per attempt budget; there is no durable queue.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use project_events::{EventPublisher, PublisherConfig};
//! use project_events::events::{ProjectCreatedEvent, ProjectStatus};
//!
//! #[tokio::main]
//! async fn main() -> project_events::Result<()> {
//!     let publisher = EventPublisher::init(PublisherConfig::from_env()?).await?;
//!
//!     let event = ProjectCreatedEvent {
//!         project_id: "p-42".to_string(),
//!         user_id: "u-7".to_string(),
//!         name: "Apollo".to_string(),
//!         description: None,
//!         status: ProjectStatus::Draft,
//!         created_at: chrono::Utc::now(),
//!     };
//!     publisher.publish_project_created(&event, Some("req-123")).await?;
//!
//!     publisher.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod envelope;
pub mod error;
pub mod events;
pub mod metrics;
pub mod publisher;
pub mod registry;
pub mod retry;
pub mod transport;

// Re-exports for convenience
pub use circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitError, CircuitSnapshot, CircuitState};
pub use config::{HttpConfig, PublisherConfig, StubConfig, TokenStatus, TransportKind};
pub use envelope::{EventEnvelope, EventMetadata};
pub use error::{PublishError, Result};
pub use metrics::{MetricKind, MetricsRegistry};
pub use publisher::{EventPublisher, HealthSnapshot, HealthStatus, PublisherOptions, PublisherState};
pub use registry::{EventMetadataEntry, EventType, Priority, RetryPolicy};
pub use retry::{JitterSource, RetryEngine};
pub use transport::{HttpTransport, StubTransport, Transport};
