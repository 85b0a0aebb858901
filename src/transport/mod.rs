// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Delivery transports.
//!
//! A [`Transport`] moves an [`EventEnvelope`] to the orchestration service.
//! Two implementations exist and one is chosen at startup by
//! [`build_transport()`]; nothing downstream cares which:
//!
//! - [`HttpTransport`]: POSTs JSON to the orchestrator (production).
//! - [`StubTransport`]: no I/O, optional simulated latency and failures.
//!
//! # Implementing
//!
//! ```rust,no_run
//! use project_events::transport::{BoxFuture, Transport};
//! use project_events::{EventEnvelope, EventType, Result, TransportKind};
//! use std::time::Duration;
//!
//! struct NullTransport;
//!
//! impl Transport for NullTransport {
//!     fn kind(&self) -> TransportKind {
//!         TransportKind::Stub
//!     }
//!
//!     fn publish<'a>(
//!         &'a self,
//!         _event_type: EventType,
//!         _envelope: &'a EventEnvelope,
//!         _timeout: Duration,
//!     ) -> BoxFuture<'a, Result<()>> {
//!         Box::pin(async { Ok(()) })
//!     }
//!
//!     fn health_check(&self) -> BoxFuture<'_, bool> {
//!         Box::pin(async { true })
//!     }
//! }
//! ```

mod http;
mod stub;

pub use http::HttpTransport;
pub use stub::StubTransport;

use crate::config::{PublisherConfig, TransportKind};
use crate::envelope::EventEnvelope;
use crate::error::Result;
use crate::registry::EventType;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Type alias for boxed async futures (keeps the trait object-safe).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Delivery mechanism for event envelopes.
pub trait Transport: Send + Sync + 'static {
    /// Which implementation this is (reported in health snapshots).
    fn kind(&self) -> TransportKind;

    /// Deliver one envelope.
    ///
    /// Every failure (timeout, refused connection, non-success response)
    /// must come back as [`PublishError::Delivery`](crate::PublishError::Delivery).
    fn publish<'a>(
        &'a self,
        event_type: EventType,
        envelope: &'a EventEnvelope,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<()>>;

    /// Cheap reachability check. Never fails; returns `false` instead.
    fn health_check(&self) -> BoxFuture<'_, bool>;

    /// Release held resources (pooled connections).
    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// Construct the transport selected by `config.transport`.
pub fn build_transport(config: &PublisherConfig) -> Result<Arc<dyn Transport>> {
    let transport: Arc<dyn Transport> = match config.transport {
        TransportKind::Http => Arc::new(HttpTransport::new(config)?),
        TransportKind::Stub => Arc::new(StubTransport::new(config.stub.clone())),
    };
    info!(transport = %transport.kind(), "Event transport initialized");
    Ok(transport)
}
