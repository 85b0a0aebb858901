// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP delivery to the orchestration service.
//!
//! Each event type has its own path under the configured base URL
//! (see [`EventType::delivery_path()`]). Requests carry:
//!
//! | Header | Value |
//! |--------|-------|
//! | `Content-Type` | `application/json` |
//! | `X-Service-Token` | configured service token |
//! | `X-Event-Type` | dotted event name |
//! | `X-Correlation-ID` | envelope correlation id |
//!
//! The token is attached to requests only; it never reaches a log line.
//!
//! [`close()`](Transport::close) drops the pooled client, which closes idle
//! keep-alive connections to the orchestrator.

use super::{BoxFuture, Transport};
use crate::config::{PublisherConfig, TransportKind};
use crate::envelope::EventEnvelope;
use crate::error::{PublishError, Result};
use crate::registry::EventType;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const HEADER_SERVICE_TOKEN: &str = "X-Service-Token";
pub const HEADER_EVENT_TYPE: &str = "X-Event-Type";
pub const HEADER_CORRELATION_ID: &str = "X-Correlation-ID";

/// Longest response body excerpt carried in a delivery error.
pub const MAX_ERROR_BODY_BYTES: usize = 256;

/// Network transport backed by a pooled `reqwest` client.
pub struct HttpTransport {
    /// `None` once closed.
    client: RwLock<Option<Client>>,
    /// Base URL without trailing slash. `None` when unconfigured.
    base_url: Option<String>,
    token: Option<SecretString>,
    health_path: String,
    health_timeout: Duration,
}

impl HttpTransport {
    /// Build the transport from publisher configuration.
    ///
    /// A missing base URL is logged, not rejected: the service must be able
    /// to start while the orchestrator is being configured.
    pub fn new(config: &PublisherConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.http.connect_timeout())
            .pool_max_idle_per_host(config.http.pool_max_idle_per_host)
            .build()
            .map_err(|e| PublishError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = config
            .orchestration_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string());

        if base_url.is_none() {
            warn!("ORCHESTRATION_SERVICE_URL not set, HTTP event delivery will fail");
        }

        Ok(Self {
            client: RwLock::new(Some(client)),
            base_url,
            token: config.service_token.clone(),
            health_path: config.http.health_path.clone(),
            health_timeout: config.http.health_timeout(),
        })
    }

    /// Handle to the pooled client, `None` after close. The lock is released
    /// before any request is sent.
    fn client(&self) -> Option<Client> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_closed(&self) -> bool {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Configured base URL, if any.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Full delivery URL for an event type.
    pub fn endpoint(&self, event_type: EventType) -> Option<String> {
        self.base_url
            .as_ref()
            .map(|base| format!("{}{}", base, event_type.delivery_path()))
    }

    fn health_url(&self) -> Option<String> {
        self.base_url
            .as_ref()
            .map(|base| format!("{}{}", base, self.health_path))
    }

    async fn send(&self, event_type: EventType, envelope: &EventEnvelope, timeout: Duration) -> Result<()> {
        let Some(client) = self.client() else {
            return Err(PublishError::delivery(event_type.as_str(), "transport is closed"));
        };

        let url = self.endpoint(event_type).ok_or_else(|| {
            PublishError::delivery(event_type.as_str(), "orchestration service URL not configured")
        })?;

        let mut request = client
            .post(&url)
            .timeout(timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(HEADER_EVENT_TYPE, event_type.as_str())
            .header(HEADER_CORRELATION_ID, envelope.correlation_id())
            .json(envelope);

        if let Some(token) = &self.token {
            request = request.header(HEADER_SERVICE_TOKEN, token.expose_secret());
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!(
                    url = %url,
                    event_type = %event_type,
                    event_id = %envelope.event_id(),
                    status = %response.status(),
                    "Event delivered"
                );
                Ok(())
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                error!(
                    url = %url,
                    event_type = %event_type,
                    correlation_id = %envelope.correlation_id(),
                    status = %status,
                    "Orchestrator rejected event"
                );
                Err(PublishError::delivery(
                    event_type.as_str(),
                    format!("orchestrator returned {}: {}", status, truncate_body(&body)),
                ))
            }
            Err(e) if e.is_timeout() => {
                error!(
                    url = %url,
                    event_type = %event_type,
                    correlation_id = %envelope.correlation_id(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Event delivery timed out"
                );
                Err(PublishError::delivery(
                    event_type.as_str(),
                    format!("request timed out after {}ms", timeout.as_millis()),
                ))
            }
            Err(e) => {
                error!(
                    url = %url,
                    event_type = %event_type,
                    correlation_id = %envelope.correlation_id(),
                    error = %e,
                    "Event delivery connection failed"
                );
                Err(PublishError::delivery(
                    event_type.as_str(),
                    format!("failed to reach {}: {}", url, e),
                ))
            }
        }
    }
}

/// Cut a response body to [`MAX_ERROR_BODY_BYTES`] on a char boundary.
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_BYTES {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes)", &body[..end], body.len())
}

impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn publish<'a>(
        &'a self,
        event_type: EventType,
        envelope: &'a EventEnvelope,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.send(event_type, envelope, timeout))
    }

    fn health_check(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let Some(url) = self.health_url() else {
                debug!("Health check skipped, no orchestration URL");
                return false;
            };
            let Some(client) = self.client() else {
                debug!("Health check skipped, transport closed");
                return false;
            };

            match client.get(&url).timeout(self.health_timeout).send().await {
                Ok(response) => {
                    let healthy = response.status().is_success();
                    if !healthy {
                        debug!(url = %url, status = %response.status(), "Health check returned non-success");
                    }
                    healthy
                }
                Err(e) => {
                    debug!(url = %url, error = %e, "Health check failed");
                    false
                }
            }
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let client = self
                .client
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if client.is_some() {
                drop(client);
                info!("HTTP event transport closed, connection pool released");
            }
        })
    }
}
