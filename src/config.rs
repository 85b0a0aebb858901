// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the event publisher.
//!
//! Configuration normally comes from the process environment via
//! [`PublisherConfig::from_env()`], but can also be built programmatically or
//! deserialized from JSON/YAML.
//!
//! # Environment
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `EVENT_TRANSPORT` | `http` or `stub` | `stub` |
//! | `ORCHESTRATION_SERVICE_URL` | Base URL of the orchestrator | unset |
//! | `INTERNAL_SERVICE_TOKEN` | Sent as `X-Service-Token` | unset |
//! | `EVENT_STUB_SIMULATE_DELAY` | Simulated transport sleeps before answering | `false` |
//! | `EVENT_STUB_DELAY_MS` | Simulated latency in ms | `100` |
//! | `EVENT_STUB_FAILURE_RATE` | Probability (0.0-1.0) of a synthetic failure | `0.0` |
//!
//! A missing `ORCHESTRATION_SERVICE_URL` is not a startup error: the HTTP
//! transport reports itself unhealthy and every delivery fails until it is set.
//!
//! # Structure
//!
//! ```text
//! PublisherConfig
//! ├── transport: TransportKind        # http | stub
//! ├── orchestration_url: Option       # base URL for http
//! ├── service_token: Option<Secret>   # never logged
//! ├── http: HttpConfig                # client timeouts, health path
//! └── stub: StubConfig                # simulated latency / failures
//! ```

use crate::error::{PublishError, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_EVENT_TRANSPORT: &str = "EVENT_TRANSPORT";
pub const ENV_ORCHESTRATION_SERVICE_URL: &str = "ORCHESTRATION_SERVICE_URL";
pub const ENV_INTERNAL_SERVICE_TOKEN: &str = "INTERNAL_SERVICE_TOKEN";
pub const ENV_STUB_SIMULATE_DELAY: &str = "EVENT_STUB_SIMULATE_DELAY";
pub const ENV_STUB_DELAY_MS: &str = "EVENT_STUB_DELAY_MS";
pub const ENV_STUB_FAILURE_RATE: &str = "EVENT_STUB_FAILURE_RATE";

/// Token values shipped in templates and docs. Running with one of these is
/// equivalent to running unauthenticated.
const INSECURE_TOKENS: &[&str] = &[
    "change-me",
    "changeme",
    "internal-service-token",
    "dev-token",
    "secret",
];

// ═══════════════════════════════════════════════════════════════════════════════
// TransportKind
// ═══════════════════════════════════════════════════════════════════════════════

/// Which transport implementation the publisher uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Real delivery over HTTP.
    Http,
    /// Simulated delivery, no I/O.
    #[default]
    Stub,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Stub => write!(f, "stub"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "stub" => Ok(Self::Stub),
            other => Err(PublishError::Config(format!(
                "{} must be 'http' or 'stub', got '{}'",
                ENV_EVENT_TRANSPORT, other
            ))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PublisherConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// Top-level publisher configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublisherConfig {
    #[serde(default)]
    pub transport: TransportKind,

    /// Base URL of the orchestration service, e.g. `http://orchestrator:8080`.
    #[serde(default)]
    pub orchestration_url: Option<String>,

    /// Credential sent with every delivery.
    #[serde(default, deserialize_with = "deserialize_token")]
    pub service_token: Option<SecretString>,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub stub: StubConfig,
}

fn deserialize_token<'de, D>(deserializer: D) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.map(SecretString::from))
}

/// Outcome of inspecting the configured service token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Missing,
    InsecureDefault,
    Configured,
}

impl PublisherConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let transport = match get(ENV_EVENT_TRANSPORT) {
            Some(value) => value.parse()?,
            None => TransportKind::default(),
        };

        let defaults = StubConfig::default();
        let stub = StubConfig {
            simulate_delay: match get(ENV_STUB_SIMULATE_DELAY) {
                Some(value) => parse_bool(ENV_STUB_SIMULATE_DELAY, &value)?,
                None => defaults.simulate_delay,
            },
            delay_ms: match get(ENV_STUB_DELAY_MS) {
                Some(value) => value.parse().map_err(|e| {
                    PublishError::Config(format!("{} is not a valid integer: {}", ENV_STUB_DELAY_MS, e))
                })?,
                None => defaults.delay_ms,
            },
            failure_rate: match get(ENV_STUB_FAILURE_RATE) {
                Some(value) => value.parse().map_err(|e| {
                    PublishError::Config(format!("{} is not a valid number: {}", ENV_STUB_FAILURE_RATE, e))
                })?,
                None => defaults.failure_rate,
            },
        };

        let config = Self {
            transport,
            orchestration_url: get(ENV_ORCHESTRATION_SERVICE_URL),
            service_token: get(ENV_INTERNAL_SERVICE_TOKEN).map(SecretString::from),
            http: HttpConfig::default(),
            stub,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a stub-transport config that never fails and never sleeps.
    pub fn for_testing() -> Self {
        Self {
            transport: TransportKind::Stub,
            orchestration_url: None,
            service_token: Some(SecretString::from("test-service-token-0123456789")),
            http: HttpConfig::default(),
            stub: StubConfig::default(),
        }
    }

    /// Reject values that cannot be acted on.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.stub.failure_rate) {
            return Err(PublishError::Config(format!(
                "{} must be between 0.0 and 1.0, got {}",
                ENV_STUB_FAILURE_RATE, self.stub.failure_rate
            )));
        }
        Ok(())
    }

    /// Classify the configured token.
    pub fn token_status(&self) -> TokenStatus {
        match &self.service_token {
            None => TokenStatus::Missing,
            Some(token) => {
                let value = token.expose_secret().trim();
                if value.is_empty() {
                    TokenStatus::Missing
                } else if INSECURE_TOKENS.iter().any(|t| t.eq_ignore_ascii_case(value)) {
                    TokenStatus::InsecureDefault
                } else {
                    TokenStatus::Configured
                }
            }
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(PublishError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HttpConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// HTTP client settings for the network transport.
///
/// The per-delivery timeout comes from the event registry; these bound the
/// connection phase and the health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,

    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Idle pooled connections kept per host.
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_health_timeout_ms() -> u64 {
    3_000
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_pool_max_idle_per_host() -> usize {
    16
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            health_timeout_ms: 3_000,
            health_path: "/health".to_string(),
            pool_max_idle_per_host: 16,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// StubConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// Behavior knobs for the simulated transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StubConfig {
    #[serde(default)]
    pub simulate_delay: bool,

    #[serde(default = "default_stub_delay_ms")]
    pub delay_ms: u64,

    /// Probability in `[0.0, 1.0]` that a delivery fails.
    #[serde(default)]
    pub failure_rate: f64,
}

fn default_stub_delay_ms() -> u64 {
    100
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            simulate_delay: false,
            delay_ms: 100,
            failure_rate: 0.0,
        }
    }
}

impl StubConfig {
    /// Latency to simulate, if enabled.
    pub fn delay(&self) -> Option<Duration> {
        self.simulate_delay.then(|| Duration::from_millis(self.delay_ms))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
