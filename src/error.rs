// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for event publishing.
//!
//! Errors are categorized by where they originate (transport, circuit breaker,
//! registry, configuration) and carry enough context to debug a failed
//! delivery without exposing the service token.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Delivery` | Yes | Network errors, timeouts, non-2xx responses |
//! | `CircuitOpen` | No | Shared breaker is open, call rejected without I/O |
//! | `UnknownEventType` | No | Event name not in the registry (programming error) |
//! | `Exhausted` | No | All attempts failed for a critical/high event |
//! | `Serialization` | No | Envelope could not be encoded |
//! | `Config` | No | Configuration invalid |
//! | `Internal` | No | Unexpected internal error |
//!
//! # Retry Behavior
//!
//! The retry engine only loops on errors where [`PublishError::is_retryable()`]
//! is true. Everything else surfaces on the first occurrence.

use thiserror::Error;

/// Result type alias for publishing operations.
pub type Result<T> = std::result::Result<T, PublishError>;

/// Errors that can occur while publishing project events.
#[derive(Error, Debug)]
pub enum PublishError {
    /// Transport-level failure.
    ///
    /// Covers timeouts, refused connections, DNS failures and non-success
    /// responses. The retry engine does not distinguish between them.
    #[error("Delivery error ({event_type}): {message}")]
    Delivery { event_type: String, message: String },

    /// The shared circuit breaker rejected the call.
    ///
    /// No I/O was attempted. Not retried by the engine.
    #[error("Circuit breaker is OPEN")]
    CircuitOpen,

    /// The event type has no registry entry.
    ///
    /// Indicates a bug in the caller; never occurs for [`EventType`](crate::EventType) values.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Every attempt failed for an event whose failures must be visible.
    #[error("Failed to publish event {event_type} after {attempts} attempts: {last_error}")]
    Exhausted {
        event_type: String,
        attempts: u32,
        last_error: String,
    },

    /// Envelope serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PublishError {
    /// Create a delivery error for an event type.
    pub fn delivery(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            event_type: event_type.into(),
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Delivery { .. } => true,
            Self::CircuitOpen => false, // Breaker semantics override retry
            Self::UnknownEventType(_) => false,
            Self::Exhausted { .. } => false,
            Self::Serialization(_) => false,
            Self::Config(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Check if this is a circuit breaker rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen)
    }
}
