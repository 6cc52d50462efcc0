// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Throttle routing proxy.

use thiserror::Error;

/// The primary error type used across classification, routing, dispatch and logging.
#[derive(Debug, Error)]
pub enum ThrottleError {
    /// The client sent a request the proxy cannot interpret (bad JSON, no messages).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request body exceeded the configured size cap.
    #[error("request body exceeds {limit} bytes")]
    RequestTooLarge { limit: usize },

    /// An upstream provider failed or answered with a non-2xx status.
    #[error("upstream error from {provider}: {message}")]
    Upstream {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// No provider has credentials, so no model can ever be selected.
    #[error("no provider is configured; set an API key for at least one provider")]
    NoProviderConfigured,

    /// Configuration errors (invalid values, unknown model ids).
    #[error("configuration error: {0}")]
    Config(String),

    /// Routing log storage errors.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An upstream call did not finish within its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ThrottleError {
    /// Wire-level error type string used in client-facing error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ThrottleError::InvalidRequest(_) => "invalid_request_error",
            ThrottleError::RequestTooLarge { .. } => "request_too_large",
            ThrottleError::Upstream { .. } => "upstream_error",
            ThrottleError::NoProviderConfigured | ThrottleError::Config(_) => {
                "configuration_error"
            }
            ThrottleError::Storage { .. } => "storage_error",
            ThrottleError::Timeout { .. } => "timeout_error",
            ThrottleError::Internal(_) => "api_error",
        }
    }

    /// HTTP status code the gateway answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ThrottleError::InvalidRequest(_) => 400,
            ThrottleError::RequestTooLarge { .. } => 413,
            ThrottleError::Upstream { .. } => 502,
            ThrottleError::Timeout { .. } => 504,
            ThrottleError::NoProviderConfigured
            | ThrottleError::Config(_)
            | ThrottleError::Storage { .. }
            | ThrottleError::Internal(_) => 500,
        }
    }

    /// Shorthand for an upstream failure without an HTTP status (transport errors).
    pub fn upstream(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ThrottleError::Upstream {
            provider: provider.into(),
            status: None,
            message: message.into(),
        }
    }
}
