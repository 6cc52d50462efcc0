// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Throttle routing proxy.
//!
//! Holds the error type and the normalized data model shared by the
//! classifier, router, dispatcher, format adapters and routing log.

pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ThrottleError;
pub use types::{
    ClientDialect, DEFAULT_MAX_TOKENS, FinishReason, ParsedRequest, ProviderId, ProxyMessage,
    ProxyResponse, Role, RoutingMode, Tier, TokenUsage, UpstreamFamily,
};
