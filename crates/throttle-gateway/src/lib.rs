// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Throttle routing proxy.
//!
//! Serves the Anthropic Messages and OpenAI Chat Completions dialects,
//! routes each request to the cheapest suitable configured model, and
//! exposes the control functions ([`control`]) over a few extra routes.

pub mod control;
pub mod error;
pub mod handlers;
pub mod proxy;
pub mod server;
mod streaming;

pub use control::{ModeChange, RouteHints, RoutePlan};
pub use error::ApiError;
pub use server::{GatewayState, HealthState, build_router, start_server};
