// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! Proxy: POST /v1/messages, POST /v1/chat/completions.
//! Control: GET /health, GET /stats, GET /config, POST /mode, GET /log.

use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
};
use serde::{Deserialize, Serialize};
use throttle_config::ThrottleConfig;
use throttle_core::{ClientDialect, ProviderId, RoutingMode, ThrottleError};
use throttle_cost::{LogEntry, RoutingStats};

use crate::control::{self, ModeChange};
use crate::error::ApiError;
use crate::proxy;
use crate::server::GatewayState;

/// Default look-back window for GET /stats.
pub const DEFAULT_STATS_DAYS: u32 = 7;

/// Default row count for GET /log.
pub const DEFAULT_LOG_TAIL: usize = 20;

/// Response body for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Health status string.
    pub status: String,
    /// Binary version.
    pub version: String,
    pub uptime_secs: u64,
    /// Active routing mode.
    pub mode: RoutingMode,
    /// Providers with credentials.
    pub providers: Vec<ProviderId>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub tail: Option<usize>,
}

/// Request body for POST /mode.
#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: RoutingMode,
}

/// POST /v1/messages: Anthropic Messages dialect.
pub async fn post_messages(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    proxy::handle(state, ClientDialect::Anthropic, headers, body).await
}

/// POST /v1/chat/completions: OpenAI Chat Completions dialect.
pub async fn post_chat_completions(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    proxy::handle(state, ClientDialect::OpenAi, headers, body).await
}

pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let config = state.config.get();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        mode: config.routing.mode,
        providers: config.configured_providers(),
    })
}

/// GET /stats?days=N
pub async fn get_stats(
    State(state): State<GatewayState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<RoutingStats>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_STATS_DAYS);
    Ok(Json(control::get_routing_stats(&state, days).await?))
}

/// GET /config, API keys masked.
pub async fn get_config(State(state): State<GatewayState>) -> Json<ThrottleConfig> {
    Json(control::get_config(&state))
}

/// POST /mode with `{"mode": "eco"}`.
pub async fn post_mode(
    State(state): State<GatewayState>,
    body: Bytes,
) -> Result<Json<ModeChange>, ApiError> {
    let request: ModeRequest = serde_json::from_slice(&body).map_err(|e| {
        ThrottleError::InvalidRequest(format!(
            "expected {{\"mode\": \"eco|standard|performance\"}}: {e}"
        ))
    })?;
    Ok(Json(control::set_mode(&state, request.mode)))
}

/// GET /log?tail=N
pub async fn get_log(
    State(state): State<GatewayState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let n = query.tail.unwrap_or(DEFAULT_LOG_TAIL);
    Ok(Json(control::get_recent_routing_log(&state, n).await?))
}
