// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control functions shared by the HTTP control routes and the CLI.
//!
//! Each function takes the gateway state and returns plain data; the
//! handlers wrap the results in JSON.

use chrono::{TimeDelta, Utc};
use serde::Serialize;
use throttle_config::ThrottleConfig;
use throttle_core::{ParsedRequest, ProxyMessage, RoutingMode, ThrottleError};
use throttle_cost::{Baseline, LogEntry, RoutingStats, compute_stats, format_timestamp};
use throttle_router::{
    Classification, ClassifyContext, Override, RoutingDecision, classify, detect_override,
};

use crate::server::GatewayState;

/// Longest look-back window accepted by [`get_routing_stats`].
pub const MAX_STATS_DAYS: u32 = 3650;

/// Most rows [`get_recent_routing_log`] returns.
pub const MAX_LOG_TAIL: usize = 1000;

/// Per-request routing hints taken from request headers or CLI flags.
#[derive(Debug, Clone, Default)]
pub struct RouteHints {
    pub force_model: Option<String>,
    pub parent_request_id: Option<String>,
}

/// Classification plus the routing decision derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct RoutePlan {
    pub classification: Classification,
    pub decision: RoutingDecision,
}

impl RoutePlan {
    pub fn override_(&self) -> Option<&Override> {
        self.decision.override_.as_ref()
    }
}

/// Result of a mode switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeChange {
    pub previous: RoutingMode,
    pub current: RoutingMode,
}

/// Score a request against the configured weights and thresholds.
pub fn classify_request(config: &ThrottleConfig, request: &ParsedRequest) -> Classification {
    let context = ClassifyContext {
        message_count: request.messages.len(),
        system_prompt: request.system_prompt.as_deref(),
    };
    classify(
        request.last_user_text(),
        &context,
        &config.classifier.weights,
        &config.classifier.thresholds,
    )
}

/// Classify a single prompt as if it were a one-turn request.
pub fn classify_prompt(config: &ThrottleConfig, prompt: &str) -> Classification {
    classify_request(config, &single_turn(prompt))
}

/// A one-turn request around `prompt`, used for dry runs.
pub fn single_turn(prompt: &str) -> ParsedRequest {
    ParsedRequest {
        messages: vec![ProxyMessage::user(prompt)],
        system_prompt: None,
        max_tokens: throttle_core::DEFAULT_MAX_TOKENS,
        temperature: None,
        stream: false,
    }
}

/// Classify a request and pick its model under the snapshot's routing mode.
///
/// Override detection may consult the routing log for parent inheritance.
pub async fn route_request(
    state: &GatewayState,
    config: &ThrottleConfig,
    request: &ParsedRequest,
    hints: &RouteHints,
) -> Result<RoutePlan, ThrottleError> {
    let classification = classify_request(config, request);
    let override_ = detect_override(
        hints.force_model.as_deref(),
        hints.parent_request_id.as_deref(),
        &state.registry,
        &state.log,
    )
    .await;
    let decision = throttle_router::route_request(
        &classification,
        config.routing.mode,
        override_.as_ref(),
        &state.registry,
        config,
        &state.table,
    )?;
    Ok(RoutePlan {
        classification,
        decision,
    })
}

/// Savings summary over the last `days` days of the routing log.
///
/// The baseline is the most expensive model among configured providers.
pub async fn get_routing_stats(
    state: &GatewayState,
    days: u32,
) -> Result<RoutingStats, ThrottleError> {
    let days = days.clamp(1, MAX_STATS_DAYS);
    let since = format_timestamp(Utc::now() - TimeDelta::days(i64::from(days)));
    let entries = state.log.read_since(&since).await?;

    let config = state.config.get();
    let baseline = state.registry.most_expensive(&config).map(|m| Baseline {
        model_id: m.id.clone(),
        pricing: m.pricing,
    });
    Ok(compute_stats(&entries, baseline.as_ref()))
}

/// Current configuration with every API key masked.
pub fn get_config(state: &GatewayState) -> ThrottleConfig {
    state.config.get().redacted()
}

/// Switch the routing mode for subsequent requests.
pub fn set_mode(state: &GatewayState, mode: RoutingMode) -> ModeChange {
    let previous = state.config.set_mode(mode);
    ModeChange {
        previous,
        current: mode,
    }
}

/// The `n` most recent routing log entries, oldest first.
pub async fn get_recent_routing_log(
    state: &GatewayState,
    n: usize,
) -> Result<Vec<LogEntry>, ThrottleError> {
    state.log.tail(n.min(MAX_LOG_TAIL)).await
}
