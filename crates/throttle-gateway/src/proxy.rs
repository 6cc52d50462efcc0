// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The request pipeline shared by both proxy endpoints.
//!
//! read (size-capped) → parse → classify + route → dispatch → format → log.

use std::time::Instant;

use axum::Json;
use axum::body::Body;
use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use throttle_config::ThrottleConfig;
use throttle_core::{ClientDialect, ParsedRequest, ThrottleError, TokenUsage};
use throttle_cost::{LogEntry, LogStatus, hash_prompt, now_timestamp};
use throttle_providers::{
    UpstreamRequest, format_anthropic_response, format_openai_response, parse_anthropic_request,
    parse_openai_request,
};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::control::{self, RouteHints, RoutePlan};
use crate::error::ApiError;
use crate::server::GatewayState;
use crate::streaming;

/// Request header naming a model alias or id to force.
pub const FORCE_MODEL_HEADER: HeaderName = HeaderName::from_static("x-throttle-force-model");
/// Request header naming the request this one continues.
pub const PARENT_REQUEST_HEADER: HeaderName =
    HeaderName::from_static("x-throttle-parent-request-id");

pub const MODEL_HEADER: HeaderName = HeaderName::from_static("x-throttle-model");
pub const TIER_HEADER: HeaderName = HeaderName::from_static("x-throttle-tier");
pub const SCORE_HEADER: HeaderName = HeaderName::from_static("x-throttle-score");
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-throttle-request-id");
pub const MODE_HEADER: HeaderName = HeaderName::from_static("x-throttle-mode");

/// Everything known about a routed request that its log entry and response
/// headers need.
#[derive(Debug, Clone)]
pub(crate) struct RequestContext {
    pub request_id: String,
    pub dialect: ClientDialect,
    pub plan: RoutePlan,
    pub prompt_hash: String,
    pub parent_request_id: Option<String>,
    pub stream: bool,
}

impl RequestContext {
    /// Routing headers, set on every response once a model is chosen.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        let decision = &self.plan.decision;
        let values = [
            (MODEL_HEADER, decision.model.id.clone()),
            (TIER_HEADER, decision.tier.to_string()),
            (
                SCORE_HEADER,
                format!("{:.3}", self.plan.classification.composite_score),
            ),
            (REQUEST_ID_HEADER, self.request_id.clone()),
            (MODE_HEADER, decision.mode.to_string()),
        ];
        for (name, value) in values {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(name, value);
            }
        }
    }

    pub fn log_entry(&self, usage: TokenUsage, latency_ms: u64, status: LogStatus) -> LogEntry {
        let decision = &self.plan.decision;
        let mut entry = LogEntry {
            request_id: self.request_id.clone(),
            timestamp: now_timestamp(),
            prompt_hash: self.prompt_hash.clone(),
            composite_score: self.plan.classification.composite_score,
            tier: decision.tier,
            selected_model: decision.model.id.clone(),
            provider: decision.model.provider,
            mode: decision.mode,
            is_override: decision.override_.is_some(),
            override_kind: decision.override_.as_ref().map(|o| o.kind().to_string()),
            input_tokens: 0,
            output_tokens: 0,
            estimated_cost_usd: 0.0,
            latency_ms: 0,
            parent_request_id: self.parent_request_id.clone(),
            dialect: self.dialect,
            stream: self.stream,
            status,
        };
        entry.complete(usage, &decision.model.pricing, latency_ms, status);
        entry
    }

    /// Error response in the client's dialect, carrying the routing headers.
    pub fn error_response(&self, error: ThrottleError) -> Response {
        let mut response = ApiError::new(self.dialect, error).into_response();
        self.apply_headers(response.headers_mut());
        response
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Run one proxy request end to end.
pub(crate) async fn handle(
    state: GatewayState,
    dialect: ClientDialect,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!("proxy", request_id = %request_id, dialect = %dialect);
    async move {
        let config = state.config.get();
        match route(&state, &config, dialect, &headers, body, request_id).await {
            Ok((ctx, request)) => forward(&state, &config, ctx, &request).await,
            Err(e) => ApiError::new(dialect, e).into_response(),
        }
    }
    .instrument(span)
    .await
}

/// Read, parse and route. Errors here happen before any model is chosen.
async fn route(
    state: &GatewayState,
    config: &ThrottleConfig,
    dialect: ClientDialect,
    headers: &HeaderMap,
    body: Body,
    request_id: String,
) -> Result<(RequestContext, ParsedRequest), ThrottleError> {
    let bytes = read_body(headers, body, config.server.max_body_bytes).await?;
    let request = match dialect {
        ClientDialect::Anthropic => parse_anthropic_request(&bytes)?,
        ClientDialect::OpenAi => parse_openai_request(&bytes)?,
    };

    let hints = RouteHints {
        force_model: header_str(headers, &FORCE_MODEL_HEADER),
        parent_request_id: header_str(headers, &PARENT_REQUEST_HEADER),
    };
    let plan = control::route_request(state, config, &request, &hints).await?;

    info!(
        model = %plan.decision.model.id,
        provider = %plan.decision.model.provider,
        tier = %plan.decision.tier,
        score = plan.classification.composite_score,
        mode = %plan.decision.mode,
        override_kind = plan.override_().map(|o| o.kind()),
        stream = request.stream,
        "routed request"
    );

    let ctx = RequestContext {
        request_id,
        dialect,
        prompt_hash: hash_prompt(request.last_user_text()),
        parent_request_id: hints.parent_request_id,
        stream: request.stream,
        plan,
    };
    Ok((ctx, request))
}

async fn forward(
    state: &GatewayState,
    config: &ThrottleConfig,
    ctx: RequestContext,
    request: &ParsedRequest,
) -> Response {
    let model = &ctx.plan.decision.model;
    let Some(credentials) = config.provider_credentials(model.provider) else {
        return ctx.error_response(ThrottleError::Config(format!(
            "provider {} has no credentials",
            model.provider
        )));
    };
    let model_id = model.id.clone();
    let upstream = UpstreamRequest {
        credentials: &credentials,
        model_id: &model_id,
        request,
    };

    if request.stream {
        return streaming::respond(state, config, ctx, upstream).await;
    }

    let started = Instant::now();
    match state.dispatcher.dispatch(&upstream).await {
        Ok(response) => {
            info!(
                model = %response.model_id,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                latency_ms = response.latency_ms,
                "upstream call completed"
            );
            state
                .writer
                .append(ctx.log_entry(response.usage, response.latency_ms, LogStatus::Ok));
            let mut http = match ctx.dialect {
                ClientDialect::Anthropic => {
                    Json(format_anthropic_response(&response, &ctx.request_id)).into_response()
                }
                ClientDialect::OpenAi => {
                    Json(format_openai_response(&response, &ctx.request_id)).into_response()
                }
            };
            ctx.apply_headers(http.headers_mut());
            http
        }
        Err(e) => {
            warn!(model = %model_id, error = %e, "upstream call failed");
            state.writer.append(ctx.log_entry(
                TokenUsage::default(),
                elapsed_ms(started),
                LogStatus::Error,
            ));
            ctx.error_response(e)
        }
    }
}

/// Collect the body, refusing anything over `limit` bytes.
///
/// A declared `Content-Length` over the cap is rejected before reading.
async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Vec<u8>, ThrottleError> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(ThrottleError::RequestTooLarge { limit });
    }

    let mut buf = Vec::new();
    let mut chunks = body.into_data_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk
            .map_err(|e| ThrottleError::InvalidRequest(format!("failed to read body: {e}")))?;
        if buf.len() + chunk.len() > limit {
            return Err(ThrottleError::RequestTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn header_str(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
