// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Upstream HTTP calls, buffered and streamed.

use std::time::{Duration, Instant};

use serde_json::Value;
use throttle_config::ProviderCredentials;
use throttle_config::model::UpstreamConfig;
use throttle_core::{
    FinishReason, ParsedRequest, ProviderId, ProxyResponse, ThrottleError, TokenUsage,
    UpstreamFamily,
};
use tracing::{debug, warn};

use crate::stream::{FrameStream, sse_frames};
use crate::{anthropic, google, openai};

/// Longest upstream error body quoted back to the caller.
const ERROR_SNIPPET_CHARS: usize = 300;

/// Content, finish reason and usage decoded from a buffered upstream body.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Completion {
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
}

/// Everything needed to call one upstream model.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamRequest<'a> {
    pub credentials: &'a ProviderCredentials,
    pub model_id: &'a str,
    pub request: &'a ParsedRequest,
}

/// An upstream response whose body is still an unread SSE stream.
#[derive(Debug)]
pub struct StreamHandle {
    pub response: reqwest::Response,
    pub provider: ProviderId,
    /// When the upstream call was issued; the base for latency.
    pub started: Instant,
}

impl StreamHandle {
    pub fn into_frames(self) -> FrameStream {
        sse_frames(self.response, self.provider)
    }
}

/// Issues upstream calls for all three families.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    buffered: reqwest::Client,
    streaming: reqwest::Client,
    request_timeout: Duration,
    connect_timeout: Duration,
    anthropic_version: String,
}

impl Dispatcher {
    /// Build the HTTP clients. Buffered calls get a total deadline; streamed
    /// calls only a connect deadline, the idle gap is policed by the reader.
    pub fn new(config: &UpstreamConfig) -> Result<Self, ThrottleError> {
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);

        let build = |total: Option<Duration>| {
            let mut builder = reqwest::Client::builder().connect_timeout(connect_timeout);
            if let Some(total) = total {
                builder = builder.timeout(total);
            }
            builder
                .build()
                .map_err(|e| ThrottleError::Internal(format!("failed to build HTTP client: {e}")))
        };

        Ok(Self {
            buffered: build(Some(request_timeout))?,
            streaming: build(None)?,
            request_timeout,
            connect_timeout,
            anthropic_version: config.anthropic_version.clone(),
        })
    }

    /// Call the upstream and wait for the whole response.
    pub async fn dispatch(
        &self,
        upstream: &UpstreamRequest<'_>,
    ) -> Result<ProxyResponse, ThrottleError> {
        let started = Instant::now();
        let provider = upstream.credentials.provider;

        let response = self
            .send(self.build(upstream, false), provider, self.request_timeout)
            .await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(provider, e, self.request_timeout))?;

        let completion = match provider.family() {
            UpstreamFamily::Anthropic => anthropic::parse_response(&body),
            UpstreamFamily::Google => google::parse_response(&body),
            UpstreamFamily::OpenAiCompatible => openai::parse_response(&body),
        }
        .map_err(|e| ThrottleError::Upstream {
            provider: provider.to_string(),
            status: None,
            message: format!("unreadable response body: {e}"),
        })?;

        let latency_ms = elapsed_ms(started);
        debug!(
            %provider,
            model = upstream.model_id,
            latency_ms,
            input_tokens = completion.usage.input_tokens,
            output_tokens = completion.usage.output_tokens,
            "upstream call complete"
        );

        Ok(ProxyResponse {
            content: completion.content,
            model_id: upstream.model_id.to_string(),
            finish_reason: completion.finish_reason,
            usage: completion.usage,
            latency_ms,
        })
    }

    /// Call the upstream with streaming enabled and hand back the unread
    /// body once the status line is known to be 2xx.
    pub async fn stream_dispatch(
        &self,
        upstream: &UpstreamRequest<'_>,
    ) -> Result<StreamHandle, ThrottleError> {
        let started = Instant::now();
        let provider = upstream.credentials.provider;
        let response = self
            .send(self.build(upstream, true), provider, self.connect_timeout)
            .await?;
        debug!(%provider, model = upstream.model_id, "upstream stream opened");
        Ok(StreamHandle {
            response,
            provider,
            started,
        })
    }

    fn build(&self, upstream: &UpstreamRequest<'_>, stream: bool) -> reqwest::RequestBuilder {
        let creds = upstream.credentials;
        let client = if stream { &self.streaming } else { &self.buffered };
        let base = &creds.base_url;

        match creds.provider.family() {
            UpstreamFamily::Anthropic => client
                .post(format!("{base}/v1/messages"))
                .header("x-api-key", &creds.api_key)
                .header("anthropic-version", &self.anthropic_version)
                .json(&anthropic::build_request(
                    upstream.model_id,
                    upstream.request,
                    stream,
                )),
            UpstreamFamily::Google => {
                let method = if stream {
                    "streamGenerateContent?alt=sse"
                } else {
                    "generateContent"
                };
                client
                    .post(format!("{base}/v1beta/models/{}:{method}", upstream.model_id))
                    .header("x-goog-api-key", &creds.api_key)
                    .json(&google::build_request(upstream.request))
            }
            UpstreamFamily::OpenAiCompatible => client
                .post(format!("{base}/chat/completions"))
                .bearer_auth(&creds.api_key)
                .json(&openai::build_request(
                    creds.provider,
                    upstream.model_id,
                    upstream.request,
                    stream,
                )),
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        provider: ProviderId,
        deadline: Duration,
    ) -> Result<reqwest::Response, ThrottleError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(provider, e, deadline))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = upstream_error_message(&body).unwrap_or_else(|| {
            let snippet: String = body.chars().take(ERROR_SNIPPET_CHARS).collect();
            format!("HTTP {status}: {snippet}")
        });
        warn!(%provider, status = status.as_u16(), error = %message, "upstream returned an error");
        Err(ThrottleError::Upstream {
            provider: provider.to_string(),
            status: Some(status.as_u16()),
            message,
        })
    }

    fn transport_error(
        &self,
        provider: ProviderId,
        error: reqwest::Error,
        deadline: Duration,
    ) -> ThrottleError {
        if error.is_timeout() {
            warn!(%provider, ?deadline, "upstream call timed out");
            ThrottleError::Timeout { duration: deadline }
        } else {
            warn!(%provider, error = %error, "upstream call failed");
            ThrottleError::upstream(provider.to_string(), format!("request failed: {error}"))
        }
    }
}

/// Pull `error.message` out of an Anthropic, OpenAI or Google error body.
fn upstream_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    // Google occasionally wraps the error object in a one-element array.
    let error = value
        .get("error")
        .or_else(|| value.get(0).and_then(|v| v.get("error")))?;
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
