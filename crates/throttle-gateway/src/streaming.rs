// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streamed responses: upstream SSE frames are translated and written to the
//! client as they arrive.
//!
//! The log entry is written when the body stream is dropped, so client
//! disconnects, idle timeouts and upstream failures all still produce a row
//! carrying whatever usage was seen.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::HeaderValue;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::Response;
use futures::StreamExt;
use throttle_config::ThrottleConfig;
use throttle_core::{ThrottleError, TokenUsage};
use throttle_cost::{LogStatus, LogWriter};
use throttle_providers::{FrameStream, StreamTranslator, UpstreamRequest};
use tracing::{info, warn};

use crate::proxy::{RequestContext, elapsed_ms};
use crate::server::GatewayState;

/// Open the upstream stream and hand back a response whose body pipes
/// translated frames.
pub(crate) async fn respond(
    state: &GatewayState,
    config: &ThrottleConfig,
    ctx: RequestContext,
    upstream: UpstreamRequest<'_>,
) -> Response {
    let idle = Duration::from_secs(config.upstream.stream_idle_timeout_secs);
    let started = Instant::now();

    let opened = tokio::time::timeout(idle, state.dispatcher.stream_dispatch(&upstream)).await;
    let handle = match opened {
        Ok(Ok(handle)) => handle,
        Ok(Err(e)) => return fail(&state.writer, &ctx, e, started),
        Err(_) => {
            let error = ThrottleError::Timeout { duration: idle };
            return fail(&state.writer, &ctx, error, started);
        }
    };

    let translator = StreamTranslator::new(
        handle.provider.family(),
        ctx.dialect,
        ctx.plan.decision.model.id.clone(),
        &ctx.request_id,
    );
    let mut response = Response::new(Body::empty());
    ctx.apply_headers(response.headers_mut());

    let telemetry = Telemetry {
        writer: state.writer.clone(),
        started: handle.started,
        translator,
        ctx,
    };
    let pipe = Pipe {
        frames: handle.into_frames(),
        idle,
        ended: false,
        telemetry,
    };
    *response.body_mut() = Body::from_stream(pipe.into_stream());

    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

fn fail(
    writer: &LogWriter,
    ctx: &RequestContext,
    error: ThrottleError,
    started: Instant,
) -> Response {
    warn!(model = %ctx.plan.decision.model.id, error = %error, "upstream stream failed to open");
    writer.append(ctx.log_entry(TokenUsage::default(), elapsed_ms(started), LogStatus::Error));
    ctx.error_response(error)
}

/// Upstream frames plus the state needed to translate and account for them.
struct Pipe {
    frames: FrameStream,
    idle: Duration,
    ended: bool,
    telemetry: Telemetry,
}

impl Pipe {
    fn into_stream(self) -> impl futures::Stream<Item = Result<Bytes, Infallible>> + Send {
        futures::stream::unfold(self, |mut pipe| async move {
            if pipe.ended {
                return None;
            }
            loop {
                match tokio::time::timeout(pipe.idle, pipe.frames.next()).await {
                    Ok(Some(Ok(frame))) => {
                        if let Some(out) = pipe.telemetry.translator.translate(&frame) {
                            return Some((Ok(Bytes::from(out)), pipe));
                        }
                    }
                    Ok(Some(Err(e))) => {
                        warn!(
                            request_id = %pipe.telemetry.ctx.request_id,
                            error = %e,
                            "upstream stream broke"
                        );
                        return None;
                    }
                    Ok(None) => {
                        pipe.ended = true;
                        let tail = pipe.telemetry.translator.finish()?;
                        return Some((Ok(Bytes::from(tail)), pipe));
                    }
                    Err(_) => {
                        warn!(
                            request_id = %pipe.telemetry.ctx.request_id,
                            idle_secs = pipe.idle.as_secs(),
                            "upstream stream went idle"
                        );
                        return None;
                    }
                }
            }
        })
    }
}

/// Writes the stream's log entry exactly once, when dropped.
struct Telemetry {
    writer: LogWriter,
    started: Instant,
    translator: StreamTranslator,
    ctx: RequestContext,
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        let acc = self.translator.accumulator();
        let status = if acc.completed {
            LogStatus::Ok
        } else if acc.error.is_some() {
            LogStatus::Error
        } else {
            LogStatus::Aborted
        };
        let latency_ms = elapsed_ms(self.started);
        if status == LogStatus::Ok {
            info!(
                request_id = %self.ctx.request_id,
                input_tokens = acc.usage.input_tokens,
                output_tokens = acc.usage.output_tokens,
                latency_ms,
                "stream completed"
            );
        } else {
            warn!(
                request_id = %self.ctx.request_id,
                status = %status,
                input_tokens = acc.usage.input_tokens,
                output_tokens = acc.usage.output_tokens,
                latency_ms,
                "stream ended without a terminal event, logging partial usage"
            );
        }
        self.writer
            .append(self.ctx.log_entry(acc.usage, latency_ms, status));
    }
}
