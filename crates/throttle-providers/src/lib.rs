// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Upstream dispatch and protocol translation for Throttle.
//!
//! Each upstream family (native Anthropic, native Google, OpenAI-compatible)
//! has a module with its request builder, response parser and stream decoder.
//! The two client dialects (Anthropic Messages, OpenAI Chat Completions) are
//! parsed into a [`ParsedRequest`](throttle_core::ParsedRequest) and formatted
//! back from a [`ProxyResponse`](throttle_core::ProxyResponse); streamed
//! responses go through a [`StreamTranslator`] one SSE frame at a time.

pub mod anthropic;
mod content;
pub mod dispatch;
mod google;
pub mod openai;
pub mod stream;

pub use anthropic::{
    format_response as format_anthropic_response, parse_request as parse_anthropic_request,
};
pub use dispatch::{Dispatcher, StreamHandle, UpstreamRequest};
pub use openai::{
    format_response as format_openai_response, parse_request as parse_openai_request,
};
pub use stream::{FrameStream, SseFrame, StreamAccumulator, StreamTranslator, sse_frames};
