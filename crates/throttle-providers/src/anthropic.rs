// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Messages API: the client dialect served on `/v1/messages` and
//! the native upstream wire format.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use throttle_core::{
    DEFAULT_MAX_TOKENS, FinishReason, ParsedRequest, ProxyMessage, ProxyResponse, Role,
    ThrottleError, TokenUsage,
};

use crate::content::{MessageContent, decode_body, require_turns};
use crate::dispatch::Completion;
use crate::stream::{UpstreamEvent, event_frame};

// --- Client dialect: inbound ---

#[derive(Debug, Deserialize)]
struct ClientBody {
    #[serde(default)]
    messages: Option<Vec<ClientMessage>>,
    #[serde(default)]
    system: Option<MessageContent>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ClientMessage {
    role: String,
    content: MessageContent,
}

/// Normalize a `/v1/messages` request body.
///
/// `system` is read from its own field; the client's `model` is ignored.
pub fn parse_request(body: &[u8]) -> Result<ParsedRequest, ThrottleError> {
    let body: ClientBody = decode_body(body)?;
    let raw_len = body.messages.as_ref().map(Vec::len);

    let messages: Vec<ProxyMessage> = body
        .messages
        .unwrap_or_default()
        .into_iter()
        .filter_map(|m| {
            let role = match m.role.as_str() {
                "user" => Role::User,
                "assistant" => Role::Assistant,
                _ => return None,
            };
            Some(ProxyMessage {
                role,
                content: m.content.flatten(),
            })
        })
        .collect();
    require_turns(raw_len, &messages)?;

    Ok(ParsedRequest {
        messages,
        system_prompt: body
            .system
            .map(|s| s.flatten())
            .filter(|s| !s.is_empty()),
        max_tokens: body.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: body.temperature,
        stream: body.stream.unwrap_or(false),
    })
}

// --- Shared response envelope (client output and upstream input) ---

/// A complete Messages API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "message_type")]
    pub kind: String,
    #[serde(default = "assistant_role")]
    pub role: String,
    pub content: Vec<ResponseBlock>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub stop_sequence: Option<String>,
    pub usage: Usage,
}

fn message_type() -> String {
    "message".to_string()
}

fn assistant_role() -> String {
    "assistant".to_string()
}

/// A response content block. Tool use and thinking blocks carry no text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

impl From<Usage> for TokenUsage {
    fn from(u: Usage) -> Self {
        TokenUsage::new(u.input_tokens, u.output_tokens)
    }
}

/// Wrap a result in the Messages API envelope.
pub fn format_response(response: &ProxyResponse, request_id: &str) -> MessagesResponse {
    MessagesResponse {
        id: message_id(request_id),
        kind: message_type(),
        role: assistant_role(),
        content: vec![ResponseBlock::Text {
            text: response.content.clone(),
        }],
        model: response.model_id.clone(),
        stop_reason: Some(response.finish_reason.to_anthropic().to_string()),
        stop_sequence: None,
        usage: Usage {
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        },
    }
}

pub(crate) fn message_id(request_id: &str) -> String {
    format!("msg_{}", request_id.replace('-', ""))
}

// --- Upstream: outbound request ---

#[derive(Debug, Serialize)]
pub(crate) struct MessagesRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

pub(crate) fn build_request<'a>(
    model_id: &'a str,
    request: &'a ParsedRequest,
    stream: bool,
) -> MessagesRequest<'a> {
    MessagesRequest {
        model: model_id,
        messages: request
            .messages
            .iter()
            .map(|m| WireMessage {
                role: m.role,
                content: &m.content,
            })
            .collect(),
        system: request.system_prompt.as_deref(),
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        stream,
    }
}

// --- Upstream: buffered response ---

pub(crate) fn parse_response(body: &[u8]) -> Result<Completion, serde_json::Error> {
    let response: MessagesResponse = serde_json::from_slice(body)?;
    let content = response
        .content
        .iter()
        .filter_map(|b| match b {
            ResponseBlock::Text { text } => Some(text.as_str()),
            ResponseBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("");
    Ok(Completion {
        content,
        finish_reason: response
            .stop_reason
            .as_deref()
            .map_or(FinishReason::Stop, FinishReason::from_upstream),
        usage: response.usage.into(),
    })
}

// --- Upstream: stream events ---

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart { message: StartMessage },
    ContentBlockDelta { delta: BlockDelta },
    MessageDelta {
        delta: MessageDeltaInfo,
        #[serde(default)]
        usage: Option<DeltaUsage>,
    },
    MessageStop,
    Error { error: ErrorDetail },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StartMessage {
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaInfo {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeltaUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// Decode one Anthropic SSE frame. The `type` field in the data is
/// authoritative; the `event:` line is not consulted.
pub(crate) fn stream_events(data: &str) -> Result<Vec<UpstreamEvent>, serde_json::Error> {
    let events = match serde_json::from_str::<StreamEvent>(data)? {
        StreamEvent::MessageStart { message } => vec![UpstreamEvent::Usage {
            input_tokens: Some(message.usage.input_tokens),
            output_tokens: Some(message.usage.output_tokens),
        }],
        StreamEvent::ContentBlockDelta {
            delta: BlockDelta::TextDelta { text },
        } => vec![UpstreamEvent::Text(text)],
        StreamEvent::MessageDelta { delta, usage } => {
            let mut events = Vec::with_capacity(2);
            if let Some(u) = usage {
                events.push(UpstreamEvent::Usage {
                    input_tokens: u.input_tokens,
                    output_tokens: u.output_tokens,
                });
            }
            if let Some(reason) = delta.stop_reason {
                events.push(UpstreamEvent::Finish(FinishReason::from_upstream(&reason)));
            }
            events
        }
        StreamEvent::MessageStop => vec![UpstreamEvent::Done],
        StreamEvent::Error { error } => vec![UpstreamEvent::Error(error.message)],
        StreamEvent::ContentBlockDelta { .. } | StreamEvent::Other => Vec::new(),
    };
    Ok(events)
}

// --- Client dialect: outbound stream frames ---

/// `message_start` followed by `content_block_start`.
pub(crate) fn open_frames(message_id: &str, model_id: &str, usage: TokenUsage) -> String {
    let start = json!({
        "type": "message_start",
        "message": {
            "id": message_id,
            "type": "message",
            "role": "assistant",
            "content": [],
            "model": model_id,
            "stop_reason": null,
            "stop_sequence": null,
            "usage": {"input_tokens": usage.input_tokens, "output_tokens": 0},
        },
    });
    let block = json!({
        "type": "content_block_start",
        "index": 0,
        "content_block": {"type": "text", "text": ""},
    });
    event_frame("message_start", &start) + &event_frame("content_block_start", &block)
}

pub(crate) fn delta_frame(text: &str) -> String {
    event_frame(
        "content_block_delta",
        &json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": text},
        }),
    )
}

/// `content_block_stop`, `message_delta` and `message_stop`.
pub(crate) fn close_frames(finish: &FinishReason, usage: TokenUsage) -> String {
    let stop = json!({"type": "content_block_stop", "index": 0});
    let delta = json!({
        "type": "message_delta",
        "delta": {"stop_reason": finish.to_anthropic(), "stop_sequence": null},
        "usage": {"output_tokens": usage.output_tokens},
    });
    event_frame("content_block_stop", &stop)
        + &event_frame("message_delta", &delta)
        + &event_frame("message_stop", &json!({"type": "message_stop"}))
}

pub(crate) fn error_frame(message: &str) -> String {
    let body: Value = json!({
        "type": "error",
        "error": {"type": "upstream_error", "message": message},
    });
    event_frame("error", &body)
}
