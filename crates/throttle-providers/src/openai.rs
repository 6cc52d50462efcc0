// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI Chat Completions: the client dialect served on
//! `/v1/chat/completions` and the wire format of every OpenAI-compatible
//! upstream (OpenAI, DeepSeek, Groq, Mistral, xAI).

use serde::{Deserialize, Serialize};
use serde_json::json;
use throttle_core::{
    DEFAULT_MAX_TOKENS, FinishReason, ParsedRequest, ProviderId, ProxyMessage, ProxyResponse,
    Role, ThrottleError, TokenUsage,
};

use crate::content::{MessageContent, decode_body, require_turns};
use crate::dispatch::Completion;
use crate::stream::{UpstreamEvent, data_frame};

// --- Client dialect: inbound ---

#[derive(Debug, Deserialize)]
struct ClientBody {
    #[serde(default)]
    messages: Option<Vec<ClientMessage>>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    max_completion_tokens: Option<u32>,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ClientMessage {
    role: String,
    #[serde(default)]
    content: Option<MessageContent>,
}

/// Normalize a `/v1/chat/completions` request body.
///
/// `system` and `developer` messages become the system prompt; tool and
/// function messages are dropped.
pub fn parse_request(body: &[u8]) -> Result<ParsedRequest, ThrottleError> {
    let body: ClientBody = decode_body(body)?;
    let raw_len = body.messages.as_ref().map(Vec::len);

    let mut system = Vec::new();
    let mut messages = Vec::new();
    for m in body.messages.unwrap_or_default() {
        let text = m.content.as_ref().map(MessageContent::flatten).unwrap_or_default();
        match m.role.as_str() {
            "system" | "developer" => system.push(text),
            "user" => messages.push(ProxyMessage::user(text)),
            "assistant" => messages.push(ProxyMessage::assistant(text)),
            _ => {}
        }
    }
    require_turns(raw_len, &messages)?;

    let system = system.join("\n");
    Ok(ParsedRequest {
        messages,
        system_prompt: (!system.is_empty()).then_some(system),
        max_tokens: body
            .max_completion_tokens
            .or(body.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: body.temperature,
        stream: body.stream.unwrap_or(false),
    })
}

// --- Shared response envelope (client output and upstream input) ---

/// A complete `chat.completion` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub id: String,
    #[serde(default = "completion_object")]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

fn completion_object() -> String {
    "chat.completion".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ChoiceMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default = "assistant_role")]
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

fn assistant_role() -> String {
    "assistant".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl From<TokenUsage> for ChatUsage {
    fn from(u: TokenUsage) -> Self {
        Self {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.total(),
        }
    }
}

/// Wrap a result in the `chat.completion` envelope.
pub fn format_response(response: &ProxyResponse, request_id: &str) -> ChatCompletion {
    ChatCompletion {
        id: completion_id(request_id),
        object: completion_object(),
        created: chrono::Utc::now().timestamp(),
        model: response.model_id.clone(),
        choices: vec![Choice {
            index: 0,
            message: ChoiceMessage {
                role: assistant_role(),
                content: Some(response.content.clone()),
            },
            finish_reason: Some(response.finish_reason.to_openai().to_string()),
        }],
        usage: Some(response.usage.into()),
    }
}

pub(crate) fn completion_id(request_id: &str) -> String {
    format!("chatcmpl-{request_id}")
}

// --- Upstream: outbound request ---

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

/// OpenAI itself wants `max_completion_tokens`; the compatible providers
/// still expect `max_tokens`.
pub(crate) fn build_request<'a>(
    provider: ProviderId,
    model_id: &'a str,
    request: &'a ParsedRequest,
    stream: bool,
) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = &request.system_prompt {
        messages.push(WireMessage {
            role: "system",
            content: system,
        });
    }
    messages.extend(request.messages.iter().map(|m| WireMessage {
        role: match m.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        },
        content: &m.content,
    }));

    let (max_tokens, max_completion_tokens) = match provider {
        ProviderId::OpenAi => (None, Some(request.max_tokens)),
        _ => (Some(request.max_tokens), None),
    };

    ChatRequest {
        model: model_id,
        messages,
        max_tokens,
        max_completion_tokens,
        temperature: request.temperature,
        stream,
        stream_options: stream.then_some(StreamOptions {
            include_usage: true,
        }),
    }
}

// --- Upstream: buffered response ---

pub(crate) fn parse_response(body: &[u8]) -> Result<Completion, serde_json::Error> {
    let completion: ChatCompletion = serde_json::from_slice(body)?;
    let choice = completion.choices.into_iter().next();
    let usage = completion.usage.unwrap_or_default();
    Ok(Completion {
        finish_reason: choice
            .as_ref()
            .and_then(|c| c.finish_reason.as_deref())
            .map_or(FinishReason::Stop, FinishReason::from_upstream),
        content: choice.and_then(|c| c.message.content).unwrap_or_default(),
        usage: TokenUsage::new(usage.prompt_tokens, usage.completion_tokens),
    })
}

// --- Upstream: stream chunks ---

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: String,
}

/// Literal sentinel ending an OpenAI-style stream.
pub(crate) const DONE: &str = "[DONE]";

/// Decode one `chat.completion.chunk` frame (or the `[DONE]` sentinel).
pub(crate) fn stream_events(data: &str) -> Result<Vec<UpstreamEvent>, serde_json::Error> {
    if data.trim() == DONE {
        return Ok(vec![UpstreamEvent::Done]);
    }
    let chunk: Chunk = serde_json::from_str(data)?;
    if let Some(error) = chunk.error {
        return Ok(vec![UpstreamEvent::Error(error.message)]);
    }

    let mut events = Vec::new();
    if let Some(choice) = chunk.choices.into_iter().next() {
        if let Some(text) = choice.delta.and_then(|d| d.content).filter(|t| !t.is_empty()) {
            events.push(UpstreamEvent::Text(text));
        }
        if let Some(reason) = choice.finish_reason {
            events.push(UpstreamEvent::Finish(FinishReason::from_upstream(&reason)));
        }
    }
    if let Some(usage) = chunk.usage {
        events.push(UpstreamEvent::Usage {
            input_tokens: Some(usage.prompt_tokens),
            output_tokens: Some(usage.completion_tokens),
        });
    }
    Ok(events)
}

// --- Client dialect: outbound stream chunks ---

fn chunk(
    id: &str,
    created: i64,
    model_id: &str,
    delta: serde_json::Value,
    finish: Option<&str>,
) -> serde_json::Value {
    json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": created,
        "model": model_id,
        "choices": [{"index": 0, "delta": delta, "finish_reason": finish}],
    })
}

/// First chunk, announcing the assistant role.
pub(crate) fn open_frame(id: &str, created: i64, model_id: &str) -> String {
    data_frame(&chunk(
        id,
        created,
        model_id,
        json!({"role": "assistant", "content": ""}),
        None,
    ))
}

pub(crate) fn delta_frame(id: &str, created: i64, model_id: &str, text: &str) -> String {
    data_frame(&chunk(id, created, model_id, json!({"content": text}), None))
}

/// Terminal chunk carrying `finish_reason` and usage, then `[DONE]`.
pub(crate) fn close_frames(
    id: &str,
    created: i64,
    model_id: &str,
    finish: &FinishReason,
    usage: TokenUsage,
) -> String {
    let mut last = chunk(id, created, model_id, json!({}), Some(finish.to_openai()));
    last["usage"] = json!(ChatUsage::from(usage));
    data_frame(&last) + "data: [DONE]\n\n"
}

pub(crate) fn error_frame(message: &str) -> String {
    data_frame(&json!({
        "error": {"message": message, "type": "upstream_error", "code": null},
    }))
}
