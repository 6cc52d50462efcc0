// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Gemini `generateContent` wire format.
//!
//! Gemini is upstream-only: no client speaks it, so only request building
//! and response/stream decoding live here.

use serde::{Deserialize, Serialize};
use throttle_core::{FinishReason, ParsedRequest, Role, TokenUsage};

use crate::dispatch::Completion;
use crate::stream::UpstreamEvent;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

pub(crate) fn build_request(request: &ParsedRequest) -> GenerateContentRequest<'_> {
    GenerateContentRequest {
        contents: request
            .messages
            .iter()
            .map(|m| Content {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                },
                parts: [Part { text: &m.content }],
            })
            .collect(),
        system_instruction: request.system_prompt.as_deref().map(|text| SystemInstruction {
            parts: [Part { text }],
        }),
        generation_config: GenerationConfig {
            max_output_tokens: request.max_tokens,
            temperature: request.temperature,
        },
    }
}

/// A full response, or one chunk of a `streamGenerateContent?alt=sse` stream.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

/// Token counts. Thinking tokens are billed as output.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    thoughts_token_count: u32,
}

impl UsageMetadata {
    fn output_tokens(&self) -> u32 {
        self.candidates_token_count
            .saturating_add(self.thoughts_token_count)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

impl GenerateContentResponse {
    /// Visible text of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    fn finish_reason(&self) -> Option<FinishReason> {
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .map(FinishReason::from_upstream)
    }
}

pub(crate) fn parse_response(body: &[u8]) -> Result<Completion, serde_json::Error> {
    let response: GenerateContentResponse = serde_json::from_slice(body)?;
    let usage = response.usage_metadata.as_ref().map_or_else(TokenUsage::default, |u| {
        TokenUsage::new(u.prompt_token_count, u.output_tokens())
    });
    Ok(Completion {
        content: response.text(),
        finish_reason: response.finish_reason().unwrap_or(FinishReason::Stop),
        usage,
    })
}

/// Decode one streamed chunk. Every chunk is a partial
/// `GenerateContentResponse`; usage metadata is cumulative.
pub(crate) fn stream_events(data: &str) -> Result<Vec<UpstreamEvent>, serde_json::Error> {
    let chunk: GenerateContentResponse = serde_json::from_str(data)?;
    if let Some(error) = chunk.error {
        return Ok(vec![UpstreamEvent::Error(error.message)]);
    }

    let mut events = Vec::with_capacity(3);
    let text = chunk.text();
    if !text.is_empty() {
        events.push(UpstreamEvent::Text(text));
    }
    if let Some(usage) = &chunk.usage_metadata {
        events.push(UpstreamEvent::Usage {
            input_tokens: Some(usage.prompt_token_count),
            output_tokens: Some(usage.output_tokens()),
        });
    }
    if let Some(finish) = chunk.finish_reason() {
        events.push(UpstreamEvent::Finish(finish));
    }
    Ok(events)
}
