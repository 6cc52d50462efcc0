// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message content shared by both client dialects: a plain string or an
//! array of typed blocks, flattened to text.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use throttle_core::{ProxyMessage, ThrottleError};

/// Content of one inbound message.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A typed content block. Only text survives flattening.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentBlock {
    Text {
        text: String,
    },
    ToolResult {
        #[serde(default)]
        content: Option<MessageContent>,
    },
    #[serde(other)]
    Unsupported,
}

impl MessageContent {
    /// Join all text with `"\n"`; images and tool calls are dropped.
    pub(crate) fn flatten(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(ContentBlock::text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl ContentBlock {
    fn text(&self) -> Option<String> {
        match self {
            ContentBlock::Text { text } => Some(text.clone()),
            ContentBlock::ToolResult {
                content: Some(content),
            } => Some(content.flatten()),
            _ => None,
        }
    }
}

/// Deserialize a client body, mapping failures to `invalid_request_error`.
pub(crate) fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ThrottleError> {
    serde_json::from_slice(body)
        .map_err(|e| ThrottleError::InvalidRequest(format!("malformed JSON body: {e}")))
}

/// Reject conversations the upstreams cannot answer.
///
/// `raw_len` is the length of the client's `messages` array before
/// system/tool entries were filtered out.
pub(crate) fn require_turns(
    raw_len: Option<usize>,
    turns: &[ProxyMessage],
) -> Result<(), ThrottleError> {
    match raw_len {
        None => Err(ThrottleError::InvalidRequest(
            "`messages` is required".into(),
        )),
        Some(0) => Err(ThrottleError::InvalidRequest(
            "`messages` must not be empty".into(),
        )),
        Some(_) if turns.is_empty() => Err(ThrottleError::InvalidRequest(
            "`messages` contains no user or assistant turn".into(),
        )),
        Some(_) => Ok(()),
    }
}
