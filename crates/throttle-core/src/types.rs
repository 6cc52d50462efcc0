// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared data model: tiers, modes, providers, and the normalized request/response shapes.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Ordered complexity bucket assigned by the classifier.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Greetings, single facts, short lookups.
    Simple,
    /// General conversation and moderate Q&A.
    Standard,
    /// Code generation, long context, multi-step work.
    Complex,
    /// Deep multi-step reasoning over large inputs.
    Reasoning,
}

impl Tier {
    /// All tiers, cheapest first.
    pub const ALL: [Tier; 4] = [Tier::Simple, Tier::Standard, Tier::Complex, Tier::Reasoning];

    /// Position of this tier in [`Tier::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// The next more capable tier, if any.
    pub fn higher(self) -> Option<Tier> {
        Tier::ALL.get(self.index() + 1).copied()
    }

    /// The next cheaper tier, if any.
    pub fn lower(self) -> Option<Tier> {
        self.index().checked_sub(1).map(|i| Tier::ALL[i])
    }
}

/// Named routing policy selecting which tier-to-model table is used.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Cheapest acceptable models.
    Eco,
    /// Balanced cost and quality.
    #[default]
    Standard,
    /// Strongest models per tier.
    Performance,
}

impl RoutingMode {
    pub const ALL: [RoutingMode; 3] = [
        RoutingMode::Eco,
        RoutingMode::Standard,
        RoutingMode::Performance,
    ];
}

/// Wire-protocol group an upstream provider belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UpstreamFamily {
    /// Native Anthropic Messages API.
    Anthropic,
    /// Native Google Gemini `generateContent` API.
    Google,
    /// Any provider speaking the OpenAI Chat Completions shape.
    OpenAiCompatible,
}

/// A concrete upstream provider with credentials in the config.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Anthropic,
    Google,
    OpenAi,
    DeepSeek,
    Groq,
    Mistral,
    XAi,
}

impl ProviderId {
    pub const ALL: [ProviderId; 7] = [
        ProviderId::Anthropic,
        ProviderId::Google,
        ProviderId::OpenAi,
        ProviderId::DeepSeek,
        ProviderId::Groq,
        ProviderId::Mistral,
        ProviderId::XAi,
    ];

    /// Upstream wire family used to talk to this provider.
    pub fn family(self) -> UpstreamFamily {
        match self {
            ProviderId::Anthropic => UpstreamFamily::Anthropic,
            ProviderId::Google => UpstreamFamily::Google,
            _ => UpstreamFamily::OpenAiCompatible,
        }
    }

    /// Base URL used when the config does not override it.
    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderId::Anthropic => "https://api.anthropic.com",
            ProviderId::Google => "https://generativelanguage.googleapis.com",
            ProviderId::OpenAi => "https://api.openai.com/v1",
            ProviderId::DeepSeek => "https://api.deepseek.com/v1",
            ProviderId::Groq => "https://api.groq.com/openai/v1",
            ProviderId::Mistral => "https://api.mistral.ai/v1",
            ProviderId::XAi => "https://api.x.ai/v1",
        }
    }
}

/// Which public request/response shape the caller speaks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ClientDialect {
    /// `POST /v1/messages`
    Anthropic,
    /// `POST /v1/chat/completions`
    OpenAi,
}

/// Conversation role of a normalized message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation with its content flattened to plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyMessage {
    pub role: Role,
    pub content: String,
}

impl ProxyMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Default completion budget when the client does not send one.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// A client request normalized out of either dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRequest {
    pub messages: Vec<ProxyMessage>,
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub stream: bool,
}

impl ParsedRequest {
    /// Text of the most recent user turn, or empty if there is none.
    pub fn last_user_text(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Token counts reported by an upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Normalized reason a generation stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    /// Natural end of turn (`end_turn`, `stop`, `STOP`).
    Stop,
    /// Token budget exhausted (`max_tokens`, `MAX_TOKENS`, `length`).
    Length,
    /// Any other upstream value, passed through unchanged.
    Other(String),
}

impl FinishReason {
    /// Normalize a raw upstream finish/stop reason.
    pub fn from_upstream(raw: &str) -> Self {
        match raw {
            "end_turn" | "stop" | "STOP" => FinishReason::Stop,
            "max_tokens" | "MAX_TOKENS" | "length" => FinishReason::Length,
            other => FinishReason::Other(other.to_string()),
        }
    }

    /// Normalized name (`stop`, `length`, or the raw value).
    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::Other(s) => s,
        }
    }

    /// Value for an OpenAI-dialect `finish_reason`.
    pub fn to_openai(&self) -> &str {
        self.as_str()
    }

    /// Value for an Anthropic-dialect `stop_reason`.
    pub fn to_anthropic(&self) -> &str {
        match self {
            FinishReason::Stop => "end_turn",
            FinishReason::Length => "max_tokens",
            FinishReason::Other(s) => s,
        }
    }
}

/// A completed upstream result, buffered or accumulated across a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub content: String,
    pub model_id: String,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
    pub latency_ms: u64,
}
