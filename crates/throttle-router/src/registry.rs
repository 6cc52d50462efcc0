// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalogue of routable models, their pricing, and force-model aliases.
//!
//! Prices are USD per million tokens, list prices as of 2026-03.

use serde::Serialize;
use throttle_config::ThrottleConfig;
use throttle_core::{ProviderId, UpstreamFamily};
use throttle_cost::ModelPricing;

/// A routable upstream model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub provider: ProviderId,
    pub display_name: String,
    pub pricing: ModelPricing,
}

impl ModelDescriptor {
    fn new(
        id: &str,
        provider: ProviderId,
        display_name: &str,
        input_per_mtok: f64,
        output_per_mtok: f64,
    ) -> Self {
        Self {
            id: id.to_string(),
            provider,
            display_name: display_name.to_string(),
            pricing: ModelPricing::new(input_per_mtok, output_per_mtok),
        }
    }

    /// Wire family used to reach this model.
    pub fn family(&self) -> UpstreamFamily {
        self.provider.family()
    }
}

/// Short names accepted in `X-Throttle-Force-Model`.
const ALIASES: &[(&str, &str)] = &[
    ("opus", "claude-opus-4-1"),
    ("sonnet", "claude-sonnet-4-5"),
    ("haiku", "claude-haiku-4-5"),
    ("claude", "claude-sonnet-4-5"),
    ("gemini", "gemini-2.5-pro"),
    ("pro", "gemini-2.5-pro"),
    ("flash", "gemini-2.5-flash"),
    ("flash-lite", "gemini-2.5-flash-lite"),
    ("gpt", "gpt-4.1"),
    ("gpt-mini", "gpt-4.1-mini"),
    ("4o-mini", "gpt-4o-mini"),
    ("o3", "o3"),
    ("o4-mini", "o4-mini"),
    ("deepseek", "deepseek-chat"),
    ("reasoner", "deepseek-reasoner"),
    ("r1", "deepseek-reasoner"),
    ("llama", "llama-3.3-70b-versatile"),
    ("groq", "llama-3.3-70b-versatile"),
    ("mistral", "mistral-large-latest"),
    ("mistral-small", "mistral-small-latest"),
    ("grok", "grok-4"),
    ("grok-mini", "grok-3-mini"),
];

/// All known models, in declaration order.
///
/// Declaration order breaks ties between equally priced models.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
}

impl ModelRegistry {
    /// The built-in model catalogue.
    pub fn builtin() -> Self {
        use ProviderId::*;
        Self {
            models: vec![
                ModelDescriptor::new("claude-haiku-4-5", Anthropic, "Claude Haiku 4.5", 1.0, 5.0),
                ModelDescriptor::new("claude-sonnet-4-5", Anthropic, "Claude Sonnet 4.5", 3.0, 15.0),
                ModelDescriptor::new("claude-opus-4-1", Anthropic, "Claude Opus 4.1", 15.0, 75.0),
                ModelDescriptor::new("gemini-2.5-flash-lite", Google, "Gemini 2.5 Flash-Lite", 0.10, 0.40),
                ModelDescriptor::new("gemini-2.5-flash", Google, "Gemini 2.5 Flash", 0.30, 2.50),
                ModelDescriptor::new("gemini-2.5-pro", Google, "Gemini 2.5 Pro", 1.25, 10.0),
                ModelDescriptor::new("gpt-4o-mini", OpenAi, "GPT-4o mini", 0.15, 0.60),
                ModelDescriptor::new("gpt-4.1-mini", OpenAi, "GPT-4.1 mini", 0.40, 1.60),
                ModelDescriptor::new("gpt-4.1", OpenAi, "GPT-4.1", 2.0, 8.0),
                ModelDescriptor::new("o4-mini", OpenAi, "o4-mini", 1.10, 4.40),
                ModelDescriptor::new("o3", OpenAi, "o3", 2.0, 8.0),
                ModelDescriptor::new("deepseek-chat", DeepSeek, "DeepSeek V3", 0.27, 1.10),
                ModelDescriptor::new("deepseek-reasoner", DeepSeek, "DeepSeek R1", 0.55, 2.19),
                ModelDescriptor::new("llama-3.3-70b-versatile", Groq, "Llama 3.3 70B (Groq)", 0.59, 0.79),
                ModelDescriptor::new("mistral-small-latest", Mistral, "Mistral Small", 0.10, 0.30),
                ModelDescriptor::new("mistral-large-latest", Mistral, "Mistral Large", 2.0, 6.0),
                ModelDescriptor::new("grok-3-mini", XAi, "Grok 3 mini", 0.30, 0.50),
                ModelDescriptor::new("grok-4", XAi, "Grok 4", 3.0, 15.0),
            ],
        }
    }

    pub fn all(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Look up a model by exact id.
    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Resolve a force-model alias or exact model id (case-insensitive).
    pub fn resolve_alias(&self, alias: &str) -> Option<&ModelDescriptor> {
        let wanted = alias.trim().to_ascii_lowercase();
        let id = ALIASES
            .iter()
            .find(|(a, _)| *a == wanted)
            .map(|(_, id)| *id)
            .unwrap_or(wanted.as_str());
        self.get(id)
    }

    /// Models whose provider has credentials, in declaration order.
    pub fn configured<'s, 'c>(
        &'s self,
        config: &'c ThrottleConfig,
    ) -> impl Iterator<Item = &'s ModelDescriptor> + use<'s, 'c> {
        self.models
            .iter()
            .filter(move |m| config.is_configured(m.provider))
    }

    /// The most expensive configured model; the default savings baseline.
    pub fn most_expensive(&self, config: &ThrottleConfig) -> Option<&ModelDescriptor> {
        // `>=` keeps the first declared model on ties.
        self.configured(config).fold(None, |best: Option<&ModelDescriptor>, m| match best {
            Some(b) if b.pricing.blended() >= m.pricing.blended() => Some(b),
            _ => Some(m),
        })
    }

    /// The cheapest configured model, ties broken by declaration order.
    pub fn cheapest_configured(&self, config: &ThrottleConfig) -> Option<&ModelDescriptor> {
        self.configured(config).fold(None, |best: Option<&ModelDescriptor>, m| match best {
            Some(b) if b.pricing.blended() <= m.pricing.blended() => Some(b),
            _ => Some(m),
        })
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
