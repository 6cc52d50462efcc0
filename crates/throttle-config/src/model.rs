// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Throttle routing proxy.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};
use throttle_core::{ProviderId, RoutingMode, Tier};

/// Top-level Throttle configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ThrottleConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Active routing mode and routing table overrides.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Classifier weights and tier thresholds.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Per-provider credentials and endpoints.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Outbound HTTP behaviour.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Log level and routing log location.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ThrottleConfig {
    /// Providers that currently have a usable API key, in declaration order.
    pub fn configured_providers(&self) -> Vec<ProviderId> {
        ProviderId::ALL
            .into_iter()
            .filter(|p| self.providers.get(*p).is_configured())
            .collect()
    }

    /// Whether `provider` has a usable API key.
    pub fn is_configured(&self, provider: ProviderId) -> bool {
        self.providers.get(provider).is_configured()
    }

    /// API key and effective base URL for a configured provider.
    pub fn provider_credentials(&self, provider: ProviderId) -> Option<ProviderCredentials> {
        let cfg = self.providers.get(provider);
        let api_key = cfg.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        let base_url = cfg
            .base_url
            .as_deref()
            .unwrap_or(provider.default_base_url())
            .trim_end_matches('/')
            .to_string();
        Some(ProviderCredentials {
            provider,
            api_key: api_key.to_string(),
            base_url,
        })
    }

    /// Copy of this config with every API key replaced by a marker.
    pub fn redacted(&self) -> ThrottleConfig {
        let mut copy = self.clone();
        for provider in ProviderId::ALL {
            let cfg = copy.providers.get_mut(provider);
            if cfg.api_key.is_some() {
                cfg.api_key = Some(REDACTED.to_string());
            }
        }
        copy
    }

    /// Redacted config rendered as TOML.
    pub fn to_redacted_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&self.redacted())
    }
}

/// Placeholder written over secrets by [`ThrottleConfig::redacted`].
pub const REDACTED: &str = "***";

/// Resolved connection details for one provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub provider: ProviderId,
    pub api_key: String,
    /// Base URL without a trailing slash.
    pub base_url: String,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("provider", &self.provider)
            .field("api_key", &REDACTED)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8484
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Routing mode and optional routing table overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Mode used when the process starts.
    #[serde(default)]
    pub mode: RoutingMode,

    /// Replacement model lists per mode and tier.
    #[serde(default)]
    pub table: RoutingTableOverrides,
}

/// Routing table overrides, one section per mode.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingTableOverrides {
    #[serde(default)]
    pub eco: TierOverrides,
    #[serde(default)]
    pub standard: TierOverrides,
    #[serde(default)]
    pub performance: TierOverrides,
}

impl RoutingTableOverrides {
    pub fn for_mode(&self, mode: RoutingMode) -> &TierOverrides {
        match mode {
            RoutingMode::Eco => &self.eco,
            RoutingMode::Standard => &self.standard,
            RoutingMode::Performance => &self.performance,
        }
    }
}

/// Ordered model id lists replacing the built-in list for a tier.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TierOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complex: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Vec<String>>,
}

impl TierOverrides {
    pub fn for_tier(&self, tier: Tier) -> Option<&[String]> {
        match tier {
            Tier::Simple => self.simple.as_deref(),
            Tier::Standard => self.standard.as_deref(),
            Tier::Complex => self.complex.as_deref(),
            Tier::Reasoning => self.reasoning.as_deref(),
        }
    }
}

/// Classifier dimension weights and tier thresholds.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub weights: ClassifierWeights,
    #[serde(default)]
    pub thresholds: TierThresholds,
}

/// Weight of each scoring dimension in the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierWeights {
    #[serde(default = "default_length_weight")]
    pub length: f64,
    #[serde(default = "default_code_weight")]
    pub code: f64,
    #[serde(default = "default_reasoning_weight")]
    pub reasoning: f64,
    #[serde(default = "default_depth_weight")]
    pub depth: f64,
    #[serde(default = "default_system_weight")]
    pub system: f64,
}

impl ClassifierWeights {
    pub fn sum(&self) -> f64 {
        self.length + self.code + self.reasoning + self.depth + self.system
    }
}

impl Default for ClassifierWeights {
    fn default() -> Self {
        Self {
            length: default_length_weight(),
            code: default_code_weight(),
            reasoning: default_reasoning_weight(),
            depth: default_depth_weight(),
            system: default_system_weight(),
        }
    }
}

fn default_length_weight() -> f64 {
    0.25
}

fn default_code_weight() -> f64 {
    0.30
}

fn default_reasoning_weight() -> f64 {
    0.20
}

fn default_depth_weight() -> f64 {
    0.15
}

fn default_system_weight() -> f64 {
    0.10
}

/// Lower bound of the composite score for each tier above `simple`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TierThresholds {
    #[serde(default = "default_standard_threshold")]
    pub standard: f64,
    #[serde(default = "default_complex_threshold")]
    pub complex: f64,
    #[serde(default = "default_reasoning_threshold")]
    pub reasoning: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            standard: default_standard_threshold(),
            complex: default_complex_threshold(),
            reasoning: default_reasoning_threshold(),
        }
    }
}

fn default_standard_threshold() -> f64 {
    0.15
}

fn default_complex_threshold() -> f64 {
    0.35
}

fn default_reasoning_threshold() -> f64 {
    0.60
}

/// Credentials for every supported provider.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub anthropic: ProviderConfig,
    #[serde(default)]
    pub google: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub deepseek: ProviderConfig,
    #[serde(default)]
    pub groq: ProviderConfig,
    #[serde(default)]
    pub mistral: ProviderConfig,
    #[serde(default)]
    pub xai: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, provider: ProviderId) -> &ProviderConfig {
        match provider {
            ProviderId::Anthropic => &self.anthropic,
            ProviderId::Google => &self.google,
            ProviderId::OpenAi => &self.openai,
            ProviderId::DeepSeek => &self.deepseek,
            ProviderId::Groq => &self.groq,
            ProviderId::Mistral => &self.mistral,
            ProviderId::XAi => &self.xai,
        }
    }

    pub fn get_mut(&mut self, provider: ProviderId) -> &mut ProviderConfig {
        match provider {
            ProviderId::Anthropic => &mut self.anthropic,
            ProviderId::Google => &mut self.google,
            ProviderId::OpenAi => &mut self.openai,
            ProviderId::DeepSeek => &mut self.deepseek,
            ProviderId::Groq => &mut self.groq,
            ProviderId::Mistral => &mut self.mistral,
            ProviderId::XAi => &mut self.xai,
        }
    }
}

/// One provider's API key and optional endpoint override.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key. `None` or blank leaves the provider unconfigured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override, e.g. for a local mock or a regional endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// Outbound HTTP configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Total deadline for a buffered upstream call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// TCP/TLS connect deadline.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Longest gap tolerated between two reads of a streamed response.
    #[serde(default = "default_stream_idle_timeout_secs")]
    pub stream_idle_timeout_secs: u64,

    /// Value of the `anthropic-version` header.
    #[serde(default = "default_anthropic_version")]
    pub anthropic_version: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            stream_idle_timeout_secs: default_stream_idle_timeout_secs(),
            anthropic_version: default_anthropic_version(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_stream_idle_timeout_secs() -> u64 {
    60
}

fn default_anthropic_version() -> String {
    "2023-06-01".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Path to the SQLite routing log.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            database_path: default_database_path(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("throttle").join("routing.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("routing.db"))
        .to_string_lossy()
        .into_owned()
}
