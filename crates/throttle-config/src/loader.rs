// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./throttle.toml` > `~/.config/throttle/throttle.toml` >
//! `/etc/throttle/throttle.toml` with environment variable overrides via the
//! `THROTTLE_` prefix and the conventional provider key variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ThrottleConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/throttle/throttle.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "throttle.toml";

/// Provider key variables and the config key each one fills.
///
/// `GEMINI_API_KEY` is listed after `GOOGLE_API_KEY` so it wins when both are set.
const PROVIDER_KEY_VARS: &[(&str, &str)] = &[
    ("ANTHROPIC_API_KEY", "providers.anthropic.api_key"),
    ("GOOGLE_API_KEY", "providers.google.api_key"),
    ("GEMINI_API_KEY", "providers.google.api_key"),
    ("OPENAI_API_KEY", "providers.openai.api_key"),
    ("DEEPSEEK_API_KEY", "providers.deepseek.api_key"),
    ("GROQ_API_KEY", "providers.groq.api_key"),
    ("MISTRAL_API_KEY", "providers.mistral.api_key"),
    ("XAI_API_KEY", "providers.xai.api_key"),
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/throttle/throttle.toml` (system-wide)
/// 3. `~/.config/throttle/throttle.toml` (user XDG config)
/// 4. `./throttle.toml` (local directory)
/// 5. `THROTTLE_*` environment variables
/// 6. Provider key variables such as `ANTHROPIC_API_KEY`
pub fn load_config() -> Result<ThrottleConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<ThrottleConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ThrottleConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ThrottleConfig, figment::Error> {
    with_env(
        Figment::new()
            .merge(Serialized::defaults(ThrottleConfig::default()))
            .merge(Toml::file(path)),
    )
    .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    with_env(
        Figment::new()
            .merge(Serialized::defaults(ThrottleConfig::default()))
            .merge(Toml::file(SYSTEM_CONFIG_PATH))
            .merge(Toml::file(user_config_path().unwrap_or_default()))
            .merge(Toml::file(LOCAL_CONFIG_FILE)),
    )
}

/// `$XDG_CONFIG_HOME/throttle/throttle.toml`, if a config dir exists.
pub fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("throttle").join(LOCAL_CONFIG_FILE))
}

fn with_env(figment: Figment) -> Figment {
    let figment = figment.merge(env_provider());
    PROVIDER_KEY_VARS
        .iter()
        .fold(figment, |figment, &(var, key)| {
            figment.merge(
                Env::raw()
                    .filter_map(move |k| k.as_str().eq_ignore_ascii_case(var).then(|| key.into())),
            )
        })
}

/// Create the `THROTTLE_` environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `THROTTLE_SERVER_MAX_BODY_BYTES` must map to
/// `server.max_body_bytes`, not `server.max.body.bytes`.
fn env_provider() -> Env {
    Env::prefixed("THROTTLE_").map(|key| {
        // `key` is the env var name with the prefix stripped, e.g. "routing_mode".
        let key_str = key.as_str().to_ascii_lowercase();
        let mapped = if let Some(rest) = key_str.strip_prefix("providers_") {
            // THROTTLE_PROVIDERS_OPENAI_BASE_URL -> providers.openai.base_url
            match rest.split_once('_') {
                Some((provider, field)) => format!("providers.{provider}.{field}"),
                None => format!("providers.{rest}"),
            }
        } else {
            key_str
                .replacen("server_", "server.", 1)
                .replacen("routing_", "routing.", 1)
                .replacen("upstream_", "upstream.", 1)
                .replacen("logging_", "logging.", 1)
        };
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use throttle_core::RoutingMode;

    #[test]
    fn throttle_env_vars_map_to_sections() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("THROTTLE_SERVER_PORT", "9100");
            jail.set_env("THROTTLE_ROUTING_MODE", "eco");
            jail.set_env("THROTTLE_LOGGING_LOG_LEVEL", "debug");
            jail.set_env("THROTTLE_PROVIDERS_OPENAI_BASE_URL", "http://localhost:1234/v1");

            let config = load_config()?;
            assert_eq!(config.server.port, 9100);
            assert_eq!(config.routing.mode, RoutingMode::Eco);
            assert_eq!(config.logging.log_level, "debug");
            assert_eq!(
                config.providers.openai.base_url.as_deref(),
                Some("http://localhost:1234/v1")
            );
            Ok(())
        });
    }

    #[test]
    fn provider_key_vars_fill_credentials() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("ANTHROPIC_API_KEY", "ak-env");
            jail.set_env("GOOGLE_API_KEY", "google-env");
            jail.set_env("GEMINI_API_KEY", "gemini-env");

            let config = load_config()?;
            assert_eq!(config.providers.anthropic.api_key.as_deref(), Some("ak-env"));
            assert_eq!(config.providers.google.api_key.as_deref(), Some("gemini-env"));
            Ok(())
        });
    }

    #[test]
    fn local_file_is_overridden_by_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                LOCAL_CONFIG_FILE,
                r#"
[providers.deepseek]
api_key = "from-file"

[server]
port = 7000
"#,
            )?;
            jail.set_env("DEEPSEEK_API_KEY", "from-env");

            let config = load_config()?;
            assert_eq!(config.server.port, 7000);
            assert_eq!(config.providers.deepseek.api_key.as_deref(), Some("from-env"));
            Ok(())
        });
    }
}
