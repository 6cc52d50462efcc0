// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as ordered thresholds, usable weights, and well-formed URLs.

use throttle_core::ProviderId;

use crate::diagnostic::ConfigError;
use crate::model::ThrottleConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ThrottleConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(validation("server.host must not be empty".to_string()));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(validation(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if config.server.port == 0 {
        errors.push(validation("server.port must be non-zero".to_string()));
    }

    if config.server.max_body_bytes == 0 {
        errors.push(validation(
            "server.max_body_bytes must be greater than 0".to_string(),
        ));
    }

    let weights = &config.classifier.weights;
    for (name, value) in [
        ("length", weights.length),
        ("code", weights.code),
        ("reasoning", weights.reasoning),
        ("depth", weights.depth),
        ("system", weights.system),
    ] {
        if !value.is_finite() || value < 0.0 {
            errors.push(validation(format!(
                "classifier.weights.{name} must be a non-negative number, got {value}"
            )));
        }
    }
    if !(weights.sum() > 0.0) {
        errors.push(validation(
            "classifier.weights must not all be zero".to_string(),
        ));
    }

    let t = &config.classifier.thresholds;
    for (name, value) in [
        ("standard", t.standard),
        ("complex", t.complex),
        ("reasoning", t.reasoning),
    ] {
        if !(value > 0.0 && value <= 1.0) {
            errors.push(validation(format!(
                "classifier.thresholds.{name} must be in (0, 1], got {value}"
            )));
        }
    }
    if !(t.standard < t.complex && t.complex < t.reasoning) {
        errors.push(validation(format!(
            "classifier.thresholds must be strictly increasing (standard < complex < reasoning), got {} / {} / {}",
            t.standard, t.complex, t.reasoning
        )));
    }

    for provider in ProviderId::ALL {
        if let Some(url) = config.providers.get(provider).base_url.as_deref()
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            errors.push(validation(format!(
                "providers.{provider}.base_url must start with http:// or https://, got `{url}`"
            )));
        }
    }

    let upstream = &config.upstream;
    for (name, value) in [
        ("request_timeout_secs", upstream.request_timeout_secs),
        ("connect_timeout_secs", upstream.connect_timeout_secs),
        ("stream_idle_timeout_secs", upstream.stream_idle_timeout_secs),
    ] {
        if value == 0 {
            errors.push(validation(format!(
                "upstream.{name} must be greater than 0"
            )));
        }
    }

    if config.logging.database_path.trim().is_empty() {
        errors.push(validation(
            "logging.database_path must not be empty".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validation(message: String) -> ConfigError {
    ConfigError::Validation { message }
}
