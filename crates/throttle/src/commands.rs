// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offline subcommands: classify, route, stats, log, config.
//!
//! These run the same control functions the server exposes, against the
//! local configuration and routing log, and print either plain text or JSON.

use std::fmt::Write as _;

use serde::Serialize;
use throttle_config::{SharedConfig, ThrottleConfig};
use throttle_core::{ParsedRequest, ThrottleError};
use throttle_cost::{DEFAULT_QUEUE_CAPACITY, LogEntry, LogWriter, RoutingLog, RoutingStats};
use throttle_gateway::control::{self, RouteHints, RoutePlan};
use throttle_gateway::GatewayState;
use throttle_router::Classification;

async fn open_state(config: ThrottleConfig) -> Result<GatewayState, ThrottleError> {
    let log = RoutingLog::open(&config.logging.database_path).await?;
    let (writer, _task) = LogWriter::spawn(log.clone(), DEFAULT_QUEUE_CAPACITY);
    GatewayState::new(SharedConfig::new(config), log, writer)
}

fn request(prompt: &str, system: Option<String>) -> ParsedRequest {
    let mut request = control::single_turn(prompt);
    request.system_prompt = system;
    request
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ThrottleError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ThrottleError::Internal(format!("failed to render JSON: {e}")))
}

pub fn classify(
    config: &ThrottleConfig,
    prompt: &str,
    system: Option<String>,
    json: bool,
) -> Result<String, ThrottleError> {
    let classification = control::classify_request(config, &request(prompt, system));
    if json {
        to_json(&classification)
    } else {
        Ok(render_classification(&classification))
    }
}

pub async fn route(
    config: ThrottleConfig,
    prompt: &str,
    system: Option<String>,
    hints: RouteHints,
    json: bool,
) -> Result<String, ThrottleError> {
    let state = open_state(config).await?;
    let snapshot = state.config.get();
    let plan = control::route_request(&state, &snapshot, &request(prompt, system), &hints).await?;
    if json {
        to_json(&plan)
    } else {
        Ok(render_plan(&plan))
    }
}

pub async fn stats(config: ThrottleConfig, days: u32, json: bool) -> Result<String, ThrottleError> {
    let state = open_state(config).await?;
    let stats = control::get_routing_stats(&state, days).await?;
    if json {
        to_json(&stats)
    } else {
        Ok(render_stats(&stats, days))
    }
}

pub async fn log(config: ThrottleConfig, tail: usize, json: bool) -> Result<String, ThrottleError> {
    let state = open_state(config).await?;
    let entries = control::get_recent_routing_log(&state, tail).await?;
    if json {
        to_json(&entries)
    } else {
        Ok(render_log(&entries))
    }
}

pub fn show_config(config: &ThrottleConfig) -> Result<String, ThrottleError> {
    config
        .to_redacted_toml()
        .map_err(|e| ThrottleError::Internal(format!("failed to render config: {e}")))
}

fn render_classification(c: &Classification) -> String {
    let d = &c.dimensions;
    let mut out = String::new();
    let _ = writeln!(out, "tier:      {}", c.tier);
    let _ = writeln!(out, "score:     {:.3}", c.composite_score);
    let _ = writeln!(
        out,
        "dimensions: length={:.2} code={:.2} reasoning={:.2} depth={:.2} system={:.2}",
        d.length, d.code, d.reasoning, d.depth, d.system
    );
    let _ = write!(out, "elapsed:   {}us", c.elapsed_us);
    out
}

fn render_plan(plan: &RoutePlan) -> String {
    let d = &plan.decision;
    let mut out = String::new();
    let _ = writeln!(out, "model:     {} ({})", d.model.id, d.model.provider);
    let _ = writeln!(out, "tier:      {}", d.tier);
    let _ = writeln!(out, "mode:      {}", d.mode);
    let _ = writeln!(out, "score:     {:.3}", plan.classification.composite_score);
    if let Some(o) = plan.override_() {
        let _ = writeln!(out, "override:  {}", o.kind());
    }
    let _ = write!(out, "reasoning: {}", d.reasoning);
    out
}

fn render_stats(s: &RoutingStats, days: u32) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "last {days} day(s): {} request(s)", s.total_requests);
    let _ = writeln!(out, "cost:      ${:.4}", s.total_cost_usd);
    match &s.baseline_model {
        Some(model) => {
            let _ = writeln!(out, "baseline:  ${:.4} (all on {model})", s.baseline_cost_usd);
            let _ = writeln!(
                out,
                "savings:   ${:.4} ({:.1}%)",
                s.estimated_savings_usd, s.savings_percent
            );
        }
        None => {
            let _ = writeln!(out, "baseline:  none (no provider configured)");
        }
    }
    let _ = writeln!(
        out,
        "tokens:    {} in / {} out",
        s.total_input_tokens, s.total_output_tokens
    );
    let _ = write!(
        out,
        "latency:   {:.0} ms avg; {} override(s), {} error(s), {} aborted",
        s.avg_latency_ms, s.override_count, s.error_count, s.aborted_count
    );
    for (model, m) in &s.by_model {
        let _ = write!(
            out,
            "\n  {model:<28} {:>6} req  ${:.4}",
            m.requests, m.cost_usd
        );
    }
    out
}

fn render_log(entries: &[LogEntry]) -> String {
    if entries.is_empty() {
        return "routing log is empty".to_string();
    }
    entries
        .iter()
        .map(|e| {
            let id: String = e.request_id.chars().take(8).collect();
            format!(
                "{}  {id}  {:<9} {:<26} {:>6}/{:<6} ${:.5}  {}{}",
                e.timestamp,
                e.tier,
                e.selected_model,
                e.input_tokens,
                e.output_tokens,
                e.estimated_cost_usd,
                e.status,
                e.override_kind
                    .as_deref()
                    .map(|k| format!(" [{k}]"))
                    .unwrap_or_default(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use throttle_config::ProviderConfig;
    use throttle_core::{ClientDialect, ProviderId, RoutingMode, Tier};
    use throttle_cost::LogStatus;

    fn config_in(dir: &tempfile::TempDir) -> ThrottleConfig {
        let mut config = ThrottleConfig::default();
        config.logging.database_path = dir.path().join("routing.db").display().to_string();
        *config.providers.get_mut(ProviderId::Google) = ProviderConfig {
            api_key: Some("g-key".into()),
            base_url: None,
        };
        config
    }

    #[test]
    fn classify_text_names_tier_and_score() {
        let out = classify(&ThrottleConfig::default(), "hi", None, false).unwrap();
        assert!(out.starts_with("tier:      simple"));
        assert!(out.contains("score:"));
    }

    #[test]
    fn classify_json_is_machine_readable() {
        let out = classify(&ThrottleConfig::default(), "hi", None, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["tier"], "simple");
    }

    #[tokio::test]
    async fn route_dry_run_honours_force_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        *config.providers.get_mut(ProviderId::Anthropic) = ProviderConfig {
            api_key: Some("a-key".into()),
            base_url: None,
        };
        let hints = RouteHints {
            force_model: Some("opus".into()),
            parent_request_id: None,
        };
        let out = route(config, "hi", None, hints, false).await.unwrap();
        assert!(out.starts_with("model:     claude-opus-4-1 (anthropic)"));
        assert!(out.contains("override:  forced"));
    }

    #[tokio::test]
    async fn stats_and_log_on_an_empty_database() {
        let dir = tempfile::tempdir().unwrap();
        let out = stats(config_in(&dir), 7, false).await.unwrap();
        assert!(out.starts_with("last 7 day(s): 0 request(s)"));
        let out = log(config_in(&dir), 10, false).await.unwrap();
        assert_eq!(out, "routing log is empty");
    }

    #[test]
    fn config_output_masks_keys() {
        let dir = tempfile::tempdir().unwrap();
        let out = show_config(&config_in(&dir)).unwrap();
        assert!(out.contains("[providers.google]"));
        assert!(!out.contains("g-key"));
    }

    #[test]
    fn log_rows_show_override_kind() {
        let entry = LogEntry {
            request_id: "0123456789abcdef".into(),
            timestamp: "2026-03-01T00:00:00.000Z".into(),
            prompt_hash: "00".into(),
            composite_score: 0.9,
            tier: Tier::Reasoning,
            selected_model: "claude-opus-4-1".into(),
            provider: ProviderId::Anthropic,
            mode: RoutingMode::Standard,
            is_override: true,
            override_kind: Some("forced".into()),
            input_tokens: 10,
            output_tokens: 20,
            estimated_cost_usd: 0.00165,
            latency_ms: 900,
            parent_request_id: None,
            dialect: ClientDialect::Anthropic,
            stream: false,
            status: LogStatus::Ok,
        };
        let out = render_log(&[entry]);
        assert!(out.contains("01234567  reasoning"));
        assert!(out.ends_with("ok [forced]"));
    }
}
