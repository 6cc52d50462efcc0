// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregate reporting over routing log entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use throttle_core::Tier;

use crate::ledger::{LogEntry, LogStatus};
use crate::pricing::{ModelPricing, calculate_cost};

/// Model every request is priced against to compute savings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub model_id: String,
    pub pricing: ModelPricing,
}

/// Per-model slice of the statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    pub requests: u64,
    pub cost_usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Aggregated cost, savings and distribution report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingStats {
    pub total_requests: u64,
    pub total_cost_usd: f64,
    pub baseline_model: Option<String>,
    /// What the same token counts would have cost on the baseline model.
    pub baseline_cost_usd: f64,
    pub estimated_savings_usd: f64,
    pub savings_percent: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub avg_latency_ms: f64,
    pub override_count: u64,
    pub error_count: u64,
    pub aborted_count: u64,
    pub by_model: BTreeMap<String, ModelStats>,
    pub by_tier: BTreeMap<Tier, u64>,
}

/// Aggregate `entries`, pricing savings against `baseline` when given.
pub fn compute_stats(entries: &[LogEntry], baseline: Option<&Baseline>) -> RoutingStats {
    let mut stats = RoutingStats {
        baseline_model: baseline.map(|b| b.model_id.clone()),
        ..RoutingStats::default()
    };
    let mut latency_total: u128 = 0;

    for entry in entries {
        let cost = entry.estimated_cost_usd.max(0.0);
        stats.total_requests += 1;
        stats.total_cost_usd += cost;
        stats.total_input_tokens += u64::from(entry.input_tokens);
        stats.total_output_tokens += u64::from(entry.output_tokens);
        latency_total += u128::from(entry.latency_ms);

        if entry.is_override {
            stats.override_count += 1;
        }
        match entry.status {
            LogStatus::Ok => {}
            LogStatus::Error => stats.error_count += 1,
            LogStatus::Aborted => stats.aborted_count += 1,
        }

        if let Some(b) = baseline {
            stats.baseline_cost_usd += calculate_cost(&entry.usage(), &b.pricing);
        }

        let model = stats.by_model.entry(entry.selected_model.clone()).or_default();
        model.requests += 1;
        model.cost_usd += cost;
        model.input_tokens += u64::from(entry.input_tokens);
        model.output_tokens += u64::from(entry.output_tokens);

        *stats.by_tier.entry(entry.tier).or_default() += 1;
    }

    if stats.total_requests > 0 {
        stats.avg_latency_ms = latency_total as f64 / stats.total_requests as f64;
    }
    if baseline.is_some() {
        stats.estimated_savings_usd = stats.baseline_cost_usd - stats.total_cost_usd;
        if stats.baseline_cost_usd > 0.0 {
            stats.savings_percent = stats.estimated_savings_usd / stats.baseline_cost_usd * 100.0;
        }
    }

    stats
}
