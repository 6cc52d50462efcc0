// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-model pricing and cost calculation.

use serde::{Deserialize, Serialize};
use throttle_core::TokenUsage;

/// Per-model pricing in USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Cost per million input tokens.
    pub input_per_mtok: f64,
    /// Cost per million output tokens.
    pub output_per_mtok: f64,
}

impl ModelPricing {
    pub const fn new(input_per_mtok: f64, output_per_mtok: f64) -> Self {
        Self {
            input_per_mtok,
            output_per_mtok,
        }
    }

    /// Input plus output price; used to rank models by cost.
    pub fn blended(&self) -> f64 {
        self.input_per_mtok + self.output_per_mtok
    }
}

/// Calculate the USD cost of one call.
///
/// Never negative, even if a pricing entry is.
pub fn calculate_cost(usage: &TokenUsage, pricing: &ModelPricing) -> f64 {
    let input = f64::from(usage.input_tokens) * pricing.input_per_mtok / 1_000_000.0;
    let output = f64::from(usage.output_tokens) * pricing.output_per_mtok / 1_000_000.0;
    (input + output).max(0.0)
}
