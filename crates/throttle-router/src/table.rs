// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mode × tier → ordered model candidate lists.

use std::collections::HashMap;

use throttle_config::model::RoutingTableOverrides;
use throttle_core::{RoutingMode, ThrottleError, Tier};

use crate::registry::ModelRegistry;

/// Ordered candidate lists for every (mode, tier) pair.
///
/// The first configured model in a list wins; later entries are fallbacks.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    entries: HashMap<(RoutingMode, Tier), Vec<String>>,
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl RoutingTable {
    /// Built-in table.
    pub fn builtin() -> Self {
        // `Std` is the `standard` mode; `Standard` alone is the tier.
        use RoutingMode::{Eco, Performance, Standard as Std};
        use Tier::*;

        let rows: [((RoutingMode, Tier), &[&str]); 12] = [
            ((Eco, Simple), &["gemini-2.5-flash-lite", "deepseek-chat", "gpt-4o-mini", "claude-haiku-4-5"]),
            ((Eco, Standard), &["deepseek-chat", "gemini-2.5-flash", "gpt-4o-mini", "claude-haiku-4-5"]),
            ((Eco, Complex), &["gemini-2.5-flash", "deepseek-chat", "claude-haiku-4-5", "gpt-4.1"]),
            ((Eco, Reasoning), &["deepseek-reasoner", "gemini-2.5-pro", "o4-mini", "claude-sonnet-4-5"]),
            ((Std, Simple), &["gemini-2.5-flash", "gpt-4o-mini", "claude-haiku-4-5", "deepseek-chat"]),
            ((Std, Standard), &["claude-haiku-4-5", "gemini-2.5-flash", "gpt-4.1-mini", "deepseek-chat"]),
            ((Std, Complex), &["claude-sonnet-4-5", "gemini-2.5-pro", "gpt-4.1"]),
            ((Std, Reasoning), &["claude-opus-4-1", "o3", "gemini-2.5-pro", "deepseek-reasoner"]),
            ((Performance, Simple), &["claude-haiku-4-5", "gemini-2.5-flash", "gpt-4.1-mini"]),
            ((Performance, Standard), &["claude-sonnet-4-5", "gpt-4.1", "gemini-2.5-pro"]),
            ((Performance, Complex), &["claude-opus-4-1", "o3", "gemini-2.5-pro"]),
            ((Performance, Reasoning), &["claude-opus-4-1", "o3", "gemini-2.5-pro"]),
        ];

        Self {
            entries: rows.into_iter().map(|(key, list)| (key, ids(list))).collect(),
        }
    }

    /// Built-in table with configured lists swapped in.
    ///
    /// Every model id in `overrides` must exist in `registry`; all unknown ids
    /// are reported together.
    pub fn with_overrides(
        overrides: &RoutingTableOverrides,
        registry: &ModelRegistry,
    ) -> Result<Self, ThrottleError> {
        let mut table = Self::builtin();
        let mut unknown = Vec::new();

        for mode in RoutingMode::ALL {
            for tier in Tier::ALL {
                let Some(list) = overrides.for_mode(mode).for_tier(tier) else {
                    continue;
                };
                if list.is_empty() {
                    unknown.push(format!("routing.table.{mode}.{tier} must not be empty"));
                    continue;
                }
                for id in list {
                    if registry.get(id).is_none() {
                        unknown.push(format!("routing.table.{mode}.{tier}: unknown model `{id}`"));
                    }
                }
                table.entries.insert((mode, tier), list.to_vec());
            }
        }

        if unknown.is_empty() {
            Ok(table)
        } else {
            Err(ThrottleError::Config(unknown.join("; ")))
        }
    }

    /// Candidate model ids for a mode and tier, preferred first.
    pub fn candidates(&self, mode: RoutingMode, tier: Tier) -> &[String] {
        self.entries
            .get(&(mode, tier))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::builtin()
    }
}
