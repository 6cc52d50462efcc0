// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model selection.
//!
//! Orchestrates model selection: force-model > parent inheritance > classify,
//! then falls back across tiers when the preferred provider has no credentials.

use serde::Serialize;
use throttle_config::ThrottleConfig;
use throttle_core::{RoutingMode, ThrottleError, Tier};
use tracing::{info, warn};

use crate::classifier::Classification;
use crate::overrides::Override;
use crate::registry::{ModelDescriptor, ModelRegistry};
use crate::table::RoutingTable;

/// The chosen model and why it was chosen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    pub model: ModelDescriptor,
    /// Tier the decision was made for (classified, or inherited from a parent).
    pub tier: Tier,
    pub mode: RoutingMode,
    /// Override that determined the decision, if one applied.
    #[serde(rename = "override")]
    pub override_: Option<Override>,
    /// Short human-readable account of which rule fired.
    pub reasoning: String,
}

/// Pick a model for a classified request.
///
/// Always returns a usable, configured model unless no provider has
/// credentials at all, which is a configuration error.
pub fn route_request(
    classification: &Classification,
    mode: RoutingMode,
    override_: Option<&Override>,
    registry: &ModelRegistry,
    config: &ThrottleConfig,
    table: &RoutingTable,
) -> Result<RoutingDecision, ThrottleError> {
    if config.configured_providers().is_empty() {
        return Err(ThrottleError::NoProviderConfigured);
    }

    let mut tier = classification.tier;
    let mut note = String::new();

    if let Some(o) = override_ {
        match o {
            Override::Forced { alias, model_id } => {
                if let Some(model) = usable(registry, config, model_id) {
                    return Ok(decision(
                        model,
                        tier,
                        mode,
                        Some(o),
                        format!("forced by `{alias}`"),
                    ));
                }
                warn!(alias = %alias, model = %model_id, "forced model's provider is not configured, routing normally");
                note = format!("forced `{alias}` unavailable; ");
            }
            Override::Inherited {
                parent_request_id,
                tier: parent_tier,
                model_id,
            } => {
                tier = *parent_tier;
                if let Some(model) = usable(registry, config, model_id) {
                    return Ok(decision(
                        model,
                        tier,
                        mode,
                        Some(o),
                        format!("inherited model from parent {parent_request_id}"),
                    ));
                }
                let (model, how) = select_for_tier(tier, mode, registry, config, table)?;
                return Ok(decision(
                    model,
                    tier,
                    mode,
                    Some(o),
                    format!("inherited tier {tier} from parent {parent_request_id}; {how}"),
                ));
            }
        }
    }

    let (model, how) = select_for_tier(tier, mode, registry, config, table)?;
    Ok(decision(
        model,
        tier,
        mode,
        None,
        format!(
            "{note}score {:.3} -> {tier}; {how}",
            classification.composite_score
        ),
    ))
}

fn decision(
    model: &ModelDescriptor,
    tier: Tier,
    mode: RoutingMode,
    override_: Option<&Override>,
    reasoning: String,
) -> RoutingDecision {
    info!(model = %model.id, provider = %model.provider, %tier, %mode, reasoning = %reasoning, "routing decision");
    RoutingDecision {
        model: model.clone(),
        tier,
        mode,
        override_: override_.cloned(),
        reasoning,
    }
}

fn usable<'a>(
    registry: &'a ModelRegistry,
    config: &ThrottleConfig,
    model_id: &str,
) -> Option<&'a ModelDescriptor> {
    registry
        .get(model_id)
        .filter(|m| config.is_configured(m.provider))
}

/// First configured model for `tier`, then the next higher tier, then the
/// next lower tier, then the cheapest configured model anywhere.
fn select_for_tier<'a>(
    tier: Tier,
    mode: RoutingMode,
    registry: &'a ModelRegistry,
    config: &ThrottleConfig,
    table: &RoutingTable,
) -> Result<(&'a ModelDescriptor, String), ThrottleError> {
    let first_in = |t: Tier| {
        table
            .candidates(mode, t)
            .iter()
            .enumerate()
            .find_map(|(i, id)| usable(registry, config, id).map(|m| (m, i)))
    };

    if let Some((model, idx)) = first_in(tier) {
        let how = if idx == 0 {
            format!("{mode} table")
        } else {
            format!("{mode} table fallback #{idx}")
        };
        return Ok((model, how));
    }

    for neighbour in [tier.higher(), tier.lower()].into_iter().flatten() {
        if let Some((model, _)) = first_in(neighbour) {
            return Ok((model, format!("no {tier} model configured, borrowed from {neighbour}")));
        }
    }

    registry
        .cheapest_configured(config)
        .map(|m| (m, "cheapest configured model".to_string()))
        .ok_or(ThrottleError::NoProviderConfigured)
}
