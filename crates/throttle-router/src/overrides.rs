// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Detection of routing overrides: explicit force-model and parent-tier inheritance.

use async_trait::async_trait;
use serde::Serialize;
use throttle_core::{ThrottleError, Tier};
use throttle_cost::RoutingLog;
use tracing::{debug, warn};

use crate::registry::ModelRegistry;

/// A routing decision that bypasses classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Override {
    /// The caller named a model (alias or exact id).
    Forced { alias: String, model_id: String },
    /// The request is a child of an earlier, logged request.
    Inherited {
        parent_request_id: String,
        tier: Tier,
        model_id: String,
    },
}

impl Override {
    /// `forced` or `inherited`, as stored in the routing log.
    pub fn kind(&self) -> &'static str {
        match self {
            Override::Forced { .. } => "forced",
            Override::Inherited { .. } => "inherited",
        }
    }
}

/// Tier and model an earlier request was routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRoute {
    pub tier: Tier,
    pub model_id: String,
}

/// Source of earlier routing decisions, keyed by request id.
#[async_trait]
pub trait ParentLookup: Send + Sync {
    async fn parent_route(&self, request_id: &str) -> Result<Option<ParentRoute>, ThrottleError>;
}

#[async_trait]
impl ParentLookup for RoutingLog {
    async fn parent_route(&self, request_id: &str) -> Result<Option<ParentRoute>, ThrottleError> {
        Ok(self.find(request_id).await?.map(|entry| ParentRoute {
            tier: entry.tier,
            model_id: entry.selected_model,
        }))
    }
}

/// Decide whether a request carries an override.
///
/// Precedence: force-model > parent inheritance. An unknown alias, an unknown
/// parent, or a failed lookup is logged and ignored so the request still routes.
pub async fn detect_override(
    force_model: Option<&str>,
    parent_request_id: Option<&str>,
    registry: &ModelRegistry,
    lookup: &dyn ParentLookup,
) -> Option<Override> {
    if let Some(alias) = force_model.map(str::trim).filter(|a| !a.is_empty()) {
        match registry.resolve_alias(alias) {
            Some(model) => {
                return Some(Override::Forced {
                    alias: alias.to_string(),
                    model_id: model.id.clone(),
                });
            }
            None => warn!(alias, "unknown force-model alias, ignoring"),
        }
    }

    let parent = parent_request_id.map(str::trim).filter(|p| !p.is_empty())?;
    match lookup.parent_route(parent).await {
        Ok(Some(route)) => Some(Override::Inherited {
            parent_request_id: parent.to_string(),
            tier: route.tier,
            model_id: route.model_id,
        }),
        Ok(None) => {
            debug!(parent_request_id = parent, "parent request not in routing log");
            None
        }
        Err(e) => {
            warn!(parent_request_id = parent, error = %e, "parent lookup failed, routing normally");
            None
        }
    }
}
