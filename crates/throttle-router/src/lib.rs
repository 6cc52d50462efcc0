// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt classification and model routing for the Throttle proxy.
//!
//! This crate provides:
//! - [`classify`]: weighted heuristic complexity scoring (no I/O)
//! - [`ModelRegistry`] / [`RoutingTable`]: the model catalogue and mode × tier lists
//! - [`detect_override`]: force-model aliases and parent-tier inheritance
//! - [`route_request`]: the cheapest configured model for a request

pub mod classifier;
pub mod overrides;
pub mod registry;
pub mod router;
pub mod table;

pub use classifier::{Classification, ClassifyContext, DimensionScores, classify, tier_for_score};
pub use overrides::{Override, ParentLookup, ParentRoute, detect_override};
pub use registry::{ModelDescriptor, ModelRegistry};
pub use router::{RoutingDecision, route_request};
pub use table::RoutingTable;
