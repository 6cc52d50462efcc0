// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost accounting for the Throttle routing proxy.
//!
//! Provides model pricing math, the append-only SQLite routing log with its
//! non-blocking writer, and savings statistics over logged requests.

pub mod ledger;
pub mod pricing;
pub mod stats;
pub mod writer;

pub use ledger::{LogEntry, LogStatus, RoutingLog, format_timestamp, hash_prompt, now_timestamp};
pub use pricing::{ModelPricing, calculate_cost};
pub use stats::{Baseline, ModelStats, RoutingStats, compute_stats};
pub use writer::{DEFAULT_QUEUE_CAPACITY, LogWriter};
