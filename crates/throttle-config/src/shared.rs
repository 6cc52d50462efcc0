// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide configuration handle shared by every request.

use std::sync::Arc;

use arc_swap::ArcSwap;
use throttle_core::RoutingMode;

use crate::model::ThrottleConfig;

/// Cheaply cloneable handle to the live configuration.
///
/// Readers take an immutable snapshot per request with [`SharedConfig::get`];
/// a request keeps using its snapshot even if the mode changes mid-flight.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<ArcSwap<ThrottleConfig>>,
}

impl SharedConfig {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Snapshot of the current configuration.
    pub fn get(&self) -> Arc<ThrottleConfig> {
        self.inner.load_full()
    }

    /// Currently active routing mode.
    pub fn mode(&self) -> RoutingMode {
        self.inner.load().routing.mode
    }

    /// Switch the active routing mode, returning the previous one.
    pub fn set_mode(&self, mode: RoutingMode) -> RoutingMode {
        let previous = self.inner.load().routing.mode;
        self.inner.rcu(|current| {
            let mut next = ThrottleConfig::clone(current);
            next.routing.mode = mode;
            next
        });
        tracing::info!(from = %previous, to = %mode, "routing mode changed");
        previous
    }
}

impl From<ThrottleConfig> for SharedConfig {
    fn from(config: ThrottleConfig) -> Self {
        Self::new(config)
    }
}
