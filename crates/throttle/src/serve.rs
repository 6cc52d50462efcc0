// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `throttle serve` command implementation.
//!
//! Opens the routing log, starts its writer, serves the proxy until a
//! shutdown signal, then waits for queued log entries to be written.

use std::time::Duration;

use throttle_config::{SharedConfig, ThrottleConfig};
use throttle_core::ThrottleError;
use throttle_cost::{DEFAULT_QUEUE_CAPACITY, LogWriter, RoutingLog};
use throttle_gateway::{GatewayState, start_server};
use tracing::{info, warn};

use crate::shutdown;

/// How long shutdown waits for the routing log queue to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the `throttle serve` command.
pub async fn run_serve(config: ThrottleConfig) -> Result<(), ThrottleError> {
    let db_path = config.logging.database_path.clone();
    let log = RoutingLog::open(&db_path).await?;
    info!(path = %db_path, "routing log opened");
    let (writer, writer_task) = LogWriter::spawn(log.clone(), DEFAULT_QUEUE_CAPACITY);

    let providers = config.configured_providers();
    if providers.is_empty() {
        warn!("no provider API key is configured; proxy requests will fail until one is set");
    } else {
        let names: Vec<String> = providers.iter().map(ToString::to_string).collect();
        info!(providers = %names.join(","), "providers configured");
    }

    let state = GatewayState::new(SharedConfig::new(config), log, writer)?;
    let cancel = shutdown::install_signal_handler();
    start_server(state, cancel.cancelled_owned()).await?;

    // The server owned the last writer handle; the task ends once the queue is empty.
    match tokio::time::timeout(DRAIN_TIMEOUT, writer_task).await {
        Ok(Ok(())) => info!("routing log flushed"),
        Ok(Err(e)) => warn!(error = %e, "routing log writer task failed"),
        Err(_) => warn!(
            timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "routing log writer did not drain in time"
        ),
    }
    Ok(())
}
