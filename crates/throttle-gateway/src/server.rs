// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the proxy.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    routing::{get, post},
};
use throttle_config::SharedConfig;
use throttle_core::ThrottleError;
use throttle_cost::{LogWriter, RoutingLog};
use throttle_providers::Dispatcher;
use throttle_router::{ModelRegistry, RoutingTable};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Health state for the unauthenticated health endpoint.
#[derive(Debug, Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Live configuration; the routing mode can change at runtime.
    pub config: SharedConfig,
    pub registry: Arc<ModelRegistry>,
    /// Mode × tier candidate lists with config overrides applied.
    pub table: Arc<RoutingTable>,
    pub dispatcher: Dispatcher,
    /// Read side of the routing log (stats, tail, parent lookups).
    pub log: RoutingLog,
    /// Write side of the routing log; never blocks a request.
    pub writer: LogWriter,
    pub health: HealthState,
}

impl GatewayState {
    /// Assemble state from a validated configuration.
    ///
    /// Fails if a routing table override names an unknown model or the HTTP
    /// clients cannot be built.
    pub fn new(
        config: SharedConfig,
        log: RoutingLog,
        writer: LogWriter,
    ) -> Result<Self, ThrottleError> {
        let snapshot = config.get();
        let registry = ModelRegistry::builtin();
        let table = RoutingTable::with_overrides(&snapshot.routing.table, &registry)?;
        let dispatcher = Dispatcher::new(&snapshot.upstream)?;
        Ok(Self {
            config,
            registry: Arc::new(registry),
            table: Arc::new(table),
            dispatcher,
            log,
            writer,
            health: HealthState {
                start_time: Instant::now(),
            },
        })
    }
}

/// Build the application router.
///
/// Proxy routes:
/// - POST /v1/messages (Anthropic dialect)
/// - POST /v1/chat/completions (OpenAI dialect)
///
/// Control routes:
/// - GET /health, GET /stats, GET /config, POST /mode, GET /log
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/messages", post(handlers::post_messages))
        .route("/v1/chat/completions", post(handlers::post_chat_completions))
        .route("/health", get(handlers::get_health))
        .route("/stats", get(handlers::get_stats))
        .route("/config", get(handlers::get_config))
        .route("/mode", post(handlers::post_mode))
        .route("/log", get(handlers::get_log))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the configured host:port and serve until `shutdown` resolves.
///
/// In-flight requests (including open streams) are allowed to finish.
pub async fn start_server(
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ThrottleError> {
    let config = state.config.get();
    let host = config.server.host.clone();
    let port = config.server.port;

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .map_err(|e| ThrottleError::Internal(format!("failed to bind {host}:{port}: {e}")))?;
    let addr = listener
        .local_addr()
        .map_err(|e| ThrottleError::Internal(format!("listener has no address: {e}")))?;

    tracing::info!(
        mode = %config.routing.mode,
        providers = config.configured_providers().len(),
        "Throttle listening on {addr}"
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ThrottleError::Internal(format!("server error: {e}")))?;

    tracing::info!("server stopped");
    Ok(())
}
