//! Connection handlers for the relay server.
//!
//! This module owns the HTTP side: routing, the WebSocket upgrade and
//! handing each upgraded socket to the relay's session loop.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use relay_core::Relay;
use relay_transport::split_websocket;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Shared server state.
pub struct AppState {
    /// The relay engine and its registry.
    pub relay: Relay,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state whose sessions stop when `shutdown` fires.
    #[must_use]
    pub fn new(config: Config, shutdown: CancellationToken) -> Self {
        Self {
            relay: Relay::new(config.session_options()).with_shutdown(shutdown),
            config,
        }
    }
}

/// Build the HTTP router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route(&state.config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP/WebSocket server until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config, shutdown: CancellationToken) -> Result<()> {
    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Relay server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}?{}=<id>",
        addr, config.transport.websocket_path, config.transport.identifier_param
    );

    let state = Arc::new(AppState::new(config, shutdown));
    serve(listener, state).await
}

/// Serve on an already bound listener.
///
/// Stops accepting once the relay's shutdown token is cancelled; open
/// sessions are closed by the same token.
///
/// # Errors
///
/// Returns an error if the server fails while running.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    let shutdown = state.relay.shutdown_token();

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;

    info!("Relay server stopped");
    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.relay.registry().stats();
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": stats.registered,
        "total_registrations": stats.total_registrations,
        "displaced": stats.displaced,
    }))
}

/// WebSocket upgrade handler.
///
/// The upgrade goes ahead even without an identifier; the session loop
/// closes such connections before registering them.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let identifier = params
        .get(&state.config.transport.identifier_param)
        .cloned()
        .unwrap_or_default();

    ws.max_message_size(state.config.limits.max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, identifier, remote, state))
}

/// Handle a WebSocket connection.
async fn handle_websocket(
    socket: WebSocket,
    identifier: String,
    remote: SocketAddr,
    state: Arc<AppState>,
) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let (sink, source) = split_websocket(
        socket,
        Some(remote),
        state.config.limits.max_message_size,
    );

    match state
        .relay
        .run_session(&identifier, source, Box::new(sink))
        .await
    {
        Ok(report) => {
            debug!(remote = %remote, reason = %report.reason, "WebSocket session ended")
        }
        Err(e) => debug!(remote = %remote, error = %e, "WebSocket session failed"),
    }
}
