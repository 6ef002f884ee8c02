//! # graphstage HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Sync flag, pending actions, capabilities
//! - `GET /graphs` - Graph names in the combined view
//! - `POST /graph` - Content of one graph
//! - `POST /graph/add`, `POST /graph/remove` - Stage graph changes
//! - `POST /triple/assert`, `POST /triple/retract` - Stage triple changes
//! - `POST /flush` - Commit staged actions
//! - `POST /discard` - Roll staged actions back
//! - `POST /query`, `POST /update` - Backend access (409 while unsynced)
//!
//! ## Configuration (Environment Variables)
//!
//! - `GRAPHSTAGE_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)

mod handlers;
mod types;

// Re-export handlers and types for integration tests (via `graphstage::api::*`)
pub use handlers::{
    add_graph_handler, assert_handler, discard_handler, flush_handler, graph_handler,
    graphs_handler, health_handler, query_handler, remove_graph_handler, retract_handler,
    status_handler, update_handler,
};
pub use types::{
    AddGraphRequest, GraphListResponse, GraphRequest, GraphResponse, HealthResponse,
    MutationResponse, QuadJson, QueryRequest, QueryResponse, ScriptOp, StatusResponse,
    TripleJson, TripleRequest, UpdateOp, UpdateRequest, UpdateResponse,
};

use crate::error::AppError;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use graphstage_core::{Coordinator, StorageBackend};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request body limit (2 MB).
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: one coordinator behind one lock.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Mutex<Coordinator<StorageBackend>>>,
}

impl AppState {
    /// Create new app state around a coordinator.
    #[must_use]
    pub fn new(coordinator: Coordinator<StorageBackend>) -> Self {
        Self {
            coordinator: Arc::new(Mutex::new(coordinator)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `GRAPHSTAGE_CORS_ORIGINS`.
///
/// - "*": allows all origins
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("GRAPHSTAGE_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!("CORS: allowing ALL origins (GRAPHSTAGE_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: no valid origins in GRAPHSTAGE_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => build_localhost_cors(),
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/graphs", get(handlers::graphs_handler))
        .route("/graph", post(handlers::graph_handler))
        .route("/graph/add", post(handlers::add_graph_handler))
        .route("/graph/remove", post(handlers::remove_graph_handler))
        .route("/triple/assert", post(handlers::assert_handler))
        .route("/triple/retract", post(handlers::retract_handler))
        .route("/flush", post(handlers::flush_handler))
        .route("/discard", post(handlers::discard_handler))
        .route("/query", post(handlers::query_handler))
        .route("/update", post(handlers::update_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_SIZE)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/// Start the HTTP server.
///
/// On graceful shutdown anything still staged is flushed.
pub async fn run_server(addr: &str, coordinator: Coordinator<StorageBackend>) -> Result<(), AppError> {
    let state = AppState::new(coordinator);
    let router = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("graphstage HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let mut coordinator = state.coordinator.lock().await;
    if !coordinator.is_synced() {
        let report = coordinator.flush()?;
        tracing::info!(
            actions = report.actions,
            calls = report.calls(),
            "flushed staged actions on shutdown"
        );
    }
    Ok(())
}
