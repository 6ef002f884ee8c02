//! # API Endpoint Handlers
//!
//! Every handler takes the coordinator lock for its whole operation,
//! including reads that may lazily load a graph from the backend.

use super::{
    AppState,
    types::{
        AddGraphRequest, GraphListResponse, GraphRequest, GraphResponse, HealthResponse,
        MutationResponse, QueryRequest, QueryResponse, StatusResponse, TripleRequest,
        UpdateRequest, UpdateResponse,
    },
};
use crate::error::AppError;
use axum::{Json, extract::State};
use graphstage_core::{DiscardReport, FlushReport};

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Sync flag, staged action count and backend capabilities.
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let coordinator = state.coordinator.lock().await;

    Json(StatusResponse {
        synced: coordinator.is_synced(),
        pending: coordinator.pending(),
        graphs_in_memory: coordinator.collection().len(),
        persistent: coordinator.backend().is_persistent(),
        capabilities: coordinator.capabilities(),
    })
}

// =============================================================================
// GRAPH HANDLERS
// =============================================================================

/// List graph names in the combined view.
pub async fn graphs_handler(
    State(state): State<AppState>,
) -> Result<Json<GraphListResponse>, AppError> {
    let coordinator = state.coordinator.lock().await;
    let names = coordinator.graph_names()?;
    Ok(Json(GraphListResponse::new(&names)))
}

/// Content of one graph, loading it on first access.
pub async fn graph_handler(
    State(state): State<AppState>,
    Json(request): Json<GraphRequest>,
) -> Result<Json<GraphResponse>, AppError> {
    let mut coordinator = state.coordinator.lock().await;
    let graph = coordinator.graph(&request.graph_name())?;
    Ok(Json(GraphResponse::from(graph)))
}

/// Stage adding (or merging into) a graph.
pub async fn add_graph_handler(
    State(state): State<AppState>,
    Json(request): Json<AddGraphRequest>,
) -> Result<Json<MutationResponse>, AppError> {
    let graph = request.to_graph()?;

    let mut coordinator = state.coordinator.lock().await;
    coordinator.add_graph(graph)?;
    Ok(Json(MutationResponse::staged(coordinator.pending())))
}

/// Stage removing a graph.
pub async fn remove_graph_handler(
    State(state): State<AppState>,
    Json(request): Json<GraphRequest>,
) -> Result<Json<MutationResponse>, AppError> {
    let mut coordinator = state.coordinator.lock().await;
    let removed = coordinator.remove_graph(&request.graph_name())?;
    Ok(Json(MutationResponse::removed(
        coordinator.pending(),
        removed.len(),
    )))
}

// =============================================================================
// TRIPLE HANDLERS
// =============================================================================

/// Stage asserting a triple.
pub async fn assert_handler(
    State(state): State<AppState>,
    Json(request): Json<TripleRequest>,
) -> Result<Json<MutationResponse>, AppError> {
    let triple = request.triple.to_triple()?;

    let mut coordinator = state.coordinator.lock().await;
    coordinator.assert(&request.graph_name(), triple)?;
    Ok(Json(MutationResponse::staged(coordinator.pending())))
}

/// Stage retracting a triple.
pub async fn retract_handler(
    State(state): State<AppState>,
    Json(request): Json<TripleRequest>,
) -> Result<Json<MutationResponse>, AppError> {
    let triple = request.triple.to_triple()?;

    let mut coordinator = state.coordinator.lock().await;
    coordinator.retract(&request.graph_name(), triple)?;
    Ok(Json(MutationResponse::staged(coordinator.pending())))
}

// =============================================================================
// FLUSH / DISCARD
// =============================================================================

/// Commit staged actions to the backend.
pub async fn flush_handler(State(state): State<AppState>) -> Result<Json<FlushReport>, AppError> {
    let mut coordinator = state.coordinator.lock().await;
    let report = coordinator.flush()?;
    Ok(Json(report))
}

/// Roll staged actions back in memory.
pub async fn discard_handler(State(state): State<AppState>) -> Json<DiscardReport> {
    let mut coordinator = state.coordinator.lock().await;
    Json(coordinator.discard())
}

// =============================================================================
// QUERY / UPDATE
// =============================================================================

/// Backend query; 409 while anything is staged.
pub async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let coordinator = state.coordinator.lock().await;
    let results = coordinator.query(&request.to_pattern())?;
    Ok(Json(QueryResponse::new(&results.quads)))
}

/// Backend update; 409 while anything is staged.
pub async fn update_handler(
    State(state): State<AppState>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<UpdateResponse>, AppError> {
    let command = request.to_command()?;

    let mut coordinator = state.coordinator.lock().await;
    coordinator.update(&command)?;
    Ok(Json(UpdateResponse::applied(command.graph())))
}
