//! kgraph HTTP REST API
//!
//! Axum server running alongside the Unix socket IPC server (port 8767 by default).
//! Handlers are thin: they build a [`KgRequest`], hand it to the router through
//! [`dispatch_inner`] and map the [`KgResponse`] onto a status code.
//!
//! Endpoints:
//! - GET    /health, /version
//! - GET    /graph, DELETE /graph
//! - POST   /graph/generate, /graph/sample, /graph/import
//! - POST   /graph/nodes, PUT/DELETE /graph/nodes/:id
//! - POST   /graph/edges, DELETE /graph/edges/:index
//! - POST   /connect
//! - GET    /graphs, POST /graphs (save)
//! - POST   /graphs/:name/load, DELETE /graphs/:name
//! - POST   /graphs/:name/analysis
//! - POST   /export

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use kgraph_core::ipc::{AnalysisKind, KgRequest, KgResponse, PROTOCOL};
use kgraph_core::{ExportFormat, SampleKind};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/graph", get(get_graph_handler).delete(clear_graph_handler))
        .route("/graph/generate", post(generate_handler))
        .route("/graph/sample", post(sample_handler))
        .route("/graph/import", post(import_handler))
        .route("/graph/nodes", post(add_node_handler))
        .route(
            "/graph/nodes/:id",
            put(update_node_handler).delete(delete_node_handler),
        )
        .route("/graph/edges", post(add_edge_handler))
        .route("/graph/edges/:index", delete(delete_edge_handler))
        .route("/connect", post(connect_handler))
        .route("/graphs", get(list_graphs_handler).post(save_handler))
        .route("/graphs/:name", delete(delete_graph_handler))
        .route("/graphs/:name/load", post(load_handler))
        .route("/graphs/:name/analysis", post(analysis_handler))
        .route("/export", post(export_handler))
        .with_state(state)
}

/// Serve the API on the configured address until the shutdown signal fires.
pub async fn start_http_server(
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("kgraph HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct SampleBody {
    pub sample: SampleKind,
}

#[derive(Debug, Deserialize)]
pub struct NodeBody {
    pub id: String,
    pub label: String,
    pub color: String,
}

#[derive(Debug, Deserialize)]
pub struct NodeUpdateBody {
    pub label: String,
    pub color: String,
}

#[derive(Debug, Deserialize)]
pub struct EdgeBody {
    pub source: String,
    pub target: String,
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct ConnectBody {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveBody {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportBody {
    pub name: String,
    pub format: ExportFormat,
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Health: 200 with the PostgreSQL version when a store is connected, 503 otherwise.
pub async fn health_inner(state: &AppState) -> (StatusCode, serde_json::Value) {
    let socket = &state.config.service.socket_path;
    let response = crate::router::handle_request(KgRequest::Health, state).await;

    match response_to_http(response) {
        Ok(data) => (
            StatusCode::OK,
            json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "postgresql": data["postgresql"],
                "store_connected": true,
                "generation_enabled": state.generator().is_ok(),
                "socket": socket,
            }),
        ),
        Err((_, body)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "status": "unhealthy",
                "version": env!("CARGO_PKG_VERSION"),
                "error": body["error"],
                "store_connected": state.is_connected().await,
                "generation_enabled": state.generator().is_ok(),
                "socket": socket,
            }),
        ),
    }
}

pub fn version_inner() -> serde_json::Value {
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": PROTOCOL,
    })
}

/// Route one request and turn the response into `(status, body)`.
pub async fn dispatch_inner(
    state: &AppState,
    request: KgRequest,
) -> (StatusCode, serde_json::Value) {
    let response = crate::router::handle_request(request, state).await;
    match response_to_http(response) {
        Ok(data) => (StatusCode::OK, data),
        Err(failure) => failure,
    }
}

// ============================================================================
// Axum handler wrappers
// ============================================================================

type Shared = State<Arc<AppState>>;

async fn respond(state: &AppState, request: KgRequest) -> impl IntoResponse {
    let (status, body) = dispatch_inner(state, request).await;
    (status, Json(body))
}

pub async fn health_handler(State(state): Shared) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn get_graph_handler(State(state): Shared) -> impl IntoResponse {
    respond(&state, KgRequest::GetGraph).await
}

pub async fn clear_graph_handler(State(state): Shared) -> impl IntoResponse {
    respond(&state, KgRequest::ClearGraph).await
}

pub async fn generate_handler(State(state): Shared, Json(body): Json<GenerateBody>) -> impl IntoResponse {
    respond(
        &state,
        KgRequest::Generate {
            description: body.description,
        },
    )
    .await
}

pub async fn sample_handler(State(state): Shared, Json(body): Json<SampleBody>) -> impl IntoResponse {
    respond(&state, KgRequest::LoadSample { sample: body.sample }).await
}

/// The body is an exported JSON document.
pub async fn import_handler(
    State(state): Shared,
    Json(document): Json<serde_json::Value>,
) -> impl IntoResponse {
    respond(
        &state,
        KgRequest::Import {
            document: document.to_string(),
        },
    )
    .await
}

pub async fn add_node_handler(State(state): Shared, Json(body): Json<NodeBody>) -> impl IntoResponse {
    respond(
        &state,
        KgRequest::AddNode {
            id: body.id,
            label: body.label,
            color: body.color,
        },
    )
    .await
}

pub async fn update_node_handler(
    State(state): Shared,
    Path(id): Path<String>,
    Json(body): Json<NodeUpdateBody>,
) -> impl IntoResponse {
    respond(
        &state,
        KgRequest::UpdateNode {
            id,
            label: body.label,
            color: body.color,
        },
    )
    .await
}

pub async fn delete_node_handler(State(state): Shared, Path(id): Path<String>) -> impl IntoResponse {
    respond(&state, KgRequest::DeleteNode { id }).await
}

pub async fn add_edge_handler(State(state): Shared, Json(body): Json<EdgeBody>) -> impl IntoResponse {
    respond(
        &state,
        KgRequest::AddEdge {
            source: body.source,
            target: body.target,
            label: body.label,
        },
    )
    .await
}

pub async fn delete_edge_handler(State(state): Shared, Path(index): Path<usize>) -> impl IntoResponse {
    respond(&state, KgRequest::DeleteEdge { index }).await
}

pub async fn connect_handler(State(state): Shared, Json(body): Json<ConnectBody>) -> impl IntoResponse {
    respond(
        &state,
        KgRequest::Connect {
            url: body.url,
            username: body.username,
            password: body.password,
        },
    )
    .await
}

pub async fn list_graphs_handler(State(state): Shared) -> impl IntoResponse {
    respond(&state, KgRequest::ListGraphs).await
}

pub async fn save_handler(State(state): Shared, Json(body): Json<SaveBody>) -> impl IntoResponse {
    respond(
        &state,
        KgRequest::Save {
            name: body.name,
            description: body.description,
        },
    )
    .await
}

pub async fn load_handler(State(state): Shared, Path(name): Path<String>) -> impl IntoResponse {
    respond(&state, KgRequest::Load { name }).await
}

pub async fn delete_graph_handler(State(state): Shared, Path(name): Path<String>) -> impl IntoResponse {
    respond(&state, KgRequest::DeleteGraph { name }).await
}

pub async fn analysis_handler(
    State(state): Shared,
    Path(name): Path<String>,
    Json(analysis): Json<AnalysisKind>,
) -> impl IntoResponse {
    respond(&state, KgRequest::Analyze { name, analysis }).await
}

pub async fn export_handler(State(state): Shared, Json(body): Json<ExportBody>) -> impl IntoResponse {
    respond(
        &state,
        KgRequest::Export {
            name: body.name,
            format: body.format,
        },
    )
    .await
}

// ============================================================================
// Helpers
// ============================================================================

/// Status code for a failed response, from its error kind.
pub fn status_for_kind(kind: Option<&str>) -> StatusCode {
    match kind {
        Some("validation") | Some("parse") => StatusCode::BAD_REQUEST,
        Some("not_found") => StatusCode::NOT_FOUND,
        Some("generation") => StatusCode::BAD_GATEWAY,
        Some("connection") => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert an IPC `KgResponse` into an HTTP body, or a status plus error body.
pub fn response_to_http(
    response: KgResponse,
) -> std::result::Result<serde_json::Value, (StatusCode, serde_json::Value)> {
    if response.is_ok() {
        return Ok(response.data.unwrap_or_else(|| json!({})));
    }

    let status = status_for_kind(response.error_kind.as_deref());
    Err((
        status,
        json!({
            "status": "error",
            "error": response.error.unwrap_or_else(|| "unknown error".to_string()),
            "kind": response.error_kind,
        }),
    ))
}

// ============================================================================
// Unit Tests
// ============================================================================
