use futures::future::BoxFuture;
use kgraph_core::analysis::{self, PathQuery};
use kgraph_core::config::DatabaseConfig;
use kgraph_core::ipc::{AnalysisKind, KgRequest, KgResponse};
use kgraph_core::{export, generation, persistence, ExportFormat, KgError, SampleKind, ValidationError};
use serde_json::{json, Value};

use crate::state::{AppState, Session};

pub const DEFAULT_DESCRIPTION: &str = "No description provided";

pub async fn handle_request(request: KgRequest, state: &AppState) -> KgResponse {
    if let KgRequest::Ping = request {
        return KgResponse::pong();
    }
    match dispatch(request, state).await {
        Ok(data) => KgResponse::ok(data),
        Err(e) => {
            tracing::error!(kind = e.kind(), "Request failed: {}", e);
            KgResponse::from(e)
        }
    }
}

type Reply<'a> = BoxFuture<'a, Result<Value, KgError>>;

/// One handler future per request, boxed as `Send` so the IPC tasks and axum
/// handlers can hold it.
fn dispatch<'a>(request: KgRequest, state: &'a AppState) -> Reply<'a> {
    match request {
        KgRequest::Ping => Box::pin(async { Ok(json!({"pong": true})) }),
        KgRequest::Health => Box::pin(health(state)),

        // --------------------------------------------------------------------
        // Session graph
        // --------------------------------------------------------------------
        KgRequest::GetGraph => Box::pin(get_graph(state)),
        KgRequest::ClearGraph => Box::pin(clear_graph(state)),
        KgRequest::Generate { description } => Box::pin(generate(state, description)),
        KgRequest::LoadSample { sample } => Box::pin(load_sample(state, sample)),
        KgRequest::Import { document } => Box::pin(import(state, document)),
        KgRequest::AddNode { id, label, color } => Box::pin(add_node(state, id, label, color)),
        KgRequest::UpdateNode { id, label, color } => Box::pin(update_node(state, id, label, color)),
        KgRequest::DeleteNode { id } => Box::pin(delete_node(state, id)),
        KgRequest::AddEdge {
            source,
            target,
            label,
        } => Box::pin(add_edge(state, source, target, label)),
        KgRequest::DeleteEdge { index } => Box::pin(delete_edge(state, index)),
        KgRequest::Export { name, format } => Box::pin(export_session(state, name, format)),

        // --------------------------------------------------------------------
        // Graph store
        // --------------------------------------------------------------------
        KgRequest::Connect {
            url,
            username,
            password,
        } => Box::pin(connect(state, url, username, password)),
        KgRequest::ListGraphs => Box::pin(list_graphs(state)),
        KgRequest::Save { name, description } => Box::pin(save(state, name, description)),
        KgRequest::Load { name } => Box::pin(load(state, name)),
        KgRequest::DeleteGraph { name } => Box::pin(delete_graph(state, name)),
        KgRequest::Analyze { name, analysis } => Box::pin(analyze(state, name, analysis)),
    }
}

async fn health(state: &AppState) -> Result<Value, KgError> {
    let pool = state.pool().await?;
    let version = kgraph_core::db::health_check(&pool).await?;
    Ok(json!({"status": "healthy", "postgresql": version}))
}

async fn get_graph(state: &AppState) -> Result<Value, KgError> {
    let session = state.session.lock().await;
    Ok(session_json(&session))
}

async fn clear_graph(state: &AppState) -> Result<Value, KgError> {
    let mut session = state.session.lock().await;
    session.graph.clear();
    session.name = None;
    tracing::info!("Session graph cleared");
    Ok(session_json(&session))
}

async fn generate(state: &AppState, description: String) -> Result<Value, KgError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(ValidationError::Empty {
            field: "Description",
        }
        .into());
    }
    // Generate before locking; a failure leaves the session untouched.
    let backend = state.generator()?;
    let graph = generation::generate_graph(backend.as_ref(), description).await?;
    let mut session = state.session.lock().await;
    session.replace(graph, None);
    Ok(session_json(&session))
}

async fn load_sample(state: &AppState, sample: SampleKind) -> Result<Value, KgError> {
    let mut session = state.session.lock().await;
    session.replace(sample.graph(), None);
    tracing::info!(sample = sample.title(), "Sample graph loaded");
    Ok(session_json(&session))
}

async fn import(state: &AppState, document: String) -> Result<Value, KgError> {
    let graph = export::from_json(&document)?;
    if let Err(e) = graph.validate() {
        tracing::warn!(error = %e, "Imported graph is inconsistent");
    }
    let mut session = state.session.lock().await;
    session.replace(graph, None);
    Ok(session_json(&session))
}

async fn add_node(state: &AppState, id: String, label: String, color: String) -> Result<Value, KgError> {
    let mut session = state.session.lock().await;
    let node = session.graph.add_node(&id, &label, &color)?;
    Ok(json!({"node": node}))
}

async fn update_node(state: &AppState, id: String, label: String, color: String) -> Result<Value, KgError> {
    let mut session = state.session.lock().await;
    let node = session.graph.update_node(&id, &label, &color)?;
    Ok(json!({"node": node}))
}

async fn delete_node(state: &AppState, id: String) -> Result<Value, KgError> {
    let mut session = state.session.lock().await;
    let edges_removed = session.graph.remove_node(&id)?;
    Ok(json!({"deleted": id, "edges_removed": edges_removed}))
}

async fn add_edge(state: &AppState, source: String, target: String, label: String) -> Result<Value, KgError> {
    let mut session = state.session.lock().await;
    let edge = session.graph.add_edge(&source, &target, &label)?;
    Ok(json!({"edge": edge}))
}

async fn delete_edge(state: &AppState, index: usize) -> Result<Value, KgError> {
    let mut session = state.session.lock().await;
    let edge = session.graph.remove_edge(index)?;
    Ok(json!({"deleted": edge}))
}

async fn export_session(state: &AppState, name: String, format: ExportFormat) -> Result<Value, KgError> {
    let session = state.session.lock().await;
    if session.graph.is_empty() {
        return Err(ValidationError::Empty { field: "Graph" }.into());
    }
    let artifacts = export::export(&session.graph, &name, format)?;
    Ok(json!({"artifacts": artifacts}))
}

async fn connect(
    state: &AppState,
    url: String,
    username: Option<String>,
    password: Option<String>,
) -> Result<Value, KgError> {
    let database = DatabaseConfig {
        url,
        username,
        password,
        ..state.config.database.clone()
    };
    let pool = state.connect(&database).await?;
    let version = kgraph_core::db::health_check(&pool).await?;
    tracing::info!("Graph store connection replaced");
    Ok(json!({"connected": true, "postgresql": version}))
}

async fn list_graphs(state: &AppState) -> Result<Value, KgError> {
    let pool = state.pool().await?;
    let graphs = persistence::list_graphs(&pool).await?;
    Ok(json!({"count": graphs.len(), "graphs": graphs}))
}

async fn save(state: &AppState, name: String, description: Option<String>) -> Result<Value, KgError> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(ValidationError::Empty {
            field: "Graph name",
        }
        .into());
    }
    let description = description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

    let pool = state.pool().await?;
    let mut session = state.session.lock().await;
    if session.graph.is_empty() {
        return Err(ValidationError::Empty { field: "Graph" }.into());
    }
    let report = persistence::save_graph(
        &pool,
        &name,
        &description,
        &session.graph,
        state.config.graph,
    )
    .await?;
    session.name = Some(name);
    Ok(json!(report))
}

async fn load(state: &AppState, name: String) -> Result<Value, KgError> {
    let pool = state.pool().await?;
    let graph = persistence::load_graph(&pool, &name).await?;
    if graph.is_empty() {
        return Err(KgError::NotFound(format!("Graph '{}'", name)));
    }
    let mut session = state.session.lock().await;
    session.replace(graph, Some(name));
    Ok(session_json(&session))
}

async fn delete_graph(state: &AppState, name: String) -> Result<Value, KgError> {
    let pool = state.pool().await?;
    if !persistence::delete_graph(&pool, &name).await? {
        return Err(KgError::NotFound(format!("Graph '{}'", name)));
    }
    tracing::info!(graph = %name, "Persisted graph deleted");
    Ok(json!({"deleted": name}))
}

async fn analyze(state: &AppState, name: String, kind: AnalysisKind) -> Result<Value, KgError> {
    let pool = state.pool().await?;
    tracing::debug!(graph = %name, ?kind, "Running analysis");
    match kind {
        AnalysisKind::Centrality => {
            let rows = analysis::centrality(&pool, &name).await?;
            let insights = analysis::centrality_insights(&rows);
            Ok(json!({"rows": rows, "insights": insights}))
        }
        AnalysisKind::Communities => {
            let rows = analysis::communities(&pool, &name).await?;
            let summary = analysis::community_summary(&rows);
            Ok(json!({"rows": rows, "summary": summary}))
        }
        AnalysisKind::Paths { query } => {
            let query = query.normalized();
            let result = analysis::paths(&pool, &name, &query).await?;
            let specific = matches!(query, PathQuery::Specific { .. });
            Ok(json!({"specific": specific, "analysis": result}))
        }
    }
}

fn session_json(session: &Session) -> Value {
    json!({
        "name": session.name,
        "node_count": session.graph.node_count(),
        "edge_count": session.graph.edge_count(),
        "graph": session.graph,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgraph_core::{Graph, KgConfig, SampleKind};

    fn offline_state() -> AppState {
        AppState::new(KgConfig::default(), None, None)
    }

    // ========================================================================
    // TEST 1: edits go through the session graph and report failures by kind
    // ========================================================================
    #[tokio::test]
    async fn test_manual_edits_update_session() {
        let state = offline_state();

        let resp = handle_request(
            KgRequest::AddNode {
                id: "A".into(),
                label: "Alpha".into(),
                color: "#FF6B6B".into(),
            },
            &state,
        )
        .await;
        assert!(resp.is_ok(), "{:?}", resp.error);

        handle_request(
            KgRequest::AddNode {
                id: "B".into(),
                label: "Beta".into(),
                color: "#4ECDC4".into(),
            },
            &state,
        )
        .await;

        let resp = handle_request(
            KgRequest::AddEdge {
                source: "A".into(),
                target: "B".into(),
                label: "knows".into(),
            },
            &state,
        )
        .await;
        assert!(resp.is_ok());

        let resp = handle_request(
            KgRequest::AddEdge {
                source: "A".into(),
                target: "A".into(),
                label: "self".into(),
            },
            &state,
        )
        .await;
        assert_eq!(resp.error_kind.as_deref(), Some("validation"));

        let resp = handle_request(KgRequest::DeleteNode { id: "B".into() }, &state).await;
        assert_eq!(resp.data.unwrap()["edges_removed"], 1);

        let resp = handle_request(KgRequest::DeleteEdge { index: 0 }, &state).await;
        assert_eq!(resp.error_kind.as_deref(), Some("not_found"));

        let session = state.session.lock().await;
        assert_eq!(session.graph.node_count(), 1);
        assert!(session.graph.edges.is_empty());
    }

    // ========================================================================
    // TEST 2: store operations without a connection fail as connection errors
    // ========================================================================
    #[tokio::test]
    async fn test_store_requests_need_connection() {
        let state = offline_state();
        state.session.lock().await.graph = SampleKind::Technology.graph();

        for request in [
            KgRequest::Health,
            KgRequest::ListGraphs,
            KgRequest::Save {
                name: "tech".into(),
                description: None,
            },
            KgRequest::Load { name: "tech".into() },
            KgRequest::Analyze {
                name: "tech".into(),
                analysis: AnalysisKind::Centrality,
            },
        ] {
            let resp = handle_request(request, &state).await;
            assert_eq!(resp.error_kind.as_deref(), Some("connection"));
        }
    }

    // ========================================================================
    // TEST 3: save rejects an empty name before touching the store
    // ========================================================================
    #[tokio::test]
    async fn test_save_requires_name() {
        let state = offline_state();
        let resp = handle_request(
            KgRequest::Save {
                name: "   ".into(),
                description: Some("desc".into()),
            },
            &state,
        )
        .await;
        assert_eq!(resp.error_kind.as_deref(), Some("validation"));
        assert!(resp.error.unwrap().contains("Graph name"));
    }

    // ========================================================================
    // TEST 4: samples, export and clear
    // ========================================================================
    #[tokio::test]
    async fn test_sample_export_and_clear() {
        let state = offline_state();

        let resp = handle_request(
            KgRequest::LoadSample {
                sample: SampleKind::VehicleLifecycle,
            },
            &state,
        )
        .await;
        let data = resp.data.unwrap();
        assert_eq!(data["node_count"], 30);

        let resp = handle_request(
            KgRequest::Export {
                name: "vehicles".into(),
                format: kgraph_core::ExportFormat::Csv,
            },
            &state,
        )
        .await;
        let artifacts = resp.data.unwrap()["artifacts"].as_array().unwrap().clone();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0]["file_name"], "vehicles_nodes.csv");

        handle_request(KgRequest::ClearGraph, &state).await;
        assert_eq!(state.session.lock().await.graph, Graph::new());

        let resp = handle_request(
            KgRequest::Export {
                name: "vehicles".into(),
                format: kgraph_core::ExportFormat::Json,
            },
            &state,
        )
        .await;
        assert!(!resp.is_ok());
    }

    // ========================================================================
    // TEST 5: generation without an API key leaves the session alone
    // ========================================================================
    #[tokio::test]
    async fn test_generate_without_backend() {
        let state = offline_state();
        state.session.lock().await.graph = SampleKind::Technology.graph();

        let resp = handle_request(
            KgRequest::Generate {
                description: "solar system".into(),
            },
            &state,
        )
        .await;
        assert_eq!(resp.error_kind.as_deref(), Some("generation"));
        assert_eq!(state.session.lock().await.graph.node_count(), 15);
    }

    // ========================================================================
    // TEST 6: request futures are Send and run on spawned tasks
    // ========================================================================
    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_requests_run_on_spawned_tasks() {
        let state = std::sync::Arc::new(offline_state());
        assert_send(&handle_request(KgRequest::GetGraph, &state));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let state = std::sync::Arc::clone(&state);
                tokio::spawn(async move {
                    handle_request(
                        KgRequest::AddNode {
                            id: format!("n{}", i),
                            label: format!("Node {}", i),
                            color: "#FF6B6B".into(),
                        },
                        &state,
                    )
                    .await
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(state.session.lock().await.graph.node_count(), 4);
    }
}
