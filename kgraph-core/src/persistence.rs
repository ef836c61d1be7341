//! Persistence adapter: save / list / load / delete graphs in PostgreSQL
//!
//! Graphs are keyed by name. Saving replaces whatever was stored under that name:
//! the old nodes are deleted (their relationships cascade), then metadata, nodes and
//! relationships are inserted in one transaction. Relationships are created by
//! joining on `(graph_name, id)`, so an edge with a missing endpoint inserts nothing.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::config::GraphPolicy;
use crate::error::KgError;
use crate::models::{Edge, Graph, GraphMeta, Node};

/// Outcome of a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    pub name: String,
    pub nodes_written: usize,
    pub edges_written: usize,
    /// Edges whose endpoints were not found in the saved node set.
    pub edges_dropped: usize,
}

/// Persist `graph` under `name`, replacing any graph already stored with that name.
pub async fn save_graph(
    pool: &PgPool,
    name: &str,
    description: &str,
    graph: &Graph,
    policy: GraphPolicy,
) -> Result<SaveReport, KgError> {
    if policy.reject_invalid_graphs {
        graph.validate()?;
    }

    let context = "Failed to save graph";
    let mut tx = pool.begin().await.map_err(KgError::query(context))?;

    // 1. Clear previous graph with the same name (relationships cascade)
    let cleared = sqlx::query("DELETE FROM kg_nodes WHERE graph_name = $1")
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(KgError::query(context))?;

    sqlx::query("DELETE FROM kg_graph_meta WHERE name = $1")
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(KgError::query(context))?;

    // 2. Metadata
    sqlx::query(
        r#"
        INSERT INTO kg_graph_meta (name, description, created_date, node_count, edge_count)
        VALUES ($1, $2, now(), $3, $4)
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(graph.node_count() as i32)
    .bind(graph.edge_count() as i32)
    .execute(&mut *tx)
    .await
    .map_err(KgError::query(context))?;

    // 3. Nodes
    for (position, node) in graph.nodes.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO kg_nodes (graph_name, id, label, color, position)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(name)
        .bind(&node.id)
        .bind(&node.label)
        .bind(&node.color)
        .bind(position as i32)
        .execute(&mut *tx)
        .await
        .map_err(KgError::query(context))?;
    }

    // 4. Relationships, endpoints matched by (id, graph_name)
    let mut edges_written = 0;
    for (position, edge) in graph.edges.iter().enumerate() {
        let result = sqlx::query(
            r#"
            INSERT INTO kg_related (graph_name, source_pk, target_pk, label, position)
            SELECT $1, s.pk, t.pk, $4, $5
            FROM kg_nodes s, kg_nodes t
            WHERE s.graph_name = $1 AND s.id = $2
              AND t.graph_name = $1 AND t.id = $3
            "#,
        )
        .bind(name)
        .bind(&edge.source)
        .bind(&edge.target)
        .bind(&edge.label)
        .bind(position as i32)
        .execute(&mut *tx)
        .await
        .map_err(KgError::query(context))?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                graph = name,
                source = %edge.source,
                target = %edge.target,
                "Edge endpoint not found; relationship not created"
            );
        }
        edges_written += result.rows_affected() as usize;
    }

    tx.commit().await.map_err(KgError::query(context))?;

    let report = SaveReport {
        name: name.to_string(),
        nodes_written: graph.node_count(),
        edges_written,
        edges_dropped: graph.dangling_edges().len(),
    };

    tracing::info!(
        graph = name,
        replaced_nodes = cleared.rows_affected(),
        nodes = report.nodes_written,
        edges = report.edges_written,
        dropped = report.edges_dropped,
        "Saved graph"
    );

    Ok(report)
}

/// All persisted graphs, newest first.
pub async fn list_graphs(pool: &PgPool) -> Result<Vec<GraphMeta>, KgError> {
    sqlx::query_as::<_, GraphMeta>(
        r#"
        SELECT name, description, created_date, node_count, edge_count
        FROM kg_graph_meta
        ORDER BY created_date DESC
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(KgError::query("Failed to list graphs"))
}

#[derive(sqlx::FromRow)]
struct NodeRow {
    id: String,
    label: String,
    color: String,
}

#[derive(sqlx::FromRow)]
struct EdgeRow {
    source: String,
    target: String,
    label: String,
}

/// Load the graph stored under `name`. An unknown name yields an empty graph.
pub async fn load_graph(pool: &PgPool, name: &str) -> Result<Graph, KgError> {
    let context = "Failed to load graph";

    let nodes = sqlx::query_as::<_, NodeRow>(
        r#"
        SELECT id, label, color
        FROM kg_nodes
        WHERE graph_name = $1
        ORDER BY position, pk
        "#,
    )
    .bind(name)
    .fetch_all(pool)
    .await
    .map_err(KgError::query(context))?;

    let edges = sqlx::query_as::<_, EdgeRow>(
        r#"
        SELECT s.id AS source, t.id AS target, r.label
        FROM kg_related r
        JOIN kg_nodes s ON s.pk = r.source_pk AND s.graph_name = $1
        JOIN kg_nodes t ON t.pk = r.target_pk AND t.graph_name = $1
        WHERE r.graph_name = $1
        ORDER BY r.position, r.pk
        "#,
    )
    .bind(name)
    .fetch_all(pool)
    .await
    .map_err(KgError::query(context))?;

    let graph = Graph::from_parts(
        nodes
            .into_iter()
            .map(|row| Node::new(row.id, row.label, row.color))
            .collect(),
        edges
            .into_iter()
            .map(|row| Edge::new(row.source, row.target, row.label))
            .collect(),
    );

    tracing::debug!(
        graph = name,
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Loaded graph"
    );

    Ok(graph)
}

/// Remove a persisted graph and its metadata. Returns whether anything was stored.
pub async fn delete_graph(pool: &PgPool, name: &str) -> Result<bool, KgError> {
    let context = "Failed to delete graph";
    let mut tx = pool.begin().await.map_err(KgError::query(context))?;

    let nodes = sqlx::query("DELETE FROM kg_nodes WHERE graph_name = $1")
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(KgError::query(context))?;
    let meta = sqlx::query("DELETE FROM kg_graph_meta WHERE name = $1")
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(KgError::query(context))?;

    tx.commit().await.map_err(KgError::query(context))?;
    Ok(nodes.rows_affected() + meta.rows_affected() > 0)
}

// ============================================================================
// TESTS (require PostgreSQL; skipped when unreachable)
// ============================================================================
