//! Graph analytics delegated to the store's query engine
//!
//! Every metric here is a single query against a persisted graph:
//! - degree centrality: relationships incident to a node, either direction
//! - betweenness (approximate): 2-hop paths between other nodes that pass through a node
//! - closeness (approximate): reciprocal of the mean hop distance to reachable nodes
//! - communities: connected components bucketed into at most 10 ids
//! - paths: one shortest directed path (breadth-first), or a summary over all reachable pairs
//!
//! The approximations are deliberately crude and must stay that way; callers display
//! them as-is. Only community fallback bucketing and the summary helpers run in Rust.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::KgError;

/// Number of community ids components are folded into.
pub const MAX_COMMUNITIES: i64 = 10;

/// Undirected adjacency plus shortest hop distance between every reachable pair of a
/// graph. Expects the graph name as `$1`. Traversal depth is bounded by the node count.
macro_rules! hop_distances_cte {
    () => {
        r#"
        WITH RECURSIVE adjacency AS (
            SELECT source_pk AS a, target_pk AS b FROM kg_related WHERE graph_name = $1
            UNION
            SELECT target_pk AS a, source_pk AS b FROM kg_related WHERE graph_name = $1
        ),
        bound AS (
            SELECT COUNT(*)::int4 AS max_depth FROM kg_nodes WHERE graph_name = $1
        ),
        reach (origin, node, depth) AS (
            SELECT pk, pk, 0 FROM kg_nodes WHERE graph_name = $1
            UNION
            SELECT r.origin, adj.b, r.depth + 1
            FROM reach r
            JOIN adjacency adj ON adj.a = r.node
            CROSS JOIN bound
            WHERE r.depth < bound.max_depth
        ),
        dist AS (
            SELECT origin, node, MIN(depth) AS hops
            FROM reach
            WHERE node <> origin
            GROUP BY origin, node
        )
        "#
    };
}

const DEGREE_SQL: &str = r#"
    SELECT n.id AS node_id, n.label, COUNT(r.pk) AS degree
    FROM kg_nodes n
    LEFT JOIN kg_related r
        ON r.graph_name = n.graph_name
       AND (r.source_pk = n.pk OR r.target_pk = n.pk)
    WHERE n.graph_name = $1
    GROUP BY n.pk, n.id, n.label, n.position
    ORDER BY degree DESC, n.position
"#;

// Ordered 2-hop walks a - n - b with a, n, b distinct and two distinct relationships.
const BETWEENNESS_SQL: &str = r#"
    WITH incident AS (
        SELECT source_pk AS mid, pk AS rel, target_pk AS other
        FROM kg_related WHERE graph_name = $1
        UNION ALL
        SELECT target_pk AS mid, pk AS rel, source_pk AS other
        FROM kg_related WHERE graph_name = $1
    )
    SELECT n.id AS node_id, COUNT(i2.rel) AS betweenness
    FROM kg_nodes n
    LEFT JOIN incident i1
        ON i1.mid = n.pk AND i1.other <> n.pk
    LEFT JOIN incident i2
        ON i2.mid = n.pk
       AND i2.rel <> i1.rel
       AND i2.other <> n.pk
       AND i2.other <> i1.other
    WHERE n.graph_name = $1
    GROUP BY n.pk, n.id
"#;

const CLOSENESS_SQL: &str = concat!(
    hop_distances_cte!(),
    r#"
    SELECT n.id AS node_id,
           COALESCE(1.0 / NULLIF(AVG(d.hops), 0), 0)::float8 AS closeness
    FROM kg_nodes n
    LEFT JOIN dist d ON d.origin = n.pk
    WHERE n.graph_name = $1
    GROUP BY n.pk, n.id
    "#
);

const COMMUNITIES_SQL: &str = r#"
    WITH RECURSIVE adjacency AS (
        SELECT source_pk AS a, target_pk AS b FROM kg_related WHERE graph_name = $1
        UNION
        SELECT target_pk AS a, source_pk AS b FROM kg_related WHERE graph_name = $1
    ),
    reach (origin, node) AS (
        SELECT pk, pk FROM kg_nodes WHERE graph_name = $1
        UNION
        SELECT r.origin, adj.b
        FROM reach r
        JOIN adjacency adj ON adj.a = r.node
    ),
    component AS (
        SELECT r.origin, MIN(m.id) AS component_key, COUNT(*) AS component_size
        FROM reach r
        JOIN kg_nodes m ON m.pk = r.node
        GROUP BY r.origin
    ),
    ranked AS (
        SELECT origin,
               DENSE_RANK() OVER (ORDER BY component_size DESC, component_key) AS component_rank
        FROM component
    )
    SELECT n.id AS node_id,
           n.label,
           ((ranked.component_rank - 1) % $2)::int8 AS community_id
    FROM kg_nodes n
    JOIN ranked ON ranked.origin = n.pk
    WHERE n.graph_name = $1
    ORDER BY community_id, node_id
"#;

const NODES_SQL: &str = r#"
    SELECT id AS node_id, label
    FROM kg_nodes
    WHERE graph_name = $1
    ORDER BY position
"#;

// Breadth-first search over (node, depth) from the source, following edges in their
// stored direction and never expanding past the target. Rows are deduplicated per
// depth and depth is bounded by the node count, so the frontier stays polynomial.
// The path is rebuilt backwards from the target, one predecessor per step at exactly
// one hop less than the current node (lowest edge position wins).
const SHORTEST_PATH_SQL: &str = r#"
    WITH RECURSIVE src AS (
        SELECT pk FROM kg_nodes WHERE graph_name = $1 AND id = $2
    ),
    dst AS (
        SELECT pk FROM kg_nodes WHERE graph_name = $1 AND id = $3
    ),
    bound AS (
        SELECT COUNT(*)::int4 AS max_depth FROM kg_nodes WHERE graph_name = $1
    ),
    frontier (node_pk, depth) AS (
        SELECT pk, 0 FROM src WHERE EXISTS (SELECT 1 FROM dst)
        UNION
        SELECT r.target_pk, f.depth + 1
        FROM frontier f
        JOIN kg_related r ON r.source_pk = f.node_pk AND r.graph_name = $1
        CROSS JOIN bound
        WHERE f.depth < bound.max_depth
          AND f.node_pk NOT IN (SELECT pk FROM dst)
    ),
    first_seen AS (
        SELECT node_pk, MIN(depth) AS depth
        FROM frontier
        GROUP BY node_pk
    ),
    back (node_pk, depth, path_ids, labels) AS (
        SELECT fs.node_pk, fs.depth, ARRAY[t.id], ARRAY[]::text[]
        FROM first_seen fs
        JOIN dst ON dst.pk = fs.node_pk
        JOIN kg_nodes t ON t.pk = fs.node_pk
        WHERE fs.depth > 0
        UNION ALL
        SELECT step.source_pk,
               b.depth - 1,
               array_prepend(step.source_id, b.path_ids),
               array_prepend(step.label, b.labels)
        FROM back b
        CROSS JOIN LATERAL (
            SELECT r.source_pk, s.id AS source_id, r.label
            FROM kg_related r
            JOIN first_seen p ON p.node_pk = r.source_pk
            JOIN kg_nodes s ON s.pk = r.source_pk
            WHERE r.graph_name = $1
              AND r.target_pk = b.node_pk
              AND p.depth = b.depth - 1
            ORDER BY r.position, r.pk
            LIMIT 1
        ) step
        WHERE b.depth > 0
    )
    SELECT path_ids AS path_nodes, labels AS path_edges,
           (cardinality(path_ids) - 1)::int8 AS total_cost
    FROM back
    WHERE depth = 0
    ORDER BY total_cost
    LIMIT 1
"#;

const PATH_SUMMARY_SQL: &str = concat!(
    hop_distances_cte!(),
    r#"
    SELECT (SELECT COUNT(*) FROM kg_nodes WHERE graph_name = $1) AS node_count,
           AVG(d.hops)::float8 AS avg_path_length,
           MIN(d.hops)::int8 AS min_path_length,
           MAX(d.hops)::int8 AS max_path_length
    FROM dist d
    JOIN kg_nodes a ON a.pk = d.origin
    JOIN kg_nodes b ON b.pk = d.node
    WHERE a.id < b.id
    "#
);

// ============================================================================
// Result types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralityRow {
    pub node_id: String,
    pub label: String,
    pub degree_centrality: i64,
    pub betweenness_centrality: i64,
    pub closeness_centrality: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommunityRow {
    pub node_id: String,
    pub label: String,
    pub community_id: i64,
}

/// Which path analysis to run. Decided by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PathQuery {
    Summary,
    Specific { source: String, target: String },
}

impl PathQuery {
    /// Trim the endpoints; a `Specific` query with a blank endpoint becomes `Summary`.
    pub fn normalized(self) -> Self {
        match self {
            PathQuery::Specific { source, target } => {
                let (source, target) = (source.trim(), target.trim());
                if source.is_empty() || target.is_empty() {
                    PathQuery::Summary
                } else {
                    PathQuery::Specific {
                        source: source.to_string(),
                        target: target.to_string(),
                    }
                }
            }
            PathQuery::Summary => PathQuery::Summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PathResult {
    pub path_nodes: Vec<String>,
    pub path_edges: Vec<String>,
    pub total_cost: i64,
}

/// Aggregate over unordered reachable pairs. Lengths are `None` when no pair is reachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PathSummary {
    pub node_count: i64,
    pub avg_path_length: Option<f64>,
    pub min_path_length: Option<i64>,
    pub max_path_length: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum PathAnalysis {
    /// Zero or one path.
    Paths(Vec<PathResult>),
    Summary(PathSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunitySummary {
    pub community_count: usize,
    pub largest_size: usize,
    pub average_size: f64,
    /// Member labels per community id, in row order.
    pub members: BTreeMap<i64, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralityInsights {
    /// Highest degree.
    pub most_connected: CentralityRow,
    /// Highest approximate betweenness.
    pub top_broker: CentralityRow,
}

// ============================================================================
// Queries
// ============================================================================

#[derive(sqlx::FromRow)]
struct DegreeRow {
    node_id: String,
    label: String,
    degree: i64,
}

#[derive(sqlx::FromRow)]
struct NodeLabelRow {
    node_id: String,
    label: String,
}

/// Degree, betweenness and closeness per node, in descending degree order.
pub async fn centrality(pool: &PgPool, graph_name: &str) -> Result<Vec<CentralityRow>, KgError> {
    let context = "Centrality analysis failed";

    let degrees = sqlx::query_as::<_, DegreeRow>(DEGREE_SQL)
        .bind(graph_name)
        .fetch_all(pool)
        .await
        .map_err(KgError::query(context))?;

    let betweenness: HashMap<String, i64> = sqlx::query_as::<_, (String, i64)>(BETWEENNESS_SQL)
        .bind(graph_name)
        .fetch_all(pool)
        .await
        .map_err(KgError::query(context))?
        .into_iter()
        .collect();

    let closeness: HashMap<String, f64> = sqlx::query_as::<_, (String, f64)>(CLOSENESS_SQL)
        .bind(graph_name)
        .fetch_all(pool)
        .await
        .map_err(KgError::query(context))?
        .into_iter()
        .collect();

    let rows: Vec<CentralityRow> = degrees
        .into_iter()
        .map(|row| CentralityRow {
            betweenness_centrality: betweenness.get(&row.node_id).copied().unwrap_or(0),
            closeness_centrality: closeness.get(&row.node_id).copied().unwrap_or(0.0),
            node_id: row.node_id,
            label: row.label,
            degree_centrality: row.degree,
        })
        .collect();

    tracing::debug!(graph = graph_name, nodes = rows.len(), "Centrality computed");
    Ok(rows)
}

/// Connected components folded into at most [`MAX_COMMUNITIES`] ids, ordered by id then node.
pub async fn communities(pool: &PgPool, graph_name: &str) -> Result<Vec<CommunityRow>, KgError> {
    let context = "Community detection failed";

    let rows = sqlx::query_as::<_, CommunityRow>(COMMUNITIES_SQL)
        .bind(graph_name)
        .bind(MAX_COMMUNITIES)
        .fetch_all(pool)
        .await
        .map_err(KgError::query(context))?;

    if !rows.is_empty() {
        return Ok(rows);
    }

    tracing::debug!(graph = graph_name, "Component query empty, using first-character buckets");
    let nodes = sqlx::query_as::<_, NodeLabelRow>(NODES_SQL)
        .bind(graph_name)
        .fetch_all(pool)
        .await
        .map_err(KgError::query(context))?;

    let mut rows: Vec<CommunityRow> = nodes
        .into_iter()
        .map(|n| CommunityRow {
            community_id: fallback_bucket(&n.node_id),
            node_id: n.node_id,
            label: n.label,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.community_id
            .cmp(&b.community_id)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    Ok(rows)
}

/// Fallback grouping by the first character of a node id: A-E, F-J, K-O, P-T, anything else.
/// Case-sensitive; lowercase ids land in the last bucket.
pub fn fallback_bucket(node_id: &str) -> i64 {
    match node_id.chars().next() {
        Some('A'..='E') => 0,
        Some('F'..='J') => 1,
        Some('K'..='O') => 2,
        Some('P'..='T') => 3,
        _ => 4,
    }
}

pub async fn paths(
    pool: &PgPool,
    graph_name: &str,
    query: &PathQuery,
) -> Result<PathAnalysis, KgError> {
    let context = "Shortest path analysis failed";

    match query {
        PathQuery::Specific { source, target } => {
            if source == target {
                return Ok(PathAnalysis::Paths(Vec::new()));
            }
            let found = sqlx::query_as::<_, PathResult>(SHORTEST_PATH_SQL)
                .bind(graph_name)
                .bind(source)
                .bind(target)
                .fetch_optional(pool)
                .await
                .map_err(KgError::query(context))?;
            Ok(PathAnalysis::Paths(found.into_iter().collect()))
        }
        PathQuery::Summary => {
            let summary = sqlx::query_as::<_, PathSummary>(PATH_SUMMARY_SQL)
                .bind(graph_name)
                .fetch_one(pool)
                .await
                .map_err(KgError::query(context))?;
            Ok(PathAnalysis::Summary(summary))
        }
    }
}

// ============================================================================
// Summaries over query results
// ============================================================================

pub fn community_summary(rows: &[CommunityRow]) -> CommunitySummary {
    let mut members: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for row in rows {
        members.entry(row.community_id).or_default().push(row.label.clone());
    }

    let community_count = members.len();
    let largest_size = members.values().map(Vec::len).max().unwrap_or(0);
    let average_size = if community_count == 0 {
        0.0
    } else {
        rows.len() as f64 / community_count as f64
    };

    CommunitySummary {
        community_count,
        largest_size,
        average_size,
        members,
    }
}

/// `None` for an empty result. Ties go to the earliest row.
pub fn centrality_insights(rows: &[CentralityRow]) -> Option<CentralityInsights> {
    let first_max = |key: fn(&CentralityRow) -> i64| {
        rows.iter()
            .fold(None::<&CentralityRow>, |best, row| match best {
                Some(b) if key(b) >= key(row) => Some(b),
                _ => Some(row),
            })
            .cloned()
    };

    Some(CentralityInsights {
        most_connected: first_max(|r| r.degree_centrality)?,
        top_broker: first_max(|r| r.betweenness_centrality)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// TESTS (require PostgreSQL; skipped when unreachable)
// ============================================================================
