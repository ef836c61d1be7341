use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary record stored alongside every persisted graph, used for listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GraphMeta {
    pub name: String,
    pub description: String,
    pub created_date: DateTime<Utc>,
    pub node_count: i32,
    pub edge_count: i32,
}
