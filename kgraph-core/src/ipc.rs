use serde::{Deserialize, Serialize};

use crate::analysis::PathQuery;
use crate::error::KgError;
use crate::export::ExportFormat;
use crate::samples::SampleKind;

pub const PROTOCOL: &str = "kgraph/1";

/// Which analysis to run against a persisted graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisKind {
    Centrality,
    Communities,
    Paths { query: PathQuery },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum KgRequest {
    Ping,
    Health,

    // Session graph
    GetGraph,
    ClearGraph,
    Generate {
        description: String,
    },
    LoadSample {
        sample: SampleKind,
    },
    Import {
        document: String,
    },
    AddNode {
        id: String,
        label: String,
        color: String,
    },
    UpdateNode {
        id: String,
        label: String,
        color: String,
    },
    DeleteNode {
        id: String,
    },
    AddEdge {
        source: String,
        target: String,
        label: String,
    },
    DeleteEdge {
        index: usize,
    },
    Export {
        name: String,
        format: ExportFormat,
    },

    // Graph store
    Connect {
        url: String,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
    ListGraphs,
    Save {
        name: String,
        #[serde(default)]
        description: Option<String>,
    },
    Load {
        name: String,
    },
    DeleteGraph {
        name: String,
    },
    Analyze {
        name: String,
        analysis: AnalysisKind,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct KgResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    /// [`KgError::kind`] of the failure, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub version: String,
}

impl KgResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            error_kind: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            error_kind: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

impl From<KgError> for KgResponse {
    fn from(e: KgError) -> Self {
        let mut resp = Self::err(e.to_string());
        resp.error_kind = Some(e.kind().to_string());
        resp
    }
}
