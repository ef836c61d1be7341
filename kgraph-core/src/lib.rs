pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod generation;
pub mod ipc;
pub mod models;
pub mod persistence;
pub mod samples;

pub use analysis::{
    CentralityInsights, CentralityRow, CommunityRow, CommunitySummary, PathAnalysis, PathQuery,
    PathResult, PathSummary,
};
pub use config::{GraphPolicy, KgConfig};
pub use error::KgError;
pub use export::{ExportArtifact, ExportFormat};
pub use generation::{AnthropicClient, AnthropicConfig, GenerationBackend, GenerationError};
pub use ipc::{AnalysisKind, KgRequest, KgResponse};
pub use models::{Edge, Graph, GraphMeta, Node, ValidationError};
pub use persistence::SaveReport;
pub use samples::SampleKind;
