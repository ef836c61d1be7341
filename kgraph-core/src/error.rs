use thiserror::Error;

use crate::generation::GenerationError;
use crate::models::ValidationError;

#[derive(Error, Debug)]
pub enum KgError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Failed to parse graph document: {0}")]
    Parse(String),

    #[error("Graph document is missing the '{0}' array")]
    MissingKey(&'static str),

    #[error("{context}: {source}")]
    Query {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Error generating graph: {0}")]
    Generation(#[from] GenerationError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl KgError {
    /// Wrap a store failure with the operation that issued it.
    pub fn query(context: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| KgError::Query { context, source }
    }

    /// Stable machine-readable kind, used by the HTTP layer for status mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            KgError::Connection(_) => "connection",
            KgError::Parse(_) | KgError::MissingKey(_) => "parse",
            KgError::Query { .. } => "query",
            KgError::Validation(ValidationError::UnknownNode(_))
            | KgError::Validation(ValidationError::UnknownEdge(_))
            | KgError::NotFound(_) => "not_found",
            KgError::Validation(_) => "validation",
            KgError::Generation(_) => "generation",
            KgError::Export(_) => "export",
            KgError::Config(_) => "config",
        }
    }
}
