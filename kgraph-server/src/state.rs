//! Explicit application state shared by the IPC and HTTP front ends.

use std::sync::Arc;

use kgraph_core::config::DatabaseConfig;
use kgraph_core::generation::{AnthropicClient, AnthropicConfig, GenerationBackend, GenerationError};
use kgraph_core::{Graph, KgConfig, KgError};
use sqlx::PgPool;
use tokio::sync::{Mutex, RwLock};

/// The single working graph and the name it was last saved or loaded under.
#[derive(Debug, Default)]
pub struct Session {
    pub graph: Graph,
    pub name: Option<String>,
}

impl Session {
    /// Swap in a new working graph along with the name it is known under (`None` when unsaved).
    pub fn replace(&mut self, graph: Graph, name: Option<String>) {
        self.graph = graph;
        self.name = name;
    }
}

pub struct AppState {
    pub config: KgConfig,
    pub session: Mutex<Session>,
    store: RwLock<Option<PgPool>>,
    generator: Option<Arc<dyn GenerationBackend>>,
}

impl AppState {
    pub fn new(
        config: KgConfig,
        pool: Option<PgPool>,
        generator: Option<Arc<dyn GenerationBackend>>,
    ) -> Self {
        Self {
            config,
            session: Mutex::new(Session::default()),
            store: RwLock::new(pool),
            generator,
        }
    }

    /// Build state from configuration. A missing API key or an unreachable store
    /// leaves that capability unavailable instead of failing startup.
    pub async fn from_config(config: KgConfig) -> Self {
        let generator: Option<Arc<dyn GenerationBackend>> =
            match AnthropicClient::new(AnthropicConfig::from_settings(&config.generation)) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    tracing::warn!("Graph generation disabled: {}", e);
                    None
                }
            };

        let pool = if config.database.connect_on_start {
            match kgraph_core::db::create_pool(&config.database).await {
                Ok(pool) => {
                    tracing::info!("Connected to graph store");
                    Some(pool)
                }
                Err(e) => {
                    tracing::warn!("Starting without graph store: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self::new(config, pool, generator)
    }

    /// The connected store, or a connection error when there is none.
    pub async fn pool(&self) -> Result<PgPool, KgError> {
        self.store
            .read()
            .await
            .clone()
            .ok_or_else(|| KgError::Connection("no graph store connected".to_string()))
    }

    pub async fn is_connected(&self) -> bool {
        self.store.read().await.is_some()
    }

    /// Connect with `database` and replace the current store on success. On failure the
    /// previous store (if any) stays in place.
    pub async fn connect(&self, database: &DatabaseConfig) -> Result<PgPool, KgError> {
        let pool = kgraph_core::db::create_pool(database).await?;
        let previous = self.store.write().await.replace(pool.clone());
        if let Some(old) = previous {
            old.close().await;
        }
        Ok(pool)
    }

    pub fn generator(&self) -> Result<Arc<dyn GenerationBackend>, KgError> {
        self.generator
            .clone()
            .ok_or(KgError::Generation(GenerationError::MissingApiKey))
    }
}
