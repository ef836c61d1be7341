use std::str::FromStr;

use crate::config::DatabaseConfig;
use crate::error::KgError;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

/// Table layout for the persisted graphs. `graph_name` on every row is the only
/// isolation between graphs; `ON DELETE CASCADE` gives detach-delete semantics.
pub const SCHEMA: &str = include_str!("../migrations/0001_graph_schema.sql");

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, KgError> {
    let mut options = PgConnectOptions::from_str(&config.url)
        .map_err(|e| KgError::Connection(format!("invalid database URL: {}", e)))?;
    if let Some(user) = config.username.as_deref().filter(|u| !u.is_empty()) {
        options = options.username(user);
    }
    if let Some(password) = config.password.as_deref().filter(|p| !p.is_empty()) {
        options = options.password(password);
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .map_err(|e| KgError::Connection(e.to_string()))?;

    ensure_schema(&pool).await?;
    Ok(pool)
}

/// Advisory lock key serialising concurrent schema creation.
const SCHEMA_LOCK_KEY: i64 = 0x6b67_7261_7068;

pub async fn ensure_schema(pool: &PgPool) -> Result<(), KgError> {
    let context = "Failed to create graph schema";
    let mut tx = pool.begin().await.map_err(KgError::query(context))?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *tx)
        .await
        .map_err(KgError::query(context))?;

    sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(SCHEMA))
        .await
        .map_err(KgError::query(context))?;

    tx.commit().await.map_err(KgError::query(context))?;
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> Result<String, KgError> {
    let row: (String,) = sqlx::query_as("SELECT version()")
        .fetch_one(pool)
        .await
        .map_err(|e| KgError::Connection(e.to_string()))?;
    Ok(row.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_declares_all_tables() {
        for table in ["kg_graph_meta", "kg_nodes", "kg_related"] {
            assert!(SCHEMA.contains(table), "schema should declare {}", table);
        }
        assert!(SCHEMA.contains("ON DELETE CASCADE"));
    }

    #[tokio::test]
    async fn test_invalid_url_is_a_connection_error() {
        let config = DatabaseConfig {
            url: "not a url".to_string(),
            ..DatabaseConfig::default()
        };
        match create_pool(&config).await {
            Err(KgError::Connection(_)) => {}
            other => panic!("Expected Connection error, got {:?}", other.map(|_| ())),
        }
    }
}
