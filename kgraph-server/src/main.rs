use std::sync::Arc;

use clap::Parser;
use kgraph_core::KgConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use kgraph_server::{server, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "kgraph.toml")]
    config: String,

    /// Check the graph store connection and exit.
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (ANTHROPIC_API_KEY, KGRAPH__DATABASE__URL, ...)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match KgConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    if args.health {
        let pool = match kgraph_core::db::create_pool(&config.database).await {
            Ok(p) => p,
            Err(e) => {
                println!("❌ Graph store connection failed: {}", e);
                std::process::exit(1);
            }
        };
        match kgraph_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL health check failed: {}", e);
                std::process::exit(1);
            }
        }
        println!("✅ kgraph store health check passed");
        return Ok(());
    }

    let state = Arc::new(AppState::from_config(config).await);

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    if state.config.http.enabled {
        let http_state = Arc::clone(&state);
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = kgraph_server::http::start_http_server(http_state, http_shutdown).await {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    let socket_path = state.config.service.socket_path.clone();
    server::run_unix_server(&socket_path, state, tx.subscribe()).await?;

    Ok(())
}
