//! artgraph-discovery - Artist Relationship Discovery Microservice
//!
//! Aggregates artist relationships from an AI reasoning service and several
//! secondary knowledge sources into a deduplicated SQLite graph, and serves
//! discovery runs over HTTP (JSON and SSE).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use artgraph_common::config::{load_or_default, RootFolderInitializer, RootFolderResolver};
use artgraph_discovery::cache::AnalysisCache;
use artgraph_discovery::config::{resolve_bind_address, DiscoveryConfig, ENV_BIND};
use artgraph_discovery::pipeline::DiscoveryPipeline;
use artgraph_discovery::sources::build_sources;
use artgraph_discovery::store::{GraphStore, SqliteGraphStore};
use artgraph_discovery::AppState;

const MODULE_NAME: &str = "artgraph-discovery";

/// Command-line arguments for artgraph-discovery
#[derive(Parser, Debug)]
#[command(name = "artgraph-discovery")]
#[command(about = "Artist relationship discovery microservice")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = ENV_BIND)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_or_default(MODULE_NAME, args.config.as_deref());

    // RUST_LOG overrides the TOML level
    let default_level = toml_config
        .logging
        .level
        .clone()
        .unwrap_or_else(|| "artgraph_discovery=info,tower_http=info".to_string());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting artgraph-discovery v{} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );

    // Root folder and database
    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder)
        .with_toml(&toml_config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db = artgraph_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    // Sources and pipeline
    let config = DiscoveryConfig::resolve(&db, &toml_config)
        .await
        .context("Failed to resolve discovery configuration")?;
    let sources = build_sources(&config);
    info!("{} secondary sources enabled", sources.adapters.len());

    let cache = AnalysisCache::new(db.clone(), config.pipeline.cache_window);
    match cache.purge_expired().await {
        Ok(0) => {}
        Ok(purged) => info!("Purged {} expired cached analyses", purged),
        Err(e) => warn!("Failed to purge analysis cache: {}", e),
    }

    let store: Arc<dyn GraphStore> = Arc::new(SqliteGraphStore::new(db.clone()));
    let pipeline = Arc::new(DiscoveryPipeline::new(
        sources.ai,
        sources.adapters,
        store.clone(),
        cache,
        config.pipeline.clone(),
    ));

    let shared_secret =
        artgraph_common::api::resolve_shared_secret(&db, toml_config.shared_secret.as_ref())
            .await
            .context("Failed to resolve API shared secret")?;

    let state = AppState::new(db, pipeline, store, shared_secret);
    let app = artgraph_discovery::build_router(state);

    let bind = resolve_bind_address(args.bind, &toml_config);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
