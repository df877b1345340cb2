//! emotrack-ingest - real-time emotion frame ingestion service
//!
//! Serves the `/ws/video` stream endpoint plus health and monitor routes.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use emotrack_common::config::{
    load_toml_config, resolve_root_folder, RootFolder, SharedConfig, ROOT_FOLDER_ENV,
};
use emotrack_common::db::init_database;
use emotrack_common::EventBus;
use emotrack_ingest::config::ServiceConfig;
use emotrack_ingest::db::{SqliteEmotionRepository, SqliteIdentityResolver};
use emotrack_ingest::inference::{HttpInferenceBackend, InferencePool};
use emotrack_ingest::report::JsonReportGenerator;
use emotrack_ingest::{build_router, AppState, SessionServices};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "emotrack_ingest=info,emotrack_common=info,tower_http=info";

/// Command-line arguments for emotrack-ingest
#[derive(Parser, Debug)]
#[command(name = "emotrack-ingest")]
#[command(about = "Real-time emotion frame ingestion service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the port of `ingest.bind_addr`)
    #[arg(short, long, env = "EMOTRACK_PORT")]
    port: Option<u16>,

    /// Root folder holding the database and reports
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file (default: <root>/emotrack.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// `log_level` from the config file, read before tracing is up
fn configured_log_level(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str::<SharedConfig>(&content).ok()?.log_level
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let root = RootFolder::new(resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
        args.config.as_deref(),
    ));
    let config_path = args.config.clone().unwrap_or_else(|| root.config_path());

    // RUST_LOG wins over the config file
    let fallback_filter = configured_log_level(&config_path)
        .map(|level| format!("emotrack_ingest={level},emotrack_common={level}"))
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting emotrack-ingest v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Root folder: {}", root.path().display());

    root.ensure_exists().context("Failed to create root folder")?;

    let service_config: ServiceConfig =
        load_toml_config(&config_path).context("Failed to load configuration")?;
    let config = service_config.ingest;
    config.validate().context("Invalid configuration")?;

    let mut addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind_addr '{}'", config.bind_addr))?;
    if let Some(port) = args.port {
        addr.set_port(port);
    }

    let db_path = root.database_path();
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database: {}", db_path.display());

    let backend = Arc::new(
        HttpInferenceBackend::from_config(&config.inference)
            .context("Failed to create inference client")?,
    );
    let inference = Arc::new(InferencePool::from_config(
        backend.clone(),
        backend,
        &config.inference,
    ));
    info!(
        endpoint = %config.inference.endpoint,
        workers = inference.workers(),
        "Inference pool ready"
    );

    let services = SessionServices::new(
        config,
        Arc::new(SqliteIdentityResolver::new(pool.clone())),
        inference,
        Arc::new(SqliteEmotionRepository::new(pool.clone())),
        Arc::new(JsonReportGenerator::new(pool, root.reports_dir())),
        EventBus::default(),
    );
    let app = build_router(AppState::new(services));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("emotrack-ingest listening on http://{}", addr);
    info!("Video stream: ws://{}/ws/video?token=<token>", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
