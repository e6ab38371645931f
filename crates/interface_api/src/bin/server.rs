//! Claims Fraud Scoring - API Server Binary
//!
//! Starts the HTTP API for scoring claims, managing model versions and
//! recording outcomes.
//!
//! # Usage
//!
//! ```bash
//! # Run with config/fraud-api.toml and a directory of trained models
//! API_JWT_SECRET=... API_MODELS_DIR=models cargo run --bin fraud-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_CONFIG_FILE` - Config file without extension (default: config/fraud-api)
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_JWT_SECRET` - JWT signing secret (required)
//! * `API_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `API_MODELS_DIR` - Directory of model JSON files registered at startup
//! * `API_MAX_BATCH_SIZE` - Largest accepted batch (default: 1000)
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `API_SCORING__*` - Overrides for the scoring config, e.g. `API_SCORING__THRESHOLDS__REVIEW`

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_fraud::{ModelRegistry, TracingSink};
use interface_api::{config::ApiConfig, create_router, register_models_from_dir, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config_file = std::env::var("API_CONFIG_FILE")
        .unwrap_or_else(|_| interface_api::config::DEFAULT_CONFIG_FILE.to_string());
    let config = ApiConfig::load(&config_file)?;

    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        model_family = %config.scoring.model_family,
        "Starting claims fraud scoring API"
    );

    let sink = Arc::new(TracingSink);
    let registry = Arc::new(ModelRegistry::new(config.scoring.drift.clone(), sink.clone()));

    match &config.models_dir {
        Some(dir) => {
            let loaded = register_models_from_dir(&registry, dir)?;
            tracing::info!(loaded, dir = %dir, "Model versions loaded");
        }
        None => tracing::warn!("No models_dir configured; scoring is unavailable until a model is registered"),
    }

    let state = AppState::new(config.clone(), registry, sink)?;
    let app = create_router(state);

    let addr: SocketAddr = config.server_addr().parse()?;
    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
