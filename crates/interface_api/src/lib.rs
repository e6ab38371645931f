//! HTTP API Layer
//!
//! This crate provides the REST API for claims fraud scoring using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: scoring, model lifecycle, outcome feedback and thresholds
//! - **Middleware**: Authentication, tracing, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: `FraudError` mapped onto HTTP status codes
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(config, registry, Arc::new(TracingSink))?;
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use domain_fraud::{CaseManagementSink, FraudError, ModelRegistry, ModelVersion, ScoringService};

use crate::config::ApiConfig;
use crate::handlers::{health, models, outcomes, scoring, thresholds};
use crate::middleware::{audit_middleware, auth_middleware};

/// Serialized model versions carry a whole forest
const MODEL_BODY_LIMIT: usize = 64 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScoringService>,
    pub registry: Arc<ModelRegistry>,
    pub config: ApiConfig,
}

impl AppState {
    /// Builds the scoring service over `registry`
    pub fn new(
        config: ApiConfig,
        registry: Arc<ModelRegistry>,
        case_sink: Arc<dyn CaseManagementSink>,
    ) -> Result<Self, FraudError> {
        let service = ScoringService::new(config.scoring.clone(), Arc::clone(&registry), case_sink)?;
        Ok(Self {
            service: Arc::new(service),
            registry,
            config,
        })
    }
}

/// Registers every `*.json` model in `dir`, in file name order
///
/// The first version registered for a family becomes its active version.
/// Returns the number of versions registered.
pub fn register_models_from_dir(registry: &ModelRegistry, dir: impl AsRef<Path>) -> Result<usize, FraudError> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir)
        .map_err(|e| FraudError::configuration(format!("cannot read models dir {}: {e}", dir.display())))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    for path in &paths {
        let model = ModelVersion::from_json_file(path)?;
        let version_id = model.version_id.clone();
        let status = registry.register(model)?;
        info!(model_version = %version_id, ?status, path = %path.display(), "Loaded model from disk");
    }
    Ok(paths.len())
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let model_routes = Router::new()
        .route("/", get(models::list_models).post(models::register_model))
        .route("/:version_id/retire", post(models::retire_model))
        .layer(DefaultBodyLimit::max(MODEL_BODY_LIMIT));

    // Protected API routes
    let api_routes = Router::new()
        .route("/score", post(scoring::score_claim))
        .route("/score/batch", post(scoring::score_batch))
        .nest("/models", model_routes)
        .route("/outcomes", post(outcomes::record_outcome))
        .route(
            "/thresholds",
            get(thresholds::get_thresholds).put(thresholds::update_thresholds),
        )
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}
