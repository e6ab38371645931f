//! Health check handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use domain_fraud::ModelVersionId;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_model: Option<ModelVersionId>,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_model: None,
    })
}

/// Readiness check; ready once the served family has an active model
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, ApiError> {
    let family = &state.config.scoring.model_family;
    let active = state.registry.get_active_version(family).ok_or_else(|| {
        ApiError::ServiceUnavailable(format!("no active model for family `{family}`"))
    })?;

    Ok(Json(HealthResponse {
        status: "ready".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_model: Some(active.version_id.clone()),
    }))
}
