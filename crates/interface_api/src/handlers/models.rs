//! Model lifecycle handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::info;

use domain_fraud::{ModelVersion, ModelVersionId};

use crate::auth::{permissions, require_permission, Claims};
use crate::dto::models::{ModelListResponse, RegisterModelResponse, RetireModelResponse};
use crate::error::ApiError;
use crate::AppState;

/// Lists loaded and retired model versions
pub async fn list_models(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ModelListResponse>, ApiError> {
    require_permission(&claims, permissions::MODEL_READ)?;

    let family = state.config.scoring.model_family.clone();
    let snapshot = state.registry.snapshot();
    Ok(Json(ModelListResponse {
        active: snapshot.active(&family).map(|m| m.version_id.clone()),
        generation: snapshot.generation(),
        versions: snapshot.versions(),
        family,
    }))
}

/// Registers a model version from its JSON form
pub async fn register_model(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(model): Json<ModelVersion>,
) -> Result<(StatusCode, Json<RegisterModelResponse>), ApiError> {
    require_permission(&claims, permissions::MODEL_ADMIN)?;

    let version_id = model.version_id.clone();
    let status = state.registry.register(model)?;
    info!(model_version = %version_id, subject = %claims.sub, "Model registered via API");

    Ok((StatusCode::CREATED, Json(RegisterModelResponse { version_id, status })))
}

/// Retires a loaded model version
pub async fn retire_model(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(version_id): Path<String>,
) -> Result<Json<RetireModelResponse>, ApiError> {
    require_permission(&claims, permissions::MODEL_ADMIN)?;

    let version_id = ModelVersionId::new(version_id);
    let snapshot = state.registry.snapshot();
    if snapshot.get(&version_id).is_none() {
        return Err(if snapshot.is_retired(&version_id) {
            ApiError::Conflict(format!("model version {version_id} is already retired"))
        } else {
            ApiError::NotFound(format!("model version {version_id} is not loaded"))
        });
    }

    let promoted = state.registry.retire(&version_id)?;
    info!(model_version = %version_id, subject = %claims.sub, "Model retired via API");

    Ok(Json(RetireModelResponse {
        retired: version_id,
        promoted,
    }))
}
