//! Routing threshold handlers

use axum::{extract::State, Extension, Json};

use domain_fraud::PolicyThresholds;

use crate::auth::{permissions, require_permission, Claims};
use crate::error::ApiError;
use crate::AppState;

/// Current routing thresholds
pub async fn get_thresholds(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<PolicyThresholds>, ApiError> {
    require_permission(&claims, permissions::MODEL_READ)?;
    Ok(Json(state.service.thresholds()))
}

/// Replaces the routing thresholds
pub async fn update_thresholds(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(thresholds): Json<PolicyThresholds>,
) -> Result<Json<PolicyThresholds>, ApiError> {
    require_permission(&claims, permissions::MODEL_ADMIN)?;
    state.service.reload_thresholds(thresholds)?;
    Ok(Json(state.service.thresholds()))
}
