//! Scoring handlers
//!
//! Scoring is CPU bound, so it runs on the blocking pool.

use axum::{extract::State, Extension, Json};
use std::sync::Arc;

use domain_fraud::{ClaimDecision, ScoringRequest, ScoringResponse};

use crate::auth::{permissions, require_permission, Claims};
use crate::dto::scoring::ScoreClaimRequest;
use crate::error::ApiError;
use crate::AppState;

/// Scores one claim
pub async fn score_claim(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<ScoreClaimRequest>,
) -> Result<Json<ClaimDecision>, ApiError> {
    require_permission(&claims, permissions::CLAIM_SCORE)?;

    let service = Arc::clone(&state.service);
    let decision = tokio::task::spawn_blocking(move || service.score_claim(&request.claim, &request.model))
        .await
        .map_err(|e| ApiError::Internal(format!("scoring task failed: {e}")))??;

    Ok(Json(decision))
}

/// Scores a batch; failed claims are reported per claim
pub async fn score_batch(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<ScoringRequest>,
) -> Result<Json<ScoringResponse>, ApiError> {
    require_permission(&claims, permissions::CLAIM_SCORE)?;

    if request.claims.is_empty() {
        return Err(ApiError::Validation("batch contains no claims".to_string()));
    }
    if request.claims.len() > state.config.max_batch_size {
        return Err(ApiError::Validation(format!(
            "batch of {} claims exceeds the limit of {}",
            request.claims.len(),
            state.config.max_batch_size
        )));
    }

    let service = Arc::clone(&state.service);
    let response = tokio::task::spawn_blocking(move || service.score_request(&request))
        .await
        .map_err(|e| ApiError::Internal(format!("scoring task failed: {e}")))??;

    Ok(Json(response))
}
