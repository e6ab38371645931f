//! Outcome feedback handler

use axum::{extract::State, Extension, Json};

use crate::auth::{permissions, require_permission, Claims};
use crate::dto::scoring::{RecordOutcomeRequest, RecordOutcomeResponse};
use crate::error::ApiError;
use crate::AppState;

/// Records the realised label of a previously scored claim
pub async fn record_outcome(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<RecordOutcomeRequest>,
) -> Result<Json<RecordOutcomeResponse>, ApiError> {
    require_permission(&claims, permissions::OUTCOME_WRITE)?;

    if !request.score.risk_score.is_finite() || !(0.0..=1.0).contains(&request.score.risk_score) {
        return Err(ApiError::Validation(format!(
            "risk_score must be within [0, 1], got {}",
            request.score.risk_score
        )));
    }

    let drift = state.service.record_outcome(&request.score, request.is_fraud);
    Ok(Json(RecordOutcomeResponse { recorded: true, drift }))
}
