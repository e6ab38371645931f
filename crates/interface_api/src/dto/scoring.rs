//! Scoring DTOs

use serde::{Deserialize, Serialize};

use domain_fraud::{ClaimRecord, DriftDetected, ModelSelector, ScoreResult};

/// Request to score a single claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreClaimRequest {
    pub claim: ClaimRecord,
    /// `active` or a version id
    #[serde(default)]
    pub model: ModelSelector,
}

/// Realised label for a score returned earlier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOutcomeRequest {
    pub score: ScoreResult,
    pub is_fraud: bool,
}

/// Result of recording an outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOutcomeResponse {
    pub recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift: Option<DriftDetected>,
}
