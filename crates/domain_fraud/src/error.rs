//! Fraud scoring errors
//!
//! Every error names the pipeline stage it came from so callers can triage a
//! failed claim without reading logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use core_kernel::ClaimId;
use crate::model::ModelVersionId;

/// Pipeline stage an error originated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FeatureBuild,
    Scoring,
    Explanation,
    Routing,
    Registry,
    Training,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::FeatureBuild => "feature_build",
            Stage::Scoring => "scoring",
            Stage::Explanation => "explanation",
            Stage::Routing => "routing",
            Stage::Registry => "registry",
            Stage::Training => "training",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while scoring, explaining or routing a claim
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FraudError {
    #[error("Schema error on claim {claim_id}: `{field}` {reason}")]
    Schema {
        claim_id: ClaimId,
        field: String,
        reason: String,
    },

    #[error("Model unavailable: `{requested}` is not loaded for family `{family}`")]
    ModelUnavailable { family: String, requested: String },

    #[error("Input shape mismatch for model {model_version}: expected {expected}, got {actual}")]
    InputShape {
        model_version: ModelVersionId,
        expected: String,
        actual: String,
    },

    #[error(
        "Explanation for claim {claim_id} under model {model_version} reconstructs {reconstructed:.6} \
         but the score is {expected:.6} (tolerance {tolerance})"
    )]
    ExplanationInconsistency {
        claim_id: ClaimId,
        model_version: ModelVersionId,
        expected: f64,
        reconstructed: f64,
        tolerance: f64,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Training error: {0}")]
    Training(String),
}

impl FraudError {
    pub fn schema(claim_id: ClaimId, field: impl Into<String>, reason: impl Into<String>) -> Self {
        FraudError::Schema {
            claim_id,
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        FraudError::Configuration(message.into())
    }

    pub fn registry(message: impl Into<String>) -> Self {
        FraudError::Registry(message.into())
    }

    /// Stage the error is attributed to
    pub fn stage(&self) -> Stage {
        match self {
            FraudError::Schema { .. } => Stage::FeatureBuild,
            FraudError::ModelUnavailable { .. } => Stage::Registry,
            FraudError::InputShape { .. } => Stage::Scoring,
            FraudError::ExplanationInconsistency { .. } => Stage::Explanation,
            FraudError::Configuration(_) => Stage::Routing,
            FraudError::Registry(_) => Stage::Registry,
            FraudError::Training(_) => Stage::Training,
        }
    }

    /// Claim the error refers to, when it is claim specific
    pub fn claim_id(&self) -> Option<ClaimId> {
        match self {
            FraudError::Schema { claim_id, .. }
            | FraudError::ExplanationInconsistency { claim_id, .. } => Some(*claim_id),
            _ => None,
        }
    }

    /// Model version the error refers to, when known
    pub fn model_version(&self) -> Option<&ModelVersionId> {
        match self {
            FraudError::InputShape { model_version, .. }
            | FraudError::ExplanationInconsistency { model_version, .. } => Some(model_version),
            _ => None,
        }
    }

    /// Retrying after a registry reload can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, FraudError::ModelUnavailable { .. })
    }

    /// Errors that abort a whole scoring request rather than a single claim
    pub fn is_request_fatal(&self) -> bool {
        matches!(
            self,
            FraudError::ModelUnavailable { .. }
                | FraudError::InputShape { .. }
                | FraudError::Configuration(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_is_claim_scoped() {
        let claim_id = ClaimId::new();
        let err = FraudError::schema(claim_id, "claim_amount", "is required");
        assert_eq!(err.stage(), Stage::FeatureBuild);
        assert_eq!(err.claim_id(), Some(claim_id));
        assert!(!err.is_request_fatal());
        assert!(err.to_string().contains("claim_amount"));
    }

    #[test]
    fn test_model_unavailable_is_retryable_and_fatal() {
        let err = FraudError::ModelUnavailable {
            family: "claims".to_string(),
            requested: "active".to_string(),
        };
        assert!(err.is_retryable());
        assert!(err.is_request_fatal());
    }

    #[test]
    fn test_input_shape_carries_model_version() {
        let err = FraudError::InputShape {
            model_version: ModelVersionId::new("v3"),
            expected: "16 features".to_string(),
            actual: "15 features".to_string(),
        };
        assert_eq!(err.model_version().map(|v| v.as_str()), Some("v3"));
        assert!(!err.is_retryable());
    }
}
