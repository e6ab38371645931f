//! Risk scoring against a loaded model version

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::ClaimId;
use crate::error::FraudError;
use crate::features::FeatureVector;
use crate::model::{ModelVersion, ModelVersionId};

/// Calibrated fraud risk for one claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub claim_id: ClaimId,
    /// Calibrated probability in [0, 1]
    pub risk_score: f64,
    pub model_version: ModelVersionId,
    pub computed_at: DateTime<Utc>,
}

/// Stateless scorer; all state lives in the model version
#[derive(Debug, Clone, Copy, Default)]
pub struct AnomalyScorer;

impl AnomalyScorer {
    pub fn new() -> Self {
        Self
    }

    /// Scores one feature vector
    ///
    /// # Errors
    ///
    /// `FraudError::InputShape` if the vector was built for a different schema
    /// or has the wrong length.
    pub fn score(&self, vector: &FeatureVector, model: &ModelVersion) -> Result<ScoreResult, FraudError> {
        Self::check_shape(vector, model)?;

        let risk_score = model.risk(&vector.values);
        debug!(
            claim_id = %vector.claim_id,
            model_version = %model.version_id,
            estimator = model.model_name(),
            risk_score,
            "Scored claim"
        );

        Ok(ScoreResult {
            claim_id: vector.claim_id,
            risk_score,
            model_version: model.version_id.clone(),
            computed_at: Utc::now(),
        })
    }

    /// Scores each vector independently; a shape error fails only its own entry
    pub fn score_batch(
        &self,
        vectors: &[FeatureVector],
        model: &ModelVersion,
    ) -> Vec<Result<ScoreResult, FraudError>> {
        vectors.iter().map(|v| self.score(v, model)).collect()
    }

    fn check_shape(vector: &FeatureVector, model: &ModelVersion) -> Result<(), FraudError> {
        if vector.schema_version != model.feature_schema.version {
            return Err(FraudError::InputShape {
                model_version: model.version_id.clone(),
                expected: format!("schema {}", model.feature_schema.version),
                actual: format!("schema {}", vector.schema_version),
            });
        }
        if vector.len() != model.input_len() {
            return Err(FraudError::InputShape {
                model_version: model.version_id.clone(),
                expected: format!("{} features", model.input_len()),
                actual: format!("{} features", vector.len()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{ClaimRecord, ClaimType};
    use crate::model::fixtures::small_model;
    use chrono::{NaiveDate, TimeZone};
    use core_kernel::{Currency, Money, PartyId, PolicyId};
    use rust_decimal_macros::dec;

    fn vector(model: &ModelVersion) -> FeatureVector {
        let claim = ClaimRecord::new(
            PolicyId::new(),
            PartyId::new(),
            ClaimType::Death,
            NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        )
        .with_amount(Money::new(dec!(20000), Currency::USD))
        .with_premium(Money::new(dec!(1200), Currency::USD));
        model.feature_builder().build(&claim).unwrap()
    }

    #[test]
    fn test_score_is_deterministic_and_bounded() {
        let model = small_model("unit-v1");
        let v = vector(&model);
        let a = AnomalyScorer::new().score(&v, &model).unwrap();
        let b = AnomalyScorer::new().score(&v, &model).unwrap();
        assert_eq!(a.risk_score.to_bits(), b.risk_score.to_bits());
        assert!((0.0..=1.0).contains(&a.risk_score));
        assert_eq!(a.model_version, model.version_id);
    }

    #[test]
    fn test_wrong_length_is_input_shape_error() {
        let model = small_model("unit-v1");
        let mut v = vector(&model);
        v.values.pop();
        let err = AnomalyScorer::new().score(&v, &model).unwrap_err();
        assert!(matches!(err, FraudError::InputShape { .. }));
    }

    #[test]
    fn test_wrong_schema_version_is_input_shape_error() {
        let model = small_model("unit-v1");
        let mut v = vector(&model);
        v.schema_version = "fs-other".to_string();
        assert!(AnomalyScorer::new().score(&v, &model).is_err());
    }

    #[test]
    fn test_batch_matches_single() {
        let model = small_model("unit-v1");
        let v = vector(&model);
        let single = AnomalyScorer::new().score(&v, &model).unwrap();
        let batch = AnomalyScorer::new().score_batch(&[v.clone(), v], &model);
        for result in batch {
            assert_eq!(result.unwrap().risk_score.to_bits(), single.risk_score.to_bits());
        }
    }
}
