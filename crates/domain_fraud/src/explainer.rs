//! Score explanations
//!
//! Local explanations are permutation-sampled Shapley values measured from the
//! model version's baseline vector. Along each feature ordering the features
//! are switched one at a time from baseline to the claim's value and each
//! score delta is credited to the feature just switched. Because the deltas
//! telescope, every ordering reconstructs the score exactly; averaging over a
//! fixed, seeded set of orderings keeps explanations reproducible.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use core_kernel::ClaimId;
use crate::error::FraudError;
use crate::features::FeatureVector;
use crate::model::{ModelVersion, ModelVersionId};
use crate::scorer::ScoreResult;

/// Explanation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainerConfig {
    /// Largest allowed `|baseline + sum(contributions) - risk_score|`
    pub tolerance: f64,
    /// Number of feature orderings averaged
    pub permutations: usize,
    /// Contributions forwarded with routing events
    pub top_n: usize,
}

impl ExplainerConfig {
    pub fn validate(&self) -> Result<(), FraudError> {
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(FraudError::configuration(format!(
                "explanation tolerance must be finite and non-negative, got {}",
                self.tolerance
            )));
        }
        if self.permutations == 0 {
            return Err(FraudError::configuration("explanation permutations must be at least 1"));
        }
        Ok(())
    }
}

/// How an explanation was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationMethod {
    /// Additive attribution for this claim
    Local,
    /// Score delta spread by global importance after the local path failed
    GlobalFallback,
}

/// One feature's share of the score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub feature: String,
    pub contribution: f64,
}

/// Additive explanation of a single score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub claim_id: ClaimId,
    pub model_version: ModelVersionId,
    pub method: ExplanationMethod,
    /// Score of the model's baseline vector
    pub baseline_score: f64,
    pub risk_score: f64,
    /// Sorted by descending absolute contribution
    pub contributions: Vec<Attribution>,
}

impl Explanation {
    fn new(
        score: &ScoreResult,
        method: ExplanationMethod,
        baseline_score: f64,
        names: &[String],
        contributions: Vec<f64>,
    ) -> Self {
        let mut contributions: Vec<Attribution> = names
            .iter()
            .zip(contributions)
            .map(|(name, contribution)| Attribution {
                feature: name.clone(),
                contribution,
            })
            .collect();
        // Stable sort keeps schema order among ties
        contributions.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));

        Self {
            claim_id: score.claim_id,
            model_version: score.model_version.clone(),
            method,
            baseline_score,
            risk_score: score.risk_score,
            contributions,
        }
    }

    /// The `n` largest contributions by absolute value
    pub fn top(&self, n: usize) -> &[Attribution] {
        &self.contributions[..n.min(self.contributions.len())]
    }

    /// `baseline_score + sum(contributions)`
    pub fn reconstructed(&self) -> f64 {
        self.baseline_score + self.contributions.iter().map(|a| a.contribution).sum::<f64>()
    }
}

/// Produces explanations for scored claims
#[derive(Debug, Clone)]
pub struct Explainer {
    config: ExplainerConfig,
}

impl Explainer {
    pub fn new(config: ExplainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExplainerConfig {
        &self.config
    }

    /// Explains a score, degrading to a global-importance explanation when the
    /// local attribution does not reconstruct it within tolerance
    ///
    /// # Errors
    ///
    /// `FraudError::InputShape` when the vector does not fit the model.
    pub fn explain(
        &self,
        model: &ModelVersion,
        vector: &FeatureVector,
        score: &ScoreResult,
    ) -> Result<Explanation, FraudError> {
        match self.explain_local(model, vector, score) {
            Ok(explanation) => Ok(explanation),
            Err(err @ FraudError::ExplanationInconsistency { .. }) => {
                warn!(
                    claim_id = %score.claim_id,
                    model_version = %model.version_id,
                    error = %err,
                    "Local explanation inconsistent, using global fallback"
                );
                Ok(self.explain_global(model, vector, score))
            }
            Err(err) => Err(err),
        }
    }

    /// Local attribution only
    ///
    /// # Errors
    ///
    /// `FraudError::ExplanationInconsistency` when the attribution misses the
    /// score by more than the configured tolerance.
    pub fn explain_local(
        &self,
        model: &ModelVersion,
        vector: &FeatureVector,
        score: &ScoreResult,
    ) -> Result<Explanation, FraudError> {
        check_fit(model, vector)?;

        let n = vector.len();
        let x = &vector.values;
        let orderings = self.orderings(n, model.random_seed);
        let mut contributions = vec![0.0; n];

        for ordering in &orderings {
            let mut current = model.baseline.clone();
            let mut previous = model.risk(&current);
            for &i in ordering {
                if current[i] == x[i] {
                    continue;
                }
                current[i] = x[i];
                let next = model.risk(&current);
                contributions[i] += next - previous;
                previous = next;
            }
        }
        let k = orderings.len() as f64;
        contributions.iter_mut().for_each(|c| *c /= k);

        let explanation = Explanation::new(
            score,
            ExplanationMethod::Local,
            model.baseline_score(),
            &vector.names,
            contributions,
        );

        let reconstructed = explanation.reconstructed();
        if (reconstructed - score.risk_score).abs() > self.config.tolerance {
            return Err(FraudError::ExplanationInconsistency {
                claim_id: score.claim_id,
                model_version: model.version_id.clone(),
                expected: score.risk_score,
                reconstructed,
                tolerance: self.config.tolerance,
            });
        }
        Ok(explanation)
    }

    /// Spreads `risk_score - baseline_score` across features in proportion to
    /// global importance times the standardised deviation from baseline
    fn explain_global(&self, model: &ModelVersion, vector: &FeatureVector, score: &ScoreResult) -> Explanation {
        let baseline_score = model.baseline_score();
        let delta = score.risk_score - baseline_score;

        let mut weights: Vec<f64> = vector
            .values
            .iter()
            .zip(&model.baseline)
            .zip(model.scaler.stds.iter().zip(&model.global_importance))
            .map(|((x, b), (std, importance))| importance * ((x - b) / std).abs())
            .collect();
        if weights.iter().sum::<f64>() <= 0.0 {
            weights = model.global_importance.clone();
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            weights = vec![1.0; vector.len()];
        }
        let total: f64 = weights.iter().sum();
        let contributions = weights.iter().map(|w| delta * w / total).collect();

        Explanation::new(
            score,
            ExplanationMethod::GlobalFallback,
            baseline_score,
            &vector.names,
            contributions,
        )
    }

    /// Schema order, reverse order, then seeded shuffles
    fn orderings(&self, n: usize, seed: u64) -> Vec<Vec<usize>> {
        let forward: Vec<usize> = (0..n).collect();
        let mut orderings = vec![forward.clone()];
        if self.config.permutations > 1 {
            orderings.push(forward.iter().rev().copied().collect());
        }
        let mut rng = StdRng::seed_from_u64(seed);
        while orderings.len() < self.config.permutations {
            let mut ordering = forward.clone();
            ordering.shuffle(&mut rng);
            orderings.push(ordering);
        }
        orderings
    }
}

fn check_fit(model: &ModelVersion, vector: &FeatureVector) -> Result<(), FraudError> {
    if vector.len() != model.input_len() || vector.schema_version != model.feature_schema.version {
        return Err(FraudError::InputShape {
            model_version: model.version_id.clone(),
            expected: format!("{} features of schema {}", model.input_len(), model.feature_schema.version),
            actual: format!("{} features of schema {}", vector.len(), vector.schema_version),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{BeneficiaryRelation, ClaimRecord, ClaimType};
    use crate::model::fixtures::small_model;
    use crate::scorer::AnomalyScorer;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use core_kernel::{Currency, Money, PartyId, PolicyId};
    use rust_decimal_macros::dec;

    fn config() -> ExplainerConfig {
        ExplainerConfig {
            tolerance: 1e-3,
            permutations: 6,
            top_n: 3,
        }
    }

    fn suspicious_vector(model: &ModelVersion) -> FeatureVector {
        let submitted = Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap();
        let claim = ClaimRecord::new(
            PolicyId::new(),
            PartyId::new(),
            ClaimType::AccidentalDeath,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            submitted,
        )
        .with_amount(Money::new(dec!(150000), Currency::USD))
        .with_premium(Money::new(dec!(2400), Currency::USD))
        .with_beneficiary_change(submitted - Duration::days(10))
        .with_beneficiary_relation(BeneficiaryRelation::Other);
        model.feature_builder().build(&claim).unwrap()
    }

    #[test]
    fn test_local_explanation_reconstructs_score() {
        let model = small_model("unit-v1");
        let v = suspicious_vector(&model);
        let score = AnomalyScorer::new().score(&v, &model).unwrap();
        let explanation = Explainer::new(config()).explain_local(&model, &v, &score).unwrap();

        assert_eq!(explanation.method, ExplanationMethod::Local);
        assert!((explanation.reconstructed() - score.risk_score).abs() <= 1e-3);
        assert_eq!(explanation.top(3).len(), 3);
        let sizes: Vec<f64> = explanation.contributions.iter().map(|a| a.contribution.abs()).collect();
        assert!(sizes.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_explanation_is_reproducible() {
        let model = small_model("unit-v1");
        let v = suspicious_vector(&model);
        let score = AnomalyScorer::new().score(&v, &model).unwrap();
        let explainer = Explainer::new(config());
        let a = explainer.explain(&model, &v, &score).unwrap();
        let b = explainer.explain(&model, &v, &score).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_inconsistent_score_falls_back_to_global() {
        let model = small_model("unit-v1");
        let v = suspicious_vector(&model);
        let mut score = AnomalyScorer::new().score(&v, &model).unwrap();
        score.risk_score = (score.risk_score - 0.25).max(0.0);

        let explainer = Explainer::new(config());
        assert!(matches!(
            explainer.explain_local(&model, &v, &score),
            Err(FraudError::ExplanationInconsistency { .. })
        ));

        let fallback = explainer.explain(&model, &v, &score).unwrap();
        assert_eq!(fallback.method, ExplanationMethod::GlobalFallback);
        assert!((fallback.reconstructed() - score.risk_score).abs() <= 1e-9);
    }

    #[test]
    fn test_orderings_are_distinct_permutations() {
        let orderings = Explainer::new(config()).orderings(5, 9);
        assert_eq!(orderings.len(), 6);
        assert_eq!(orderings[1], vec![4, 3, 2, 1, 0]);
        for ordering in &orderings {
            let mut sorted = ordering.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, vec![0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_zero_permutations_rejected() {
        let mut c = config();
        c.permutations = 0;
        assert!(c.validate().is_err());
    }
}
