//! Polymorphic risk estimators and their fixed-weight ensemble

use serde::{Deserialize, Serialize};

use super::classifier::LogisticClassifier;
use super::isolation::IsolationForest;

/// Anything that maps a standardised feature row to a raw risk in [0, 1]
pub trait RiskEstimator {
    /// Raw (uncalibrated) risk
    fn estimate(&self, x: &[f64]) -> f64;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

impl RiskEstimator for IsolationForest {
    fn estimate(&self, x: &[f64]) -> f64 {
        self.anomaly_score(x)
    }

    fn name(&self) -> &'static str {
        "isolation_forest"
    }
}

impl RiskEstimator for LogisticClassifier {
    fn estimate(&self, x: &[f64]) -> f64 {
        self.probability(x)
    }

    fn name(&self) -> &'static str {
        "logistic_classifier"
    }
}

/// Weighted ensemble member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleMember {
    pub weight: f64,
    pub model: ScoringModel,
}

/// Weighted average of member estimates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    pub members: Vec<EnsembleMember>,
}

impl Ensemble {
    pub fn new(members: Vec<EnsembleMember>) -> Self {
        Self { members }
    }
}

impl RiskEstimator for Ensemble {
    fn estimate(&self, x: &[f64]) -> f64 {
        let total: f64 = self.members.iter().map(|m| m.weight).sum();
        if total <= 0.0 {
            return 0.5;
        }
        let weighted: f64 = self
            .members
            .iter()
            .map(|m| m.weight * m.model.estimate(x))
            .sum();
        (weighted / total).clamp(0.0, 1.0)
    }

    fn name(&self) -> &'static str {
        "ensemble"
    }
}

/// Scorer variants a model version can carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
pub enum ScoringModel {
    Density(IsolationForest),
    Classifier(LogisticClassifier),
    Ensemble(Ensemble),
}

impl ScoringModel {
    /// Checks the estimator accepts rows of `n_features`
    pub(crate) fn validate(&self, n_features: usize) -> Result<(), String> {
        match self {
            ScoringModel::Density(forest) => {
                if forest.n_features() != n_features {
                    return Err(format!(
                        "isolation forest expects {} features, schema has {n_features}",
                        forest.n_features()
                    ));
                }
                forest.validate()
            }
            ScoringModel::Classifier(classifier) => {
                if classifier.weights.len() != n_features {
                    return Err(format!(
                        "classifier expects {} features, schema has {n_features}",
                        classifier.weights.len()
                    ));
                }
                classifier.validate()
            }
            ScoringModel::Ensemble(ensemble) => {
                if ensemble.members.is_empty() {
                    return Err("ensemble has no members".to_string());
                }
                if ensemble.members.iter().any(|m| !(m.weight.is_finite() && m.weight > 0.0)) {
                    return Err("ensemble weights must be finite and positive".to_string());
                }
                ensemble
                    .members
                    .iter()
                    .try_for_each(|m| m.model.validate(n_features))
            }
        }
    }
}

impl RiskEstimator for ScoringModel {
    fn estimate(&self, x: &[f64]) -> f64 {
        match self {
            ScoringModel::Density(forest) => forest.estimate(x),
            ScoringModel::Classifier(classifier) => classifier.estimate(x),
            ScoringModel::Ensemble(ensemble) => ensemble.estimate(x),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ScoringModel::Density(forest) => forest.name(),
            ScoringModel::Classifier(classifier) => classifier.name(),
            ScoringModel::Ensemble(ensemble) => ensemble.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(weight: f64, intercept: f64) -> ScoringModel {
        ScoringModel::Classifier(LogisticClassifier::new(vec![weight], intercept))
    }

    #[test]
    fn test_weighted_average() {
        let ensemble = Ensemble::new(vec![
            EnsembleMember {
                weight: 3.0,
                model: classifier(0.0, 0.0),
            },
            EnsembleMember {
                weight: 1.0,
                model: classifier(0.0, 100.0),
            },
        ]);
        // 0.75 * 0.5 + 0.25 * 1.0
        assert!((ensemble.estimate(&[1.0]) - 0.625).abs() < 1e-9);
    }

    #[test]
    fn test_validate_rejects_width_mismatch() {
        let model = classifier(1.0, 0.0);
        assert!(model.validate(1).is_ok());
        assert!(model.validate(2).is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_weight() {
        let model = ScoringModel::Ensemble(Ensemble::new(vec![EnsembleMember {
            weight: 0.0,
            model: classifier(1.0, 0.0),
        }]));
        assert!(model.validate(1).is_err());
    }
}
