//! Model training
//!
//! Fits a complete [`ModelVersion`] from labelled claims: standardiser,
//! isolation forest, logistic classifier, ensemble weights, calibration,
//! explanation baseline, global importances and the reference score
//! histogram used for drift monitoring. Feature vectors come from the same
//! [`FeatureBuilder`] used at serving time.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::claim::LabeledClaim;
use crate::error::FraudError;
use crate::features::{FeatureBuilder, FeatureSchema};
use crate::model::{
    Calibration, ClassifierParams, Ensemble, EnsembleMember, IsolationForest, IsolationParams,
    LogisticClassifier, ModelVersion, ModelVersionId, RiskEstimator, Scaler, ScoreHistogram,
    ScoringModel,
};

/// Fewest usable rows a model can be fitted on
const MIN_TRAINING_ROWS: usize = 20;

/// Calibration fitted on the training scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMethod {
    Sigmoid,
    Isotonic,
}

/// Training settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub version_id: ModelVersionId,
    pub family: String,
    /// Seeds the split, the forest and the explainer orderings
    pub seed: u64,
    pub isolation: IsolationParams,
    pub classifier: ClassifierParams,
    /// Ensemble weight of the isolation forest; zero drops it
    pub density_weight: f64,
    /// Ensemble weight of the classifier; zero drops it
    pub classifier_weight: f64,
    pub calibration: CalibrationMethod,
    pub histogram_bins: usize,
    /// Share of rows held out for evaluation
    pub holdout_fraction: f64,
}

impl TrainingParams {
    pub fn new(version_id: impl Into<String>, family: impl Into<String>, seed: u64) -> Self {
        Self {
            version_id: ModelVersionId::new(version_id),
            family: family.into(),
            seed,
            isolation: IsolationParams {
                n_trees: 100,
                sample_size: 256,
            },
            classifier: ClassifierParams {
                epochs: 300,
                learning_rate: 0.1,
                l2: 1e-3,
            },
            density_weight: 0.3,
            classifier_weight: 0.7,
            calibration: CalibrationMethod::Sigmoid,
            histogram_bins: 10,
            holdout_fraction: 0.2,
        }
    }

    fn validate(&self) -> Result<(), FraudError> {
        let weights_ok = [self.density_weight, self.classifier_weight]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0);
        if !weights_ok || self.density_weight + self.classifier_weight <= 0.0 {
            return Err(FraudError::Training(
                "ensemble weights must be non-negative with a positive sum".to_string(),
            ));
        }
        if !(0.0..0.9).contains(&self.holdout_fraction) {
            return Err(FraudError::Training(format!(
                "holdout fraction must be in [0, 0.9), got {}",
                self.holdout_fraction
            )));
        }
        if self.histogram_bins < 2 || self.isolation.n_trees == 0 || self.classifier.epochs == 0 {
            return Err(FraudError::Training(
                "histogram bins, tree count and epochs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Training diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub rows_used: usize,
    pub rows_rejected: usize,
    pub holdout_rows: usize,
    pub fraud_rate: f64,
    /// ROC AUC of calibrated scores on the training rows
    pub training_auc: f64,
    /// ROC AUC on the holdout, when it contains both classes
    pub holdout_auc: Option<f64>,
}

/// A fitted model and how it was fitted
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: ModelVersion,
    pub report: TrainingReport,
}

/// Fits model versions
#[derive(Debug, Clone)]
pub struct Trainer {
    params: TrainingParams,
}

impl Trainer {
    pub fn new(params: TrainingParams) -> Self {
        Self { params }
    }

    /// Trains a model version
    ///
    /// Claims that fail feature building are skipped and counted.
    ///
    /// # Errors
    ///
    /// `FraudError::Training` when too few rows remain or only one class is present.
    pub fn train(&self, schema: FeatureSchema, claims: &[LabeledClaim]) -> Result<TrainedModel, FraudError> {
        let params = &self.params;
        params.validate()?;
        schema.validate()?;

        let builder = FeatureBuilder::new(&schema);
        let mut rows = Vec::with_capacity(claims.len());
        let mut labels = Vec::with_capacity(claims.len());
        let mut rejected = 0;
        for labeled in claims {
            match builder.build(&labeled.claim) {
                Ok(vector) => {
                    rows.push(vector.values);
                    labels.push(labeled.is_fraud);
                }
                Err(err) => {
                    warn!(claim_id = %labeled.claim.claim_id, error = %err, "Skipping training claim");
                    rejected += 1;
                }
            }
        }

        if rows.len() < MIN_TRAINING_ROWS {
            return Err(FraudError::Training(format!(
                "{} usable rows, at least {MIN_TRAINING_ROWS} required",
                rows.len()
            )));
        }
        let positives = labels.iter().filter(|&&y| y).count();
        if positives == 0 || positives == labels.len() {
            return Err(FraudError::Training(
                "training data must contain both fraudulent and legitimate claims".to_string(),
            ));
        }

        let (train_idx, holdout_idx) = self.split(rows.len());
        let train_rows: Vec<Vec<f64>> = train_idx.iter().map(|&i| rows[i].clone()).collect();
        let train_labels: Vec<bool> = train_idx.iter().map(|&i| labels[i]).collect();

        let scaler = Scaler::fit(&train_rows);
        let scaled: Vec<Vec<f64>> = train_rows.iter().map(|r| scaler.transform(r)).collect();

        let forest = IsolationForest::fit(&scaled, &params.isolation, params.seed);
        let classifier = LogisticClassifier::fit(&scaled, &train_labels, &params.classifier);
        let global_importance = self.global_importance(&forest, &classifier);
        let model = self.ensemble(forest, classifier);

        let raw: Vec<f64> = scaled.iter().map(|x| model.estimate(x)).collect();
        let calibration = match params.calibration {
            CalibrationMethod::Sigmoid => Calibration::fit_sigmoid(&raw, &train_labels, 500, 1.0),
            CalibrationMethod::Isotonic => Calibration::fit_isotonic(&raw, &train_labels),
        };
        let calibrated: Vec<f64> = raw.iter().map(|&s| calibration.apply(s)).collect();
        let baseline = legitimate_median(&train_rows, &train_labels);

        let version = ModelVersion {
            version_id: params.version_id.clone(),
            family: params.family.clone(),
            trained_at: Utc::now(),
            random_seed: params.seed,
            reference_distribution: ScoreHistogram::from_scores(&calibrated, params.histogram_bins),
            feature_schema: schema,
            scaler,
            model,
            calibration,
            baseline,
            global_importance,
        };
        version.validate()?;

        let holdout_auc = if holdout_idx.is_empty() {
            None
        } else {
            let scores: Vec<f64> = holdout_idx.iter().map(|&i| version.risk(&rows[i])).collect();
            let truth: Vec<bool> = holdout_idx.iter().map(|&i| labels[i]).collect();
            roc_auc(&scores, &truth)
        };
        let report = TrainingReport {
            rows_used: rows.len(),
            rows_rejected: rejected,
            holdout_rows: holdout_idx.len(),
            fraud_rate: positives as f64 / labels.len() as f64,
            training_auc: roc_auc(&calibrated, &train_labels).unwrap_or(0.5),
            holdout_auc,
        };

        info!(
            model_version = %version.version_id,
            rows_used = report.rows_used,
            rows_rejected = report.rows_rejected,
            training_auc = report.training_auc,
            holdout_auc = ?report.holdout_auc,
            "Model trained"
        );
        Ok(TrainedModel { model: version, report })
    }

    /// Seeded shuffle, then the first `holdout_fraction` rows are held out
    fn split(&self, n: usize) -> (Vec<usize>, Vec<usize>) {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(self.params.seed));
        let holdout = ((n as f64) * self.params.holdout_fraction).floor() as usize;
        let train = indices.split_off(holdout);
        (train, indices)
    }

    fn ensemble(&self, forest: IsolationForest, classifier: LogisticClassifier) -> ScoringModel {
        let mut members = Vec::new();
        if self.params.classifier_weight > 0.0 {
            members.push(EnsembleMember {
                weight: self.params.classifier_weight,
                model: ScoringModel::Classifier(classifier),
            });
        }
        if self.params.density_weight > 0.0 {
            members.push(EnsembleMember {
                weight: self.params.density_weight,
                model: ScoringModel::Density(forest),
            });
        }
        if members.len() == 1 {
            return members.remove(0).model;
        }
        ScoringModel::Ensemble(Ensemble::new(members))
    }

    /// Blend of normalised classifier coefficient magnitudes and forest split
    /// frequencies, weighted like the ensemble and summing to one
    fn global_importance(&self, forest: &IsolationForest, classifier: &LogisticClassifier) -> Vec<f64> {
        let coefficients = normalise(classifier.weights.iter().map(|w| w.abs()).collect());
        let splits = normalise(forest.split_frequencies());
        let (wc, wd) = (self.params.classifier_weight, self.params.density_weight);
        let blended = coefficients
            .iter()
            .zip(&splits)
            .map(|(c, s)| (wc * c + wd * s) / (wc + wd))
            .collect();
        normalise(blended)
    }
}

fn normalise(mut values: Vec<f64>) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.iter_mut().for_each(|v| *v /= total);
    }
    values
}

/// Per-feature median of the legitimate rows, a typical legitimate claim
fn legitimate_median(rows: &[Vec<f64>], labels: &[bool]) -> Vec<f64> {
    let n_features = rows.first().map(Vec::len).unwrap_or(0);
    (0..n_features)
        .map(|j| {
            let mut column: Vec<f64> = rows
                .iter()
                .zip(labels)
                .filter(|(_, &y)| !y)
                .map(|(r, _)| r[j])
                .collect();
            column.sort_by(f64::total_cmp);
            match column.len() {
                0 => 0.0,
                len if len % 2 == 1 => column[len / 2],
                len => (column[len / 2 - 1] + column[len / 2]) / 2.0,
            }
        })
        .collect()
}

/// ROC AUC by the rank-sum statistic, ties sharing their average rank
///
/// `None` unless both classes are present.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> Option<f64> {
    let positives = labels.iter().filter(|&&y| y).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let average_rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            if labels[k] {
                rank_sum += average_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_data::SampleClaimGenerator;
    use chrono::TimeZone;

    fn claims(n: usize) -> Vec<LabeledClaim> {
        let as_of = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        SampleClaimGenerator::new(7, 0.15, as_of).unwrap().generate(n)
    }

    fn fast_params() -> TrainingParams {
        let mut params = TrainingParams::new("train-test", "claims", 7);
        params.isolation.n_trees = 20;
        params.isolation.sample_size = 64;
        params.classifier.epochs = 150;
        params.classifier.learning_rate = 0.2;
        params
    }

    #[test]
    fn test_roc_auc() {
        assert_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &[false, false, true, true]), Some(1.0));
        assert_eq!(roc_auc(&[0.9, 0.8, 0.2, 0.1], &[false, false, true, true]), Some(0.0));
        assert_eq!(roc_auc(&[0.5, 0.5], &[false, true]), Some(0.5));
        assert_eq!(roc_auc(&[0.5, 0.6], &[true, true]), None);
    }

    #[test]
    fn test_trained_model_is_valid_and_discriminates() {
        let trained = Trainer::new(fast_params())
            .train(FeatureSchema::standard("fs-train"), &claims(600))
            .unwrap();
        assert!(trained.model.validate().is_ok());
        assert_eq!(trained.report.rows_used, 600);
        assert_eq!(trained.report.holdout_rows, 120);
        assert!(trained.report.training_auc > 0.75);
        let total: f64 = trained.model.global_importance.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_class_rejected() {
        let legit: Vec<LabeledClaim> = claims(300).into_iter().filter(|c| !c.is_fraud).collect();
        let err = Trainer::new(fast_params())
            .train(FeatureSchema::standard("fs-train"), &legit)
            .unwrap_err();
        assert!(matches!(err, FraudError::Training(_)));
    }

    #[test]
    fn test_training_is_reproducible() {
        let data = claims(300);
        let a = Trainer::new(fast_params()).train(FeatureSchema::standard("fs-train"), &data).unwrap();
        let b = Trainer::new(fast_params()).train(FeatureSchema::standard("fs-train"), &data).unwrap();
        assert_eq!(a.model.model, b.model.model);
        assert_eq!(a.model.calibration, b.model.calibration);
        assert_eq!(a.report.training_auc, b.report.training_auc);
    }
}
