//! Model versions
//!
//! A [`ModelVersion`] is an immutable, serialisable artifact holding
//! everything inference needs: the feature schema, the standardiser, the
//! estimator tree, the calibration map, and the references used by the
//! explainer and drift monitor.

pub mod calibration;
pub mod classifier;
pub mod ensemble;
pub mod isolation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::FraudError;
use crate::features::{FeatureBuilder, FeatureSchema};

pub use calibration::Calibration;
pub use classifier::{ClassifierParams, LogisticClassifier};
pub use ensemble::{Ensemble, EnsembleMember, RiskEstimator, ScoringModel};
pub use isolation::{IsolationForest, IsolationParams};

/// Model version identifier, e.g. `fraud-2024.06`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelVersionId(String);

impl ModelVersionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelVersionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Reserved selector value; no version may use it as its id
const ACTIVE_SELECTOR: &str = "active";

/// Which model a request wants: the family's active version or a pinned one
///
/// Serialised as `"active"` or the version id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelSelector {
    #[default]
    Active,
    Version(ModelVersionId),
}

impl From<String> for ModelSelector {
    fn from(value: String) -> Self {
        if value == ACTIVE_SELECTOR {
            ModelSelector::Active
        } else {
            ModelSelector::Version(ModelVersionId(value))
        }
    }
}

impl From<ModelSelector> for String {
    fn from(selector: ModelSelector) -> Self {
        match selector {
            ModelSelector::Active => ACTIVE_SELECTOR.to_string(),
            ModelSelector::Version(id) => id.0,
        }
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSelector::Active => f.write_str(ACTIVE_SELECTOR),
            ModelSelector::Version(id) => write!(f, "{id}"),
        }
    }
}

/// Per-feature standardisation fitted at training time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl Scaler {
    /// Fits means and population standard deviations; constant columns get std 1
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let n_features = rows.first().map(Vec::len).unwrap_or(0);
        let n = rows.len().max(1) as f64;
        let mut means = vec![0.0; n_features];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let mut stds = vec![0.0; n_features];
        for row in rows {
            for ((s, v), m) in stds.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2) / n;
            }
        }
        for s in stds.iter_mut() {
            *s = if *s > 1e-12 { s.sqrt() } else { 1.0 };
        }
        Self { means, stds }
    }

    pub fn transform(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }
}

/// Equal-width histogram of risk scores over [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistogram {
    /// Share of scores falling in each bin; sums to 1
    pub proportions: Vec<f64>,
}

impl ScoreHistogram {
    pub fn from_scores(scores: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let mut counts = vec![0.0; bins];
        for &s in scores {
            counts[Self::bin_index(s, bins)] += 1.0;
        }
        let total = scores.len().max(1) as f64;
        Self {
            proportions: counts.into_iter().map(|c| c / total).collect(),
        }
    }

    pub fn uniform(bins: usize) -> Self {
        let bins = bins.max(1);
        Self {
            proportions: vec![1.0 / bins as f64; bins],
        }
    }

    pub fn bins(&self) -> usize {
        self.proportions.len()
    }

    /// Proportions must be finite, non-negative and sum to 1
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.bins() < 2 {
            return Err("reference distribution needs at least two bins".to_string());
        }
        if self.proportions.iter().any(|p| !(p.is_finite() && *p >= 0.0)) {
            return Err("reference distribution proportions must be finite and non-negative".to_string());
        }
        let total: f64 = self.proportions.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(format!("reference distribution proportions sum to {total}, expected 1"));
        }
        Ok(())
    }

    pub fn bin_index(score: f64, bins: usize) -> usize {
        let clamped = score.clamp(0.0, 1.0);
        ((clamped * bins as f64) as usize).min(bins - 1)
    }
}

/// An immutable, fully loaded model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub version_id: ModelVersionId,
    /// Model family; at most one version per family is active
    pub family: String,
    pub trained_at: DateTime<Utc>,
    /// Seed that fixed every stochastic choice made for this version
    pub random_seed: u64,
    pub feature_schema: FeatureSchema,
    pub scaler: Scaler,
    pub model: ScoringModel,
    pub calibration: Calibration,
    /// Reference feature vector (raw units) explanations are measured from
    pub baseline: Vec<f64>,
    /// Non-negative per-feature importance used by the fallback explanation
    pub global_importance: Vec<f64>,
    /// Score distribution at training time, the drift reference
    pub reference_distribution: ScoreHistogram,
}

impl ModelVersion {
    pub fn input_len(&self) -> usize {
        self.feature_schema.len()
    }

    pub fn feature_builder(&self) -> FeatureBuilder<'_> {
        FeatureBuilder::new(&self.feature_schema)
    }

    /// Name of the top-level estimator
    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    /// Raw ensemble output for a raw feature row
    pub fn raw_score(&self, features: &[f64]) -> f64 {
        self.model.estimate(&self.scaler.transform(features))
    }

    /// Calibrated risk for a raw feature row
    ///
    /// Callers must have checked the row length against the schema.
    pub fn risk(&self, features: &[f64]) -> f64 {
        self.calibration.apply(self.raw_score(features))
    }

    /// Risk of the baseline vector
    pub fn baseline_score(&self) -> f64 {
        self.risk(&self.baseline)
    }

    /// Checks every component agrees with the schema width and is well formed
    pub fn validate(&self) -> Result<(), FraudError> {
        self.feature_schema.validate()?;
        let n = self.input_len();
        let invalid = |reason: String| {
            FraudError::configuration(format!("model {} is invalid: {reason}", self.version_id))
        };

        if self.scaler.len() != n || self.scaler.stds.len() != n {
            return Err(invalid(format!("scaler has {} columns, schema has {n}", self.scaler.len())));
        }
        if self.scaler.stds.iter().any(|s| !(s.is_finite() && *s > 0.0))
            || self.scaler.means.iter().any(|m| !m.is_finite())
        {
            return Err(invalid("scaler must be finite with positive deviations".to_string()));
        }
        if self.baseline.len() != n || self.baseline.iter().any(|v| !v.is_finite()) {
            return Err(invalid(format!("baseline must have {n} finite values")));
        }
        if self.global_importance.len() != n
            || self.global_importance.iter().any(|v| !(v.is_finite() && *v >= 0.0))
        {
            return Err(invalid(format!("global importance must have {n} non-negative values")));
        }
        if self.version_id.as_str() == ACTIVE_SELECTOR {
            return Err(invalid(format!("`{ACTIVE_SELECTOR}` is reserved for the active selector")));
        }
        self.reference_distribution.validate().map_err(invalid)?;
        self.model.validate(n).map_err(invalid)?;
        self.calibration.validate().map_err(invalid)?;
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, FraudError> {
        let model: ModelVersion = serde_json::from_str(json)
            .map_err(|e| FraudError::configuration(format!("cannot parse model version: {e}")))?;
        model.validate()?;
        Ok(model)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FraudError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            FraudError::configuration(format!("cannot read model file {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String, FraudError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| FraudError::configuration(format!("cannot serialise model {}: {e}", self.version_id)))
    }
}
