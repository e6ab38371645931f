//! Drift monitoring
//!
//! Each model version gets a monitor that compares recent scores against the
//! score histogram recorded at training time, and recent realised outcomes
//! against the scores that predicted them. Signals are advisory only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::FraudError;
use crate::model::{ModelVersionId, ScoreHistogram};

/// Floor applied to bin proportions so empty bins do not blow up the PSI
const PSI_EPSILON: f64 = 1e-4;

/// Drift thresholds and window sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Scores kept in the rolling window
    pub window_size: usize,
    /// Scores required before the PSI is evaluated
    pub min_samples: usize,
    /// PSI above which score drift is reported
    pub psi_threshold: f64,
    /// Labelled outcomes required before calibration is evaluated
    pub min_labeled: usize,
    /// Largest tolerated gap between mean predicted risk and observed fraud rate
    pub calibration_gap_threshold: f64,
}

impl DriftConfig {
    pub fn validate(&self) -> Result<(), FraudError> {
        if self.window_size == 0 || self.min_samples == 0 || self.min_samples > self.window_size {
            return Err(FraudError::configuration(format!(
                "drift min_samples ({}) must be between 1 and window_size ({})",
                self.min_samples, self.window_size
            )));
        }
        if self.min_labeled == 0 || self.min_labeled > self.window_size {
            return Err(FraudError::configuration(format!(
                "drift min_labeled ({}) must be between 1 and window_size ({})",
                self.min_labeled, self.window_size
            )));
        }
        if !(self.psi_threshold.is_finite() && self.psi_threshold > 0.0) {
            return Err(FraudError::configuration("drift psi_threshold must be positive"));
        }
        if !(self.calibration_gap_threshold.is_finite() && self.calibration_gap_threshold > 0.0) {
            return Err(FraudError::configuration("drift calibration_gap_threshold must be positive"));
        }
        Ok(())
    }
}

/// What drifted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriftKind {
    /// Recent scores no longer match the training distribution
    ScoreDistribution { psi: f64 },
    /// Predicted risk no longer matches observed fraud
    OutcomeCalibration { mean_predicted: f64, observed_rate: f64 },
}

/// Advisory retraining signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftDetected {
    pub model_version: ModelVersionId,
    pub kind: DriftKind,
    /// Observations the signal was computed over
    pub samples: usize,
    pub detected_at: DateTime<Utc>,
}

/// Rolling drift state for one model version
#[derive(Debug, Clone)]
pub struct DriftMonitor {
    model_version: ModelVersionId,
    reference: ScoreHistogram,
    config: DriftConfig,
    scores: VecDeque<f64>,
    outcomes: VecDeque<(f64, bool)>,
}

impl DriftMonitor {
    pub fn new(model_version: ModelVersionId, reference: ScoreHistogram, config: DriftConfig) -> Self {
        Self {
            model_version,
            reference,
            scores: VecDeque::with_capacity(config.window_size),
            outcomes: VecDeque::with_capacity(config.window_size),
            config,
        }
    }

    pub fn model_version(&self) -> &ModelVersionId {
        &self.model_version
    }

    pub fn window_len(&self) -> usize {
        self.scores.len()
    }

    /// Adds a score; reports drift and restarts the window when the PSI
    /// crosses the threshold
    pub fn observe_score(&mut self, risk_score: f64) -> Option<DriftDetected> {
        push_bounded(&mut self.scores, risk_score, self.config.window_size);
        if self.scores.len() < self.config.min_samples {
            return None;
        }

        let window: Vec<f64> = self.scores.iter().copied().collect();
        let actual = ScoreHistogram::from_scores(&window, self.reference.bins());
        let psi = population_stability_index(&self.reference.proportions, &actual.proportions);
        if psi <= self.config.psi_threshold {
            return None;
        }

        let samples = self.scores.len();
        self.scores.clear();
        Some(self.signal(DriftKind::ScoreDistribution { psi }, samples))
    }

    /// Adds a realised outcome for a previously scored claim
    pub fn observe_outcome(&mut self, risk_score: f64, is_fraud: bool) -> Option<DriftDetected> {
        push_bounded(&mut self.outcomes, (risk_score, is_fraud), self.config.window_size);
        if self.outcomes.len() < self.config.min_labeled {
            return None;
        }

        let n = self.outcomes.len() as f64;
        let mean_predicted = self.outcomes.iter().map(|(s, _)| s).sum::<f64>() / n;
        let observed_rate = self.outcomes.iter().filter(|(_, y)| *y).count() as f64 / n;
        if (mean_predicted - observed_rate).abs() <= self.config.calibration_gap_threshold {
            return None;
        }

        let samples = self.outcomes.len();
        self.outcomes.clear();
        Some(self.signal(
            DriftKind::OutcomeCalibration {
                mean_predicted,
                observed_rate,
            },
            samples,
        ))
    }

    fn signal(&self, kind: DriftKind, samples: usize) -> DriftDetected {
        DriftDetected {
            model_version: self.model_version.clone(),
            kind,
            samples,
            detected_at: Utc::now(),
        }
    }
}

fn push_bounded<T>(window: &mut VecDeque<T>, value: T, capacity: usize) {
    if window.len() == capacity {
        window.pop_front();
    }
    window.push_back(value);
}

/// `sum((actual - expected) * ln(actual / expected))` over matching bins
pub fn population_stability_index(expected: &[f64], actual: &[f64]) -> f64 {
    expected
        .iter()
        .zip(actual)
        .map(|(&e, &a)| {
            let e = e.max(PSI_EPSILON);
            let a = a.max(PSI_EPSILON);
            (a - e) * (a / e).ln()
        })
        .sum()
}
