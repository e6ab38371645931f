//! Scoring configuration
//!
//! Every field is explicit; there are no serde defaults, so a config file that
//! omits a threshold fails to load instead of silently routing with a guess.

use serde::{Deserialize, Serialize};

use crate::drift::DriftConfig;
use crate::error::FraudError;
use crate::explainer::ExplainerConfig;
use crate::router::PolicyThresholds;

/// Batch execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Batches at least this large are scored on worker threads
    pub parallel_threshold: usize,
    pub max_workers: usize,
}

/// Configuration of the scoring core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Model family served for `active` requests
    pub model_family: String,
    pub thresholds: PolicyThresholds,
    pub explanation: ExplainerConfig,
    pub drift: DriftConfig,
    pub batch: BatchConfig,
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), FraudError> {
        if self.model_family.trim().is_empty() {
            return Err(FraudError::configuration("model_family must not be empty"));
        }
        self.thresholds.validate()?;
        self.explanation.validate()?;
        self.drift.validate()?;
        if self.batch.max_workers == 0 || self.batch.parallel_threshold == 0 {
            return Err(FraudError::configuration(
                "batch max_workers and parallel_threshold must be at least 1",
            ));
        }
        Ok(())
    }
}
