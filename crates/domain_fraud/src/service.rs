//! Scoring service
//!
//! Orchestrates feature building, scoring, explanation and routing for single
//! claims and batches. A claim-level failure rejects only that claim; model
//! and configuration failures abort the request.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use tracing::{error, info, warn};

use core_kernel::ClaimId;
use crate::claim::ClaimRecord;
use crate::config::ScoringConfig;
use crate::drift::DriftDetected;
use crate::error::{FraudError, Stage};
use crate::events::CaseManagementSink;
use crate::explainer::{Explainer, Explanation};
use crate::model::{ModelSelector, ModelVersion, ModelVersionId};
use crate::registry::ModelRegistry;
use crate::router::{Action, DecisionRouter, Disposition, PolicyThresholds};
use crate::scorer::{AnomalyScorer, ScoreResult};

/// Claims to score and the model to score them with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub claims: Vec<ClaimRecord>,
    #[serde(default)]
    pub model: ModelSelector,
}

/// Everything produced for a successfully scored claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimDecision {
    pub score: ScoreResult,
    pub explanation: Explanation,
    pub disposition: Disposition,
    /// Features filled by imputation
    pub imputed: Vec<String>,
}

/// Why a claim was not scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimFailure {
    pub claim_id: ClaimId,
    pub stage: Stage,
    pub model_version: Option<ModelVersionId>,
    pub error: String,
    pub retryable: bool,
}

impl ClaimFailure {
    fn from_error(claim_id: ClaimId, model_version: &ModelVersionId, err: &FraudError) -> Self {
        Self {
            claim_id,
            stage: err.stage(),
            model_version: Some(err.model_version().unwrap_or(model_version).clone()),
            error: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Per-claim result, 1:1 with the request's claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClaimOutcome {
    Scored(ClaimDecision),
    Rejected(ClaimFailure),
}

impl ClaimOutcome {
    pub fn claim_id(&self) -> ClaimId {
        match self {
            ClaimOutcome::Scored(decision) => decision.score.claim_id,
            ClaimOutcome::Rejected(failure) => failure.claim_id,
        }
    }

    pub fn decision(&self) -> Option<&ClaimDecision> {
        match self {
            ClaimOutcome::Scored(decision) => Some(decision),
            ClaimOutcome::Rejected(_) => None,
        }
    }
}

/// Disposition counts for a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub fast_track: usize,
    pub review: usize,
    pub investigate: usize,
    pub rejected: usize,
}

impl BatchSummary {
    fn from_outcomes(outcomes: &[ClaimOutcome]) -> Self {
        let mut summary = BatchSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                ClaimOutcome::Scored(decision) => match decision.disposition.action {
                    Action::FastTrack => summary.fast_track += 1,
                    Action::Review => summary.review += 1,
                    Action::Investigate => summary.investigate += 1,
                },
                ClaimOutcome::Rejected(_) => summary.rejected += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResponse {
    pub model_version: ModelVersionId,
    pub outcomes: Vec<ClaimOutcome>,
    pub summary: BatchSummary,
}

/// Scoring pipeline bound to a registry and case management sink
pub struct ScoringService {
    config: ScoringConfig,
    thresholds: RwLock<PolicyThresholds>,
    registry: Arc<ModelRegistry>,
    scorer: AnomalyScorer,
    explainer: Explainer,
    router: DecisionRouter,
}

impl ScoringService {
    /// # Errors
    ///
    /// `FraudError::Configuration` when the config is invalid.
    pub fn new(
        config: ScoringConfig,
        registry: Arc<ModelRegistry>,
        case_sink: Arc<dyn CaseManagementSink>,
    ) -> Result<Self, FraudError> {
        config.validate()?;
        Ok(Self {
            thresholds: RwLock::new(config.thresholds),
            explainer: Explainer::new(config.explanation.clone()),
            router: DecisionRouter::new(case_sink, config.explanation.top_n),
            scorer: AnomalyScorer::new(),
            registry,
            config,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Thresholds currently used for routing
    pub fn thresholds(&self) -> PolicyThresholds {
        *self.thresholds.read()
    }

    /// Replaces the routing thresholds after validating them
    pub fn reload_thresholds(&self, thresholds: PolicyThresholds) -> Result<(), FraudError> {
        thresholds.validate()?;
        *self.thresholds.write() = thresholds;
        info!(
            review = thresholds.review,
            investigate = thresholds.investigate,
            "Routing thresholds reloaded"
        );
        Ok(())
    }

    /// Scores a single claim
    pub fn score_claim(&self, claim: &ClaimRecord, selector: &ModelSelector) -> Result<ClaimDecision, FraudError> {
        let model = self.registry.resolve(&self.config.model_family, selector)?;
        let thresholds = self.thresholds();
        Self::preflight(&model, &thresholds)?;
        self.process(claim, &model, &thresholds).map_err(|err| {
            if let FraudError::InputShape { .. } = err {
                error!(model_version = %model.version_id, error = %err, "Model does not match its feature schema");
            }
            err
        })
    }

    /// Scores every claim of a request against one resolved model version
    ///
    /// # Errors
    ///
    /// Request-fatal errors only; claim-level failures are returned as
    /// [`ClaimOutcome::Rejected`].
    pub fn score_request(&self, request: &ScoringRequest) -> Result<ScoringResponse, FraudError> {
        let model = self.registry.resolve(&self.config.model_family, &request.model)?;
        self.score_with(&request.claims, &model)
    }

    /// Request-fatal conditions are checked before any claim is processed,
    /// so a failed request emits no routing events or drift samples.
    /// Routing and monitoring side effects are not rolled back otherwise.
    fn score_with(&self, claims: &[ClaimRecord], model: &ModelVersion) -> Result<ScoringResponse, FraudError> {
        let thresholds = self.thresholds();
        Self::preflight(model, &thresholds)?;

        let results = if claims.len() >= self.config.batch.parallel_threshold {
            self.process_parallel(claims, model, &thresholds)
        } else {
            claims
                .iter()
                .map(|claim| self.process(claim, model, &thresholds))
                .collect()
        };

        let mut outcomes = Vec::with_capacity(results.len());
        for (claim, result) in claims.iter().zip(results) {
            match result {
                Ok(decision) => outcomes.push(ClaimOutcome::Scored(decision)),
                Err(err) if err.is_request_fatal() => {
                    if let FraudError::InputShape { .. } = err {
                        error!(model_version = %model.version_id, error = %err, "Model does not match its feature schema");
                    }
                    return Err(err);
                }
                Err(err) => {
                    warn!(claim_id = %claim.claim_id, stage = %err.stage(), error = %err, "Claim rejected");
                    outcomes.push(ClaimOutcome::Rejected(ClaimFailure::from_error(
                        claim.claim_id,
                        &model.version_id,
                        &err,
                    )));
                }
            }
        }

        let summary = BatchSummary::from_outcomes(&outcomes);
        info!(
            model_version = %model.version_id,
            total = summary.total,
            fast_track = summary.fast_track,
            review = summary.review,
            investigate = summary.investigate,
            rejected = summary.rejected,
            "Scoring request completed"
        );
        Ok(ScoringResponse {
            model_version: model.version_id.clone(),
            outcomes,
            summary,
        })
    }

    fn preflight(model: &ModelVersion, thresholds: &PolicyThresholds) -> Result<(), FraudError> {
        thresholds.validate()?;
        let expected = model.input_len();
        if model.scaler.len() != expected || model.baseline.len() != expected {
            let err = FraudError::InputShape {
                model_version: model.version_id.clone(),
                expected: format!("{expected} features"),
                actual: format!(
                    "scaler {} / baseline {} columns",
                    model.scaler.len(),
                    model.baseline.len()
                ),
            };
            error!(model_version = %model.version_id, error = %err, "Model does not match its feature schema");
            return Err(err);
        }
        Ok(())
    }

    /// Feeds a realised outcome to the drift monitor of the version that scored it
    pub fn record_outcome(&self, score: &ScoreResult, is_fraud: bool) -> Option<DriftDetected> {
        self.registry.record_outcome(score, Some(is_fraud))
    }

    fn process(
        &self,
        claim: &ClaimRecord,
        model: &ModelVersion,
        thresholds: &PolicyThresholds,
    ) -> Result<ClaimDecision, FraudError> {
        let vector = model.feature_builder().build(claim)?;
        let score = self.scorer.score(&vector, model)?;
        let explanation = self.explainer.explain(model, &vector, &score)?;
        let disposition = self.router.route(&score, &explanation, thresholds)?;
        self.registry.record_outcome(&score, None);

        Ok(ClaimDecision {
            score,
            explanation,
            disposition,
            imputed: vector.imputed,
        })
    }

    /// Splits the batch into contiguous chunks scored on scoped threads;
    /// results come back in input order
    fn process_parallel(
        &self,
        claims: &[ClaimRecord],
        model: &ModelVersion,
        thresholds: &PolicyThresholds,
    ) -> Vec<Result<ClaimDecision, FraudError>> {
        let workers = self.config.batch.max_workers.clamp(1, claims.len().max(1));
        let chunk_size = claims.len().div_ceil(workers).max(1);

        thread::scope(|scope| {
            let handles: Vec<_> = claims
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|claim| self.process(claim, model, thresholds))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::ClaimType;
    use crate::drift::DriftConfig;
    use crate::events::InMemorySink;
    use crate::explainer::ExplainerConfig;
    use crate::config::BatchConfig;
    use crate::model::fixtures::small_model;
    use chrono::{NaiveDate, TimeZone, Utc};
    use core_kernel::{Currency, Money, PartyId, PolicyId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn config(parallel_threshold: usize) -> ScoringConfig {
        ScoringConfig {
            model_family: "claims".to_string(),
            thresholds: PolicyThresholds {
                review: 0.3,
                investigate: 0.7,
            },
            explanation: ExplainerConfig {
                tolerance: 1e-3,
                permutations: 4,
                top_n: 3,
            },
            drift: DriftConfig {
                window_size: 500,
                min_samples: 200,
                psi_threshold: 0.2,
                min_labeled: 100,
                calibration_gap_threshold: 0.1,
            },
            batch: BatchConfig {
                parallel_threshold,
                max_workers: 3,
            },
        }
    }

    fn service(parallel_threshold: usize) -> (ScoringService, Arc<InMemorySink>) {
        let sink = Arc::new(InMemorySink::new());
        let registry = Arc::new(ModelRegistry::new(config(parallel_threshold).drift, sink.clone()));
        registry.register(small_model("unit-v1")).unwrap();
        let service = ScoringService::new(config(parallel_threshold), registry, sink.clone()).unwrap();
        (service, sink)
    }

    fn claim(amount: u32) -> ClaimRecord {
        ClaimRecord::new(
            PolicyId::new(),
            PartyId::new(),
            ClaimType::Death,
            NaiveDate::from_ymd_opt(2021, 5, 1).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        )
        .with_amount(Money::new(Decimal::from(amount), Currency::USD))
        .with_premium(Money::new(dec!(1500), Currency::USD))
    }

    #[test]
    fn test_bad_claim_does_not_abort_batch() {
        let (service, sink) = service(100);
        let mut broken = claim(5_000);
        broken.claim_amount = None;
        let request = ScoringRequest {
            claims: vec![claim(5_000), broken.clone(), claim(90_000)],
            model: ModelSelector::Active,
        };

        let response = service.score_request(&request).unwrap();
        assert_eq!(response.outcomes.len(), 3);
        assert_eq!(response.summary.rejected, 1);
        match &response.outcomes[1] {
            ClaimOutcome::Rejected(failure) => {
                assert_eq!(failure.claim_id, broken.claim_id);
                assert_eq!(failure.stage, Stage::FeatureBuild);
                assert!(!failure.retryable);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(sink.routing_events().len(), 2);
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let claims: Vec<ClaimRecord> = (1..=10).map(|i| claim(i * 7_500)).collect();
        let request = ScoringRequest {
            claims,
            model: ModelSelector::Active,
        };
        let (sequential, _) = service(100);
        let (parallel, _) = service(2);

        let a = sequential.score_request(&request).unwrap();
        let b = parallel.score_request(&request).unwrap();
        for (x, y) in a.outcomes.iter().zip(&b.outcomes) {
            assert_eq!(x.claim_id(), y.claim_id());
            let (x, y) = (x.decision().unwrap(), y.decision().unwrap());
            assert_eq!(x.score.risk_score.to_bits(), y.score.risk_score.to_bits());
            assert_eq!(x.explanation.contributions, y.explanation.contributions);
        }
    }

    #[test]
    fn test_unknown_version_aborts_request() {
        let (service, _) = service(100);
        let request = ScoringRequest {
            claims: vec![claim(1_000)],
            model: ModelSelector::Version(ModelVersionId::new("missing")),
        };
        assert!(matches!(
            service.score_request(&request),
            Err(FraudError::ModelUnavailable { .. })
        ));
    }

    #[test]
    fn test_mismatched_model_fails_before_any_side_effect() {
        let (service, sink) = service(2);
        let mut model = small_model("unit-broken");
        model.scaler.means.pop();
        model.scaler.stds.pop();

        let claims: Vec<ClaimRecord> = (1..=4).map(|i| claim(i * 10_000)).collect();
        let err = service.score_with(&claims, &model).unwrap_err();

        assert!(matches!(err, FraudError::InputShape { .. }));
        assert!(sink.routing_events().is_empty());
        assert!(sink.samples().is_empty());
    }

    #[test]
    fn test_reload_thresholds_validates() {
        let (service, _) = service(100);
        assert!(service
            .reload_thresholds(PolicyThresholds {
                review: 0.8,
                investigate: 0.4
            })
            .is_err());
        assert_eq!(service.thresholds().review, 0.3);

        service
            .reload_thresholds(PolicyThresholds {
                review: 0.2,
                investigate: 0.5,
            })
            .unwrap();
        assert_eq!(service.thresholds().investigate, 0.5);
    }
}
