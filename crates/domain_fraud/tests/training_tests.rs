//! Training tests on seeded synthetic claims

use domain_fraud::training::{roc_auc, CalibrationMethod};
use domain_fraud::{
    FeatureBuilder, FeatureSchema, FraudError, ModelSelector, ModelVersion, Trainer, TrainingParams,
    VersionStatus,
};
use test_utils::*;

fn trained(params: TrainingParams) -> domain_fraud::TrainedModel {
    Trainer::new(params)
        .train(FeatureSchema::standard(REFERENCE_SCHEMA), &synthetic_claims(1_200, 21))
        .expect("synthetic claims train")
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[test]
fn test_trained_model_ranks_fraud_above_legitimate_claims() {
    let result = trained(TrainingParams::new("trained-1", REFERENCE_FAMILY, 5));
    let model = &result.model;
    let builder = FeatureBuilder::new(&model.feature_schema);

    let fresh = synthetic_claims(600, 77);
    let (mut fraud, mut legit) = (Vec::new(), Vec::new());
    let mut labels = Vec::new();
    let mut scores = Vec::new();
    for labeled in &fresh {
        let vector = builder.build(&labeled.claim).unwrap();
        let score = model.risk(&vector.values);
        assert!((0.0..=1.0).contains(&score));
        if labeled.is_fraud {
            fraud.push(score);
        } else {
            legit.push(score);
        }
        labels.push(labeled.is_fraud);
        scores.push(score);
    }

    assert!(mean(&fraud) > mean(&legit), "fraud {} vs legit {}", mean(&fraud), mean(&legit));
    assert!(roc_auc(&scores, &labels).unwrap() > 0.7);
    assert!(result.report.training_auc > 0.7);
    assert_eq!(result.report.rows_rejected, 0);
}

#[test]
fn test_training_is_reproducible_for_a_seed() {
    let a = trained(TrainingParams::new("trained-1", REFERENCE_FAMILY, 5));
    let b = trained(TrainingParams::new("trained-1", REFERENCE_FAMILY, 5));
    assert_eq!(a.model.model, b.model.model);
    assert_eq!(a.model.calibration, b.model.calibration);
    assert_eq!(a.report, b.report);
}

#[test]
fn test_isotonic_calibration_trains() {
    let mut params = TrainingParams::new("trained-iso", REFERENCE_FAMILY, 9);
    params.calibration = CalibrationMethod::Isotonic;
    let result = trained(params);
    result.model.validate().unwrap();
    assert!(result.report.training_auc > 0.7);
}

#[test]
fn test_trained_model_round_trips_through_the_registry() {
    let result = trained(TrainingParams::new("trained-json", REFERENCE_FAMILY, 13));
    let json = result.model.to_json_pretty().unwrap();
    let restored = ModelVersion::from_json_str(&json).unwrap();
    assert_eq!(restored, result.model);

    let harness = ScoringHarness::with_models(reference_config(), vec![]);
    assert_eq!(harness.registry.register(restored).unwrap(), VersionStatus::Active);

    let claim = ScenarioClaims::suspicious_large_claim();
    let decision = harness.service.score_claim(&claim, &ModelSelector::Active).unwrap();
    let vector = FeatureBuilder::new(&result.model.feature_schema).build(&claim).unwrap();
    assert_eq!(
        decision.score.risk_score.to_bits(),
        result.model.risk(&vector.values).to_bits()
    );
    assert_explanation_consistent(&decision.explanation, reference_config().explanation.tolerance);
}

#[test]
fn test_single_class_data_is_rejected() {
    let legit: Vec<_> = synthetic_claims(400, 4).into_iter().filter(|c| !c.is_fraud).collect();
    let err = Trainer::new(TrainingParams::new("one-class", REFERENCE_FAMILY, 1))
        .train(FeatureSchema::standard(REFERENCE_SCHEMA), &legit)
        .unwrap_err();
    assert!(matches!(err, FraudError::Training(_)));
}

#[test]
fn test_too_few_rows_rejected() {
    let err = Trainer::new(TrainingParams::new("tiny", REFERENCE_FAMILY, 1))
        .train(FeatureSchema::standard(REFERENCE_SCHEMA), &synthetic_claims(10, 4))
        .unwrap_err();
    assert!(matches!(err, FraudError::Training(_)));
}
