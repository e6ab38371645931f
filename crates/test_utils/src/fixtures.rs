//! Pre-built Test Fixtures
//!
//! Provides the reference model version, the reference scoring configuration
//! and scenario claims. The reference model is built once per test binary and
//! cached; its classifier coefficients are set by hand so scenario outcomes do
//! not depend on a training run.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use rust_decimal_macros::dec;

use core_kernel::{Currency, Money, PartyId, PolicyId};
use domain_fraud::config::BatchConfig;
use domain_fraud::model::{
    Calibration, Ensemble, EnsembleMember, IsolationForest, IsolationParams, LogisticClassifier,
    Scaler, ScoreHistogram,
};
use domain_fraud::sample_data::SampleClaimGenerator;
use domain_fraud::{
    BeneficiaryRelation, ClaimRecord, ClaimType, DriftConfig, ExplainerConfig, FeatureBuilder,
    FeatureSchema, LabeledClaim, ModelVersion, ModelVersionId, PolicyThresholds, ScoringConfig,
    ScoringModel,
};

/// Model family used throughout the test suite
pub const REFERENCE_FAMILY: &str = "claims";
/// Version id of the reference model
pub const REFERENCE_VERSION: &str = "fraud-ref-1";
/// Feature schema version of the reference model
pub const REFERENCE_SCHEMA: &str = "fs-2024.1";
/// Seed of the reference model
pub const REFERENCE_SEED: u64 = 42;

/// Per-feature (mean, std) in standard schema order
const SCALER: [(f64, f64); 16] = [
    (7.5, 1.2),     // log_claim_amount
    (2.0, 3.0),     // claim_to_premium_ratio
    (900.0, 700.0), // days_since_policy_start
    (0.4, 0.5),     // within_contestable_period
    (3000.0, 1200.0), // days_since_beneficiary_change
    (0.05, 0.2),    // recent_beneficiary_change
    (0.25, 0.5),    // previous_claims
    (45.0, 12.0),   // claimant_age
    (0.25, 0.43),
    (0.25, 0.43),
    (0.25, 0.43),
    (0.25, 0.43),
    (0.25, 0.43),
    (0.25, 0.43),
    (0.25, 0.43),
    (0.25, 0.43),
];

/// Classifier coefficients on standardised features, standard schema order
const COEFFICIENTS: [f64; 16] = [
    1.2, 0.6, -0.9, 0.5, -0.8, 0.9, 0.4, 0.0, // numeric
    0.0, 0.0, 0.0, 0.3, // claim type: death, disability, critical illness, accidental death
    0.0, 0.0, 0.0, 0.4, // beneficiary: spouse, child, parent, other
];

const INTERCEPT: f64 = -2.5;
const CLASSIFIER_WEIGHT: f64 = 0.7;
const DENSITY_WEIGHT: f64 = 0.3;

static REFERENCE_MODEL: Lazy<ModelVersion> = Lazy::new(build_reference_model);

/// Date the scenario and synthetic claims are generated relative to
pub fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap()
}

/// Seeded synthetic labelled claims
pub fn synthetic_claims(count: usize, seed: u64) -> Vec<LabeledClaim> {
    SampleClaimGenerator::new(seed, 0.15, as_of())
        .expect("valid fraud rate")
        .generate(count)
}

fn build_reference_model() -> ModelVersion {
    let schema = FeatureSchema::standard(REFERENCE_SCHEMA);
    let scaler = Scaler {
        means: SCALER.iter().map(|(m, _)| *m).collect(),
        stds: SCALER.iter().map(|(_, s)| *s).collect(),
    };

    let builder = FeatureBuilder::new(&schema);
    let raw_rows: Vec<Vec<f64>> = synthetic_claims(1_000, REFERENCE_SEED)
        .iter()
        .map(|c| builder.build(&c.claim).expect("synthetic claims are valid").values)
        .collect();
    let scaled: Vec<Vec<f64>> = raw_rows.iter().map(|r| scaler.transform(r)).collect();

    let params = IsolationParams {
        n_trees: 64,
        sample_size: 128,
    };
    let forest = IsolationForest::fit(&scaled, &params, REFERENCE_SEED);

    let coefficient_total: f64 = COEFFICIENTS.iter().map(|c| c.abs()).sum();
    let global_importance: Vec<f64> = COEFFICIENTS
        .iter()
        .zip(forest.split_frequencies())
        .map(|(c, s)| CLASSIFIER_WEIGHT * c.abs() / coefficient_total + DENSITY_WEIGHT * s)
        .collect();

    let model = ScoringModel::Ensemble(Ensemble::new(vec![
        EnsembleMember {
            weight: CLASSIFIER_WEIGHT,
            model: ScoringModel::Classifier(LogisticClassifier::new(COEFFICIENTS.to_vec(), INTERCEPT)),
        },
        EnsembleMember {
            weight: DENSITY_WEIGHT,
            model: ScoringModel::Density(forest),
        },
    ]));

    // Typical legitimate claim: $1,800 death claim, 900 days in, spouse beneficiary
    let mut baseline = vec![0.0; schema.len()];
    baseline[..8].copy_from_slice(&[1_800f64.ln_1p(), 1.0, 900.0, 0.0, 3650.0, 0.0, 0.0, 45.0]);
    baseline[8] = 1.0;
    baseline[12] = 1.0;

    let mut version = ModelVersion {
        version_id: ModelVersionId::new(REFERENCE_VERSION),
        family: REFERENCE_FAMILY.to_string(),
        trained_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        random_seed: REFERENCE_SEED,
        feature_schema: schema,
        scaler,
        model,
        calibration: Calibration::Sigmoid { a: 8.0, b: -4.0 },
        baseline,
        global_importance,
        reference_distribution: ScoreHistogram::uniform(10),
    };
    let scores: Vec<f64> = raw_rows.iter().map(|r| version.risk(r)).collect();
    version.reference_distribution = ScoreHistogram::from_scores(&scores, 10);
    version.validate().expect("reference model is valid");
    version
}

/// The reference model version
pub fn reference_model() -> ModelVersion {
    REFERENCE_MODEL.clone()
}

/// The reference model under a different version id
pub fn reference_model_with_version(version_id: &str) -> ModelVersion {
    let mut model = reference_model();
    model.version_id = ModelVersionId::new(version_id);
    model
}

/// Reference scoring configuration
pub fn reference_config() -> ScoringConfig {
    ScoringConfig {
        model_family: REFERENCE_FAMILY.to_string(),
        thresholds: PolicyThresholds {
            review: 0.3,
            investigate: 0.7,
        },
        explanation: ExplainerConfig {
            tolerance: 1e-3,
            permutations: 8,
            top_n: 5,
        },
        drift: DriftConfig {
            window_size: 200,
            min_samples: 100,
            psi_threshold: 0.2,
            min_labeled: 50,
            calibration_gap_threshold: 0.15,
        },
        batch: BatchConfig {
            parallel_threshold: 16,
            max_workers: 4,
        },
    }
}

/// Scenario claims with known expected dispositions
pub struct ScenarioClaims;

impl ScenarioClaims {
    pub fn policy_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    /// $150,000 accidental death claim submitted two days into the
    /// contestable period, beneficiary changed ten days before submission
    pub fn suspicious_large_claim() -> ClaimRecord {
        let submitted_at = Utc.with_ymd_and_hms(2024, 1, 3, 10, 30, 0).unwrap();
        ClaimRecord::new(
            PolicyId::new_v7(),
            PartyId::new_v7(),
            ClaimType::AccidentalDeath,
            Self::policy_start(),
            submitted_at,
        )
        .with_amount(Money::new(dec!(150000), Currency::USD))
        .with_premium(Money::new(dec!(2400), Currency::USD))
        .with_loss_date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        .with_beneficiary_change(submitted_at - Duration::days(10))
        .with_beneficiary_relation(BeneficiaryRelation::Other)
        .with_previous_claims(0)
        .with_claimant_age(38)
    }

    /// $5,000 death claim four years into the policy with no beneficiary change
    pub fn routine_claim() -> ClaimRecord {
        let submitted_at = Utc.with_ymd_and_hms(2024, 3, 15, 14, 0, 0).unwrap();
        ClaimRecord::new(
            PolicyId::new_v7(),
            PartyId::new_v7(),
            ClaimType::Death,
            (submitted_at - Duration::days(1_500)).date_naive(),
            submitted_at,
        )
        .with_amount(Money::new(dec!(5000), Currency::USD))
        .with_premium(Money::new(dec!(2000), Currency::USD))
        .with_beneficiary_relation(BeneficiaryRelation::Spouse)
        .with_previous_claims(0)
        .with_claimant_age(50)
    }

    /// Claim with no amount, rejected at feature building
    pub fn claim_missing_amount() -> ClaimRecord {
        let mut claim = Self::routine_claim();
        claim.claim_amount = None;
        claim
    }
}
