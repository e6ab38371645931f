//! Claims Fraud Scoring - Training Binary
//!
//! Generates seeded synthetic claims, trains a model version and writes it as
//! JSON for the API server's `models_dir`.
//!
//! # Environment Variables
//!
//! * `TRAIN_VERSION_ID` - Version id of the new model (required)
//! * `TRAIN_FAMILY` - Model family (default: claims)
//! * `TRAIN_SEED` - Random seed (default: 42)
//! * `TRAIN_SAMPLES` - Number of synthetic claims (default: 5000)
//! * `TRAIN_FRAUD_RATE` - Share of fraudulent synthetic claims (default: 0.1)
//! * `TRAIN_SCHEMA_VERSION` - Feature schema version (default: fs-2024.1)
//! * `TRAIN_CALIBRATION` - `sigmoid` or `isotonic` (default: sigmoid)
//! * `TRAIN_OUTPUT` - Output path (default: models/<version_id>.json)

use chrono::Utc;
use serde::Deserialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_fraud::sample_data::SampleClaimGenerator;
use domain_fraud::training::CalibrationMethod;
use domain_fraud::{FeatureSchema, Trainer, TrainingParams};

#[derive(Debug, Deserialize)]
struct TrainConfig {
    version_id: String,
    family: String,
    seed: u64,
    samples: usize,
    fraud_rate: f64,
    schema_version: String,
    calibration: CalibrationMethod,
    output: Option<PathBuf>,
}

fn load_config() -> Result<TrainConfig, config::ConfigError> {
    config::Config::builder()
        .set_default("family", "claims")?
        .set_default("seed", 42)?
        .set_default("samples", 5000)?
        .set_default("fraud_rate", 0.1)?
        .set_default("schema_version", "fs-2024.1")?
        .set_default("calibration", "sigmoid")?
        .add_source(config::Environment::with_prefix("TRAIN").try_parsing(true))
        .build()?
        .try_deserialize()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config()?;
    tracing::info!(
        version_id = %config.version_id,
        samples = config.samples,
        fraud_rate = config.fraud_rate,
        seed = config.seed,
        "Generating synthetic training claims"
    );

    let claims = SampleClaimGenerator::new(config.seed, config.fraud_rate, Utc::now())?.generate(config.samples);

    let mut params = TrainingParams::new(config.version_id.clone(), config.family.clone(), config.seed);
    params.calibration = config.calibration;
    let trained = Trainer::new(params).train(FeatureSchema::standard(config.schema_version.clone()), &claims)?;

    let report = &trained.report;
    tracing::info!(
        rows_used = report.rows_used,
        rows_rejected = report.rows_rejected,
        holdout_rows = report.holdout_rows,
        fraud_rate = report.fraud_rate,
        training_auc = report.training_auc,
        holdout_auc = ?report.holdout_auc,
        "Model trained"
    );

    let output = config
        .output
        .unwrap_or_else(|| PathBuf::from("models").join(format!("{}.json", config.version_id)));
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output, trained.model.to_json_pretty()?)?;

    tracing::info!(path = %output.display(), "Model written");
    Ok(())
}
