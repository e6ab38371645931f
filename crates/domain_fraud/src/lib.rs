//! Claims Fraud Scoring Domain
//!
//! This crate scores insurance claims for fraud risk, explains each score,
//! and routes the claim to a disposition.
//!
//! # Scoring Flow
//!
//! ```text
//! ClaimRecord -> FeatureBuilder -> AnomalyScorer -> Explainer -> DecisionRouter -> Disposition
//!                                        ^                              |
//!                                  ModelRegistry <---- score samples ----+
//! ```
//!
//! The [`ModelRegistry`] is the only shared mutable state. Everything else is a
//! pure function of the claim and an immutable [`ModelVersion`].

pub mod claim;
pub mod config;
pub mod drift;
pub mod error;
pub mod events;
pub mod explainer;
pub mod features;
pub mod model;
pub mod registry;
pub mod router;
pub mod sample_data;
pub mod scorer;
pub mod service;
pub mod training;

pub use claim::{BeneficiaryRelation, ClaimRecord, ClaimType, LabeledClaim};
pub use config::{BatchConfig, ScoringConfig};
pub use drift::{DriftConfig, DriftDetected, DriftKind, DriftMonitor};
pub use error::{FraudError, Stage};
pub use events::{CaseManagementSink, InMemorySink, MonitoringSink, RoutingEvent, ScoreSample, TracingSink};
pub use explainer::{Attribution, Explainer, ExplainerConfig, Explanation, ExplanationMethod};
pub use features::{FeatureBuilder, FeatureKind, FeatureSchema, FeatureSpec, FeatureVector};
pub use model::{ModelSelector, ModelVersion, ModelVersionId, ScoringModel};
pub use registry::{ModelRegistry, RegisteredModel, RegistrySnapshot, VersionInfo, VersionStatus};
pub use router::{Action, DecisionRouter, Disposition, PolicyThresholds, Priority};
pub use scorer::{AnomalyScorer, ScoreResult};
pub use service::{ClaimDecision, ClaimFailure, ClaimOutcome, ScoringRequest, ScoringResponse, ScoringService};
pub use training::{Trainer, TrainedModel, TrainingParams, TrainingReport};
