//! Outbound events and the sinks that receive them
//!
//! The core never persists routing or monitoring data. It hands events to a
//! [`CaseManagementSink`] or [`MonitoringSink`] and moves on.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use core_kernel::{ClaimId, EventId};
use crate::drift::DriftDetected;
use crate::explainer::Attribution;
use crate::model::ModelVersionId;
use crate::router::{Action, Priority};

/// Disposition handed to case management
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingEvent {
    pub event_id: EventId,
    pub claim_id: ClaimId,
    pub action: Action,
    pub priority: Priority,
    pub risk_score: f64,
    pub model_version: ModelVersionId,
    /// Largest contributions of the explanation
    pub top_features: Vec<Attribution>,
    pub emitted_at: DateTime<Utc>,
}

/// A scored claim, optionally with its realised outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSample {
    pub claim_id: ClaimId,
    pub model_version: ModelVersionId,
    pub risk_score: f64,
    /// Confirmed fraud outcome, once known
    pub realized_label: Option<bool>,
    pub recorded_at: DateTime<Utc>,
}

/// Receives one routing event per disposition
pub trait CaseManagementSink: Send + Sync {
    fn publish_routing(&self, event: &RoutingEvent);
}

/// Receives score samples and drift signals
pub trait MonitoringSink: Send + Sync {
    fn publish_sample(&self, sample: &ScoreSample);

    fn publish_drift(&self, signal: &DriftDetected);
}

/// Sink that writes structured `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl CaseManagementSink for TracingSink {
    fn publish_routing(&self, event: &RoutingEvent) {
        let top_features: Vec<&str> = event.top_features.iter().map(|a| a.feature.as_str()).collect();
        info!(
            event_id = %event.event_id,
            claim_id = %event.claim_id,
            action = ?event.action,
            priority = ?event.priority,
            risk_score = event.risk_score,
            model_version = %event.model_version,
            top_features = ?top_features,
            "Claim routed"
        );
    }
}

impl MonitoringSink for TracingSink {
    fn publish_sample(&self, sample: &ScoreSample) {
        info!(
            claim_id = %sample.claim_id,
            model_version = %sample.model_version,
            risk_score = sample.risk_score,
            realized_label = ?sample.realized_label,
            "Score sample"
        );
    }

    fn publish_drift(&self, signal: &DriftDetected) {
        warn!(
            model_version = %signal.model_version,
            kind = ?signal.kind,
            samples = signal.samples,
            "Model drift detected, retraining advised"
        );
    }
}

/// Sink that keeps everything in memory
#[derive(Debug, Default)]
pub struct InMemorySink {
    routing: Mutex<Vec<RoutingEvent>>,
    samples: Mutex<Vec<ScoreSample>>,
    drift: Mutex<Vec<DriftDetected>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routing_events(&self) -> Vec<RoutingEvent> {
        self.routing.lock().clone()
    }

    pub fn samples(&self) -> Vec<ScoreSample> {
        self.samples.lock().clone()
    }

    pub fn drift_signals(&self) -> Vec<DriftDetected> {
        self.drift.lock().clone()
    }
}

impl CaseManagementSink for InMemorySink {
    fn publish_routing(&self, event: &RoutingEvent) {
        self.routing.lock().push(event.clone());
    }
}

impl MonitoringSink for InMemorySink {
    fn publish_sample(&self, sample: &ScoreSample) {
        self.samples.lock().push(sample.clone());
    }

    fn publish_drift(&self, signal: &DriftDetected) {
        self.drift.lock().push(signal.clone());
    }
}
