//! Model registry and lifecycle
//!
//! Readers clone an `Arc` to an immutable [`RegistrySnapshot`] and never see a
//! half-updated registry. Writers are serialised, build a new snapshot from
//! the current one and swap it in. Drift monitors are the only other mutable
//! state and live behind their own lock.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use crate::drift::{DriftConfig, DriftDetected, DriftMonitor};
use crate::error::FraudError;
use crate::events::{MonitoringSink, ScoreSample};
use crate::model::{ModelSelector, ModelVersion, ModelVersionId};
use crate::scorer::ScoreResult;

/// Lifecycle status of a registered version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    /// Served for `active` requests of its family
    Active,
    /// Loaded and addressable by id only
    Rollout,
    /// Unloaded
    Retired,
}

/// A loaded version with its registry bookkeeping
#[derive(Debug, Clone)]
pub struct RegisteredModel {
    pub model: Arc<ModelVersion>,
    pub status: VersionStatus,
    /// Registration order, used to pick the rollout to promote
    pub sequence: u64,
    pub registered_at: DateTime<Utc>,
}

impl RegisteredModel {
    fn info(&self) -> VersionInfo {
        VersionInfo {
            version_id: self.model.version_id.clone(),
            family: self.model.family.clone(),
            status: self.status,
            trained_at: self.model.trained_at,
            registered_at: self.registered_at,
            feature_schema: self.model.feature_schema.version.clone(),
        }
    }
}

/// Summary row for listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version_id: ModelVersionId,
    pub family: String,
    pub status: VersionStatus,
    pub trained_at: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
    pub feature_schema: String,
}

/// Immutable view of the registry at one generation
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    models: BTreeMap<ModelVersionId, RegisteredModel>,
    active: HashMap<String, ModelVersionId>,
    retired: Vec<VersionInfo>,
    next_sequence: u64,
    generation: u64,
}

impl RegistrySnapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, version_id: &ModelVersionId) -> Option<&RegisteredModel> {
        self.models.get(version_id)
    }

    pub fn active(&self, family: &str) -> Option<Arc<ModelVersion>> {
        self.active
            .get(family)
            .and_then(|id| self.models.get(id))
            .map(|entry| Arc::clone(&entry.model))
    }

    pub fn is_retired(&self, version_id: &ModelVersionId) -> bool {
        self.retired.iter().any(|info| &info.version_id == version_id)
    }

    /// Loaded versions in id order, followed by retired versions in retirement order
    pub fn versions(&self) -> Vec<VersionInfo> {
        self.models
            .values()
            .map(RegisteredModel::info)
            .chain(self.retired.iter().cloned())
            .collect()
    }

    pub fn retired(&self) -> &[VersionInfo] {
        &self.retired
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    fn newest_rollout(&self, family: &str) -> Option<ModelVersionId> {
        self.models
            .values()
            .filter(|e| e.status == VersionStatus::Rollout && e.model.family == family)
            .max_by_key(|e| e.sequence)
            .map(|e| e.model.version_id.clone())
    }
}

/// Registry of loaded model versions
pub struct ModelRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
    writer: Mutex<()>,
    monitors: Mutex<HashMap<ModelVersionId, DriftMonitor>>,
    drift_config: DriftConfig,
    monitoring: Arc<dyn MonitoringSink>,
}

impl ModelRegistry {
    pub fn new(drift_config: DriftConfig, monitoring: Arc<dyn MonitoringSink>) -> Self {
        Self {
            current: RwLock::new(Arc::new(RegistrySnapshot::default())),
            writer: Mutex::new(()),
            monitors: Mutex::new(HashMap::new()),
            drift_config,
            monitoring,
        }
    }

    /// Current snapshot; the read lock is held only to clone the `Arc`
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        let guard = self.current.read();
        Arc::clone(&*guard)
    }

    fn publish(&self, snapshot: RegistrySnapshot) {
        let mut guard = self.current.write();
        *guard = Arc::new(snapshot);
    }

    /// Loads a version; it becomes active if its family has none, otherwise
    /// it is served in rollout
    ///
    /// # Errors
    ///
    /// `Configuration` if the model fails validation, `Registry` if the id is
    /// already loaded or was retired.
    pub fn register(&self, model: ModelVersion) -> Result<VersionStatus, FraudError> {
        model.validate()?;
        let _writer = self.writer.lock();

        let mut next = (*self.snapshot()).clone();
        if next.models.contains_key(&model.version_id) || next.is_retired(&model.version_id) {
            return Err(FraudError::registry(format!(
                "model version {} is already registered",
                model.version_id
            )));
        }

        let status = if next.active.contains_key(&model.family) {
            VersionStatus::Rollout
        } else {
            next.active.insert(model.family.clone(), model.version_id.clone());
            VersionStatus::Active
        };

        let version_id = model.version_id.clone();
        let family = model.family.clone();
        let monitor = DriftMonitor::new(
            version_id.clone(),
            model.reference_distribution.clone(),
            self.drift_config.clone(),
        );

        next.models.insert(
            version_id.clone(),
            RegisteredModel {
                model: Arc::new(model),
                status,
                sequence: next.next_sequence,
                registered_at: Utc::now(),
            },
        );
        next.next_sequence += 1;
        next.generation += 1;

        self.monitors.lock().insert(version_id.clone(), monitor);
        self.publish(next);

        info!(model_version = %version_id, family = %family, ?status, "Model version registered");
        Ok(status)
    }

    /// Unloads a version; retiring the active one promotes the newest rollout
    ///
    /// Returns the promoted version, if any.
    pub fn retire(&self, version_id: &ModelVersionId) -> Result<Option<ModelVersionId>, FraudError> {
        let _writer = self.writer.lock();

        let mut next = (*self.snapshot()).clone();
        let entry = next
            .models
            .remove(version_id)
            .ok_or_else(|| FraudError::registry(format!("model version {version_id} is not loaded")))?;
        let family = entry.model.family.clone();

        let mut promoted = None;
        if entry.status == VersionStatus::Active {
            next.active.remove(&family);
            if let Some(successor) = next.newest_rollout(&family) {
                if let Some(successor_entry) = next.models.get_mut(&successor) {
                    successor_entry.status = VersionStatus::Active;
                }
                next.active.insert(family.clone(), successor.clone());
                promoted = Some(successor);
            }
        }
        next.retired.push(VersionInfo {
            status: VersionStatus::Retired,
            ..entry.info()
        });
        next.generation += 1;

        self.monitors.lock().remove(version_id);
        self.publish(next);

        match &promoted {
            Some(successor) => info!(
                retired = %version_id,
                promoted = %successor,
                family = %family,
                "Model version retired, rollout promoted"
            ),
            None if entry.status == VersionStatus::Active => warn!(
                retired = %version_id,
                family = %family,
                "Active model version retired with no rollout to promote"
            ),
            None => info!(retired = %version_id, family = %family, "Model version retired"),
        }
        Ok(promoted)
    }

    pub fn get_active_version(&self, family: &str) -> Option<Arc<ModelVersion>> {
        self.snapshot().active(family)
    }

    /// Resolves a selector to a loaded version of `family`
    ///
    /// # Errors
    ///
    /// `ModelUnavailable` when nothing matching is loaded.
    pub fn resolve(&self, family: &str, selector: &ModelSelector) -> Result<Arc<ModelVersion>, FraudError> {
        let snapshot = self.snapshot();
        let found = match selector {
            ModelSelector::Active => snapshot.active(family),
            ModelSelector::Version(id) => snapshot
                .get(id)
                .filter(|entry| entry.model.family == family)
                .map(|entry| Arc::clone(&entry.model)),
        };
        found.ok_or_else(|| FraudError::ModelUnavailable {
            family: family.to_string(),
            requested: selector.to_string(),
        })
    }

    /// Records a scored claim, and its realised label when known
    ///
    /// Publishes a score sample, feeds the version's drift monitor and
    /// publishes any drift signal that results.
    pub fn record_outcome(&self, score: &ScoreResult, realized_label: Option<bool>) -> Option<DriftDetected> {
        self.monitoring.publish_sample(&ScoreSample {
            claim_id: score.claim_id,
            model_version: score.model_version.clone(),
            risk_score: score.risk_score,
            realized_label,
            recorded_at: Utc::now(),
        });

        let signal = {
            let mut monitors = self.monitors.lock();
            let monitor = monitors.get_mut(&score.model_version)?;
            match realized_label {
                Some(is_fraud) => monitor.observe_outcome(score.risk_score, is_fraud),
                None => monitor.observe_score(score.risk_score),
            }
        };

        if let Some(signal) = &signal {
            self.monitoring.publish_drift(signal);
        }
        signal
    }
}
