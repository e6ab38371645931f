//! Model lifecycle DTOs

use serde::{Deserialize, Serialize};

use domain_fraud::{ModelVersionId, VersionInfo, VersionStatus};

/// Loaded and retired versions of the served family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelListResponse {
    pub family: String,
    pub active: Option<ModelVersionId>,
    /// Registry generation the listing was taken from
    pub generation: u64,
    pub versions: Vec<VersionInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterModelResponse {
    pub version_id: ModelVersionId,
    pub status: VersionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetireModelResponse {
    pub retired: ModelVersionId,
    /// Rollout promoted to active, if the retired version was active
    pub promoted: Option<ModelVersionId>,
}
