//! Feature building
//!
//! Turns a [`ClaimRecord`] into the fixed-length numeric vector a model
//! version was trained on. The schema travels with the model version and the
//! trainer uses this same builder, so serving and training cannot diverge.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use core_kernel::ClaimId;
use crate::claim::{BeneficiaryRelation, ClaimRecord, ClaimType};
use crate::error::FraudError;

/// How a single feature is derived from a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FeatureKind {
    /// `ln(1 + claim amount)`
    LogClaimAmount,
    /// `claim amount / (premium + 1)`
    ClaimToPremiumRatio,
    DaysSincePolicyStart,
    /// 1.0 while inside the schema's contestable period
    WithinContestablePeriod,
    DaysSinceBeneficiaryChange,
    /// 1.0 when the beneficiary changed inside the schema's recent window
    RecentBeneficiaryChange,
    PreviousClaims,
    ClaimantAge,
    ClaimTypeIs(ClaimType),
    BeneficiaryIs(BeneficiaryRelation),
}

/// A named feature and its imputation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub kind: FeatureKind,
    /// Value used when the claim lacks the input; `None` makes the input required
    pub impute: Option<f64>,
}

impl FeatureSpec {
    pub fn required(name: impl Into<String>, kind: FeatureKind) -> Self {
        Self {
            name: name.into(),
            kind,
            impute: None,
        }
    }

    pub fn imputed(name: impl Into<String>, kind: FeatureKind, value: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            impute: Some(value),
        }
    }
}

/// Ordered feature layout for one model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Schema version, recorded on every vector built from it
    pub version: String,
    /// Length of the contestable period in days
    pub contestable_period_days: u32,
    /// Window in days for a beneficiary change to count as recent
    pub recent_change_window_days: u32,
    pub features: Vec<FeatureSpec>,
}

impl FeatureSchema {
    /// The standard claims layout: claim economics, policy timing, beneficiary
    /// activity, claimant history and one-hot claim/beneficiary categories.
    pub fn standard(version: impl Into<String>) -> Self {
        use FeatureKind::*;

        let mut features = vec![
            FeatureSpec::required("log_claim_amount", LogClaimAmount),
            FeatureSpec::imputed("claim_to_premium_ratio", ClaimToPremiumRatio, 5.0),
            FeatureSpec::required("days_since_policy_start", DaysSincePolicyStart),
            FeatureSpec::required("within_contestable_period", WithinContestablePeriod),
            FeatureSpec::imputed("days_since_beneficiary_change", DaysSinceBeneficiaryChange, 3650.0),
            FeatureSpec::required("recent_beneficiary_change", RecentBeneficiaryChange),
            FeatureSpec::imputed("previous_claims", PreviousClaims, 0.0),
            FeatureSpec::imputed("claimant_age", ClaimantAge, 45.0),
        ];
        for claim_type in [
            ClaimType::Death,
            ClaimType::Disability,
            ClaimType::CriticalIllness,
            ClaimType::AccidentalDeath,
        ] {
            features.push(FeatureSpec::required(
                format!("claim_type_{}", claim_type.as_str()),
                ClaimTypeIs(claim_type),
            ));
        }
        for relation in [
            BeneficiaryRelation::Spouse,
            BeneficiaryRelation::Child,
            BeneficiaryRelation::Parent,
            BeneficiaryRelation::Other,
        ] {
            features.push(FeatureSpec::required(
                format!("beneficiary_{}", relation.as_str()),
                BeneficiaryIs(relation),
            ));
        }

        Self {
            version: version.into(),
            contestable_period_days: 730,
            recent_change_window_days: 90,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    /// Rejects empty schemas, duplicate names and non-finite imputation values
    pub fn validate(&self) -> Result<(), FraudError> {
        if self.features.is_empty() {
            return Err(FraudError::configuration(format!(
                "feature schema {} has no features",
                self.version
            )));
        }
        let mut seen = HashSet::new();
        for spec in &self.features {
            if !seen.insert(spec.name.as_str()) {
                return Err(FraudError::configuration(format!(
                    "feature schema {} repeats feature `{}`",
                    self.version, spec.name
                )));
            }
            if matches!(spec.impute, Some(v) if !v.is_finite()) {
                return Err(FraudError::configuration(format!(
                    "feature `{}` has a non-finite imputation value",
                    spec.name
                )));
            }
        }
        Ok(())
    }
}

/// Numeric features for one claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub claim_id: ClaimId,
    pub schema_version: String,
    pub names: Vec<String>,
    pub values: Vec<f64>,
    /// Features filled from the schema's imputation rule
    pub imputed: Vec<String>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    pub fn was_imputed(&self, name: &str) -> bool {
        self.imputed.iter().any(|n| n == name)
    }
}

/// Builds feature vectors against a schema
#[derive(Debug, Clone, Copy)]
pub struct FeatureBuilder<'a> {
    schema: &'a FeatureSchema,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(schema: &'a FeatureSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.schema
    }

    /// Builds the vector for a claim
    ///
    /// # Errors
    ///
    /// `FraudError::Schema` when the claim breaks a record invariant or a
    /// required input is absent with no imputation rule.
    pub fn build(&self, claim: &ClaimRecord) -> Result<FeatureVector, FraudError> {
        claim.validate()?;

        let mut values = Vec::with_capacity(self.schema.len());
        let mut imputed = Vec::new();

        for spec in &self.schema.features {
            let value = match self.derive(spec.kind, claim)? {
                Some(value) => value,
                None => match spec.impute {
                    Some(fill) => {
                        imputed.push(spec.name.clone());
                        fill
                    }
                    None => {
                        return Err(FraudError::schema(
                            claim.claim_id,
                            spec.name.clone(),
                            "is required and has no imputation rule",
                        ))
                    }
                },
            };
            if !value.is_finite() {
                return Err(FraudError::schema(claim.claim_id, spec.name.clone(), "is not finite"));
            }
            values.push(value);
        }

        Ok(FeatureVector {
            claim_id: claim.claim_id,
            schema_version: self.schema.version.clone(),
            names: self.schema.names(),
            values,
            imputed,
        })
    }

    /// Raw value for one feature, `None` when the claim lacks the input
    fn derive(&self, kind: FeatureKind, claim: &ClaimRecord) -> Result<Option<f64>, FraudError> {
        let money_error = |field: &str, err: core_kernel::MoneyError| {
            FraudError::schema(claim.claim_id, field, err.to_string())
        };

        let value = match kind {
            FeatureKind::LogClaimAmount => match &claim.claim_amount {
                Some(amount) => Some(
                    amount
                        .to_f64()
                        .map_err(|e| money_error("claim_amount", e))?
                        .ln_1p(),
                ),
                None => None,
            },
            FeatureKind::ClaimToPremiumRatio => match (&claim.claim_amount, &claim.policy_premium) {
                (Some(amount), Some(premium)) => Some(
                    amount
                        .smoothed_ratio_to(premium)
                        .map_err(|e| money_error("policy_premium", e))?,
                ),
                _ => None,
            },
            FeatureKind::DaysSincePolicyStart => Some(claim.days_since_policy_start() as f64),
            FeatureKind::WithinContestablePeriod => {
                let inside = claim.days_since_policy_start()
                    < i64::from(self.schema.contestable_period_days);
                Some(indicator(inside))
            }
            FeatureKind::DaysSinceBeneficiaryChange => {
                claim.days_since_beneficiary_change().map(|d| d as f64)
            }
            FeatureKind::RecentBeneficiaryChange => {
                let recent = claim
                    .days_since_beneficiary_change()
                    .map(|d| d <= i64::from(self.schema.recent_change_window_days))
                    .unwrap_or(false);
                Some(indicator(recent))
            }
            FeatureKind::PreviousClaims => claim.previous_claims.map(f64::from),
            FeatureKind::ClaimantAge => claim.claimant_age.map(f64::from),
            FeatureKind::ClaimTypeIs(claim_type) => Some(indicator(claim.claim_type == claim_type)),
            FeatureKind::BeneficiaryIs(relation) => {
                Some(indicator(claim.beneficiary_relation == Some(relation)))
            }
        };
        Ok(value)
    }
}

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}
