//! Claim records as received for scoring

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClaimId, Money, PartyId, PolicyId};
use crate::error::FraudError;

/// Type of claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Death,
    Disability,
    CriticalIllness,
    AccidentalDeath,
    Other,
}

impl ClaimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Death => "death",
            ClaimType::Disability => "disability",
            ClaimType::CriticalIllness => "critical_illness",
            ClaimType::AccidentalDeath => "accidental_death",
            ClaimType::Other => "other",
        }
    }
}

/// Relationship of the beneficiary to the insured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeneficiaryRelation {
    Spouse,
    Child,
    Parent,
    Other,
}

impl BeneficiaryRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BeneficiaryRelation::Spouse => "spouse",
            BeneficiaryRelation::Child => "child",
            BeneficiaryRelation::Parent => "parent",
            BeneficiaryRelation::Other => "other",
        }
    }
}

/// A claim submitted for fraud scoring
///
/// Optional fields may be imputed by the feature schema; a missing field with
/// no imputation rule rejects the claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Claim identifier
    pub claim_id: ClaimId,
    /// Policy the claim is made against
    pub policy_id: PolicyId,
    /// Claimant
    pub claimant_id: PartyId,
    /// Claim type
    pub claim_type: ClaimType,
    /// Amount claimed
    #[serde(default)]
    pub claim_amount: Option<Money>,
    /// Annual policy premium
    #[serde(default)]
    pub policy_premium: Option<Money>,
    /// Policy effective date, start of the contestable period
    pub policy_effective_date: NaiveDate,
    /// Date of loss
    #[serde(default)]
    pub loss_date: Option<NaiveDate>,
    /// When the claim was submitted
    pub submitted_at: DateTime<Utc>,
    /// Most recent beneficiary change on the policy
    #[serde(default)]
    pub beneficiary_changed_at: Option<DateTime<Utc>>,
    /// Beneficiary relationship
    #[serde(default)]
    pub beneficiary_relation: Option<BeneficiaryRelation>,
    /// Prior claims by the same claimant
    #[serde(default)]
    pub previous_claims: Option<u32>,
    /// Claimant age in years
    #[serde(default)]
    pub claimant_age: Option<u32>,
}

impl ClaimRecord {
    /// Creates a claim with the fields every record must carry
    pub fn new(
        policy_id: PolicyId,
        claimant_id: PartyId,
        claim_type: ClaimType,
        policy_effective_date: NaiveDate,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            claim_id: ClaimId::new_v7(),
            policy_id,
            claimant_id,
            claim_type,
            claim_amount: None,
            policy_premium: None,
            policy_effective_date,
            loss_date: None,
            submitted_at,
            beneficiary_changed_at: None,
            beneficiary_relation: None,
            previous_claims: None,
            claimant_age: None,
        }
    }

    pub fn with_claim_id(mut self, claim_id: ClaimId) -> Self {
        self.claim_id = claim_id;
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.claim_amount = Some(amount);
        self
    }

    pub fn with_premium(mut self, premium: Money) -> Self {
        self.policy_premium = Some(premium);
        self
    }

    pub fn with_loss_date(mut self, loss_date: NaiveDate) -> Self {
        self.loss_date = Some(loss_date);
        self
    }

    pub fn with_beneficiary_change(mut self, changed_at: DateTime<Utc>) -> Self {
        self.beneficiary_changed_at = Some(changed_at);
        self
    }

    pub fn with_beneficiary_relation(mut self, relation: BeneficiaryRelation) -> Self {
        self.beneficiary_relation = Some(relation);
        self
    }

    pub fn with_previous_claims(mut self, count: u32) -> Self {
        self.previous_claims = Some(count);
        self
    }

    pub fn with_claimant_age(mut self, age: u32) -> Self {
        self.claimant_age = Some(age);
        self
    }

    /// Checks amount signs and timestamp ordering against the policy dates
    pub fn validate(&self) -> Result<(), FraudError> {
        if let Some(amount) = &self.claim_amount {
            if amount.is_negative() {
                return Err(FraudError::schema(self.claim_id, "claim_amount", "must be non-negative"));
            }
        }
        if let Some(premium) = &self.policy_premium {
            if premium.is_negative() {
                return Err(FraudError::schema(self.claim_id, "policy_premium", "must be non-negative"));
            }
        }

        let submitted_on = self.submitted_at.date_naive();
        if submitted_on < self.policy_effective_date {
            return Err(FraudError::schema(
                self.claim_id,
                "submitted_at",
                format!("precedes policy effective date {}", self.policy_effective_date),
            ));
        }
        if let Some(loss_date) = self.loss_date {
            if loss_date < self.policy_effective_date {
                return Err(FraudError::schema(
                    self.claim_id,
                    "loss_date",
                    format!("precedes policy effective date {}", self.policy_effective_date),
                ));
            }
            if loss_date > submitted_on {
                return Err(FraudError::schema(self.claim_id, "loss_date", "is after submission"));
            }
        }
        if let Some(changed_at) = self.beneficiary_changed_at {
            if changed_at > self.submitted_at {
                return Err(FraudError::schema(
                    self.claim_id,
                    "beneficiary_changed_at",
                    "is after submission",
                ));
            }
        }
        Ok(())
    }

    /// Whole days between the policy effective date and submission
    pub fn days_since_policy_start(&self) -> i64 {
        (self.submitted_at.date_naive() - self.policy_effective_date).num_days()
    }

    /// Whole days between the last beneficiary change and submission
    pub fn days_since_beneficiary_change(&self) -> Option<i64> {
        self.beneficiary_changed_at
            .map(|changed_at| (self.submitted_at - changed_at).num_days())
    }
}

/// A historical claim with its realised fraud outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledClaim {
    pub claim: ClaimRecord,
    pub is_fraud: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn claim() -> ClaimRecord {
        ClaimRecord::new(
            PolicyId::new(),
            PartyId::new(),
            ClaimType::Death,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_valid_claim_passes() {
        let c = claim().with_amount(Money::new(dec!(1000), Currency::USD));
        assert!(c.validate().is_ok());
        assert_eq!(c.days_since_policy_start(), 60);
    }

    #[test]
    fn test_negative_amount_rejected() {
        let c = claim().with_amount(Money::new(dec!(-1), Currency::USD));
        let err = c.validate().unwrap_err();
        assert!(matches!(err, FraudError::Schema { ref field, .. } if field == "claim_amount"));
    }

    #[test]
    fn test_submission_before_policy_start_rejected() {
        let mut c = claim();
        c.submitted_at = Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_beneficiary_change_after_submission_rejected() {
        let c = claim();
        let later = c.submitted_at + Duration::days(1);
        assert!(c.with_beneficiary_change(later).validate().is_err());
    }

    #[test]
    fn test_loss_after_submission_rejected() {
        let c = claim().with_loss_date(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_days_since_beneficiary_change() {
        let c = claim();
        let changed = c.submitted_at - Duration::days(10);
        assert_eq!(c.with_beneficiary_change(changed).days_since_beneficiary_change(), Some(10));
    }
}
