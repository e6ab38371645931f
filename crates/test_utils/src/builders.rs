//! Test Data Builders
//!
//! Builders that let tests state only the claim attributes they care about,
//! and a harness wiring a registry, sinks and scoring service together.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use core_kernel::{ClaimId, Currency, Money, PartyId, PolicyId};
use domain_fraud::{
    BeneficiaryRelation, ClaimRecord, ClaimType, InMemorySink, ModelRegistry, ModelVersion,
    ScoringConfig, ScoringService,
};

use crate::fixtures::{reference_config, reference_model};

/// Builder for claims expressed relative to the submission time
pub struct TestClaimBuilder {
    claim_id: ClaimId,
    claim_type: ClaimType,
    submitted_at: DateTime<Utc>,
    days_since_policy_start: i64,
    amount: Option<Decimal>,
    premium: Option<Decimal>,
    beneficiary_changed_days_before: Option<i64>,
    relation: Option<BeneficiaryRelation>,
    previous_claims: Option<u32>,
    claimant_age: Option<u32>,
}

impl Default for TestClaimBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClaimBuilder {
    /// A routine claim: $5,000 death claim, 1,500 days in, spouse beneficiary
    pub fn new() -> Self {
        Self {
            claim_id: ClaimId::new_v7(),
            claim_type: ClaimType::Death,
            submitted_at: Utc.with_ymd_and_hms(2024, 3, 15, 14, 0, 0).unwrap(),
            days_since_policy_start: 1_500,
            amount: Some(Decimal::from(5_000)),
            premium: Some(Decimal::from(2_000)),
            beneficiary_changed_days_before: None,
            relation: Some(BeneficiaryRelation::Spouse),
            previous_claims: Some(0),
            claimant_age: Some(50),
        }
    }

    pub fn with_claim_id(mut self, claim_id: ClaimId) -> Self {
        self.claim_id = claim_id;
        self
    }

    pub fn with_claim_type(mut self, claim_type: ClaimType) -> Self {
        self.claim_type = claim_type;
        self
    }

    pub fn with_days_since_policy_start(mut self, days: i64) -> Self {
        self.days_since_policy_start = days;
        self
    }

    pub fn with_amount(mut self, amount: impl Into<Decimal>) -> Self {
        self.amount = Some(amount.into());
        self
    }

    pub fn without_amount(mut self) -> Self {
        self.amount = None;
        self
    }

    pub fn with_premium(mut self, premium: impl Into<Decimal>) -> Self {
        self.premium = Some(premium.into());
        self
    }

    pub fn without_premium(mut self) -> Self {
        self.premium = None;
        self
    }

    pub fn with_beneficiary_change_days_before(mut self, days: i64) -> Self {
        self.beneficiary_changed_days_before = Some(days);
        self
    }

    pub fn with_relation(mut self, relation: BeneficiaryRelation) -> Self {
        self.relation = Some(relation);
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

    pub fn build(self) -> ClaimRecord {
        let effective = (self.submitted_at - Duration::days(self.days_since_policy_start)).date_naive();
        let mut claim = ClaimRecord::new(
            PolicyId::new_v7(),
            PartyId::new_v7(),
            self.claim_type,
            effective,
            self.submitted_at,
        )
        .with_claim_id(self.claim_id);

        claim.claim_amount = self.amount.map(|a| Money::new(a, Currency::USD));
        claim.policy_premium = self.premium.map(|p| Money::new(p, Currency::USD));
        claim.beneficiary_changed_at = self
            .beneficiary_changed_days_before
            .map(|days| self.submitted_at - Duration::days(days));
        claim.beneficiary_relation = self.relation;
        claim.previous_claims = self.previous_claims;
        claim.claimant_age = self.claimant_age;
        claim
    }
}

/// A scoring service over an in-memory registry and sink
pub struct ScoringHarness {
    pub service: Arc<ScoringService>,
    pub registry: Arc<ModelRegistry>,
    pub sink: Arc<InMemorySink>,
}

impl ScoringHarness {
    /// Reference config with the reference model registered as active
    pub fn reference() -> Self {
        Self::with_models(reference_config(), vec![reference_model()])
    }

    /// Registers `models` in order; the first of each family becomes active
    pub fn with_models(config: ScoringConfig, models: Vec<ModelVersion>) -> Self {
        let sink = Arc::new(InMemorySink::new());
        let registry = Arc::new(ModelRegistry::new(config.drift.clone(), sink.clone()));
        for model in models {
            registry.register(model).expect("test model registers");
        }
        let service = Arc::new(
            ScoringService::new(config, Arc::clone(&registry), sink.clone()).expect("valid test config"),
        );
        Self {
            service,
            registry,
            sink,
        }
    }
}
