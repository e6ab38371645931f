//! Synthetic labelled claims
//!
//! Seeded generator for demos, training smoke runs and fixtures. Fraudulent
//! claims are larger, arrive sooner after the policy starts, carry more prior
//! claims and more often follow a recent beneficiary change.

use chrono::{DateTime, Duration, Utc};
use rand::distributions::{Distribution, Uniform, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Exp, LogNormal, Poisson};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use core_kernel::{Currency, Money, PartyId, PolicyId};
use crate::claim::{BeneficiaryRelation, ClaimRecord, ClaimType, LabeledClaim};
use crate::error::FraudError;

const CLAIM_TYPES: [ClaimType; 4] = [
    ClaimType::Death,
    ClaimType::Disability,
    ClaimType::CriticalIllness,
    ClaimType::AccidentalDeath,
];

const RELATIONS: [BeneficiaryRelation; 4] = [
    BeneficiaryRelation::Spouse,
    BeneficiaryRelation::Child,
    BeneficiaryRelation::Parent,
    BeneficiaryRelation::Other,
];

/// Distributions for one class of claim
#[derive(Debug, Clone)]
struct Profile {
    amount: LogNormal<f64>,
    days_to_claim: Exp<f64>,
    previous_claims: Poisson<f64>,
    relation: WeightedIndex<f64>,
    /// Probability of a beneficiary change shortly before the claim
    recent_change_rate: f64,
}

impl Profile {
    fn new(
        amount: (f64, f64),
        mean_days_to_claim: f64,
        previous_claims_rate: f64,
        relation_weights: [f64; 4],
        recent_change_rate: f64,
    ) -> Result<Self, FraudError> {
        let invalid = |e: String| FraudError::Training(format!("invalid sample distribution: {e}"));
        Ok(Self {
            amount: LogNormal::new(amount.0, amount.1).map_err(|e| invalid(e.to_string()))?,
            days_to_claim: Exp::new(1.0 / mean_days_to_claim).map_err(|e| invalid(e.to_string()))?,
            previous_claims: Poisson::new(previous_claims_rate).map_err(|e| invalid(e.to_string()))?,
            relation: WeightedIndex::new(relation_weights).map_err(|e| invalid(e.to_string()))?,
            recent_change_rate,
        })
    }
}

/// Seeded generator of labelled claims submitted in the year before `as_of`
#[derive(Debug, Clone)]
pub struct SampleClaimGenerator {
    rng: StdRng,
    fraud_rate: f64,
    as_of: DateTime<Utc>,
    fraud: Profile,
    legitimate: Profile,
    premium: Uniform<f64>,
    age: Uniform<u32>,
}

impl SampleClaimGenerator {
    /// # Errors
    ///
    /// `FraudError::Training` when `fraud_rate` is outside [0, 1].
    pub fn new(seed: u64, fraud_rate: f64, as_of: DateTime<Utc>) -> Result<Self, FraudError> {
        if !(0.0..=1.0).contains(&fraud_rate) {
            return Err(FraudError::Training(format!(
                "fraud rate must be within [0, 1], got {fraud_rate}"
            )));
        }
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            fraud_rate,
            as_of,
            fraud: Profile::new((8.0, 1.5), 60.0, 0.5, [0.2, 0.2, 0.15, 0.45], 0.4)?,
            legitimate: Profile::new((7.0, 1.0), 365.0, 0.2, [0.45, 0.3, 0.15, 0.1], 0.05)?,
            premium: Uniform::new(500.0, 5000.0),
            age: Uniform::new_inclusive(25, 80),
        })
    }

    pub fn generate(&mut self, count: usize) -> Vec<LabeledClaim> {
        (0..count).map(|_| self.next_claim()).collect()
    }

    pub fn next_claim(&mut self) -> LabeledClaim {
        let is_fraud = self.rng.gen_bool(self.fraud_rate);
        let profile = if is_fraud { &self.fraud } else { &self.legitimate };
        let rng = &mut self.rng;

        let submitted_at = self.as_of - Duration::minutes(rng.gen_range(0..60 * 24 * 365));
        let days_since_start = (profile.days_to_claim.sample(rng).floor() as i64).clamp(0, 3650);
        let effective_date = (submitted_at - Duration::days(days_since_start)).date_naive();
        let loss_date = submitted_at.date_naive() - Duration::days(rng.gen_range(0..=days_since_start.min(14)));

        let amount = profile.amount.sample(rng);
        let premium = self.premium.sample(rng);
        let claim_type = CLAIM_TYPES[rng.gen_range(0..CLAIM_TYPES.len())];
        let relation = RELATIONS[profile.relation.sample(rng)];
        let previous_claims = profile.previous_claims.sample(rng) as u32;
        let age = self.age.sample(rng);

        let mut claim = ClaimRecord::new(
            PolicyId::new(),
            PartyId::new(),
            claim_type,
            effective_date,
            submitted_at,
        )
        .with_amount(usd(amount))
        .with_premium(usd(premium))
        .with_loss_date(loss_date)
        .with_beneficiary_relation(relation)
        .with_previous_claims(previous_claims)
        .with_claimant_age(age);

        if rng.gen_bool(profile.recent_change_rate) {
            let days_before = rng.gen_range(1..=60).min(days_since_start);
            claim = claim.with_beneficiary_change(submitted_at - Duration::days(days_before));
        } else if rng.gen_bool(0.1) {
            let days_before = rng.gen_range(180..=2000).min(days_since_start);
            claim = claim.with_beneficiary_change(submitted_at - Duration::days(days_before));
        }

        LabeledClaim { claim, is_fraud }
    }
}

fn usd(value: f64) -> Money {
    let amount = Decimal::from_f64(value).unwrap_or(Decimal::ZERO).round_dp(2);
    Money::new(amount, Currency::USD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn generator(seed: u64) -> SampleClaimGenerator {
        let as_of = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        SampleClaimGenerator::new(seed, 0.15, as_of).unwrap()
    }

    #[test]
    fn test_generated_claims_are_valid() {
        for labeled in generator(1).generate(500) {
            assert!(labeled.claim.validate().is_ok(), "{:?}", labeled.claim);
        }
    }

    #[test]
    fn test_same_seed_same_labels_and_amounts() {
        let a = generator(9).generate(50);
        let b = generator(9).generate(50);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.is_fraud, y.is_fraud);
            assert_eq!(x.claim.claim_amount, y.claim.claim_amount);
            assert_eq!(x.claim.policy_effective_date, y.claim.policy_effective_date);
        }
    }

    #[test]
    fn test_fraud_rate_roughly_respected() {
        let claims = generator(3).generate(2_000);
        let rate = claims.iter().filter(|c| c.is_fraud).count() as f64 / claims.len() as f64;
        assert!((0.11..0.19).contains(&rate), "rate {rate}");
    }

    #[test]
    fn test_invalid_fraud_rate_rejected() {
        let as_of = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        assert!(SampleClaimGenerator::new(1, 1.5, as_of).is_err());
    }
}
