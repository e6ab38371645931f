//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating claims that satisfy the
//! record invariants, with optional inputs present or absent.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::{Currency, Money, PartyId, PolicyId};
use domain_fraud::{BeneficiaryRelation, ClaimRecord, ClaimType};

/// Strategy for generating claim types
pub fn claim_type_strategy() -> impl Strategy<Value = ClaimType> {
    prop_oneof![
        Just(ClaimType::Death),
        Just(ClaimType::Disability),
        Just(ClaimType::CriticalIllness),
        Just(ClaimType::AccidentalDeath),
        Just(ClaimType::Other),
    ]
}

/// Strategy for generating beneficiary relations
pub fn relation_strategy() -> impl Strategy<Value = BeneficiaryRelation> {
    prop_oneof![
        Just(BeneficiaryRelation::Spouse),
        Just(BeneficiaryRelation::Child),
        Just(BeneficiaryRelation::Parent),
        Just(BeneficiaryRelation::Other),
    ]
}

/// Strategy for USD amounts in cents, up to $10 million
pub fn usd_strategy() -> impl Strategy<Value = Money> {
    (0i64..1_000_000_000i64).prop_map(|cents| Money::new(Decimal::new(cents, 2), Currency::USD))
}

/// Strategy for calibrated risk scores
pub fn risk_score_strategy() -> impl Strategy<Value = f64> {
    0.0f64..=1.0f64
}

/// Strategy for claims that satisfy every record invariant and always carry
/// an amount; other optional inputs may be absent
pub fn valid_claim_strategy() -> impl Strategy<Value = ClaimRecord> {
    (
        claim_type_strategy(),
        usd_strategy(),
        proptest::option::of(usd_strategy()),
        0i64..7_300,
        proptest::option::of(0i64..7_300),
        proptest::option::of(relation_strategy()),
        proptest::option::of(0u32..20),
        proptest::option::of(18u32..100),
        0i64..(365 * 24 * 60),
    )
        .prop_map(
            |(claim_type, amount, premium, days_in, change_before, relation, previous, age, minute)| {
                let submitted_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
                let effective = (submitted_at - Duration::days(days_in)).date_naive();
                let mut claim = ClaimRecord::new(PolicyId::new(), PartyId::new(), claim_type, effective, submitted_at)
                    .with_amount(amount);
                claim.policy_premium = premium;
                claim.beneficiary_changed_at = change_before.map(|d| submitted_at - Duration::days(d));
                claim.beneficiary_relation = relation;
                claim.previous_claims = previous;
                claim.claimant_age = age;
                claim
            },
        )
}
